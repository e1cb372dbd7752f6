pub mod archive;
pub mod config;
pub mod feed;
pub mod http;
pub mod package;
pub mod source;
pub mod updates;
pub mod version;
