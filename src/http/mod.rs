//! HTTP transport for remote catalog queries.

mod client;

pub use client::{HttpClient, NetworkError, REQUEST_TIMEOUT, Transport};

#[cfg(test)]
pub use client::MockTransport;
