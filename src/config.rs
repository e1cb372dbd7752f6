//! Source configuration.
//!
//! Consumes an ordered list of source descriptors (typically JSON). A reload
//! rebuilds the whole source list; stale instances are never patched.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;

use crate::source::Source;

/// Username plus optional password for a remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// One configured source as it appears in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    /// Local directory or HTTP endpoint. May contain `${VAR}` / `%VAR%`
    /// placeholders, expanded when the source is built.
    pub path: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SourceDescriptor {
    pub fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone(),
        })
    }
}

/// Parse a JSON list of descriptors.
pub fn parse_descriptors(json: &str) -> Result<Vec<SourceDescriptor>> {
    serde_json::from_str(json).context("Failed to parse source configuration")
}

/// Build the active source list from descriptors. Called at startup and on
/// every config reload; the returned list replaces the previous one
/// wholesale.
pub fn load_sources(descriptors: &[SourceDescriptor]) -> Result<Vec<Source>> {
    descriptors.iter().map(Source::from_descriptor).collect()
}

/// Expand `${VAR}` and `%VAR%` placeholders against the process environment.
/// Unset variables leave the placeholder untouched.
pub fn expand_env_placeholders(path: &str) -> String {
    let mut expanded = path.to_string();

    while let Some(start) = expanded.find("${") {
        let Some(len) = expanded[start + 2..].find('}') else {
            break;
        };
        let name = expanded[start + 2..start + 2 + len].to_string();
        match env::var(&name) {
            Ok(value) => expanded.replace_range(start..start + 3 + len, &value),
            Err(_) => {
                debug!("Leaving unset placeholder ${{{}}} in path", name);
                break;
            }
        }
    }

    // %VAR% form, common in configs written on Windows
    let mut search_from = 0;
    while let Some(offset) = expanded[search_from..].find('%') {
        let start = search_from + offset;
        let Some(len) = expanded[start + 1..].find('%') else {
            break;
        };
        let name = expanded[start + 1..start + 1 + len].to_string();
        match env::var(&name) {
            Ok(value) => {
                expanded.replace_range(start..start + 2 + len, &value);
                search_from = start + value.len();
            }
            Err(_) => {
                debug!("Leaving unset placeholder %{}% in path", name);
                search_from = start + 2 + len;
            }
        }
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptors() {
        let json = r#"[
            {"name": "official", "path": "https://feed.example.com/api/v2"},
            {"name": "local", "path": "/tmp/packages", "enabled": false},
            {"name": "private", "path": "https://priv.example.com",
             "username": "user", "password": "secret"}
        ]"#;

        let descriptors = parse_descriptors(json).unwrap();
        assert_eq!(descriptors.len(), 3);
        assert!(descriptors[0].enabled);
        assert!(!descriptors[1].enabled);

        let credentials = descriptors[2].credentials().unwrap();
        assert_eq!(credentials.username, "user");
        assert_eq!(credentials.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_parse_descriptors_invalid() {
        assert!(parse_descriptors("not json").is_err());
    }

    #[test]
    fn test_credentials_absent_without_username() {
        let json = r#"[{"name": "s", "path": "/p", "password": "orphan"}]"#;
        let descriptors = parse_descriptors(json).unwrap();
        assert!(descriptors[0].credentials().is_none());
    }

    #[test]
    fn test_expand_braced_placeholder() {
        // SAFETY: test-local env mutation
        unsafe { env::set_var("NUFEED_TEST_DIR", "/opt/pkgs") };
        assert_eq!(
            expand_env_placeholders("${NUFEED_TEST_DIR}/cache"),
            "/opt/pkgs/cache"
        );
    }

    #[test]
    fn test_expand_percent_placeholder() {
        unsafe { env::set_var("NUFEED_TEST_PCT", "abc") };
        assert_eq!(expand_env_placeholders("%NUFEED_TEST_PCT%/x"), "abc/x");
    }

    #[test]
    fn test_expand_unset_left_untouched() {
        assert_eq!(
            expand_env_placeholders("${NUFEED_DEFINITELY_UNSET}/x"),
            "${NUFEED_DEFINITELY_UNSET}/x"
        );
    }

    #[test]
    fn test_load_sources_splits_local_and_remote() {
        let descriptors = parse_descriptors(
            r#"[
                {"name": "remote", "path": "https://feed.example.com/api/v2"},
                {"name": "disk", "path": "/var/packages"}
            ]"#,
        )
        .unwrap();

        let sources = load_sources(&descriptors).unwrap();
        assert!(!sources[0].is_local());
        assert!(sources[1].is_local());
    }
}
