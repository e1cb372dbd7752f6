//! HTTP client with timeout and error classification.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::config::Credentials;

/// Finite per-request timeout. A slow catalog must surface as an ordinary
/// failure the caller logs, never stall the whole query.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Classified network failure.
///
/// Callers hold an `anyhow::Error` and downcast to this to distinguish the
/// 404 that drives the update-resolver fallback from everything else.
#[derive(Debug)]
pub enum NetworkError {
    /// HTTP 404 — on the batch update endpoint this means the server does
    /// not implement the API, not that the query failed.
    NotFound(String),
    /// Any other non-2xx status.
    Status(u16, String),
    /// Request exceeded [`REQUEST_TIMEOUT`].
    Timeout(String),
    /// Connection-level failure (DNS, refused, reset, TLS).
    Transport(String),
}

impl NetworkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetworkError::NotFound(_))
    }
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::NotFound(url) => write!(f, "Not found: {}", url),
            NetworkError::Status(code, url) => write!(f, "HTTP {} from {}", code, url),
            NetworkError::Timeout(url) => write!(f, "Request timed out: {}", url),
            NetworkError::Transport(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Byte-stream transport consumed by the remote strategy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`, optionally with basic-auth credentials, returning the
    /// response body as text.
    async fn get_text<'a>(&self, url: &str, credentials: Option<&'a Credentials>) -> Result<String>;
}

/// HTTP client for catalog feeds.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the standard timeout applied.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("nufeed")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Wraps an existing reqwest Client. Used primarily for testing.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpClient {
    /// Performs a GET request and returns the response body as text.
    ///
    /// Failures come back as [`NetworkError`] wrapped in `anyhow::Error`.
    #[tracing::instrument(skip(self, credentials))]
    async fn get_text<'a>(&self, url: &str, credentials: Option<&'a Credentials>) -> Result<String> {
        debug!("GET {}...", url);

        let mut request = self.client.get(url);
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.username, credentials.password.as_deref());
        }

        let response = request.send().await.map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(NetworkError::NotFound(url.to_string()).into());
        }
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16(), url.to_string()).into());
        }

        response
            .text()
            .await
            .map_err(|e| classify_send_error(url, e))
    }
}

fn classify_send_error(url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        NetworkError::Timeout(url.to_string()).into()
    } else {
        NetworkError::Transport(error.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_text_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/feed")
            .with_status(200)
            .with_body("<feed/>")
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let body = client
            .get_text(&format!("{}/feed", url), None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body, "<feed/>");
    }

    #[tokio::test]
    async fn test_get_text_not_found_is_classified() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/feed")
            .with_status(404)
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let err = client
            .get_text(&format!("{}/feed", url), None)
            .await
            .unwrap_err();

        mock.assert_async().await;
        let network = err.downcast_ref::<NetworkError>().unwrap();
        assert!(network.is_not_found());
    }

    #[tokio::test]
    async fn test_get_text_server_error_is_status() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/feed")
            .with_status(503)
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let err = client
            .get_text(&format!("{}/feed", url), None)
            .await
            .unwrap_err();

        mock.assert_async().await;
        match err.downcast_ref::<NetworkError>() {
            Some(NetworkError::Status(503, _)) => {}
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_text_sends_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        // "user:pass" base64-encoded
        let mock = server
            .mock("GET", "/feed")
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let credentials = Credentials {
            username: "user".into(),
            password: Some("pass".into()),
        };

        let client = HttpClient::new().unwrap();
        let body = client
            .get_text(&format!("{}/feed", url), Some(&credentials))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_get_text_connection_refused_is_transport() {
        let client = HttpClient::new().unwrap();
        // Port 1 is never listening
        let err = client
            .get_text("http://127.0.0.1:1/feed", None)
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<NetworkError>().is_some());
    }
}
