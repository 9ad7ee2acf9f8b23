//! HTTP download client
//!
//! This module provides a shared HTTP client with:
//! - Connect and per-read timeouts (no cap on total transfer time) and a User-Agent
//! - Exponential backoff retry logic for connection errors (max 3 retries)
//! - Streaming of response bodies straight to disk

use crate::error::HttpError;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Default timeout for establishing a connection
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for each read; a download may take longer as long as bytes keep arriving
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default User-Agent header
const DEFAULT_USER_AGENT: &str = concat!("extboot/", env!("CARGO_PKG_VERSION"));

/// Maximum number of retry attempts
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BASE_DELAY_MS: u64 = 250;

/// Something that can stream a URL into a file
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written
    ///
    /// Implementations must check the response status before creating `dest`.
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError>;
}

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(
        connect_timeout: Duration,
        read_timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, HttpError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| HttpError::Client {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Perform a GET request, retrying transport errors and 429/5xx responses
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, HttpError> {
        let mut last_error = None;
        let mut delay = BASE_DELAY_MS;

        for attempt in 0..=self.max_retries {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let error = HttpError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    };
                    let retryable = status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error();
                    if !retryable {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
                Err(e) => {
                    last_error = Some(if e.is_timeout() {
                        HttpError::Timeout {
                            url: url.to_string(),
                        }
                    } else {
                        HttpError::Network {
                            url: url.to_string(),
                            message: e.to_string(),
                        }
                    });
                }
            }

            if attempt < self.max_retries {
                warn!(url, attempt, "request failed, retrying");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay *= 2;
            }
        }

        Err(last_error.unwrap_or_else(|| HttpError::Network {
            url: url.to_string(),
            message: "unknown error".to_string(),
        }))
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
        let response = self.get(url).await?;
        debug!(url, dest = %dest.display(), length = ?response.content_length(), "downloading");

        let write_error = |source| HttpError::Write {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(write_error)?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| HttpError::Network {
                url: url.to_string(),
                message: format!("error reading body: {}", e),
            })?;
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_error)?;

        debug!(url, bytes = written, "download complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_http_client_with_config() {
        let client = HttpClient::with_config(
            Duration::from_secs(10),
            Duration::from_secs(60),
            "test-agent/1.0",
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_http_client_with_max_retries() {
        let client = HttpClient::new().unwrap().with_max_retries(5);
        assert_eq!(client.max_retries, 5);
    }

    #[test]
    fn test_default_constants() {
        assert!(DEFAULT_USER_AGENT.starts_with("extboot/"));
        assert_eq!(MAX_RETRIES, 3);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = HttpClient::with_config(Duration::from_secs(2), Duration::from_secs(2), "test")
            .unwrap()
            .with_max_retries(0);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tool");

        // Port 9 (discard) on localhost is closed on test machines
        let result = client.fetch_to("http://127.0.0.1:9/tool", &dest).await;
        assert!(matches!(
            result,
            Err(HttpError::Network { .. }) | Err(HttpError::Timeout { .. })
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_slow_body_outlives_read_timeout() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        const BODY: &[u8] = b"extboot!";
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                BODY.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for byte in BODY {
                tokio::time::sleep(Duration::from_millis(150)).await;
                socket.write_all(&[*byte]).await.unwrap();
                socket.flush().await.unwrap();
            }
        });

        // Every read completes well within the read timeout, the whole body does not
        let client = HttpClient::with_config(
            Duration::from_secs(2),
            Duration::from_millis(600),
            "test",
        )
        .unwrap()
        .with_max_retries(0);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("artifact");

        let written = client
            .fetch_to(&format!("http://{}/artifact", addr), &dest)
            .await
            .unwrap();
        assert_eq!(written, BODY.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), BODY);
        server.await.unwrap();
    }
}
