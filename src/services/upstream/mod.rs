//! Adapters for the external AI scoring service
//!
//! Both gateways share one HTTP transport and one failure translation: a
//! single attempt per call, bounded by connect and read timeouts, with every
//! failure mapped onto [`UpstreamError`].

use reqwest::header::ACCEPT;
use reqwest::Client as HttpClient;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::error::{AppResult, UpstreamError};

pub mod comfort;
pub mod recommendation;

pub use comfort::{normalize_ratio_pair, ComfortClient};
pub use recommendation::{RecommendationClient, RecommendationGateway};

/// HTTP transport to the AI service
#[derive(Clone)]
pub struct UpstreamTransport {
    http_client: HttpClient,
    base_url: String,
}

impl UpstreamTransport {
    /// `read_timeout` bounds each wait for data, not the whole exchange
    pub fn new(base_url: &str, connect_timeout: Duration, read_timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POSTs `body` as JSON to `path` and decodes the response
    pub async fn post_json<Req, Res>(&self, path: &str, body: &Req) -> Result<Res, UpstreamError>
    where
        Req: Serialize + ?Sized + Sync,
        Res: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(translate_transport_error)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(url = %url, status = status.as_u16(), "AI service returned error status");
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            return Err(UpstreamError::BadResponse {
                message: format!("AI returned unexpected status {}", status.as_u16()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(translate_transport_error)?;

        decode_body(&bytes)
    }
}

/// Decodes a 2xx body; blank and `null` bodies count as missing
fn decode_body<Res: DeserializeOwned>(bytes: &[u8]) -> Result<Res, UpstreamError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(empty_body());
    }

    match serde_json::from_slice::<Option<Res>>(bytes) {
        Ok(Some(decoded)) => Ok(decoded),
        Ok(None) => Err(empty_body()),
        Err(e) => Err(UpstreamError::Client {
            message: format!("could not decode response: {}", e),
        }),
    }
}

fn empty_body() -> UpstreamError {
    UpstreamError::BadResponse {
        message: "AI returned empty body".to_string(),
    }
}

/// True when any error in the chain is an I/O timeout
fn timed_out(e: &reqwest::Error) -> bool {
    if e.is_timeout() {
        return true;
    }
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = err.source();
    }
    false
}

fn translate_transport_error(e: reqwest::Error) -> UpstreamError {
    if timed_out(&e) || e.is_connect() {
        tracing::error!(error = %e, "AI service unreachable or timed out");
        UpstreamError::Timeout {
            message: e.to_string(),
        }
    } else {
        tracing::error!(error = %e, "AI client error");
        UpstreamError::Client {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use axum::Router;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serves `router` on an ephemeral port and returns its base URL
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Answers one request with a chunked `body`, pausing `pause` before each chunk
    pub async fn spawn_trickle(body: &'static str, chunk: usize, pause: Duration) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                      transfer-encoding: chunked\r\nconnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            for part in body.as_bytes().chunks(chunk) {
                tokio::time::sleep(pause).await;
                let mut frame = format!("{:x}\r\n", part.len()).into_bytes();
                frame.extend_from_slice(part);
                frame.extend_from_slice(b"\r\n");
                socket.write_all(&frame).await.unwrap();
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
        });
        format!("http://{}", addr)
    }
}
