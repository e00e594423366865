//! # HTTP Client Module
//!
//! Minimal single-shot HTTP GET over an externally supplied TCP primitive.
//!
//! This module handles:
//! - Host resolution through the link driver (bounded retries)
//! - Opening one TCP connection with a configured timeout
//! - Writing the bare two-header request
//! - Parsing the response with an explicit state machine
//! - Releasing the connection on every exit path, error paths included
//!
//! There is no connection reuse, no TLS and no support for concurrent
//! requests; the agent issues exactly one GET at startup for geolocation.

pub mod parser;
pub mod transport;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::link::LinkDriver;
use parser::ResponseParser;
pub use transport::{TcpTransport, TokioTcp};

/// Port the geolocation provider listens on. Plain HTTP only.
pub const HTTP_PORT: u16 = 80;

/// How many times to retry host resolution before giving up.
const RESOLVE_ATTEMPTS: u32 = 5;

/// Delay between resolution attempts.
const RESOLVE_RETRY_DELAY_MS: u64 = 100;

/// Read chunk size while draining the response.
const READ_CHUNK: usize = 512;

/// Typed failures of the HTTP client.
///
/// Parse and resource errors are recoverable by design: the caller decides
/// whether to degrade (publish without enrichment) or abort.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Host name did not resolve within the retry budget
    #[error("could not resolve host {0}")]
    ResolutionFailed(String),

    /// TCP connect failed or timed out
    #[error("could not connect to {0}: {1}")]
    ConnectFailed(String, std::io::Error),

    /// Response did not match the expected HTTP/1.1 shape
    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),

    /// Server answered with a non-200 status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Response carried no `Content-Length` header
    #[error("response missing Content-Length header")]
    MissingContentLength,

    /// Declared body length exceeds the caller-supplied capacity
    #[error("response body of {length} bytes exceeds buffer capacity of {capacity}")]
    ResponseTooLarge { length: usize, capacity: usize },

    /// Transport-level I/O failure mid-request
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully received HTTP response.
///
/// `body.len()` equals `content_length` and never exceeds the capacity the
/// caller passed to [`HttpClient::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_length: usize,
    pub body: Vec<u8>,
}

/// Single-request HTTP client.
///
/// Owns the TCP primitive; host resolution is delegated to the link driver
/// because only the link knows whether name lookup can work at all.
pub struct HttpClient<T: TcpTransport> {
    transport: T,
    timeout_ms: u64,
}

impl<T: TcpTransport> HttpClient<T> {
    /// `timeout_ms` bounds both the TCP connect and each response read.
    pub fn new(transport: T, timeout_ms: u64) -> Self {
        Self { transport, timeout_ms }
    }

    /// Perform a one-shot GET and return the parsed response.
    ///
    /// The request on the wire is exactly
    /// `GET <path> HTTP/1.1\r\nHost: <host>\r\n\r\n` — no other headers.
    /// A response whose declared length exceeds `max_body` fails with
    /// [`HttpError::ResponseTooLarge`] before any body byte is stored.
    ///
    /// The connection is closed on every exit path.
    pub async fn get<L: LinkDriver>(
        &mut self,
        link: &mut L,
        host: &str,
        path: &str,
        max_body: usize,
    ) -> Result<HttpResponse, HttpError> {
        let result = self.request(link, host, path, max_body).await;
        self.transport.close().await;
        result
    }

    async fn request<L: LinkDriver>(
        &mut self,
        link: &mut L,
        host: &str,
        path: &str,
        max_body: usize,
    ) -> Result<HttpResponse, HttpError> {
        let addr = self.resolve(link, host).await?;
        debug!(host, %addr, "resolved HTTP host");

        self.transport
            .connect(addr, HTTP_PORT, self.timeout_ms)
            .await
            .map_err(|e| HttpError::ConnectFailed(host.to_string(), e))?;

        let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\n\r\n");
        self.transport.write_all(request.as_bytes()).await?;
        debug!(host, path, "request sent, awaiting response");

        let mut response_parser = ResponseParser::new(max_body);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.transport.read(&mut chunk, self.timeout_ms).await?;
            if n == 0 {
                break;
            }
            if response_parser.feed(&chunk[..n])? {
                break;
            }
        }
        response_parser.finish()
    }

    async fn resolve<L: LinkDriver>(
        &mut self,
        link: &mut L,
        host: &str,
    ) -> Result<std::net::IpAddr, HttpError> {
        for attempt in 1..=RESOLVE_ATTEMPTS {
            match link.resolve_host(host).await {
                Ok(addr) => return Ok(addr),
                Err(e) => {
                    warn!(host, attempt, "host resolution failed: {e}");
                    if attempt < RESOLVE_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(RESOLVE_RETRY_DELAY_MS)).await;
                    }
                }
            }
        }
        Err(HttpError::ResolutionFailed(host.to_string()))
    }
}
