//! Minimal HTTP client for page and image fetches, with safe logging.
//!
//! - Plain GETs against absolute URLs: text for HTML pages, bytes for images
//! - One attempt per request: no retries, no custom headers or timeout
//! - Optional *raw* request/response logging via `MARQUEE_HTTP_RAW=1`
//! - [`Fetcher`] is the seam the resolution pipeline talks to, so tests can
//!   swap in a stub without a network
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), marquee_http::HttpError> {
//! let client = marquee_http::HttpClient::new()?;
//! let html = client
//!     .get_text("https://www.example.com/")
//!     .await?;
//! # let _ = html;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), final errors, and
//! (optionally) raw request/response lines on target `http.raw`.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode, Url};
use std::env;
use std::time::Instant;
use thiserror::Error;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "MARQUEE_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug.
fn make_curl(method: &Method, url: &Url) -> String {
    format!("curl -X{} '{}'", method, url.as_str().replace('\'', r"'\''"))
}

fn header_pairs(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status} for {url}: {snippet}")]
    Status {
        status: StatusCode,
        url: String,
        snippet: String,
    },
}

impl HttpError {
    /// HTTP status for [`HttpError::Status`], `None` for transport-level failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Construct a client with reqwest's defaults: no overall timeout, no
    /// custom headers.
    pub fn new() -> Result<Self, HttpError> {
        let inner = Client::builder()
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self { inner })
    }

    /// GET a page and decode the body as text (lossy UTF-8).
    pub async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        let bytes = self.get_internal(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// GET raw bytes (images, downloads).
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.get_internal(url).await
    }

    // ==============================
    // Core request implementation
    // ==============================

    /// One attempt: send, check status, read the body.
    async fn get_internal(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let url = Url::parse(url).map_err(|e| HttpError::Url(format!("{url}: {e}")))?;
        let method = Method::GET;

        let req_id = format!(
            "r{:x}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        tracing::debug!(
            req_id=%req_id,
            method=%method,
            host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            "http.request.start"
        );

        if raw_enabled() {
            let curl = make_curl(&method, &url);
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let t0 = Instant::now();
        let resp = self
            .inner
            .request(method, url.clone())
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(req_id=%req_id, message=%err, "http.network_error.send");
                HttpError::Network(err.to_string())
            })?;

        let status = resp.status();
        let headers = resp.headers().clone();
        tracing::debug!(
            req_id=%req_id,
            %status,
            content_type=?headers.get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            "http.response.headers"
        );

        let bytes = resp.bytes().await.map_err(|err| {
            tracing::warn!(req_id=%req_id, message=%err, "http.network_error.body");
            HttpError::Network(err.to_string())
        })?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        if raw_enabled() {
            let truncated = bytes.len() > RAW_MAX_BODY;
            let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
            tracing::info!(
                target:"http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                headers=?header_pairs(&headers),
                body=%text,
                truncated
            );
        }

        if status.is_success() {
            tracing::debug!(req_id=%req_id, duration_ms=dur_ms, body_len=bytes.len(), "http.response.body");
            return Ok(bytes.to_vec());
        }

        let snippet = snip_body(&bytes);
        tracing::warn!(
            req_id=%req_id,
            %status,
            body_snippet=%snippet,
            "http.error"
        );
        Err(HttpError::Status {
            status,
            url: url.to_string(),
            snippet,
        })
    }
}

// ==============================
// Fetcher seam
// ==============================

/// The two GET shapes the resolution pipeline needs.
///
/// [`HttpClient`] is the production implementation; tests provide stubs
/// that serve fixtures and count invocations.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch an HTML page as text.
    async fn fetch_text(&self, url: &str) -> Result<String, HttpError>;

    /// Fetch a binary resource.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError>;
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch_text(&self, url: &str) -> Result<String, HttpError> {
        self.get_text(url).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.get_bytes(url).await
    }
}

// ==============================
// Helpers
// ==============================

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > SNIPPET_MAX {
        let mut cut = SNIPPET_MAX;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}
