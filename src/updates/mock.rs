//! In-memory transport for testing.
//!
//! `MockTransport` implements [`Transport`] from canned responses and records
//! every request for later assertion. Unregistered URLs fail like a refused
//! connection.
//!
//! # Example
//!
//! ```
//! use updraft::updates::mock::MockTransport;
//! use updraft::updates::Transport;
//! use reqwest::Url;
//!
//! let transport = MockTransport::new()
//!     .with_text("https://api.example.com/ping", 200, "pong");
//!
//! let url = Url::parse("https://api.example.com/ping").unwrap();
//! let response = transport.get_text(&url, &[]).unwrap();
//! assert_eq!(response.body, "pong");
//! assert_eq!(transport.requests(), vec!["GET https://api.example.com/ping"]);
//! ```

use reqwest::Url;
use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Mutex;

use crate::error::{Result, UpdraftError};

use super::transport::{ResponseHead, StreamResponse, TextResponse, Transport};

#[derive(Debug, Clone)]
enum Body {
    Bytes(Vec<u8>),
    /// `len` zero bytes generated on the fly.
    Generated(u64),
    /// `ok_bytes` zero bytes, then an I/O error.
    FailAfter(u64),
}

#[derive(Debug, Clone)]
struct Download {
    status: u16,
    content_length: Option<u64>,
    body: Body,
    chunk_size: usize,
}

/// Canned-response [`Transport`] for tests.
#[derive(Debug, Default)]
pub struct MockTransport {
    texts: HashMap<String, TextResponse>,
    heads: HashMap<String, ResponseHead>,
    downloads: HashMap<String, Download>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Create a transport with no registered responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a text response for `get_text`.
    pub fn with_text(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.texts.insert(
            url.to_string(),
            TextResponse {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// Register a `HEAD` response.
    pub fn with_head(mut self, url: &str, status: u16, content_length: Option<u64>) -> Self {
        self.heads.insert(
            url.to_string(),
            ResponseHead {
                status,
                content_length,
            },
        );
        self
    }

    /// Register a download whose body is `body`, delivered `chunk_size` bytes per read.
    ///
    /// The declared `Content-Length` is the body length.
    pub fn with_download(mut self, url: &str, body: Vec<u8>, chunk_size: usize) -> Self {
        let len = body.len() as u64;
        self.downloads.insert(
            url.to_string(),
            Download {
                status: 200,
                content_length: Some(len),
                body: Body::Bytes(body),
                chunk_size,
            },
        );
        self
    }

    /// Register a download of `len` generated bytes with an explicit declared length.
    pub fn with_generated_download(
        mut self,
        url: &str,
        len: u64,
        content_length: Option<u64>,
        chunk_size: usize,
    ) -> Self {
        self.downloads.insert(
            url.to_string(),
            Download {
                status: 200,
                content_length,
                body: Body::Generated(len),
                chunk_size,
            },
        );
        self
    }

    /// Register a download that fails after `ok_bytes` bytes.
    pub fn with_broken_download(mut self, url: &str, declared: u64, ok_bytes: u64) -> Self {
        self.downloads.insert(
            url.to_string(),
            Download {
                status: 200,
                content_length: Some(declared),
                body: Body::FailAfter(ok_bytes),
                chunk_size: 1024,
            },
        );
        self
    }

    /// Register a download that answers with an error status.
    pub fn with_download_status(mut self, url: &str, status: u16) -> Self {
        self.downloads.insert(
            url.to_string(),
            Download {
                status,
                content_length: Some(0),
                body: Body::Bytes(Vec::new()),
                chunk_size: 1024,
            },
        );
        self
    }

    /// All requests made so far, as `"METHOD url"`.
    pub fn requests(&self) -> Vec<String> {
        self.log().clone()
    }

    /// Number of requests made so far.
    pub fn request_count(&self) -> usize {
        self.log().len()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, method: &str, url: &Url) {
        self.log().push(format!("{} {}", method, url));
    }

    fn refused(url: &Url) -> UpdraftError {
        UpdraftError::transport(format!("could not connect to {}", url))
    }
}

impl Transport for MockTransport {
    fn get_text(&self, url: &Url, _headers: &[(&str, &str)]) -> Result<TextResponse> {
        self.record("GET", url);
        self.texts
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Self::refused(url))
    }

    fn head(&self, url: &Url) -> Result<ResponseHead> {
        self.record("HEAD", url);
        self.heads
            .get(url.as_str())
            .copied()
            .ok_or_else(|| Self::refused(url))
    }

    fn open(&self, url: &Url) -> Result<StreamResponse> {
        self.record("GET", url);
        let download = self
            .downloads
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Self::refused(url))?;

        let head = ResponseHead {
            status: download.status,
            content_length: download.content_length,
        };

        Ok(StreamResponse {
            head,
            body: Box::new(ChunkedBody {
                body: download.body,
                position: 0,
                chunk_size: download.chunk_size.max(1),
            }),
        })
    }
}

/// Reader that hands out at most `chunk_size` bytes per call.
struct ChunkedBody {
    body: Body,
    position: u64,
    chunk_size: usize,
}

impl Read for ChunkedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (total, fails) = match &self.body {
            Body::Bytes(bytes) => (bytes.len() as u64, false),
            Body::Generated(len) => (*len, false),
            Body::FailAfter(ok) => (*ok, true),
        };

        let remaining = total - self.position;
        if remaining == 0 {
            if fails {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                ));
            }
            return Ok(0);
        }

        let n = (buf.len().min(self.chunk_size) as u64).min(remaining) as usize;
        match &self.body {
            Body::Bytes(bytes) => {
                let start = self.position as usize;
                buf[..n].copy_from_slice(&bytes[start..start + n]);
            }
            Body::Generated(_) | Body::FailAfter(_) => buf[..n].fill(0),
        }
        self.position += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn unregistered_url_is_refused() {
        let transport = MockTransport::new();
        let err = transport.head(&url("https://example.com/a")).unwrap_err();
        assert!(matches!(err, UpdraftError::Transport { .. }));
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn download_respects_chunk_size() {
        let transport =
            MockTransport::new().with_download("https://example.com/a", vec![1u8; 10], 4);
        let mut response = transport.open(&url("https://example.com/a")).unwrap();

        let mut buf = [0u8; 64];
        let sizes: Vec<usize> = std::iter::from_fn(|| match response.body.read(&mut buf) {
            Ok(0) => None,
            Ok(n) => Some(n),
            Err(_) => None,
        })
        .collect();

        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(response.head.content_length, Some(10));
    }

    #[test]
    fn broken_download_errors_after_prefix() {
        let transport = MockTransport::new().with_broken_download("https://example.com/a", 100, 10);
        let mut response = transport.open(&url("https://example.com/a")).unwrap();

        let mut body = Vec::new();
        let err = response.body.read_to_end(&mut body).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(body.len(), 10);
    }

    #[test]
    fn records_requests_in_order() {
        let transport = MockTransport::new()
            .with_head("https://example.com/a", 200, Some(1))
            .with_download("https://example.com/a", vec![1], 1);

        transport.head(&url("https://example.com/a")).unwrap();
        transport.open(&url("https://example.com/a")).unwrap();

        assert_eq!(
            transport.requests(),
            vec!["HEAD https://example.com/a", "GET https://example.com/a"]
        );
    }
}
