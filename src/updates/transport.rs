//! HTTP transport used by the resolver and the fetcher.
//!
//! The [`Transport`] trait is the seam between update logic and the network.
//! [`HttpTransport`] is the production implementation on a blocking
//! `reqwest` client; [`MockTransport`](super::mock::MockTransport) serves
//! canned responses in tests.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_LENGTH;
use reqwest::redirect::Policy;
use reqwest::Url;
use std::io::Read;
use std::time::Duration;

use crate::error::{Result, UpdraftError};

/// Default ceiling for metadata requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection timeout for artifact downloads. The body itself is not bounded
/// by a total timeout because large artifacts legitimately take longer.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// Status line and size of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code.
    pub status: u16,
    /// Declared `Content-Length`, if present and numeric.
    pub content_length: Option<u64>,
}

impl ResponseHead {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A fully buffered text response.
#[derive(Debug, Clone)]
pub struct TextResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// A response whose body is read incrementally.
pub struct StreamResponse {
    /// Status and declared size.
    pub head: ResponseHead,
    /// Body reader.
    pub body: Box<dyn Read + Send>,
}

/// Network operations needed by the update core.
pub trait Transport: Send + Sync {
    /// GET a small document, bounded by the request timeout.
    fn get_text(&self, url: &Url, headers: &[(&str, &str)]) -> Result<TextResponse>;

    /// Probe a resource without downloading its body.
    fn head(&self, url: &Url) -> Result<ResponseHead>;

    /// GET a resource and return its body as a stream.
    fn open(&self, url: &Url) -> Result<StreamResponse>;
}

/// [`Transport`] backed by `reqwest`.
pub struct HttpTransport {
    metadata: Client,
    transfer: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport identifying itself as `user_agent`.
    ///
    /// `timeout` bounds metadata requests and is clamped to 30 seconds.
    /// Both clients only speak https, including every redirect hop.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        Self::build(user_agent, timeout, true)
    }

    fn build(user_agent: &str, timeout: Duration, https_only: bool) -> Result<Self> {
        let timeout = timeout.min(DEFAULT_REQUEST_TIMEOUT);

        let metadata = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .https_only(https_only)
            .redirect(redirect_policy())
            .build()
            .map_err(|e| UpdraftError::transport(format!("failed to build HTTP client: {}", e)))?;

        let transfer = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .https_only(https_only)
            .redirect(redirect_policy())
            .build()
            .map_err(|e| UpdraftError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            metadata,
            transfer,
            timeout,
        })
    }

    /// Get the metadata request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Follow up to [`MAX_REDIRECTS`] hops, never onto a non-https URL.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.url().scheme() != "https" {
            let refused = format!("refusing redirect to non-https URL {}", attempt.url());
            attempt.error(refused)
        } else if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error(format!("more than {} redirects", MAX_REDIRECTS))
        } else {
            attempt.follow()
        }
    })
}

fn describe(err: reqwest::Error, url: &Url) -> UpdraftError {
    if err.is_redirect() {
        UpdraftError::transport(format!("request to {} was redirected unsafely: {}", url, err))
    } else if err.is_timeout() {
        UpdraftError::transport(format!("request to {} timed out", url))
    } else if err.is_connect() {
        UpdraftError::transport(format!("could not connect to {}", url))
    } else {
        UpdraftError::transport(format!("request to {} failed: {}", url, err))
    }
}

fn declared_length(response: &reqwest::blocking::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &Url, headers: &[(&str, &str)]) -> Result<TextResponse> {
        tracing::debug!("GET {}", url);

        let mut request = self.metadata.get(url.clone());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().map_err(|e| describe(e, url))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| describe(e, url))?;

        tracing::debug!("GET {} -> {}", url, status);
        Ok(TextResponse { status, body })
    }

    fn head(&self, url: &Url) -> Result<ResponseHead> {
        tracing::debug!("HEAD {}", url);

        let response = self
            .metadata
            .head(url.clone())
            .send()
            .map_err(|e| describe(e, url))?;

        Ok(ResponseHead {
            status: response.status().as_u16(),
            content_length: declared_length(&response),
        })
    }

    fn open(&self, url: &Url) -> Result<StreamResponse> {
        tracing::debug!("GET {} (stream)", url);

        let response = self
            .transfer
            .get(url.clone())
            .send()
            .map_err(|e| describe(e, url))?;

        let head = ResponseHead {
            status: response.status().as_u16(),
            content_length: declared_length(&response),
        };

        Ok(StreamResponse {
            head,
            body: Box::new(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    /// The mock server speaks plain http, so tests lift the https-only rule
    /// for the first hop. Redirects are still held to https.
    fn transport() -> HttpTransport {
        HttpTransport::build("updraft-test", Duration::from_secs(5), false).unwrap()
    }

    #[test]
    fn timeout_is_clamped_to_thirty_seconds() {
        let t = HttpTransport::new("updraft-test", Duration::from_secs(120)).unwrap();
        assert_eq!(t.timeout(), Duration::from_secs(30));

        let t = HttpTransport::new("updraft-test", Duration::from_secs(10)).unwrap();
        assert_eq!(t.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn response_head_success_range() {
        let head = |status| ResponseHead {
            status,
            content_length: None,
        };
        assert!(head(200).is_success());
        assert!(head(206).is_success());
        assert!(!head(302).is_success());
        assert!(!head(404).is_success());
    }

    #[test]
    fn get_text_sends_headers_and_returns_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/app/releases/latest")
                .header("accept", "application/vnd.github+json")
                .header("user-agent", "updraft-test");
            then.status(200).body(r#"{"tag_name":"v1.0.0"}"#);
        });

        let url = Url::parse(&server.url("/repos/acme/app/releases/latest")).unwrap();
        let response = transport()
            .get_text(&url, &[("Accept", "application/vnd.github+json")])
            .unwrap();

        mock.assert();
        assert_eq!(response.status, 200);
        assert!(response.body.contains("v1.0.0"));
    }

    #[test]
    fn get_text_passes_through_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("Not Found");
        });

        let url = Url::parse(&server.url("/missing")).unwrap();
        let response = transport().get_text(&url, &[]).unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn head_reports_status_without_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::HEAD).path("/app.exe");
            then.status(200);
        });

        let url = Url::parse(&server.url("/app.exe")).unwrap();
        let head = transport().head(&url).unwrap();
        mock.assert();
        assert_eq!(head.status, 200);
    }

    #[test]
    fn open_streams_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/app.exe");
            then.status(200).body(vec![7u8; 4096]);
        });

        let url = Url::parse(&server.url("/app.exe")).unwrap();
        let mut response = transport().open(&url).unwrap();
        assert!(response.head.is_success());

        let mut body = Vec::new();
        response.body.read_to_end(&mut body).unwrap();
        assert_eq!(body.len(), 4096);
        assert!(body.iter().all(|b| *b == 7));
    }

    #[test]
    fn connection_failure_is_transport_error() {
        // Port 9 (discard) is not served by the test harness.
        let url = Url::parse("http://127.0.0.1:9/app.exe").unwrap();
        let err = match transport().open(&url) {
            Ok(_) => panic!("expected connection failure"),
            Err(e) => e,
        };
        assert!(matches!(err, UpdraftError::Transport { .. }));
    }

    #[test]
    fn production_transport_refuses_plain_http() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/app.exe");
            then.status(200).body("payload");
        });

        let url = Url::parse(&server.url("/app.exe")).unwrap();
        let t = HttpTransport::new("updraft-test", Duration::from_secs(5)).unwrap();

        assert!(t.open(&url).is_err());
        assert!(t.head(&url).is_err());
        assert!(t.get_text(&url, &[]).is_err());
        mock.assert_calls(0);
    }

    #[test]
    fn redirect_to_plain_http_is_not_followed() {
        let server = MockServer::start();
        let target = server.mock(|when, then| {
            when.method(GET).path("/mirror/app.exe");
            then.status(200).body("tampered");
        });
        server.mock(|when, then| {
            when.method(GET).path("/app.exe");
            then.status(302).header("location", server.url("/mirror/app.exe"));
        });

        let url = Url::parse(&server.url("/app.exe")).unwrap();
        let err = match transport().open(&url) {
            Ok(_) => panic!("expected the redirect to be refused"),
            Err(e) => e,
        };

        assert!(err.to_string().contains("redirected unsafely"));
        target.assert_calls(0);
    }
}
