//! Bounded, HTTPS-only artifact download.
//!
//! [`SecureFetcher::fetch`] streams an artifact into a temporary file beside
//! the destination and only renames it into place once every check has
//! passed. Every early return (and any panic) drops the temporary file,
//! so a failed transfer never leaves a partial artifact behind.

use reqwest::Url;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, UpdraftError};

use super::staging::PARTIAL_PREFIX;
use super::transport::Transport;

/// Largest artifact the fetcher accepts: 200 MiB.
pub const MAX_ARTIFACT_BYTES: u64 = 200 * 1024 * 1024;

const CHUNK_SIZE: usize = 64 * 1024;

/// When the total size is unknown, report a status line every this many chunks.
const STATUS_EVERY_CHUNKS: u64 = 16;

/// A progress update from a running download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Percentage of the declared size, 0 to 100.
    Percent(u8),
    /// Free-text status, used when the total size is unknown.
    Status(String),
}

/// Receives download progress.
///
/// Implemented for any `FnMut(Progress)`.
pub trait ProgressSink {
    /// Handle one progress update.
    fn report(&mut self, progress: Progress);
}

impl<F: FnMut(Progress)> ProgressSink for F {
    fn report(&mut self, progress: Progress) {
        self(progress)
    }
}

/// A sink that discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: Progress) {}
}

/// Shared cancellation flag for an in-flight download.
///
/// Clones observe the same flag, so one can be moved into a signal handler
/// while the fetcher polls another between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Bytes written to the destination.
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the artifact.
    pub sha256: String,
}

/// Parse `raw` as an absolute HTTPS URL.
///
/// This is the only check that runs before any network I/O, and its failure
/// is always [`UpdraftError::InvalidArgument`].
pub fn require_https(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| UpdraftError::invalid_argument(format!("malformed URL '{}': {}", raw, e)))?;

    if url.scheme() != "https" {
        return Err(UpdraftError::invalid_argument(format!(
            "refusing to download over '{}': only https is allowed",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UpdraftError::invalid_argument(format!(
            "URL '{}' has no host",
            raw
        )));
    }

    Ok(url)
}

/// Bookkeeping for one transfer.
struct TransferState<'a> {
    destination: &'a Path,
    max_bytes: u64,
    written: u64,
    content_length_hint: Option<u64>,
    chunks: u64,
    last_percent: Option<u8>,
}

impl TransferState<'_> {
    fn accept(&mut self, n: usize) -> Result<()> {
        let next = self.written + n as u64;
        if next > self.max_bytes {
            return Err(UpdraftError::SizeExceeded {
                limit: self.max_bytes,
                observed: next,
            });
        }
        self.written = next;
        self.chunks += 1;
        Ok(())
    }

    fn report(&mut self, sink: &mut dyn ProgressSink) {
        match self.content_length_hint {
            Some(total) if total > 0 => {
                let percent = (self.written.saturating_mul(100) / total).min(100) as u8;
                if self.last_percent.is_none_or(|last| percent > last) {
                    self.last_percent = Some(percent);
                    sink.report(Progress::Percent(percent));
                }
            }
            _ => {
                if self.chunks % STATUS_EVERY_CHUNKS == 1 {
                    sink.report(Progress::Status(format!(
                        "Downloaded {}",
                        format_bytes(self.written)
                    )));
                }
            }
        }
    }

    fn finish(&mut self, sink: &mut dyn ProgressSink) -> Result<()> {
        if self.written == 0 {
            return Err(UpdraftError::incomplete(format!(
                "no bytes received for {}",
                self.destination.display()
            )));
        }
        if let Some(expected) = self.content_length_hint {
            if expected != self.written {
                return Err(UpdraftError::incomplete(format!(
                    "expected {} bytes, received {}",
                    expected, self.written
                )));
            }
        }
        if self.last_percent != Some(100) {
            self.last_percent = Some(100);
            sink.report(Progress::Percent(100));
        }
        Ok(())
    }
}

/// Streams artifacts under the size and transport policy.
pub struct SecureFetcher {
    transport: Arc<dyn Transport>,
    max_bytes: u64,
}

impl SecureFetcher {
    /// Create a fetcher with the 200 MiB limit.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            max_bytes: MAX_ARTIFACT_BYTES,
        }
    }

    #[cfg(test)]
    fn with_max_bytes(transport: Arc<dyn Transport>, max_bytes: u64) -> Self {
        Self {
            transport,
            max_bytes,
        }
    }

    /// Get the size limit in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Download `url` to `destination`.
    ///
    /// The destination's parent directory must exist. On success the file
    /// exists, is non-empty and (on Unix) is executable. On failure nothing
    /// is left at `destination` by this call.
    pub fn fetch(
        &self,
        url: &Url,
        destination: &Path,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<FetchReport> {
        if url.scheme() != "https" {
            return Err(UpdraftError::invalid_argument(format!(
                "refusing to download over '{}': only https is allowed",
                url.scheme()
            )));
        }

        let probed = self.probe_size(url)?;

        if cancel.is_cancelled() {
            return Err(UpdraftError::Cancelled);
        }

        let mut response = self.transport.open(url)?;
        if !response.head.is_success() {
            return Err(UpdraftError::transport(format!(
                "HTTP {} fetching {}",
                response.head.status, url
            )));
        }

        let hint = response.head.content_length.or(probed);
        if let Some(len) = hint {
            if len > self.max_bytes {
                return Err(UpdraftError::SizeExceeded {
                    limit: self.max_bytes,
                    observed: len,
                });
            }
        }

        let dir = destination.parent().ok_or_else(|| {
            UpdraftError::invalid_argument(format!(
                "destination {} has no parent directory",
                destination.display()
            ))
        })?;
        let mut partial = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(dir)?;

        let mut state = TransferState {
            destination,
            max_bytes: self.max_bytes,
            written: 0,
            content_length_hint: hint,
            chunks: 0,
            last_percent: None,
        };
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Download of {} cancelled after {} bytes", url, state.written);
                return Err(UpdraftError::Cancelled);
            }

            let n = match response.body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(UpdraftError::transport(format!(
                        "connection lost after {} bytes: {}",
                        state.written, e
                    )))
                }
            };

            state.accept(n)?;
            partial.write_all(&buf[..n])?;
            hasher.update(&buf[..n]);
            state.report(sink);
        }

        state.finish(sink)?;

        partial.flush()?;
        partial.as_file().sync_all()?;
        mark_executable(partial.path())?;
        partial
            .persist(destination)
            .map_err(|e| UpdraftError::Io(e.error))?;

        let sha256 = hex::encode(hasher.finalize());
        tracing::info!(
            "Downloaded {} ({} bytes, sha256 {})",
            destination.display(),
            state.written,
            sha256
        );

        Ok(FetchReport {
            bytes: state.written,
            sha256,
        })
    }

    /// Ask the server for the artifact size without downloading it.
    ///
    /// A declared size over the limit fails the download. A HEAD request that
    /// cannot be answered only means the size is checked while streaming.
    fn probe_size(&self, url: &Url) -> Result<Option<u64>> {
        match self.transport.head(url) {
            Ok(head) if head.is_success() => {
                tracing::debug!("HEAD {} declared {:?} bytes", url, head.content_length);
                if let Some(len) = head.content_length {
                    if len > self.max_bytes {
                        tracing::warn!(
                            "Refusing {}: {} bytes exceeds the {} byte limit",
                            url,
                            len,
                            self.max_bytes
                        );
                        return Err(UpdraftError::SizeExceeded {
                            limit: self.max_bytes,
                            observed: len,
                        });
                    }
                }
                Ok(head.content_length)
            }
            Ok(head) => {
                tracing::debug!("HEAD {} returned {}; size unknown", url, head.status);
                Ok(None)
            }
            Err(e) => {
                tracing::debug!("HEAD {} failed: {}; size unknown", url, e);
                Ok(None)
            }
        }
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Format a byte count for status lines ("12.5 MiB").
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Parse a `sha256sum`-style checksum file and return the digest.
///
/// Accepts a bare digest or `<digest>  <file name>` lines; the first
/// 64-character hex token wins.
pub fn parse_checksum(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|token| token.len() == 64 && token.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updates::mock::MockTransport;
    use std::fs;
    use tempfile::TempDir;

    const MIB: u64 = 1024 * 1024;
    const URL: &str = "https://downloads.example.com/app.exe";

    fn fetch_with(
        transport: MockTransport,
        temp: &TempDir,
        sink: &mut dyn ProgressSink,
    ) -> (Result<FetchReport>, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let fetcher = SecureFetcher::new(transport.clone());
        let dest = temp.path().join("app.exe");
        let result = fetcher.fetch(&Url::parse(URL).unwrap(), &dest, sink, &CancelToken::new());
        (result, transport)
    }

    fn dir_is_empty(temp: &TempDir) -> bool {
        fs::read_dir(temp.path()).unwrap().next().is_none()
    }

    #[test]
    fn require_https_accepts_https() {
        let url = require_https("https://example.com/app.exe").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn require_https_rejects_other_schemes() {
        for raw in [
            "http://example.com/app.exe",
            "ftp://example.com/app.exe",
            "file:///tmp/app.exe",
        ] {
            let err = require_https(raw).unwrap_err();
            assert!(err.is_argument_error(), "{raw} should be rejected");
        }
    }

    #[test]
    fn require_https_rejects_malformed() {
        assert!(require_https("not a url").unwrap_err().is_argument_error());
        assert!(require_https("").unwrap_err().is_argument_error());
    }

    #[test]
    fn http_url_is_rejected_without_network() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        let fetcher = SecureFetcher::new(transport.clone());

        let url = Url::parse("http://downloads.example.com/app.exe").unwrap();
        let err = fetcher
            .fetch(&url, &temp.path().join("app.exe"), &mut NoProgress, &CancelToken::new())
            .unwrap_err();

        assert!(err.is_argument_error());
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn oversized_head_fails_before_download() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new()
            .with_head(URL, 200, Some(300 * MIB))
            .with_download(URL, vec![1u8; 16], 16);

        let (result, transport) = fetch_with(transport, &temp, &mut NoProgress);

        assert!(matches!(
            result,
            Err(UpdraftError::SizeExceeded { observed, .. }) if observed == 300 * MIB
        ));
        assert_eq!(transport.requests(), vec![format!("HEAD {}", URL)]);
        assert!(dir_is_empty(&temp));
    }

    #[test]
    fn oversized_content_length_on_get_fails() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new()
            .with_head(URL, 405, None)
            .with_generated_download(URL, MIB, Some(201 * MIB), MIB as usize);

        let (result, _) = fetch_with(transport, &temp, &mut NoProgress);

        assert!(matches!(result, Err(UpdraftError::SizeExceeded { .. })));
        assert!(dir_is_empty(&temp));
    }

    #[test]
    fn stream_over_limit_aborts_and_removes_partial() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new().with_generated_download(
            URL,
            10 * 1024,
            None,
            1024,
        ));
        let fetcher = SecureFetcher::with_max_bytes(transport, 4096);

        let dest = temp.path().join("app.exe");
        let err = fetcher
            .fetch(&Url::parse(URL).unwrap(), &dest, &mut NoProgress, &CancelToken::new())
            .unwrap_err();

        assert!(matches!(
            err,
            UpdraftError::SizeExceeded { limit: 4096, observed: 5120 }
        ));
        assert!(!dest.exists());
        assert!(dir_is_empty(&temp));
    }

    #[test]
    fn ten_mib_download_reports_monotonic_progress_to_100() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new()
            .with_head(URL, 200, Some(10 * MIB))
            .with_generated_download(URL, 10 * MIB, Some(10 * MIB), MIB as usize);

        let mut seen = Vec::new();
        let mut sink = |p: Progress| {
            if let Progress::Percent(n) = p {
                seen.push(n);
            }
        };
        let (result, _) = fetch_with(transport, &temp, &mut sink);

        let report = result.unwrap();
        assert_eq!(report.bytes, 10 * MIB);
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(seen.last(), Some(&100));

        let meta = fs::metadata(temp.path().join("app.exe")).unwrap();
        assert_eq!(meta.len(), 10 * MIB);
    }

    #[test]
    fn download_without_length_reports_status_and_finishes() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new()
            .with_head(URL, 404, None)
            .with_generated_download(URL, 3 * MIB, None, CHUNK_SIZE);

        let mut events = Vec::new();
        let mut sink = |p: Progress| events.push(p);
        let (result, _) = fetch_with(transport, &temp, &mut sink);

        assert_eq!(result.unwrap().bytes, 3 * MIB);
        assert!(matches!(events.first(), Some(Progress::Status(_))));
        assert_eq!(events.last(), Some(&Progress::Percent(100)));
    }

    #[test]
    fn head_failure_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new().with_download(URL, b"binary".to_vec(), 2);

        let (result, transport) = fetch_with(transport, &temp, &mut NoProgress);

        assert_eq!(result.unwrap().bytes, 6);
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn error_status_is_transport_error() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new()
            .with_head(URL, 200, Some(10))
            .with_download_status(URL, 503);

        let (result, _) = fetch_with(transport, &temp, &mut NoProgress);

        let err = result.unwrap_err();
        assert!(matches!(err, UpdraftError::Transport { .. }));
        assert!(err.to_string().contains("503"));
        assert!(dir_is_empty(&temp));
    }

    #[test]
    fn connection_lost_mid_stream_removes_partial() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new()
            .with_head(URL, 200, Some(4096))
            .with_broken_download(URL, 4096, 2048);

        let (result, _) = fetch_with(transport, &temp, &mut NoProgress);

        assert!(matches!(result, Err(UpdraftError::Transport { .. })));
        assert!(dir_is_empty(&temp));
    }

    #[test]
    fn short_body_is_incomplete_write() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new()
            .with_head(URL, 200, None)
            .with_generated_download(URL, 100, Some(200), 50);

        let (result, _) = fetch_with(transport, &temp, &mut NoProgress);

        assert!(matches!(result, Err(UpdraftError::IncompleteWrite { .. })));
        assert!(dir_is_empty(&temp));
    }

    #[test]
    fn empty_body_is_incomplete_write() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new().with_download(URL, Vec::new(), 16);

        let (result, _) = fetch_with(transport, &temp, &mut NoProgress);

        assert!(matches!(result, Err(UpdraftError::IncompleteWrite { .. })));
        assert!(dir_is_empty(&temp));
    }

    #[test]
    fn cancellation_stops_stream_and_removes_partial() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(
            MockTransport::new()
                .with_head(URL, 200, Some(MIB))
                .with_generated_download(URL, MIB, Some(MIB), 1024),
        );
        let fetcher = SecureFetcher::new(transport);
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let mut sink = move |_: Progress| trigger.cancel();

        let dest = temp.path().join("app.exe");
        let err = fetcher
            .fetch(&Url::parse(URL).unwrap(), &dest, &mut sink, &cancel)
            .unwrap_err();

        assert!(matches!(err, UpdraftError::Cancelled));
        assert!(dir_is_empty(&temp));
    }

    #[test]
    fn pre_cancelled_token_opens_nothing() {
        let temp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new().with_head(URL, 200, Some(10)));
        let fetcher = SecureFetcher::new(transport.clone());
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = fetcher
            .fetch(
                &Url::parse(URL).unwrap(),
                &temp.path().join("app.exe"),
                &mut NoProgress,
                &cancel,
            )
            .unwrap_err();

        assert!(matches!(err, UpdraftError::Cancelled));
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn report_includes_sha256() {
        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new().with_download(URL, b"abc".to_vec(), 3);

        let (result, _) = fetch_with(transport, &temp, &mut NoProgress);

        assert_eq!(
            result.unwrap().sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[cfg(unix)]
    #[test]
    fn downloaded_artifact_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let transport = MockTransport::new().with_download(URL, b"#!/bin/sh\n".to_vec(), 64);
        let (result, _) = fetch_with(transport, &temp, &mut NoProgress);
        result.unwrap();

        let mode = fs::metadata(temp.path().join("app.exe"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(10 * MIB), "10.0 MiB");
    }

    #[test]
    fn parse_checksum_formats() {
        let digest = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        assert_eq!(
            parse_checksum(digest).as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert!(parse_checksum(&format!("{}  app.exe\n", digest)).is_some());
        assert!(parse_checksum("not a checksum").is_none());
    }
}
