//! Tile downloads with bounded retries.
//!
//! The [`Fetcher`] takes the URL list of a resolved request and writes every body
//! verbatim into the run's temporary directory. Downloads run on a dedicated rayon
//! pool but results always come back in URL order, so tile `i` is the image for
//! URL `i` regardless of completion order.
//!
//! The HTTP layer is a [`Transport`]; production code uses [`HttpTransport`] and
//! tests plug in closures.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;

use super::error::{ErrorKind, PipelineResult};
use super::types::{TileDownload, TileOutcome};

/// Browser user agent; some mirrors reject library defaults.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en-GB;q=0.8,en;q=0.7,en-US;q=0.6";

/// Default number of attempts per URL.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default pause between two attempts on the same URL.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Default timeout of a single HTTP attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default size of the download pool.
pub const DEFAULT_WORKERS: usize = 4;

/// A failed download attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {0}")]
    Status(u16),
    /// Connection, TLS, timeout or body read failure.
    #[error("{0}")]
    Transport(String),
}

/// Performs one HTTP GET and returns the body.
pub trait Transport: Send + Sync {
    /// Downloads `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when the attempt fails for any reason.
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F> Transport for F
where F: Fn(&str) -> Result<Vec<u8>, FetchError> + Send + Sync
{
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> { self(url) }
}

/// Retry and concurrency settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub workers: usize,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_TIMEOUT,
            workers: DEFAULT_WORKERS,
            accept_invalid_certs: false,
        }
    }
}

/// Header set sent with every request.
#[must_use]
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// [`Transport`] backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds the client with the browser header set and the per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::Unexpected` if the TLS backend cannot be initialized.
    pub fn new(options: &FetchOptions) -> PipelineResult<Self> {
        let client = Client::builder()
            .default_headers(browser_headers())
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|err| ErrorKind::Unexpected(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response =
            self.client.get(url).send().map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .bytes()
            .map(|body| body.to_vec())
            .map_err(|err| FetchError::Transport(err.to_string()))
    }
}

/// Downloads the tiles of one run.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    options: FetchOptions,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").field("options", &self.options).finish_non_exhaustive()
    }
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, options: FetchOptions) -> Self {
        Self { transport, options }
    }

    /// Fetcher using [`HttpTransport`].
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::new`].
    pub fn http(options: FetchOptions) -> PipelineResult<Self> {
        let transport = HttpTransport::new(&options)?;
        Ok(Self::new(Arc::new(transport), options))
    }

    /// Downloads every URL into `temp_dir` as `tile_{index:02}_{target_name}`.
    ///
    /// Once one URL exhausts its attempts, the other workers stop retrying.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::DownloadFailed` for the lowest failing index, or
    /// `ErrorKind::InvalidRequest` when `urls` is empty.
    pub fn fetch_all(
        &self,
        urls: &[String],
        temp_dir: &Path,
        target_name: &str,
    ) -> PipelineResult<Vec<TileDownload>> {
        if urls.is_empty() {
            return Err(ErrorKind::InvalidRequest("nothing to download".to_string()));
        }

        let pending: Vec<TileDownload> = urls
            .iter()
            .enumerate()
            .map(|(index, url)| {
                TileDownload::pending(
                    index,
                    url.clone(),
                    temp_dir.join(tile_file_name(index, target_name)),
                )
            })
            .collect();

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.options.workers.clamp(1, pending.len()))
            .thread_name(|i| format!("skypaper-fetch-{i}"))
            .build()
            .map_err(|err| ErrorKind::Unexpected(format!("failed to start download pool: {err}")))?;

        let cancel = AtomicBool::new(false);
        let tiles: Vec<TileDownload> = pool.install(|| {
            pending.into_par_iter().map(|tile| self.download(tile, &cancel)).collect()
        });

        let first_failure = tiles.iter().find_map(|tile| match &tile.outcome {
            TileOutcome::Failed(cause) => Some((tile.url.clone(), cause.clone())),
            _ => None,
        });
        if let Some((url, cause)) = first_failure {
            return Err(ErrorKind::DownloadFailed { url, cause });
        }

        tracing::debug!(tiles = tiles.len(), "All tiles downloaded");
        Ok(tiles)
    }

    /// Runs the retry loop for one tile.
    ///
    /// A tile that sees the cancel flag before finishing stays `Pending`.
    fn download(&self, mut tile: TileDownload, cancel: &AtomicBool) -> TileDownload {
        let max_attempts = self.options.max_attempts.max(1);
        let mut last_error = String::new();

        while tile.attempts < max_attempts {
            if tile.attempts > 0 && !self.options.retry_delay.is_zero() {
                thread::sleep(self.options.retry_delay);
            }
            if cancel.load(Ordering::Acquire) {
                return tile;
            }

            tile.attempts += 1;
            let result = self.transport.get(&tile.url).map_err(|err| err.to_string()).and_then(
                |body| {
                    fs::write(&tile.local_path, body).map_err(|err| {
                        format!("failed to write {}: {err}", tile.local_path.display())
                    })
                },
            );

            match result {
                Ok(()) => {
                    tracing::debug!(url = %tile.url, attempt = tile.attempts, "Tile downloaded");
                    tile.outcome = TileOutcome::Succeeded;
                    return tile;
                }
                Err(err) => {
                    tracing::warn!(
                        url = %tile.url,
                        attempt = tile.attempts,
                        max_attempts,
                        error = %err,
                        "Tile download attempt failed"
                    );
                    last_error = err;
                }
            }
        }

        cancel.store(true, Ordering::Release);
        tile.outcome = TileOutcome::Failed(last_error);
        tile
    }
}

/// Temporary file name of tile `index`.
#[must_use]
pub fn tile_file_name(index: usize, target_name: &str) -> String {
    format!("tile_{index:02}_{target_name}")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use tempfile::TempDir;

    use super::*;

    fn fast_options(max_attempts: u32) -> FetchOptions {
        FetchOptions {
            max_attempts,
            retry_delay: Duration::ZERO,
            ..FetchOptions::default()
        }
    }

    fn urls(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("https://tiles.test/{i}.png")).collect()
    }

    // ========================================================================
    // Retry behaviour
    // ========================================================================

    #[test]
    fn test_always_failing_url_uses_exactly_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let transport = move |_: &str| -> Result<Vec<u8>, FetchError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Status(500))
        };
        let fetcher = Fetcher::new(Arc::new(transport), fast_options(10));
        let dir = TempDir::new().unwrap();

        let err = fetcher.fetch_all(&urls(1), dir.path(), "out.png").unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(err, ErrorKind::DownloadFailed {
            url: "https://tiles.test/0.png".to_string(),
            cause: "HTTP 500".to_string(),
        });
    }

    #[test]
    fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let transport = move |_: &str| -> Result<Vec<u8>, FetchError> {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FetchError::Transport("connection reset".to_string()))
            } else {
                Ok(b"tile".to_vec())
            }
        };
        let fetcher = Fetcher::new(Arc::new(transport), fast_options(5));
        let dir = TempDir::new().unwrap();

        let tiles = fetcher.fetch_all(&urls(1), dir.path(), "out.png").unwrap();

        assert_eq!(tiles[0].attempts, 3);
        assert!(tiles[0].succeeded());
        assert_eq!(fs::read(&tiles[0].local_path).unwrap(), b"tile");
    }

    #[test]
    fn test_zero_max_attempts_still_tries_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let transport = move |_: &str| -> Result<Vec<u8>, FetchError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Status(404))
        };
        let fetcher = Fetcher::new(Arc::new(transport), fast_options(0));
        let dir = TempDir::new().unwrap();

        assert!(fetcher.fetch_all(&urls(1), dir.path(), "out.png").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_bad_tile_fails_the_set() {
        let transport = |url: &str| -> Result<Vec<u8>, FetchError> {
            if url.ends_with("/7.png") {
                Err(FetchError::Status(503))
            } else {
                Ok(url.as_bytes().to_vec())
            }
        };
        let fetcher = Fetcher::new(Arc::new(transport), fast_options(3));
        let dir = TempDir::new().unwrap();

        let err = fetcher.fetch_all(&urls(16), dir.path(), "grid.png").unwrap_err();

        assert_eq!(err, ErrorKind::DownloadFailed {
            url: "https://tiles.test/7.png".to_string(),
            cause: "HTTP 503".to_string(),
        });
    }

    // ========================================================================
    // Ordering and layout
    // ========================================================================

    #[test]
    fn test_results_follow_url_order() {
        let transport = |url: &str| -> Result<Vec<u8>, FetchError> {
            // Make early tiles slow so completion order differs from URL order.
            if url.ends_with("/0.png") || url.ends_with("/1.png") {
                thread::sleep(Duration::from_millis(30));
            }
            Ok(url.as_bytes().to_vec())
        };
        let fetcher = Fetcher::new(Arc::new(transport), fast_options(1));
        let dir = TempDir::new().unwrap();
        let list = urls(16);

        let tiles = fetcher.fetch_all(&list, dir.path(), "grid.png").unwrap();

        assert_eq!(tiles.len(), 16);
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.index, i);
            assert_eq!(tile.url, list[i]);
            assert_eq!(fs::read(&tile.local_path).unwrap(), list[i].as_bytes());
        }
    }

    #[test]
    fn test_tile_paths_live_in_temp_dir() {
        let transport = |_: &str| -> Result<Vec<u8>, FetchError> { Ok(vec![1, 2, 3]) };
        let fetcher = Fetcher::new(Arc::new(transport), fast_options(1));
        let dir = TempDir::new().unwrap();

        let tiles = fetcher.fetch_all(&urls(2), dir.path(), "sun.jpg").unwrap();

        assert_eq!(tiles[0].local_path, dir.path().join("tile_00_sun.jpg"));
        assert_eq!(tiles[1].local_path, dir.path().join("tile_01_sun.jpg"));
    }

    #[test]
    fn test_empty_url_list_is_rejected() {
        let transport = |_: &str| -> Result<Vec<u8>, FetchError> { Ok(Vec::new()) };
        let fetcher = Fetcher::new(Arc::new(transport), fast_options(1));
        let dir = TempDir::new().unwrap();

        let err = fetcher.fetch_all(&[], dir.path(), "x.png").unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidRequest(_)));
    }

    #[test]
    fn test_unwritable_temp_dir_counts_as_failure() {
        let transport = |_: &str| -> Result<Vec<u8>, FetchError> { Ok(vec![0]) };
        let fetcher = Fetcher::new(Arc::new(transport), fast_options(2));
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");

        let err = fetcher.fetch_all(&urls(1), &missing, "x.png").unwrap_err();
        match err {
            ErrorKind::DownloadFailed { cause, .. } => assert!(cause.contains("failed to write")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // ========================================================================
    // Wire constants
    // ========================================================================

    #[test]
    fn test_browser_headers() {
        let headers = browser_headers();
        assert_eq!(headers[header::USER_AGENT], USER_AGENT);
        assert_eq!(headers[header::CACHE_CONTROL], "max-age=0");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(headers[header::UPGRADE_INSECURE_REQUESTS], "1");
        assert!(headers[header::ACCEPT_LANGUAGE].to_str().unwrap().starts_with("zh-CN"));
        assert!(!headers.contains_key(header::ACCEPT_ENCODING));
    }

    #[test]
    fn test_default_options() {
        let options = FetchOptions::default();
        assert_eq!(options.max_attempts, 10);
        assert_eq!(options.retry_delay, Duration::from_secs(2));
        assert_eq!(options.timeout, Duration::from_secs(20));
        assert_eq!(options.workers, 4);
        assert!(!options.accept_invalid_certs);
    }

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::Status(500).to_string(), "HTTP 500");
        assert_eq!(FetchError::Transport("timed out".to_string()).to_string(), "timed out");
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(&FetchOptions::default()).is_ok());
    }
}
