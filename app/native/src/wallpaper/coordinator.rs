//! End-to-end wallpaper runs.
//!
//! A [`RunCoordinator`] owns the pipeline components and the single "run in
//! progress" flag. At most one run is in flight at any time; triggers that
//! arrive while a run is active are dropped, not queued.

use std::any::Any;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::error::{ErrorKind, PipelineResult};
use super::fetch::Fetcher;
use super::platform::PlatformApplier;
use super::processing::Compositor;
use super::types::RunOutcome;
use crate::sources::Catalog;

/// Work handed to a thread spawner by [`RunCoordinator::start`].
type RunJob = Box<dyn FnOnce() + Send + 'static>;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> { self.0 }
}

/// Holds the run flag; clears it when dropped, including during unwinding.
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: Arc::clone(flag) })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) { self.flag.store(false, Ordering::Release); }
}

/// Runs resolve, fetch, compose and apply for one source.
pub struct RunCoordinator {
    source: String,
    catalog: Catalog,
    fetcher: Fetcher,
    compositor: Compositor,
    applier: PlatformApplier,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
    last_outcome: Mutex<Option<RunOutcome>>,
}

impl std::fmt::Debug for RunCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCoordinator")
            .field("source", &self.source)
            .field("catalog", &self.catalog)
            .field("applier", &self.applier)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl RunCoordinator {
    /// Creates an idle coordinator using the system clock.
    pub fn new(
        source: impl Into<String>,
        catalog: Catalog,
        fetcher: Fetcher,
        applier: PlatformApplier,
    ) -> Self {
        Self {
            source: source.into(),
            catalog,
            fetcher,
            compositor: Compositor::new(),
            applier,
            clock: Arc::new(SystemClock),
            running: Arc::new(AtomicBool::new(false)),
            last_outcome: Mutex::new(None),
        }
    }

    /// Replaces the clock used to resolve sources.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn source(&self) -> &str { &self.source }

    /// Whether a run is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::Acquire) }

    /// Outcome of the most recent completed run.
    #[must_use]
    pub fn last_outcome(&self) -> Option<RunOutcome> { self.last_outcome.lock().clone() }

    /// Starts a run on a background thread.
    ///
    /// Returns `false` without doing anything if a run is already in flight.
    /// Otherwise the coordinator is marked running before this returns, and
    /// `on_outcome` receives the result once the run has finished. If the
    /// thread cannot be spawned, `on_outcome` receives an `Unexpected` failure.
    pub fn start<F>(self: &Arc<Self>, on_outcome: F) -> bool
    where F: FnOnce(RunOutcome) + Send + 'static {
        self.start_with(on_outcome, |job| {
            thread::Builder::new().name("skypaper-run".to_string()).spawn(job).map(drop)
        })
    }

    fn start_with<F, S>(self: &Arc<Self>, on_outcome: F, spawn: S) -> bool
    where
        F: FnOnce(RunOutcome) + Send + 'static,
        S: FnOnce(RunJob) -> io::Result<()>,
    {
        let Some(guard) = RunGuard::acquire(&self.running) else {
            tracing::info!(source = %self.source, "Run already in progress, trigger dropped");
            return false;
        };

        let callback = Arc::new(Mutex::new(Some(on_outcome)));
        let worker_callback = Arc::clone(&callback);
        let coordinator = Arc::clone(self);
        let spawned = spawn(Box::new(move || {
            let outcome = coordinator.execute();
            coordinator.finish(guard, outcome.clone());
            if let Some(on_outcome) = worker_callback.lock().take() {
                on_outcome(outcome);
            }
        }));

        // A failed spawn drops the job, and the guard with it.
        if let Err(err) = spawned {
            tracing::error!(error = %err, "Failed to spawn run thread");
            let outcome = RunOutcome::failed(
                &self.source,
                ErrorKind::Unexpected(format!("failed to spawn run thread: {err}")),
                self.clock.now(),
                Duration::ZERO,
            );
            *self.last_outcome.lock() = Some(outcome.clone());
            if let Some(on_outcome) = callback.lock().take() {
                on_outcome(outcome);
            }
        }
        true
    }

    /// Runs synchronously on the calling thread.
    ///
    /// Returns `None` if another run is already in flight.
    pub fn run_now(&self) -> Option<RunOutcome> {
        let Some(guard) = RunGuard::acquire(&self.running) else {
            tracing::info!(source = %self.source, "Run already in progress, trigger dropped");
            return None;
        };

        let outcome = self.execute();
        self.finish(guard, outcome.clone());
        Some(outcome)
    }

    fn finish(&self, guard: RunGuard, outcome: RunOutcome) {
        *self.last_outcome.lock() = Some(outcome);
        drop(guard);
    }

    /// Runs the pipeline once, turning errors and panics into an outcome.
    fn execute(&self) -> RunOutcome {
        let started_at = self.clock.now();
        let timer = Instant::now();
        tracing::info!(source = %self.source, "Starting wallpaper run");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.pipeline(started_at)))
            .unwrap_or_else(|payload| Err(ErrorKind::Unexpected(panic_message(&*payload))));

        match result {
            Ok(path) => {
                let outcome = RunOutcome::succeeded(&self.source, &path, started_at, timer.elapsed());
                tracing::info!(
                    source = %self.source,
                    path = %path.display(),
                    elapsed_ms = outcome.elapsed_ms,
                    "Wallpaper updated"
                );
                outcome
            }
            Err(err) => {
                tracing::warn!(source = %self.source, error = %err, "Wallpaper run failed");
                RunOutcome::failed(&self.source, err, started_at, timer.elapsed())
            }
        }
    }

    fn pipeline(&self, now: DateTime<Utc>) -> PipelineResult<PathBuf> {
        let output_dir = self.catalog.output_dir();
        fs::create_dir_all(output_dir).map_err(|err| {
            ErrorKind::io(&format!("failed to create {}", output_dir.display()), err)
        })?;

        let request = self.catalog.resolve(&self.source, now)?;
        tracing::debug!(
            source = %request.source,
            tiles = request.urls.len(),
            target = %request.target_name,
            "Resolved request"
        );

        // Removed on drop, whatever happens below.
        let temp_dir = tempfile::Builder::new()
            .prefix(".skypaper-")
            .tempdir_in(&request.output_dir)
            .map_err(|err| ErrorKind::io("failed to create tile directory", err))?;

        let tiles = self.fetcher.fetch_all(&request.urls, temp_dir.path(), &request.target_name)?;
        let composite = self.compositor.compose(&request, &tiles)?;
        self.applier.apply(&composite.path, request.fill_mode)?;

        Ok(composite.path)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "run panicked".to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::mpsc;

    use chrono::TimeZone;
    use image::{ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::wallpaper::fetch::{FetchError, FetchOptions, Transport};

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        RgbImage::from_pixel(6, 6, Rgb([20, 40, 60]))
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn options() -> FetchOptions {
        FetchOptions { max_attempts: 3, retry_delay: Duration::ZERO, ..FetchOptions::default() }
    }

    fn coordinator(dir: &Path, source: &str, transport: impl Transport + 'static) -> RunCoordinator {
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 3, 14, 12, 47, 33).unwrap());
        RunCoordinator::new(
            source,
            Catalog::new(dir),
            Fetcher::new(Arc::new(transport), options()),
            PlatformApplier::disabled(),
        )
        .with_clock(Arc::new(clock))
    }

    fn ok_transport() -> impl Transport {
        let body = png_bytes();
        move |_: &str| -> Result<Vec<u8>, FetchError> { Ok(body.clone()) }
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    // ========================================================================
    // Run outcomes
    // ========================================================================

    #[test]
    fn test_successful_run() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(dir.path(), "earth-h8", ok_transport());

        let outcome = coordinator.run_now().unwrap();

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.final_path, Some(dir.path().join("wallpaper.png")));
        assert_eq!(outcome.source, "earth-h8");
        assert_eq!(outcome.started_at, Utc.with_ymd_and_hms(2025, 3, 14, 12, 47, 33).unwrap());
        assert_eq!(coordinator.last_outcome(), Some(outcome));
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_unknown_source_fails_before_fetching() {
        let dir = TempDir::new().unwrap();
        let transport = |_: &str| -> Result<Vec<u8>, FetchError> { panic!("must not fetch") };
        let coordinator = coordinator(dir.path(), "mars-nasa", transport);

        let outcome = coordinator.run_now().unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::UnknownSource("mars-nasa".to_string())));
    }

    #[test]
    fn test_output_dir_is_created() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("nested").join("skypaper");
        let coordinator = coordinator(&output, "sun-nasa", |_: &str| -> Result<Vec<u8>, FetchError> {
            let mut bytes = Cursor::new(Vec::new());
            RgbImage::new(4, 4).write_to(&mut bytes, ImageFormat::Jpeg).unwrap();
            Ok(bytes.into_inner())
        });

        let outcome = coordinator.run_now().unwrap();

        assert!(outcome.success, "{}", outcome.message);
        assert!(output.join("wallpaper.jpg").is_file());
    }

    #[test]
    fn test_download_failure_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let transport = |_: &str| -> Result<Vec<u8>, FetchError> { Err(FetchError::Status(500)) };
        let coordinator = coordinator(dir.path(), "earth-h8", transport);

        let outcome = coordinator.run_now().unwrap();

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(ErrorKind::DownloadFailed { .. })));
        assert!(dir_entries(dir.path()).is_empty());
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_panic_becomes_failed_outcome() {
        let dir = TempDir::new().unwrap();
        let transport = |_: &str| -> Result<Vec<u8>, FetchError> { panic!("transport exploded") };
        let coordinator = coordinator(dir.path(), "earth-h8", transport);

        let outcome = coordinator.run_now().unwrap();

        assert!(!outcome.success);
        match outcome.error {
            Some(ErrorKind::Unexpected(msg)) => assert!(msg.contains("transport exploded")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!coordinator.is_running());
        assert!(dir_entries(dir.path()).is_empty());
    }

    // ========================================================================
    // Idempotence
    // ========================================================================

    #[test]
    fn test_repeated_runs_produce_identical_files() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(dir.path(), "earth-h8-16", ok_transport());

        let first = coordinator.run_now().unwrap();
        let first_bytes = fs::read(first.final_path.as_ref().unwrap()).unwrap();
        let second = coordinator.run_now().unwrap();
        let second_bytes = fs::read(second.final_path.as_ref().unwrap()).unwrap();

        assert!(first.success && second.success);
        assert_eq!(first_bytes, second_bytes);
        assert_eq!(dir_entries(dir.path()), vec!["wallpaper.png".to_string()]);
    }

    // ========================================================================
    // Single flight
    // ========================================================================

    #[test]
    fn test_second_trigger_is_dropped_while_running() {
        let dir = TempDir::new().unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let gate = Mutex::new(release_rx);
        let body = png_bytes();
        let transport = move |_: &str| -> Result<Vec<u8>, FetchError> {
            gate.lock().recv().ok();
            Ok(body.clone())
        };
        let coordinator = Arc::new(coordinator(dir.path(), "earth-h8", transport));
        let (done_tx, done_rx) = mpsc::channel();

        assert!(coordinator.start(move |outcome| done_tx.send(outcome).unwrap()));
        assert!(coordinator.is_running());
        assert!(!coordinator.start(|_| panic!("second run must not start")));
        assert!(coordinator.run_now().is_none());

        release_tx.send(()).unwrap();
        drop(release_tx);
        let outcome = done_rx.recv_timeout(Duration::from_secs(10)).unwrap();

        assert!(outcome.success, "{}", outcome.message);
        assert!(!coordinator.is_running());
        assert!(coordinator.run_now().is_some());
    }

    #[test]
    fn test_start_reports_failures_through_callback() {
        let dir = TempDir::new().unwrap();
        let coordinator = Arc::new(coordinator(dir.path(), "moon-nasa", |_: &str| {
            Err::<Vec<u8>, _>(FetchError::Transport("offline".to_string()))
        }));
        let (tx, rx) = mpsc::channel();

        assert!(coordinator.start(move |outcome| tx.send(outcome).unwrap()));
        let outcome = rx.recv_timeout(Duration::from_secs(10)).unwrap();

        assert!(!outcome.success);
        assert!(outcome.message.contains("offline"));
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.last_outcome(), Some(outcome));
    }

    #[test]
    fn test_spawn_failure_still_delivers_outcome() {
        let dir = TempDir::new().unwrap();
        let coordinator = Arc::new(coordinator(dir.path(), "earth-h8", |_: &str| {
            Ok::<_, FetchError>(png_bytes())
        }));
        let delivered = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&delivered);

        let accepted = coordinator.start_with(
            move |outcome| *sink.lock() = Some(outcome),
            |_job| Err(io::Error::other("no threads left")),
        );

        assert!(accepted);
        let outcome = delivered.lock().take().unwrap();
        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(ErrorKind::Unexpected(_))));
        assert!(outcome.message.contains("no threads left"));
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.last_outcome(), Some(outcome));
        assert!(coordinator.run_now().is_some());
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "run panicked");
    }
}
