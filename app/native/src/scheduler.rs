//! Periodic wallpaper updates.
//!
//! The [`Scheduler`] owns one timer thread that triggers
//! [`RunCoordinator::start`] on a fixed interval. Triggers that land while a
//! run is still in flight are dropped by the coordinator.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::wallpaper::{RunCoordinator, RunOutcome};

/// Callback invoked with the outcome of every scheduled run.
pub type OutcomeHandler = Arc<dyn Fn(RunOutcome) + Send + Sync>;

/// Handle to a running timer thread.
///
/// Dropping the handle stops the timer. A run already in flight is not
/// interrupted.
pub struct Scheduler {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    interval: Duration,
}

impl Scheduler {
    /// Starts the timer.
    ///
    /// When `run_immediately` is set the first trigger fires right away,
    /// otherwise after one full interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer thread cannot be spawned.
    pub fn start(
        coordinator: Arc<RunCoordinator>,
        interval: Duration,
        run_immediately: bool,
        on_outcome: OutcomeHandler,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new().name("skypaper-timer".to_string()).spawn(move || {
            if run_immediately {
                trigger(&coordinator, &on_outcome);
            }

            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => trigger(&coordinator, &on_outcome),
                    // Explicit stop or the handle was dropped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("timer thread stopped");
        })?;

        tracing::info!(interval_secs = interval.as_secs(), "scheduler started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            interval,
        })
    }

    /// Stops the timer and waits for its thread to exit.
    pub fn stop(mut self) { self.shutdown(); }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("timer thread panicked");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) { self.shutdown(); }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("running", &self.thread.is_some())
            .finish()
    }
}

fn trigger(coordinator: &Arc<RunCoordinator>, on_outcome: &OutcomeHandler) {
    let handler = Arc::clone(on_outcome);
    if !coordinator.start(move |outcome| handler(outcome)) {
        tracing::debug!(source = coordinator.source(), "scheduled trigger skipped");
    }
}

/// Converts a configured interval in minutes into a timer period.
///
/// `0` disables the timer.
#[must_use]
pub const fn interval_from_minutes(minutes: u64) -> Option<Duration> {
    if minutes == 0 { None } else { Some(Duration::from_secs(minutes.saturating_mul(60))) }
}
