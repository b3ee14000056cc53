//! Wallpaper pipeline: fetch, compose and apply.
//!
//! The stages are independent and flow one way. [`RunCoordinator`] wires them
//! together for a source id and guarantees a single run in flight.

pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod platform;
pub mod processing;
pub mod types;

pub use coordinator::{Clock, FixedClock, RunCoordinator, SystemClock};
pub use error::{ErrorKind, PipelineResult};
pub use fetch::{FetchError, FetchOptions, Fetcher, HttpTransport, Transport};
pub use platform::{CommandRunner, PlatformApplier, SystemCommandRunner, WallpaperSetter};
pub use processing::Compositor;
pub use types::{
    CompositeImage, FillMode, GridSpec, PostProcess, RunOutcome, TileDownload, TileOutcome,
    WallpaperRequest,
};
