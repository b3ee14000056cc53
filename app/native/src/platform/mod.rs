//! Platform helpers for Skypaper.
//!
//! - [`path`] - Shell-like path expansion and default locations

pub mod path;

pub use path::{default_output_dir, expand, expand_and_resolve, resolve_cli_path};
