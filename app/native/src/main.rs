#![allow(clippy::multiple_crate_versions)]

//! Skypaper command-line entry point.
//!
//! - `skypaper run`: update the wallpaper once
//! - `skypaper daemon`: keep it updated on an interval

fn main() {
    skypaper_lib::init_tracing();

    if let Err(err) = skypaper_lib::cli::run() {
        eprintln!("skypaper: {err}");
        std::process::exit(1);
    }
}
