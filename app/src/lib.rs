//! # Graphite App
//!
//! Windowed viewer for the Graphite engine.
//!
//! ## Overview
//!
//! - [`AppArgs`] - Command line arguments parsed with clap
//! - [`Viewer`] - Event loop handler owning the window and its surface target
//! - [`run`] - Builds the device context and drives the event loop
//!
//! ## Example
//!
//! ```ignore
//! use clap::Parser;
//! use graphite_app::{run, AppArgs};
//!
//! fn main() {
//!     run(AppArgs::parse()).unwrap();
//! }
//! ```

mod app;
mod args;

pub use app::{run, Viewer};
pub use args::AppArgs;

/// App library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the app subsystem.
pub fn init() {
    log::info!("Graphite App v{} initialized", VERSION);
}
