//! Command-line presentation layer.
mod app;
mod main;

pub use app::*;
pub use main::*;
