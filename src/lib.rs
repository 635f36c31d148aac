//! Sluice - a front-end asset pipeline
//!
//! Sluice compiles Sass, bundles and transpiles scripts, optimizes images and
//! copies static files into an output directory, and runs a live-reloading
//! proxy in front of an existing development server while it watches the
//! sources for changes.

// Public modules
pub mod assets;
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod server;
pub mod tasks;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use error::{Result, SluiceError};

/// Current version of Sluice
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
