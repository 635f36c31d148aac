//! Task bodies registered by [`Registry::standard`](crate::runner::Registry::standard)
//!
//! Each task is a plain function over the [`Runner`](crate::runner::Runner) so
//! that it can read the context and, for `watch`, run other tasks.

mod assets;
mod clean;
mod serve;
pub mod watch;

pub use assets::{copy, images, scripts, styles};
pub use clean::clean;
pub use serve::{reload, serve};
pub use watch::watch;
