//! Task execution engine
//!
//! This module holds the task registry, the execution context and the runner
//! that walks series and parallel groups.

pub mod context;
pub mod registry;
pub mod task;

// Re-export main types
pub use context::*;
pub use registry::*;
pub use task::*;
