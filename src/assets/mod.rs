//! Asset pipelines: file selection, stylesheets, scripts and images

pub mod css;
pub mod files;
pub mod images;
pub mod js;

pub use files::{copy_file, write_file, FileSet, Matched};
