//! Execution context for task running
//!
//! The context carries everything a task reads: the project root, the
//! configuration, the build mode and the reporter. It is shared by reference
//! with every worker thread, so all of it is immutable except the live-reload
//! slot that the serve task fills once.

use crate::config::{BuildMode, Config};
use crate::server::LiveReload;
use crate::ui::{Reporter, Verbosity};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Execution context shared by all tasks of a run
pub struct Context {
    /// Project root; every configured path is relative to it
    pub root: PathBuf,

    /// Configuration file path
    pub config_path: Option<PathBuf>,

    /// Validated configuration
    pub config: Config,

    /// Production or development build
    pub mode: BuildMode,

    /// Output sink for status messages
    pub reporter: Reporter,

    /// Live-reload hub, present once the serve task has started
    live_reload: OnceLock<LiveReload>,
}

impl Context {
    /// Create a new context with default settings
    pub fn new() -> Self {
        Context {
            root: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_path: None,
            config: Config::default(),
            mode: BuildMode::Development,
            reporter: Reporter::default(),
            live_reload: OnceLock::new(),
        }
    }

    /// Create a context with a specific project root
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = root;
        self
    }

    /// Set the configuration file path
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Set the configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the build mode
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.reporter = Reporter::new(verbosity);
        self
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Absolute output root
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.config.output)
    }

    /// Install the live-reload hub; fails if one is already running
    pub fn set_live_reload(&self, live_reload: LiveReload) -> Result<(), LiveReload> {
        self.live_reload.set(live_reload)
    }

    /// The running live-reload hub, if the serve task has started
    pub fn live_reload(&self) -> Option<&LiveReload> {
        self.live_reload.get()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
