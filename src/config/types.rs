//! Core configuration types
//!
//! This module defines the data structures that represent a sluice.yml configuration file.
//! Every field is optional; the defaults describe the standard `src/` → `dist/` layout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Output root, deleted by the clean task
    pub output: PathBuf,

    /// Source → destination mapping per asset category
    pub paths: PathsConfig,

    /// Stylesheet options
    pub styles: StylesConfig,

    /// Script bundling options
    pub scripts: ScriptsConfig,

    /// Image optimization options
    pub images: ImagesConfig,

    /// Development proxy options
    pub serve: ServeConfig,

    /// Watch patterns
    pub watch: WatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output: PathBuf::from("dist"),
            paths: PathsConfig::default(),
            styles: StylesConfig::default(),
            scripts: ScriptsConfig::default(),
            images: ImagesConfig::default(),
            serve: ServeConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

/// Path mappings for every asset category
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub styles: PathMapping,
    pub scripts: PathMapping,
    pub images: PathMapping,
    pub others: PathMapping,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            styles: PathMapping::new(&["src/scss/main.scss"], "dist/css"),
            scripts: PathMapping::new(&["src/js/main.js"], "dist/js"),
            images: PathMapping::new(
                &["src/images/**/*.{jpg,JPG,jpeg,JPEG,svg,png,gif}"],
                "dist/images",
            ),
            others: PathMapping::new(
                &[
                    "src/**/*",
                    "!src/{images,js,scss}",
                    "!src/{images,js,scss}/**/*",
                ],
                "dist",
            ),
        }
    }
}

/// A named asset category: which sources it reads and where it writes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PathMapping {
    /// Glob patterns relative to the project root; `!` prefix excludes
    #[serde(deserialize_with = "deserialize_sources")]
    pub source: Vec<String>,

    /// Destination directory relative to the project root
    pub destination: PathBuf,
}

impl PathMapping {
    pub fn new(source: &[&str], destination: &str) -> Self {
        PathMapping {
            source: source.iter().map(|s| s.to_string()).collect(),
            destination: PathBuf::from(destination),
        }
    }
}

/// Stylesheet options
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    /// Browser compatibility level for minification (`ie8`..`ie11` or `*`)
    pub compatibility: String,
}

impl Default for StylesConfig {
    fn default() -> Self {
        StylesConfig {
            compatibility: "ie8".to_string(),
        }
    }
}

/// Script bundling options
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// Language target for transpilation (e.g. `es2015`)
    pub target: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        ScriptsConfig {
            target: "es2015".to_string(),
        }
    }
}

/// Image optimization options
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// JPEG re-encoding quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        ImagesConfig { jpeg_quality: 75 }
    }
}

/// Development proxy options
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    /// URL of the externally hosted server the proxy fronts
    pub proxy: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        ServeConfig {
            proxy: "http://localhost/gulp-ready/".to_string(),
        }
    }
}

/// Watch patterns for the categories that do not reuse a path mapping
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Stylesheets that trigger the style task (partials included)
    #[serde(deserialize_with = "deserialize_sources")]
    pub styles: Vec<String>,

    /// Scripts that trigger the script task
    #[serde(deserialize_with = "deserialize_sources")]
    pub scripts: Vec<String>,

    /// Server-side templates that only trigger a reload
    #[serde(deserialize_with = "deserialize_sources")]
    pub templates: Vec<String>,

    /// Paths never reported to the watch categories
    #[serde(deserialize_with = "deserialize_sources")]
    pub ignore: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            styles: vec!["src/scss/**/*.scss".to_string()],
            scripts: vec!["src/js/**/*.js".to_string()],
            templates: vec!["**/*.php".to_string()],
            ignore: vec![
                "dist/**".to_string(),
                "node_modules/**".to_string(),
                ".git/**".to_string(),
            ],
        }
    }
}

/// Production or development build, resolved once from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn from_flag(production: bool) -> Self {
        if production {
            BuildMode::Production
        } else {
            BuildMode::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

/// Browser compatibility level for CSS output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Internet Explorer of the given major version and every modern browser
    Ie(u8),
    /// No legacy constraints
    Any,
}

/// Custom deserializer for sources that handles both single values and arrays
fn deserialize_sources<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single pattern
        Value::String(s) => Ok(vec![s]),
        // Array of patterns
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(D::Error::custom(format!(
                    "source patterns must be strings, found {:?}",
                    other
                ))),
            })
            .collect(),
        // Null means no patterns
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("source must be a string or array")),
    }
}
