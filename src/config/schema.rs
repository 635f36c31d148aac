//! Configuration validation
//!
//! This module provides validation logic for configuration files.

use crate::config::types::{Compatibility, Config, PathMapping};
use crate::error::{ConfigError, ConfigResult};
use crate::utils::{build_glob_set, stays_inside};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static IE_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[iI][eE]\s*(\d{1,2})$").expect("valid regex"));

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    validate_output(&config.output)?;

    for (name, mapping) in [
        ("styles", &config.paths.styles),
        ("scripts", &config.paths.scripts),
        ("images", &config.paths.images),
        ("others", &config.paths.others),
    ] {
        validate_mapping(name, mapping)?;
        validate_destination(name, &mapping.destination, &config.output)?;
    }

    parse_compatibility(&config.styles.compatibility)?;

    if config.scripts.target.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "scripts.target cannot be empty".to_string(),
        ));
    }

    if !(1..=100).contains(&config.images.jpeg_quality) {
        return Err(ConfigError::Invalid(format!(
            "images.jpeg_quality must be between 1 and 100, got {}",
            config.images.jpeg_quality
        )));
    }

    validate_proxy(&config.serve.proxy)?;

    for patterns in [
        &config.watch.styles,
        &config.watch.scripts,
        &config.watch.templates,
        &config.watch.ignore,
    ] {
        build_glob_set(patterns.iter().map(String::as_str))?;
    }

    Ok(())
}

/// Validate the output root: a non-empty directory strictly inside the project
fn validate_output(output: &Path) -> ConfigResult<()> {
    if !stays_inside(output) {
        return Err(ConfigError::OutsideRoot(output.to_path_buf()));
    }
    if output.components().next().is_none() || output == Path::new(".") {
        return Err(ConfigError::Invalid(
            "output cannot be the project root".to_string(),
        ));
    }
    Ok(())
}

/// Validate a single path mapping
pub fn validate_mapping(name: &str, mapping: &PathMapping) -> ConfigResult<()> {
    let includes: Vec<&str> = mapping
        .source
        .iter()
        .filter(|p| !p.starts_with('!'))
        .map(String::as_str)
        .collect();
    if includes.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "paths.{}.source needs at least one pattern that is not an exclusion",
            name
        )));
    }

    build_glob_set(
        mapping
            .source
            .iter()
            .map(|p| p.strip_prefix('!').unwrap_or(p)),
    )?;

    if !stays_inside(&mapping.destination) {
        return Err(ConfigError::OutsideRoot(mapping.destination.clone()));
    }

    Ok(())
}

/// Check that a destination lies under the output root, so `clean` removes
/// everything a build writes
fn validate_destination(name: &str, destination: &Path, output: &Path) -> ConfigResult<()> {
    if !normalized(destination).starts_with(normalized(output)) {
        return Err(ConfigError::Invalid(format!(
            "paths.{}.destination '{}' must be inside the output directory '{}'",
            name,
            destination.display(),
            output.display()
        )));
    }
    Ok(())
}

/// A relative path without `.` components
fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Parse a style compatibility level (`ie8`, `ie9`, `ie10`, `ie11`, `*`)
pub fn parse_compatibility(level: &str) -> ConfigResult<Compatibility> {
    let level = level.trim();
    if level == "*" {
        return Ok(Compatibility::Any);
    }
    let version = IE_LEVEL
        .captures(level)
        .and_then(|caps| caps[1].parse::<u8>().ok())
        .filter(|v| (8..=11).contains(v))
        .ok_or_else(|| ConfigError::UnknownCompatibility(level.to_string()))?;
    Ok(Compatibility::Ie(version))
}

/// Validate the proxy target URL
fn validate_proxy(proxy: &str) -> ConfigResult<()> {
    let url = url::Url::parse(proxy)
        .map_err(|e| ConfigError::Invalid(format!("serve.proxy '{}': {}", proxy, e)))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(()),
        _ => Err(ConfigError::Invalid(format!(
            "serve.proxy '{}' must be an http(s) URL with a host",
            proxy
        ))),
    }
}
