//! Module specifier resolution
//!
//! Relative specifiers resolve against the importing file; bare specifiers
//! resolve through `node_modules` directories from the importer upwards.

use anyhow::{bail, Context as _, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions tried, in order, when a specifier names no existing file
const EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "json"];

/// Resolve `specifier` as imported from `importer`
pub fn resolve(specifier: &str, importer: &Path) -> Result<PathBuf> {
    let importer_dir = importer.parent().unwrap_or_else(|| Path::new("."));

    let resolved = if is_relative(specifier) {
        resolve_path(&importer_dir.join(specifier))?
    } else {
        resolve_package(specifier, importer_dir)?
    };

    match resolved {
        Some(path) => fs::canonicalize(&path)
            .with_context(|| format!("Failed to resolve {}", path.display())),
        None => bail!(
            "Cannot resolve '{}' imported from {}",
            specifier,
            importer.display()
        ),
    }
}

/// Whether a specifier is a path rather than a package name
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || specifier.starts_with('/')
}

/// Split `@scope/pkg/sub/path` into (`@scope/pkg`, `sub/path`)
pub fn split_package(specifier: &str) -> (&str, &str) {
    let mut split_at = specifier.find('/');
    if specifier.starts_with('@') {
        split_at = split_at.and_then(|first| {
            specifier[first + 1..]
                .find('/')
                .map(|second| first + 1 + second)
        });
    }
    match split_at {
        Some(index) => (&specifier[..index], &specifier[index + 1..]),
        None => (specifier, ""),
    }
}

fn resolve_package(specifier: &str, from_dir: &Path) -> Result<Option<PathBuf>> {
    let (package, subpath) = split_package(specifier);

    for dir in from_dir.ancestors() {
        let package_dir = dir.join("node_modules").join(package);
        if !package_dir.is_dir() {
            continue;
        }
        if subpath.is_empty() {
            return resolve_directory(&package_dir);
        }
        return resolve_path(&package_dir.join(subpath));
    }

    Ok(None)
}

/// Resolve a path as a file, a file with a known extension, or a directory
fn resolve_path(path: &Path) -> Result<Option<PathBuf>> {
    if path.is_file() {
        return Ok(Some(path.to_path_buf()));
    }

    if let Some(file) = with_extensions(path) {
        return Ok(Some(file));
    }

    if path.is_dir() {
        return resolve_directory(path);
    }

    Ok(None)
}

/// Resolve a directory through its `package.json`, then its index file
fn resolve_directory(dir: &Path) -> Result<Option<PathBuf>> {
    let manifest = dir.join("package.json");
    if manifest.is_file() {
        let contents = fs::read_to_string(&manifest)
            .with_context(|| format!("Failed to read {}", manifest.display()))?;
        let json: serde_json::Value = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in {}", manifest.display()))?;

        for field in ["module", "main"] {
            if let Some(entry) = json.get(field).and_then(|v| v.as_str()) {
                let entry_path = dir.join(entry);
                if entry_path.is_file() {
                    return Ok(Some(entry_path));
                }
                if let Some(file) = with_extensions(&entry_path) {
                    return Ok(Some(file));
                }
                let index = entry_path.join("index");
                if let Some(file) = with_extensions(&index) {
                    return Ok(Some(file));
                }
            }
        }
    }

    Ok(with_extensions(&dir.join("index")))
}

/// First existing file among `path.js`, `path.mjs`, `path.cjs`, `path.json`
fn with_extensions(path: &Path) -> Option<PathBuf> {
    EXTENSIONS.iter().find_map(|ext| {
        let mut candidate = OsString::from(path.as_os_str());
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}
