//! Common test utilities

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const MAIN_SCSS: &str = "$brand: #336699;\n@import 'buttons';\n\nbody {\n  color: $brand;\n}\n";
pub const BUTTONS_SCSS: &str = ".btn {\n  padding: 4px 8px;\n}\n";
pub const MAIN_JS: &str = "import { greet } from './greet';\n\ndocument.title = greet('sluice');\n";
pub const GREET_JS: &str = "export function greet(name) {\n  return 'Hello, ' + name;\n}\n";
pub const ICON_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"8\" height=\"8\">\n  <rect width=\"8\" height=\"8\" fill=\"#000000\"/>\n</svg>\n";

/// Write a file below `root`, creating parent directories
pub fn write_file(root: &Path, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

/// Create a temporary project from (path, contents) pairs
pub fn create_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (relative, contents) in files {
        write_file(temp_dir.path(), relative, contents);
    }
    temp_dir
}

/// A project using the default layout with every asset category populated
pub fn create_standard_project() -> TempDir {
    create_project(&[
        ("src/scss/main.scss", MAIN_SCSS),
        ("src/scss/_buttons.scss", BUTTONS_SCSS),
        ("src/js/main.js", MAIN_JS),
        ("src/js/greet.js", GREET_JS),
        ("src/images/icon.svg", ICON_SVG),
        ("src/images/anim.gif", "GIF89a"),
        ("src/index.php", "<?php echo 'hi'; ?>\n"),
        ("src/fonts/site.woff2", "font"),
    ])
}

/// Create a temporary directory with a sluice.yml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_file(temp_dir.path(), "sluice.yml", content);
    (temp_dir, config_path)
}

/// The sluice binary, run from `dir`
pub fn sluice(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sluice").unwrap();
    cmd.current_dir(dir).env("NO_COLOR", "1");
    cmd
}

pub fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

/// Run a script with node and return its stdout, or `None` without node
pub fn node_output(script: &Path) -> Option<String> {
    let output = std::process::Command::new("node").arg(script).output().ok()?;
    assert!(
        output.status.success(),
        "{} failed: {}",
        script.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    Some(String::from_utf8(output.stdout).unwrap())
}
