//! Source file selection and output writing
//!
//! A [`FileSet`] is the Rust side of a source glob list: include patterns,
//! `!`-prefixed exclusions, and a base directory (the literal prefix of the
//! first include pattern) that output paths are made relative to.

use crate::error::ConfigResult;
use crate::utils::{build_glob_set, glob_base, relative_slash_path};
use anyhow::{Context as _, Result};
use globset::GlobSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A file or directory selected by a [`FileSet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    /// Absolute path of the source
    pub path: PathBuf,
    /// Path relative to the file set base, used to place the output
    pub relative: PathBuf,
    /// Whether the source is a directory
    pub is_dir: bool,
}

/// Files selected by a list of glob patterns
#[derive(Debug, Clone)]
pub struct FileSet {
    root: PathBuf,
    base: PathBuf,
    walk_roots: Vec<PathBuf>,
    includes: GlobSet,
    excludes: GlobSet,
}

impl FileSet {
    /// Build a file set from patterns relative to `root`
    pub fn new(root: &Path, patterns: &[String]) -> ConfigResult<Self> {
        let (excluded, included): (Vec<&str>, Vec<&str>) = patterns
            .iter()
            .map(String::as_str)
            .partition(|p| p.starts_with('!'));

        let base = included.first().map(|p| glob_base(p)).unwrap_or_default();

        let mut walk_roots: Vec<PathBuf> = Vec::new();
        for pattern in &included {
            let dir = glob_base(pattern);
            if !walk_roots.iter().any(|r| dir.starts_with(r)) {
                walk_roots.retain(|r| !r.starts_with(&dir));
                walk_roots.push(dir);
            }
        }

        Ok(FileSet {
            root: root.to_path_buf(),
            base,
            walk_roots,
            includes: build_glob_set(included.iter().copied())?,
            excludes: build_glob_set(excluded.into_iter().map(|p| &p[1..]))?,
        })
    }

    /// Base directory (relative to the root) that outputs mirror
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directories (relative to the root) that must be walked or watched
    pub fn walk_roots(&self) -> &[PathBuf] {
        &self.walk_roots
    }

    /// Whether a root-relative, `/`-separated path is selected
    pub fn matches(&self, relative: &str) -> bool {
        self.includes.is_match(relative) && !self.excludes.is_match(relative)
    }

    /// Whether an absolute path is selected
    pub fn matches_path(&self, path: &Path) -> bool {
        relative_slash_path(&self.root, path)
            .map(|rel| self.matches(&rel))
            .unwrap_or(false)
    }

    /// Walk the file system and return every selected entry, sorted by path
    pub fn collect(&self) -> Result<Vec<Matched>> {
        let base_dir = self.root.join(&self.base);
        let mut matched = Vec::new();

        for walk_root in &self.walk_roots {
            let dir = self.root.join(walk_root);
            if !dir.is_dir() {
                continue;
            }

            // Tasks walk from inside rayon groups, so the walk stays off the pool
            let walker = jwalk::WalkDir::new(&dir)
                .skip_hidden(false)
                .sort(true)
                .parallelism(jwalk::Parallelism::Serial);
            for entry in walker {
                let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
                if entry.depth == 0 {
                    continue;
                }

                let path = entry.path();
                if !self.matches_path(&path) {
                    continue;
                }

                let relative = path
                    .strip_prefix(&base_dir)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));

                matched.push(Matched {
                    is_dir: entry.file_type().is_dir(),
                    path,
                    relative,
                });
            }
        }

        matched.sort_by(|a, b| a.path.cmp(&b.path));
        matched.dedup_by(|a, b| a.path == b.path);
        Ok(matched)
    }

    /// Only the selected regular files
    pub fn collect_files(&self) -> Result<Vec<Matched>> {
        Ok(self.collect()?.into_iter().filter(|m| !m.is_dir).collect())
    }
}

/// Write bytes to a file, creating parent directories
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Copy a file byte for byte, creating parent directories
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in [
            "src/index.html",
            "src/fonts/a.woff2",
            "src/scss/main.scss",
            "src/scss/_vars.scss",
            "src/js/main.js",
            "src/images/logo.png",
            "src/images/icons/star.SVG",
            "src/images/photo.JPG",
        ] {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file).unwrap();
        }
        fs::create_dir_all(dir.path().join("src/empty")).unwrap();
        dir
    }

    fn relatives(set: &FileSet) -> Vec<String> {
        set.collect()
            .unwrap()
            .into_iter()
            .map(|m| m.relative.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_others_exclude_owned_trees() {
        let dir = project();
        let set = FileSet::new(
            dir.path(),
            &patterns(&[
                "./src/**/*",
                "!src/{images,js,scss}",
                "!src/{images,js,scss}/**/*",
            ]),
        )
        .unwrap();

        assert_eq!(set.base(), Path::new("src"));
        assert_eq!(
            relatives(&set),
            vec!["empty", "fonts", "fonts/a.woff2", "index.html"]
        );
    }

    #[test]
    fn test_image_extensions_are_case_sensitive_alternatives() {
        let dir = project();
        let set = FileSet::new(
            dir.path(),
            &patterns(&["src/images/**/*.{jpg,JPG,jpeg,JPEG,svg,png,gif}"]),
        )
        .unwrap();

        // star.SVG is not in the alternative list
        assert_eq!(relatives(&set), vec!["logo.png", "photo.JPG"]);
    }

    #[test]
    fn test_single_file_pattern() {
        let dir = project();
        let set = FileSet::new(dir.path(), &patterns(&["src/scss/main.scss"])).unwrap();

        let files = set.collect_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("main.scss"));
        assert_eq!(files[0].path, dir.path().join("src/scss/main.scss"));
    }

    #[test]
    fn test_missing_base_directory_matches_nothing() {
        let dir = TempDir::new().unwrap();
        let set = FileSet::new(dir.path(), &patterns(&["src/images/**/*.png"])).unwrap();
        assert!(set.collect().unwrap().is_empty());
    }

    #[test]
    fn test_walk_roots_are_deduplicated() {
        let dir = TempDir::new().unwrap();
        let set = FileSet::new(
            dir.path(),
            &patterns(&["src/js/**/*.js", "src/**/*.mjs", "src/js/main.js"]),
        )
        .unwrap();
        assert_eq!(set.walk_roots(), &[PathBuf::from("src")]);
    }

    #[test]
    fn test_walk_inside_single_thread_pool() {
        use rayon::prelude::*;

        let dir = project();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        let sets = vec![
            FileSet::new(dir.path(), &patterns(&["src/scss/*.scss"])).unwrap(),
            FileSet::new(dir.path(), &patterns(&["src/js/**/*.js"])).unwrap(),
        ];

        let counts: Vec<usize> = pool.install(|| {
            sets.par_iter()
                .map(|set| set.collect().unwrap().len())
                .collect()
        });
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn test_write_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("dist/css/main.css");
        write_file(&target, "a{}").unwrap();
        assert_eq!(fs::read_to_string(target).unwrap(), "a{}");
    }
}
