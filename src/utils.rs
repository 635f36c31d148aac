//! Glob and path helpers shared by the config validator, the asset tasks and the watcher

use crate::error::{ConfigError, ConfigResult};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};

/// Normalize a pattern from the config: strip a leading `./`
pub fn normalize_pattern(pattern: &str) -> &str {
    pattern.strip_prefix("./").unwrap_or(pattern)
}

/// Build a glob set from patterns; `*` never crosses a `/`
pub fn build_glob_set<'a, I>(patterns: I) -> ConfigResult<GlobSet>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(normalize_pattern(pattern))
            .literal_separator(true)
            .build()
            .map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.to_string(),
                error: e.kind().to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::InvalidGlob {
        pattern: String::new(),
        error: e.to_string(),
    })
}

/// The leading directory of a pattern that contains no glob syntax
///
/// `src/images/**/*.png` → `src/images`, `src/scss/main.scss` → `src/scss`,
/// `**/*.php` → `` (the project root).
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = normalize_pattern(pattern);
    let segments: Vec<&str> = pattern.split('/').collect();
    let literal = segments
        .iter()
        .take_while(|segment| !has_glob_syntax(segment))
        .count();

    // A fully literal pattern names a file; its base is the parent directory
    let take = if literal == segments.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };

    segments[..take].iter().collect()
}

/// Whether a single path segment contains glob metacharacters
pub fn has_glob_syntax(segment: &str) -> bool {
    segment.contains(['*', '?', '[', ']', '{', '}'])
}

/// Path of `path` relative to `root`, with `/` separators, for glob matching
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Whether a relative path stays inside its root (no absolute part, no `..`)
pub fn stays_inside(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_base() {
        assert_eq!(
            glob_base("src/images/**/*.{jpg,png}"),
            PathBuf::from("src/images")
        );
        assert_eq!(glob_base("./src/scss/main.scss"), PathBuf::from("src/scss"));
        assert_eq!(glob_base("src/**/*"), PathBuf::from("src"));
        assert_eq!(glob_base("**/*.php"), PathBuf::new());
        assert_eq!(glob_base("main.js"), PathBuf::new());
    }

    #[test]
    fn test_glob_set_braces_and_separator() {
        let set = build_glob_set(["src/images/**/*.{jpg,JPG,png}"]).unwrap();
        assert!(set.is_match("src/images/a.jpg"));
        assert!(set.is_match("src/images/icons/b.JPG"));
        assert!(!set.is_match("src/images/c.gif"));

        let set = build_glob_set(["src/*.html"]).unwrap();
        assert!(set.is_match("src/index.html"));
        assert!(!set.is_match("src/pages/about.html"));
    }

    #[test]
    fn test_invalid_glob() {
        let result = build_glob_set(["src/{unclosed"]);
        assert!(matches!(result, Err(ConfigError::InvalidGlob { .. })));
    }

    #[test]
    fn test_relative_slash_path() {
        let root = Path::new("/project");
        assert_eq!(
            relative_slash_path(root, Path::new("/project/src/js/main.js")),
            Some("src/js/main.js".to_string())
        );
        assert_eq!(relative_slash_path(root, Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn test_stays_inside() {
        assert!(stays_inside(Path::new("dist/css")));
        assert!(stays_inside(Path::new("./dist")));
        assert!(!stays_inside(Path::new("../dist")));
        assert!(!stays_inside(Path::new("/tmp/dist")));
    }
}
