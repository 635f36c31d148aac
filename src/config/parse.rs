//! Configuration file parsing and discovery

use crate::config::types::Config;
use crate::error::{ConfigError, ConfigResult, SluiceError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["sluice.yml", "sluice.yaml"];

/// Configuration together with the directory every configured path is relative to
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub root: PathBuf,
    pub config_path: Option<PathBuf>,
}

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(current_dir()?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        // Try parent directory
        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => {
                // Reached root without finding config
                return Err(ConfigError::NotFound(searched_paths.join(", ")));
            }
        }
    }
}

/// Parse a configuration file from a path
pub fn parse_config_file(path: &Path) -> Result<Config, SluiceError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e))
    })?;

    parse_config(&contents)
}

/// Parse configuration from a string
///
/// An empty document yields the default configuration.
pub fn parse_config(yaml: &str) -> Result<Config, SluiceError> {
    if yaml.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Load the configuration for a run
///
/// With an explicit path the file must exist. Otherwise the file is discovered
/// from the current directory upwards, and when none exists the defaults apply
/// with the current directory as the project root.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, SluiceError> {
    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => match find_config_file() {
            Ok(path) => Some(path),
            Err(ConfigError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        },
    };

    match config_path {
        Some(path) => {
            let config = parse_config_file(&path)?;
            let root = config_root(&path)?;
            Ok(LoadedConfig {
                config,
                root,
                config_path: Some(path),
            })
        }
        None => Ok(LoadedConfig {
            config: Config::default(),
            root: current_dir()?,
            config_path: None,
        }),
    }
}

/// The directory containing the config file, made absolute
fn config_root(config_path: &Path) -> ConfigResult<PathBuf> {
    let parent = match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if parent.is_absolute() {
        Ok(parent)
    } else {
        Ok(current_dir()?.join(parent))
    }
}

fn current_dir() -> ConfigResult<PathBuf> {
    env::current_dir()
        .map_err(|e| ConfigError::Invalid(format!("Failed to get current directory: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
output: public
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.output, PathBuf::from("public"));
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = parse_config("output: [unclosed");
        assert!(matches!(result, Err(SluiceError::Yaml(_))));
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sluice.yml");
        fs::write(&config_path, "output: dist\n").unwrap();

        let found = find_config_file_from(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sluice.yaml");
        let sub_dir = temp_dir.path().join("src").join("scss");

        fs::create_dir_all(&sub_dir).unwrap();
        fs::write(&config_path, "output: dist\n").unwrap();

        let found = find_config_file_from(sub_dir).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_config_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_config_file_from(temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_explicit_config_sets_root() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sluice.yml");
        fs::write(&config_path, "output: build\n").unwrap();

        let loaded = load_config(Some(&config_path)).unwrap();
        assert_eq!(loaded.root, temp_dir.path());
        assert_eq!(loaded.config.output, PathBuf::from("build"));
        assert_eq!(loaded.config_path, Some(config_path));
    }

    #[test]
    fn test_load_missing_explicit_config() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_config(Some(&temp_dir.path().join("missing.yml")));
        assert!(matches!(
            result,
            Err(SluiceError::Config(ConfigError::Invalid(_)))
        ));
    }
}
