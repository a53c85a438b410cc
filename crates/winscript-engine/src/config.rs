//! Engine configuration (winscript.toml)
//!
//! ```toml
//! metadata = "Windows.Win32.json"
//! library_paths = ["./native", "/opt/vendor/lib"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Metadata document to load (default: "Windows.Win32.json")
    #[serde(default = "default_metadata_path")]
    pub metadata: PathBuf,

    /// Directories searched for native modules before the platform default
    #[serde(default)]
    pub library_paths: Vec<PathBuf>,
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("Windows.Win32.json")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            metadata: default_metadata_path(),
            library_paths: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration that loads metadata from `path`
    pub fn with_metadata(path: impl Into<PathBuf>) -> Self {
        Self {
            metadata: path.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a configuration file.
    ///
    /// A relative metadata path is taken relative to the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            if config.metadata.is_relative() {
                config.metadata = base.join(&config.metadata);
            }
            for dir in &mut config.library_paths {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.metadata, PathBuf::from("Windows.Win32.json"));
        assert!(config.library_paths.is_empty());
    }

    #[test]
    fn test_parse() {
        let config = EngineConfig::from_toml_str(
            r#"
            metadata = "meta/win32.json"
            library_paths = ["/opt/lib"]
            "#,
        )
        .unwrap();
        assert_eq!(config.metadata, PathBuf::from("meta/win32.json"));
        assert_eq!(config.library_paths, vec![PathBuf::from("/opt/lib")]);
    }

    #[test]
    fn test_parse_error() {
        let err = EngineConfig::from_toml_str("metadata = [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("winscript.toml");
        std::fs::write(
            &path,
            "metadata = \"win32.json\"\nlibrary_paths = [\"native\"]\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.metadata, dir.path().join("win32.json"));
        assert_eq!(config.library_paths, vec![dir.path().join("native")]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/winscript.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
