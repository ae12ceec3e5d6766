//! Configuration types
//!
//! All fields are required. No defaults.

use crate::{ConfigError, PrefResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for durable preference stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding the store environment.
    pub root_dir: PathBuf,
    /// Maximum size of the memory map in megabytes.
    pub map_size_mb: usize,
    /// Maximum number of named preference sets in one environment.
    pub max_sets: u32,
}

impl StoreConfig {
    /// Build a config for `root_dir` with small sizing suitable for settings data.
    pub fn for_dir(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            map_size_mb: 16,
            max_sets: 32,
        }
    }

    /// Read, parse and validate a TOML config file.
    pub fn from_path(path: &Path) -> PrefResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> PrefResult<Self> {
        let config: StoreConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "root_dir".to_string(),
            });
        }

        if self.map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "map_size_mb".to_string(),
                value: self.map_size_mb.to_string(),
                reason: "map_size_mb must be at least 1".to_string(),
            });
        }

        if self.max_sets == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_sets".to_string(),
                value: self.max_sets.to_string(),
                reason: "max_sets must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Map size in bytes, as handed to the store environment.
    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrefError;
    use std::io::Write;

    #[test]
    fn test_from_toml_str_valid() {
        let config = StoreConfig::from_toml_str(
            r#"
            root_dir = "/var/lib/app/prefs"
            map_size_mb = 8
            max_sets = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/var/lib/app/prefs"));
        assert_eq!(config.map_size_bytes(), 8 * 1024 * 1024);
        assert_eq!(config.max_sets, 4);
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_fields() {
        let result = StoreConfig::from_toml_str(
            r#"
            root_dir = "/tmp/prefs"
            map_size_mb = 8
            max_sets = 4
            compression = true
            "#,
        );
        assert!(matches!(
            result,
            Err(PrefError::Config(ConfigError::Parse { .. }))
        ));
    }

    #[test]
    fn test_from_toml_str_missing_field() {
        let result = StoreConfig::from_toml_str(r#"root_dir = "/tmp/prefs""#);
        assert!(matches!(
            result,
            Err(PrefError::Config(ConfigError::Parse { .. }))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_map_size() {
        let mut config = StoreConfig::for_dir("/tmp/prefs");
        config.map_size_mb = 0;
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "map_size_mb")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_max_sets() {
        let mut config = StoreConfig::for_dir("/tmp/prefs");
        config.max_sets = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_root() {
        let config = StoreConfig::for_dir("");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "root_dir = \"/tmp/prefs\"").unwrap();
        writeln!(file, "map_size_mb = 2").unwrap();
        writeln!(file, "max_sets = 1").unwrap();

        let config = StoreConfig::from_path(file.path()).unwrap();
        assert_eq!(config.map_size_mb, 2);
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = StoreConfig::from_path(&dir.path().join("absent.toml"));
        assert!(matches!(
            result,
            Err(PrefError::Config(ConfigError::Io { .. }))
        ));
    }
}
