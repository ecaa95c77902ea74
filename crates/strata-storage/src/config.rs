use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_driver::validate_path;

use crate::error::{StorageError, StorageResult};

/// Storage configuration, usually loaded from a TOML file.
///
/// ```toml
/// root_directory = "/docker/registry"
/// layout_version = "v2"
/// buffer_size = 5242880
///
/// [driver]
/// kind = "filesystem"
/// root = "/var/lib/strata"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Driver path under which every object is stored.
    pub root_directory: String,
    /// Layout version segment following the root directory.
    pub layout_version: String,
    /// Bytes buffered by upload writers before they hit the driver.
    pub buffer_size: usize,
    pub driver: DriverConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_directory: "/docker/registry".into(),
            layout_version: "v2".into(),
            buffer_size: 5 * 1024 * 1024,
            driver: DriverConfig::InMemory,
        }
    }
}

/// Which storage driver backs the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DriverConfig {
    InMemory,
    Filesystem { root: PathBuf },
}

impl StorageConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> StorageResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Serialize this configuration to TOML.
    pub fn to_toml_string(&self) -> StorageResult<String> {
        toml::to_string(self).map_err(|e| StorageError::Config(e.to_string()))
    }

    /// Reject configurations no registry can be built from.
    pub fn validate(&self) -> StorageResult<()> {
        validate_path(&self.root_directory).map_err(|e| StorageError::Config(e.to_string()))?;
        if self.layout_version.is_empty()
            || !self
                .layout_version
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
        {
            return Err(StorageError::Config(format!(
                "invalid layout version {:?}",
                self.layout_version
            )));
        }
        if self.buffer_size == 0 {
            return Err(StorageError::Config("buffer_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StorageConfig::default();
        assert_eq!(c.root_directory, "/docker/registry");
        assert_eq!(c.layout_version, "v2");
        assert_eq!(c.buffer_size, 5 * 1024 * 1024);
        assert_eq!(c.driver, DriverConfig::InMemory);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn parse_filesystem_driver() {
        let c = StorageConfig::from_toml_str(
            r#"
            buffer_size = 1024

            [driver]
            kind = "filesystem"
            root = "/var/lib/strata"
            "#,
        )
        .unwrap();
        assert_eq!(c.buffer_size, 1024);
        assert_eq!(c.root_directory, "/docker/registry");
        assert_eq!(
            c.driver,
            DriverConfig::Filesystem {
                root: PathBuf::from("/var/lib/strata")
            }
        );
    }

    #[test]
    fn toml_roundtrip() {
        let c = StorageConfig {
            root_directory: "/custom".into(),
            driver: DriverConfig::Filesystem { root: "/tmp/x".into() },
            ..StorageConfig::default()
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(StorageConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn reject_invalid_values() {
        assert!(StorageConfig::from_toml_str("root_directory = \"relative\"").is_err());
        assert!(StorageConfig::from_toml_str("layout_version = \"v2/x\"").is_err());
        assert!(StorageConfig::from_toml_str("buffer_size = 0").is_err());
        assert!(StorageConfig::from_toml_str("[driver]\nkind = \"s3\"").is_err());
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = StorageConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
