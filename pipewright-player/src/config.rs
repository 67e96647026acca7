//! Player configuration
//!
//! An optional key/value configuration file, TOML-shaped, whose
//! `[environment]` table is exported as process environment variables once at
//! engine initialization (see [`crate::engine::EngineInit`]). The engine and
//! its plugins read these variables during their own startup; the controller
//! never consults them afterwards.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Default location of the optional engine configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pipewright.conf";

/// Player configuration loaded from a TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerConfig {
    /// Environment variables exported before the engine is initialized
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl PlayerConfig {
    /// Load configuration from an explicitly named file.
    ///
    /// A file that cannot be read or parsed is an error here; use
    /// [`PlayerConfig::load_default`] for the best-effort default path.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration from [`DEFAULT_CONFIG_PATH`] if it exists.
    ///
    /// A missing default file is normal and yields an empty configuration; an
    /// unreadable or malformed one is logged and ignored.
    pub fn load_default() -> Self {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring default config file: {e}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_environment_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[environment]\nENGINE_PLUGIN_PATH = \"/opt/engine/plugins\"\nENGINE_REGISTRY = \"/tmp/registry.bin\""
        )
        .unwrap();

        let config = PlayerConfig::load(file.path()).unwrap();
        assert_eq!(
            config.environment.get("ENGINE_PLUGIN_PATH").map(String::as_str),
            Some("/opt/engine/plugins")
        );
        assert_eq!(config.environment.len(), 2);
    }

    #[test]
    fn empty_file_is_empty_config() {
        let file = NamedTempFile::new().unwrap();
        let config = PlayerConfig::load(file.path()).unwrap();
        assert!(config.environment.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = PlayerConfig::load(Path::new("/nonexistent/pipewright.conf")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[environment\nbroken").unwrap();
        let err = PlayerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
