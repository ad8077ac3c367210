//! Config file loading

use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load the flat JSON config object at `path`.
///
/// A missing file is not an error and yields an empty map.
pub fn load_config_file(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Map::new());
        }
        Err(e) => return Err(ConfigError::io(path.display().to_string(), e)),
    };

    let value: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    match value {
        Value::Object(map) => {
            debug!(path = %path.display(), keys = map.len(), "Loaded config file");
            Ok(map)
        }
        _ => Err(ConfigError::NotAnObject {
            path: path.display().to_string(),
        }),
    }
}

/// Invocation-wide settings that may also live in the config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub audit_file: Option<PathBuf>,
}

impl GlobalSettings {
    /// Read the global keys from a loaded config map, ignoring everything else
    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ConfigError> {
        let pick = |key: &str| -> Result<Option<String>, ConfigError> {
            match config.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(other) => Err(ConfigError::invalid(key, "a string", other)),
            }
        };

        Ok(Self {
            region: pick("region")?,
            profile: pick("profile")?,
            audit_file: pick("audit_file")?.map(PathBuf::from),
        })
    }

    /// Command-line values win over config-file values
    pub fn overlay(self, region: Option<String>, profile: Option<String>, audit_file: Option<PathBuf>) -> Self {
        Self {
            region: region.or(self.region),
            profile: profile.or(self.profile),
            audit_file: audit_file.or(self.audit_file),
        }
    }
}
