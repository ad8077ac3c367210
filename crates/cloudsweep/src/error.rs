//! Command-level errors
//!
//! Per-resource failures never show up here; they become `Failed` outcome
//! records. These errors abort a whole command.

use cloudsweep_common::ProviderError;
use thiserror::Error;

/// Configuration and option resolution errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required option has no CLI value, config value or default
    #[error("missing required option '{option}' (pass {flag} or set \"{option}\" in the config file)")]
    MissingOption {
        option: &'static str,
        flag: &'static str,
    },

    /// An option resolved to a value of the wrong type
    #[error("invalid value for '{option}': expected {expected}, got {found}")]
    InvalidValue {
        option: String,
        expected: &'static str,
        found: String,
    },

    /// A selection was requested without any discriminating criterion
    #[error("{command} needs at least one selection criterion")]
    NoCriteria { command: String },

    /// Tag criterion with an empty key or value
    #[error("tag criterion needs a non-empty key and value (got key '{key}', value '{value}')")]
    EmptyTag { key: String, value: String },

    /// No such (family, action) pair
    #[error("unknown command: {family} {action}")]
    UnknownCommand { family: String, action: String },

    /// Failed to read a local file
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Config file is valid JSON but not an object
    #[error("config file '{path}' must contain a JSON object")]
    NotAnObject { path: String },
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid(option: impl Into<String>, expected: &'static str, found: &serde_json::Value) -> Self {
        Self::InvalidValue {
            option: option.into(),
            expected,
            found: found.to_string(),
        }
    }
}

/// Failure of a whole command
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The listing or provisioning call itself failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A local file needed by the command could not be used
    #[error("{context} '{path}': {source}")]
    Io {
        context: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    pub fn io(context: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Operator hint, when the underlying error has one
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            RunError::Config(_) => Some("run with --help to see the options this command accepts"),
            RunError::Provider(e) => e.suggestion(),
            RunError::Io { .. } => None,
        }
    }
}
