//! Option resolution: command line, then config file, then default

use crate::command::Command;
use crate::config::schema::{OptionSpec, find_option, options_for};
use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Effective parameters for one command
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    command: Command,
    values: BTreeMap<&'static str, Value>,
}

/// Resolve every option declared for `command`.
///
/// `cli_args` holds values given on the command line, keyed by option name.
/// Null values count as unset at every level.
pub fn resolve(
    command: Command,
    cli_args: &BTreeMap<String, Value>,
    config: &Map<String, Value>,
) -> Result<ResolvedParams, ConfigError> {
    let mut values = BTreeMap::new();

    for spec in options_for(command) {
        if let Some(value) = lookup(spec, cli_args, config) {
            values.insert(spec.name, value);
        } else if spec.required {
            return Err(ConfigError::MissingOption {
                option: spec.name,
                flag: spec.flag,
            });
        }
    }

    Ok(ResolvedParams { command, values })
}

fn lookup(
    spec: &OptionSpec,
    cli_args: &BTreeMap<String, Value>,
    config: &Map<String, Value>,
) -> Option<Value> {
    let set = |v: &&Value| !v.is_null();

    cli_args
        .get(spec.name)
        .filter(set)
        .or_else(|| spec.config_keys().find_map(|key| config.get(key).filter(set)))
        .cloned()
        .or_else(|| spec.default.map(|d| d.to_value()))
}

impl ResolvedParams {
    pub fn command(&self) -> Command {
        self.command
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Resolved (name, value) pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    fn missing(&self, name: &str) -> ConfigError {
        match find_option(self.command, name) {
            Some(spec) => ConfigError::MissingOption {
                option: spec.name,
                flag: spec.flag,
            },
            None => ConfigError::InvalidValue {
                option: name.to_string(),
                expected: "an option declared for this command",
                found: "nothing".to_string(),
            },
        }
    }

    /// Optional string option; may be empty
    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, ConfigError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(ConfigError::invalid(name, "a string", other)),
        }
    }

    /// String option that must be present; may be empty
    pub fn str(&self, name: &str) -> Result<&str, ConfigError> {
        self.opt_str(name)?.ok_or_else(|| self.missing(name))
    }

    /// String option that must be present and non-blank
    pub fn non_empty(&self, name: &str) -> Result<&str, ConfigError> {
        let s = self.str(name)?;
        if s.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                option: name.to_string(),
                expected: "a non-empty string",
                found: "\"\"".to_string(),
            });
        }
        Ok(s)
    }

    /// Non-negative integer; numeric strings are accepted
    pub fn u64(&self, name: &str) -> Result<u64, ConfigError> {
        let value = self.values.get(name).ok_or_else(|| self.missing(name))?;
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| ConfigError::invalid(name, "a non-negative integer", value))
    }

    /// List of strings; a comma-separated string is split
    pub fn string_list(&self, name: &str) -> Result<Option<Vec<String>>, ConfigError> {
        let Some(value) = self.values.get(name) else {
            return Ok(None);
        };
        let expected = "a list of strings";
        let list = match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.trim().to_string()),
                    other => Err(ConfigError::invalid(name, expected, other)),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::String(s) => s.split(',').map(|part| part.trim().to_string()).collect(),
            other => return Err(ConfigError::invalid(name, expected, other)),
        };
        Ok(Some(list.into_iter().filter(|s| !s.is_empty()).collect()))
    }
}

impl fmt::Display for ResolvedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for (name, value) in &self.values {
            match value {
                Value::String(s) => write!(f, " {name}={s}")?,
                other => write!(f, " {name}={other}")?,
            }
        }
        Ok(())
    }
}
