//! Declared options per command
//!
//! Every command's parameters are described here once. The resolver walks
//! this table, so adding an option never touches per-command code.

use crate::command::Command;
use cloudsweep_common::defaults::{
    DEFAULT_CUT_OFF_DAYS, DEFAULT_KEY_MAX_AGE_DAYS, DEFAULT_UPLOAD_PREFIX,
};
use serde_json::Value;

/// Static default for an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(u64),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Str(s) => Value::from(s),
            DefaultValue::Int(n) => Value::from(n),
        }
    }
}

/// One declared option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Canonical name, also the primary config-file key
    pub name: &'static str,
    /// Legacy config-file keys checked after `name`
    pub aliases: &'static [&'static str],
    /// Command-line flag that sets it
    pub flag: &'static str,
    pub required: bool,
    pub default: Option<DefaultValue>,
}

impl OptionSpec {
    const fn required(name: &'static str, flag: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            flag,
            required: true,
            default: None,
        }
    }

    const fn optional(name: &'static str, flag: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            flag,
            required: false,
            default: None,
        }
    }

    const fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    const fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Config-file keys in lookup order
    pub fn config_keys(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

const TAG_KEY_ALIASES: &[&str] = &["tag_to_check"];
const TAG_VALUE_ALIASES: &[&str] = &["stop_tag_value"];

const FILTER_INSTANCES: &[OptionSpec] = &[
    OptionSpec::required("tag_key", "--tag-key").with_aliases(TAG_KEY_ALIASES),
    OptionSpec::required("tag_value", "--tag-value").with_aliases(TAG_VALUE_ALIASES),
];

const STOP_INSTANCES: &[OptionSpec] = &[
    OptionSpec::optional("instance_ids", "--instance-ids"),
    OptionSpec::optional("tag_key", "--tag-key").with_aliases(TAG_KEY_ALIASES),
    OptionSpec::optional("tag_value", "--tag-value").with_aliases(TAG_VALUE_ALIASES),
];

const AGED_OBJECTS: &[OptionSpec] = &[
    OptionSpec::required("bucket_name", "--bucket-name"),
    OptionSpec::optional("cut_off_days", "--cut-off-days")
        .with_default(DefaultValue::Int(DEFAULT_CUT_OFF_DAYS)),
];

const UPLOAD_FILE: &[OptionSpec] = &[
    OptionSpec::required("bucket_name", "--bucket-name"),
    OptionSpec::required("local_file_path", "--local-file-path"),
    OptionSpec::optional("prefix", "--prefix").with_default(DefaultValue::Str(DEFAULT_UPLOAD_PREFIX)),
];

const USER_ONLY: &[OptionSpec] = &[OptionSpec::required("username", "--username")];

const DELETE_KEY: &[OptionSpec] = &[
    OptionSpec::required("username", "--username"),
    OptionSpec::required("access_key_id", "--access-key-id"),
];

const DELETE_OLD_KEYS: &[OptionSpec] = &[
    OptionSpec::required("username", "--username"),
    OptionSpec::optional("key_max_age", "--key-max-age")
        .with_default(DefaultValue::Int(DEFAULT_KEY_MAX_AGE_DAYS)),
];

/// Options declared for `command`
pub fn options_for(command: Command) -> &'static [OptionSpec] {
    match command {
        Command::ListInstances | Command::ListBuckets | Command::ListUsers => &[],
        Command::FilterInstances => FILTER_INSTANCES,
        Command::StopInstances => STOP_INSTANCES,
        Command::FilterObjects | Command::DeleteFile => AGED_OBJECTS,
        Command::UploadFile => UPLOAD_FILE,
        Command::ListKeys | Command::CreateKey => USER_ONLY,
        Command::DeleteKey => DELETE_KEY,
        Command::DeleteOldKeys => DELETE_OLD_KEYS,
    }
}

/// Look up one option of a command
pub fn find_option(command: Command, name: &str) -> Option<&'static OptionSpec> {
    options_for(command).iter().find(|o| o.name == name)
}
