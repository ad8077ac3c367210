//! The (family, action) pairs cloudsweep can run

use crate::error::ConfigError;
use cloudsweep_common::ResourceFamily;
use std::fmt;

/// One runnable command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    ListInstances,
    FilterInstances,
    StopInstances,
    ListBuckets,
    FilterObjects,
    UploadFile,
    DeleteFile,
    ListUsers,
    ListKeys,
    CreateKey,
    DeleteKey,
    DeleteOldKeys,
}

impl Command {
    pub const ALL: [Command; 12] = [
        Command::ListInstances,
        Command::FilterInstances,
        Command::StopInstances,
        Command::ListBuckets,
        Command::FilterObjects,
        Command::UploadFile,
        Command::DeleteFile,
        Command::ListUsers,
        Command::ListKeys,
        Command::CreateKey,
        Command::DeleteKey,
        Command::DeleteOldKeys,
    ];

    pub fn family(self) -> ResourceFamily {
        match self {
            Command::ListInstances | Command::FilterInstances | Command::StopInstances => {
                ResourceFamily::ComputeInstance
            }
            Command::ListBuckets
            | Command::FilterObjects
            | Command::UploadFile
            | Command::DeleteFile => ResourceFamily::StorageObject,
            Command::ListUsers
            | Command::ListKeys
            | Command::CreateKey
            | Command::DeleteKey
            | Command::DeleteOldKeys => ResourceFamily::IdentityKey,
        }
    }

    /// Action name on the command line and in the `Action` audit column
    pub fn action(self) -> &'static str {
        match self {
            Command::ListInstances => "list-instances",
            Command::FilterInstances => "filter-instances",
            Command::StopInstances => "stop-instances",
            Command::ListBuckets => "list-buckets",
            Command::FilterObjects => "filter-objects",
            Command::UploadFile => "upload-file",
            Command::DeleteFile => "delete-file",
            Command::ListUsers => "list-users",
            Command::ListKeys => "list-keys",
            Command::CreateKey => "create-key",
            Command::DeleteKey => "delete-key",
            Command::DeleteOldKeys => "delete-old-keys",
        }
    }

    /// Whether the command changes remote state
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Command::StopInstances
                | Command::UploadFile
                | Command::DeleteFile
                | Command::CreateKey
                | Command::DeleteKey
                | Command::DeleteOldKeys
        )
    }

    /// Look up a command by family and action name
    pub fn parse(family: &str, action: &str) -> Result<Self, ConfigError> {
        let parsed = ResourceFamily::parse(family);
        Self::ALL
            .into_iter()
            .find(|c| Some(c.family()) == parsed && c.action() == action)
            .ok_or_else(|| ConfigError::UnknownCommand {
                family: family.to_string(),
                action: action.to_string(),
            })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family().cli_name(), self.action())
    }
}
