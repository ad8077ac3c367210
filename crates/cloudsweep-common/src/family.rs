//! Resource families and terminal action kinds
//!
//! A family groups the remote resources one provider client can enumerate
//! and act on. The service label is part of the audit file format and must
//! not change between releases.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Class of remote resource handled by cloudsweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceFamily {
    /// EC2 instance
    ComputeInstance,
    /// S3 object inside one bucket
    StorageObject,
    /// IAM access key belonging to one user
    IdentityKey,
}

impl ResourceFamily {
    /// All families, in CLI help order
    pub const ALL: [ResourceFamily; 3] = [
        ResourceFamily::ComputeInstance,
        ResourceFamily::StorageObject,
        ResourceFamily::IdentityKey,
    ];

    /// Service label written to the `Service` audit column
    pub fn service_label(self) -> &'static str {
        match self {
            ResourceFamily::ComputeInstance => "EC2",
            ResourceFamily::StorageObject => "S3",
            ResourceFamily::IdentityKey => "IAM",
        }
    }

    /// Subcommand name used on the command line
    pub fn cli_name(self) -> &'static str {
        match self {
            ResourceFamily::ComputeInstance => "ec2",
            ResourceFamily::StorageObject => "s3",
            ResourceFamily::IdentityKey => "iam",
        }
    }

    /// Parse either the CLI name or the service label (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| {
            f.cli_name().eq_ignore_ascii_case(s) || f.service_label().eq_ignore_ascii_case(s)
        })
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_label())
    }
}

impl Serialize for ResourceFamily {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.service_label())
    }
}

impl FromStr for ResourceFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown resource family: {s}"))
    }
}

/// Terminal action applied by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Stop compute instances; completion is asynchronous on the provider side
    Stop,
    /// Delete targets with one provider call each
    DeleteOne,
    /// Delete targets with one provider call per chunk
    DeleteBatch,
}

impl ActionKind {
    /// Whether a successful issuance must be confirmed by polling
    pub fn requires_confirmation(self) -> bool {
        matches!(self, ActionKind::Stop)
    }

    /// Whether the provider receives several targets per call
    pub fn is_batched(self) -> bool {
        !matches!(self, ActionKind::DeleteOne)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Stop => "stop",
            ActionKind::DeleteOne => "delete-one",
            ActionKind::DeleteBatch => "delete-batch",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_labels_are_stable() {
        assert_eq!(ResourceFamily::ComputeInstance.service_label(), "EC2");
        assert_eq!(ResourceFamily::StorageObject.service_label(), "S3");
        assert_eq!(ResourceFamily::IdentityKey.service_label(), "IAM");
    }

    #[test]
    fn parse_accepts_cli_names_and_labels() {
        assert_eq!(ResourceFamily::parse("ec2"), Some(ResourceFamily::ComputeInstance));
        assert_eq!(ResourceFamily::parse("S3"), Some(ResourceFamily::StorageObject));
        assert_eq!(ResourceFamily::parse("Iam"), Some(ResourceFamily::IdentityKey));
        assert_eq!(ResourceFamily::parse("lambda"), None);
        assert!("rds".parse::<ResourceFamily>().is_err());
    }

    #[test]
    fn only_stop_is_confirmed() {
        assert!(ActionKind::Stop.requires_confirmation());
        assert!(!ActionKind::DeleteOne.requires_confirmation());
        assert!(!ActionKind::DeleteBatch.requires_confirmation());
    }

    #[test]
    fn delete_one_is_not_batched() {
        assert!(ActionKind::Stop.is_batched());
        assert!(ActionKind::DeleteBatch.is_batched());
        assert!(!ActionKind::DeleteOne.is_batched());
    }
}
