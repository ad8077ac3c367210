//! Outcome records
//!
//! One record is created per attempted unit of work: one per resource for
//! per-resource actions, one for batch-level summaries ("no matches",
//! configuration failures). Records are never mutated after creation.

use crate::family::ResourceFamily;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

/// Result of one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OutcomeStatus {
    Success,
    Failed,
    /// The target exists but holds nothing to act on (e.g. a user without keys)
    Empty,
    /// A selection matched zero resources
    NoMatch,
}

impl OutcomeStatus {
    /// Value written to the `Status` audit column
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeStatus::Success => "Success",
            OutcomeStatus::Failed => "Failed",
            OutcomeStatus::Empty => "Empty",
            OutcomeStatus::NoMatch => "NoMatch",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub family: ResourceFamily,
    /// Resource audit name; `None` for batch-level records
    pub resource: Option<String>,
    /// Action label, e.g. `stop-instances`
    pub action: String,
    pub status: OutcomeStatus,
    pub timestamp: DateTime<Utc>,
    /// Error text or note for console output; not an audit column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl OutcomeRecord {
    /// Record for one resource, timestamped now
    pub fn for_resource(
        family: ResourceFamily,
        resource: impl Into<String>,
        action: impl Into<String>,
        status: OutcomeStatus,
    ) -> Self {
        Self {
            family,
            resource: Some(resource.into()),
            action: action.into(),
            status,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    /// Batch-level record (no resource), timestamped now
    pub fn batch(family: ResourceFamily, action: impl Into<String>, status: OutcomeStatus) -> Self {
        Self {
            family,
            resource: None,
            action: action.into(),
            status,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }

    /// UTC ISO-8601 timestamp with microsecond precision
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, false)
    }
}
