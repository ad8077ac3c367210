//! Remote resource snapshots
//!
//! A `Resource` is an ephemeral copy of what the provider reported during
//! this invocation. Nothing is cached between invocations.

use crate::family::ResourceFamily;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Provider-reported state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    /// Object exists (storage objects have no lifecycle state)
    Present,
    /// Access key is usable
    Active,
    /// Access key is disabled
    Inactive,
    /// A provider value this tool does not model
    Other(String),
}

impl ResourceState {
    /// Canonical lowercase name, as used by `state-equals` criteria
    pub fn as_str(&self) -> &str {
        match self {
            ResourceState::Pending => "pending",
            ResourceState::Running => "running",
            ResourceState::Stopping => "stopping",
            ResourceState::Stopped => "stopped",
            ResourceState::ShuttingDown => "shutting-down",
            ResourceState::Terminated => "terminated",
            ResourceState::Present => "present",
            ResourceState::Active => "active",
            ResourceState::Inactive => "inactive",
            ResourceState::Other(s) => s,
        }
    }

    /// Parse a provider state string. Unknown values are kept verbatim.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "pending" => ResourceState::Pending,
            "running" => ResourceState::Running,
            "stopping" => ResourceState::Stopping,
            "stopped" => ResourceState::Stopped,
            "shutting-down" => ResourceState::ShuttingDown,
            "terminated" => ResourceState::Terminated,
            "present" => ResourceState::Present,
            "active" => ResourceState::Active,
            "inactive" => ResourceState::Inactive,
            _ => ResourceState::Other(s.to_string()),
        }
    }

    /// States from which a stopped state can no longer be reached
    pub fn is_gone(&self) -> bool {
        matches!(self, ResourceState::ShuttingDown | ResourceState::Terminated)
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote resource as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub family: ResourceFamily,
    /// Provider-assigned identifier (instance id, object key, access key id)
    pub id: String,
    /// Container the identifier is unique within (bucket or user name)
    pub scope: Option<String>,
    pub state: ResourceState,
    pub tags: BTreeMap<String, String>,
    /// Creation or last-modified time, whichever the family ages by
    pub timestamp: DateTime<Utc>,
}

impl Resource {
    pub fn new(
        family: ResourceFamily,
        id: impl Into<String>,
        state: ResourceState,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            family,
            id: id.into(),
            scope: None,
            state,
            tags: BTreeMap::new(),
            timestamp,
        }
    }

    /// Set the bucket or user this resource lives in
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Add one tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Name written to the `Resource` audit column
    pub fn audit_name(&self) -> String {
        audit_name(self.scope.as_deref(), &self.id)
    }
}

/// `scope/id` for scoped resources, `id` otherwise
pub fn audit_name(scope: Option<&str>, id: &str) -> String {
    match scope {
        Some(scope) => format!("{scope}/{id}"),
        None => id.to_string(),
    }
}
