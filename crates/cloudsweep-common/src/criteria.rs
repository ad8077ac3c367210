//! Selection criteria
//!
//! Criteria are combined with logical AND. Providers may push some of them
//! down as server-side filters, but every criterion is always re-checked
//! locally with [`Criterion::matches`].

use crate::resource::{Resource, ResourceState};
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// A predicate over a [`Resource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// Exact match on both tag key and tag value
    TagEquals { key: String, value: String },
    /// Provider-reported state equals this state
    StateEquals(ResourceState),
    /// Age-relevant timestamp strictly earlier than `now - duration`
    OlderThan(Duration),
}

impl Criterion {
    pub fn tag_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Criterion::TagEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn older_than_days(days: i64) -> Self {
        Criterion::OlderThan(Duration::days(days))
    }

    /// Evaluate against a resource, with `now` fixed by the caller
    pub fn matches(&self, resource: &Resource, now: DateTime<Utc>) -> bool {
        match self {
            Criterion::TagEquals { key, value } => resource.tags.get(key) == Some(value),
            Criterion::StateEquals(state) => &resource.state == state,
            Criterion::OlderThan(age) => resource.timestamp < now - *age,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::TagEquals { key, value } => write!(f, "tag {key}={value}"),
            Criterion::StateEquals(state) => write!(f, "state={state}"),
            Criterion::OlderThan(age) => write!(f, "older than {}d", age.num_days()),
        }
    }
}

/// What a selection asks the provider to enumerate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub criteria: Vec<Criterion>,
}

impl Query {
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self { criteria }
    }

    /// Query that enumerates everything visible
    pub fn all() -> Self {
        Self::default()
    }

    /// True when every criterion holds
    pub fn matches(&self, resource: &Resource, now: DateTime<Utc>) -> bool {
        self.criteria.iter().all(|c| c.matches(resource, now))
    }

    /// Tag pairs, for providers that can filter on tags server-side
    pub fn tag_filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.criteria.iter().filter_map(|c| match c {
            Criterion::TagEquals { key, value } => Some((key.as_str(), value.as_str())),
            _ => None,
        })
    }

    /// Requested states, for providers that can filter on state server-side
    pub fn state_filters(&self) -> impl Iterator<Item = &ResourceState> {
        self.criteria.iter().filter_map(|c| match c {
            Criterion::StateEquals(state) => Some(state),
            _ => None,
        })
    }

    /// Whether any criterion needs the resource's tags
    pub fn needs_tags(&self) -> bool {
        self.tag_filters().next().is_some()
    }
}
