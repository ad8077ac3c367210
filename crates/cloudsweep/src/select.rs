//! Resource selection
//!
//! Enumerates one provider and keeps the resources that satisfy every
//! criterion. Providers may filter server-side, but the final decision is
//! always made here so results never depend on what a provider pushed down.

use crate::audit::AuditSink;
use crate::error::{ConfigError, RunError};
use chrono::{DateTime, Utc};
use cloudsweep_common::resource::audit_name;
use cloudsweep_common::{
    Criterion, Enumerated, OutcomeRecord, OutcomeStatus, Query, Resource, ResourceProvider,
};
use tracing::{debug, info, warn};

/// Resources that matched, plus the records emitted while selecting
#[derive(Debug, Default)]
pub struct Selection {
    pub matched: Vec<Resource>,
    pub outcomes: Vec<OutcomeRecord>,
}

impl Selection {
    pub fn ids(&self) -> Vec<String> {
        self.matched.iter().map(|r| r.id.clone()).collect()
    }
}

/// Reject criteria sets that would select blindly
pub fn validate_criteria(criteria: &[Criterion], action: &str) -> Result<(), ConfigError> {
    if criteria.is_empty() {
        return Err(ConfigError::NoCriteria {
            command: action.to_string(),
        });
    }
    for criterion in criteria {
        if let Criterion::TagEquals { key, value } = criterion {
            if key.is_empty() || value.is_empty() {
                return Err(ConfigError::EmptyTag {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Selects resources of one provider
pub struct Selector<'a, P> {
    provider: &'a P,
    action: String,
    now: DateTime<Utc>,
}

impl<'a, P: ResourceProvider> Selector<'a, P> {
    /// `action` labels the records this selector emits
    pub fn new(provider: &'a P, action: impl Into<String>) -> Self {
        Self {
            provider,
            action: action.into(),
            now: Utc::now(),
        }
    }

    /// Fix the clock used for age criteria
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Enumerate and keep resources matching every criterion.
    ///
    /// Emits one `Failed` record per unreadable candidate and one `NoMatch`
    /// record when nothing matched. Only a failed listing call is an error.
    pub async fn select(
        &self,
        criteria: Vec<Criterion>,
        audit: &mut dyn AuditSink,
    ) -> Result<Selection, RunError> {
        validate_criteria(&criteria, &self.action)?;

        let query = Query::new(criteria);
        let mut selection = self.enumerate(&query, audit).await?;

        if selection.matched.is_empty() {
            info!(
                service = %self.provider.family(),
                action = %self.action,
                criteria = ?query.criteria.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "No resources matched"
            );
            let record = OutcomeRecord::batch(self.provider.family(), self.action.as_str(), OutcomeStatus::NoMatch);
            audit.append(&record);
            selection.outcomes.push(record);
        } else {
            info!(
                service = %self.provider.family(),
                action = %self.action,
                matched = selection.matched.len(),
                "Selected resources"
            );
        }

        Ok(selection)
    }

    /// Enumerate everything visible, without criteria
    pub async fn list(&self, audit: &mut dyn AuditSink) -> Result<Selection, RunError> {
        self.enumerate(&Query::all(), audit).await
    }

    async fn enumerate(&self, query: &Query, audit: &mut dyn AuditSink) -> Result<Selection, RunError> {
        let candidates = self.provider.enumerate(query).await?;
        let scope = self.provider.scope();
        let mut selection = Selection::default();

        debug!(candidates = candidates.len(), "Enumerated candidates");

        for candidate in candidates {
            match candidate {
                Enumerated::Found(resource) => {
                    if query.matches(&resource, self.now) {
                        selection.matched.push(resource);
                    }
                }
                Enumerated::Failed { id, error } => {
                    let name = id.as_deref().map(|id| audit_name(scope.as_deref(), id));
                    warn!(resource = ?name, error = %error, "Skipping unreadable resource");

                    let family = self.provider.family();
                    let record = match name {
                        Some(name) => {
                            OutcomeRecord::for_resource(family, name, self.action.as_str(), OutcomeStatus::Failed)
                        }
                        None => OutcomeRecord::batch(family, self.action.as_str(), OutcomeStatus::Failed),
                    }
                    .with_detail(error.to_string());
                    audit.append(&record);
                    selection.outcomes.push(record);
                }
            }
        }

        selection.matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(selection)
    }
}
