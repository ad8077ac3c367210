//! Action execution
//!
//! Each target moves through `Pending -> (Confirming) -> Success | Failed`.
//! Failures of one target never affect its neighbours. Records are emitted
//! in request order as each target reaches its terminal state.

use crate::audit::AuditSink;
use crate::wait::{Check, WaitConfig, WaitError, wait_for_resource};
use cloudsweep_common::resource::audit_name;
use cloudsweep_common::{
    ActionKind, OutcomeRecord, OutcomeStatus, ProviderError, ResourceProvider, ResourceState,
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One action over an ordered, deduplicated set of targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: ActionKind,
    targets: Vec<String>,
}

impl ActionRequest {
    /// Duplicate ids are dropped; the first occurrence keeps its position
    pub fn new<I, S>(action: ActionKind, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let targets = targets
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self { action, targets }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Why confirmation failed
#[derive(Debug, Error)]
enum ConfirmError {
    #[error("resource entered {0} state")]
    Gone(ResourceState),

    #[error(transparent)]
    Provider(ProviderError),
}

/// Applies actions through one provider
pub struct Executor<'a, P> {
    provider: &'a P,
    action_label: String,
    wait: WaitConfig,
}

impl<'a, P: ResourceProvider> Executor<'a, P> {
    /// `action_label` names the records this executor emits
    pub fn new(provider: &'a P, action_label: impl Into<String>) -> Self {
        Self {
            provider,
            action_label: action_label.into(),
            wait: WaitConfig::default(),
        }
    }

    /// Override the confirmation polling budget
    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// Apply the request. Never fails; every target yields exactly one record.
    pub async fn execute(&self, request: &ActionRequest, audit: &mut dyn AuditSink) -> Vec<OutcomeRecord> {
        let mut records = Vec::with_capacity(request.targets.len());
        if request.is_empty() {
            debug!(action = %request.action, "No targets, nothing to do");
            return records;
        }

        let chunk_size = if request.action.is_batched() {
            self.provider.batch_limit().max(1)
        } else {
            1
        };

        info!(
            service = %self.provider.family(),
            action = %self.action_label,
            targets = request.targets.len(),
            chunk_size,
            "Executing action"
        );

        // Records follow request order, also inside a chunk
        for chunk in request.targets.chunks(chunk_size) {
            for (id, issued) in self.issue_chunk(request.action, chunk).await {
                let result = match issued {
                    Ok(()) if request.action.requires_confirmation() => self.confirm(&id).await,
                    Ok(()) => Ok(()),
                    Err(e) => Err(e.to_string()),
                };
                self.emit(&id, result, audit, &mut records);
            }
        }

        records
    }

    /// Issue one chunk and pair every target with its acknowledgement, in
    /// chunk order.
    async fn issue_chunk(&self, action: ActionKind, chunk: &[String]) -> Vec<(String, Result<(), ProviderError>)> {
        match self.provider.issue(action, chunk).await {
            Ok(acks) => pair_acks(chunk, acks),
            Err(e) if chunk.len() > 1 && e.is_target_specific() => {
                warn!(
                    action = %action,
                    targets = chunk.len(),
                    error = %e,
                    "Batch rejected, retrying targets one by one"
                );
                let mut results = Vec::with_capacity(chunk.len());
                for id in chunk {
                    let single = std::slice::from_ref(id);
                    match self.provider.issue(action, single).await {
                        Ok(acks) => results.extend(pair_acks(single, acks)),
                        Err(e) => results.push((id.clone(), Err(e))),
                    }
                }
                results
            }
            Err(e) => {
                warn!(action = %action, targets = chunk.len(), error = %e, "Request failed for whole chunk");
                chunk.iter().map(|id| (id.clone(), Err(e.clone()))).collect()
            }
        }
    }

    /// Poll until the target reaches the action's terminal state
    async fn confirm(&self, id: &str) -> Result<(), String> {
        let provider = self.provider;
        let check = || async move {
            match provider.poll_state(id).await {
                Ok(ResourceState::Stopped) => Ok(Check::Ready(())),
                Ok(state) if state.is_gone() => Err(ConfirmError::Gone(state)),
                Ok(state) => {
                    debug!(resource = %id, state = %state, "Not stopped yet");
                    Ok(Check::NotYet)
                }
                Err(e) if e.is_retryable() => {
                    warn!(resource = %id, error = %e, "State poll throttled");
                    Ok(Check::NotYet)
                }
                Err(e) => Err(ConfirmError::Provider(e)),
            }
        };

        match wait_for_resource(&self.wait, check, id).await {
            Ok(()) => Ok(()),
            Err(WaitError::Exhausted { attempts }) => {
                Err(format!("confirmation timed out after {attempts} checks"))
            }
            Err(WaitError::Check(e)) => Err(e.to_string()),
        }
    }

    fn emit(
        &self,
        id: &str,
        result: Result<(), String>,
        audit: &mut dyn AuditSink,
        records: &mut Vec<OutcomeRecord>,
    ) {
        let scope = self.provider.scope();
        let name = audit_name(scope.as_deref(), id);
        let family = self.provider.family();

        let record = match result {
            Ok(()) => {
                info!(service = %family, resource = %name, action = %self.action_label, "Action succeeded");
                OutcomeRecord::for_resource(family, name, self.action_label.as_str(), OutcomeStatus::Success)
            }
            Err(detail) => {
                warn!(
                    service = %family,
                    resource = %name,
                    action = %self.action_label,
                    error = %detail,
                    "Action failed"
                );
                OutcomeRecord::for_resource(family, name, self.action_label.as_str(), OutcomeStatus::Failed)
                    .with_detail(detail)
            }
        };

        audit.append(&record);
        records.push(record);
    }
}

/// Match acknowledgements to requested ids; missing ids fail
fn pair_acks(
    chunk: &[String],
    acks: Vec<cloudsweep_common::Ack>,
) -> Vec<(String, Result<(), ProviderError>)> {
    chunk
        .iter()
        .map(|id| {
            let result = acks
                .iter()
                .find(|ack| &ack.id == id)
                .map(|ack| ack.result.clone())
                .unwrap_or_else(|| Err(ProviderError::other("no acknowledgement from provider")));
            (id.clone(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAudit;
    use cloudsweep_common::{Ack, MockResourceProvider, ResourceFamily};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn mock(family: ResourceFamily, batch_limit: usize) -> MockResourceProvider {
        let mut mock = MockResourceProvider::new();
        mock.expect_family().return_const(family);
        mock.expect_scope().return_const(None::<String>);
        mock.expect_batch_limit().return_const(batch_limit);
        mock
    }

    fn statuses(records: &[OutcomeRecord]) -> Vec<(String, OutcomeStatus)> {
        records
            .iter()
            .map(|r| (r.resource.clone().unwrap_or_default(), r.status))
            .collect()
    }

    #[test]
    fn request_dedups_keeping_first_occurrence() {
        let request = ActionRequest::new(ActionKind::Stop, ["i-2", "i-1", "i-2", "i-3", "i-1"]);
        assert_eq!(request.targets(), ["i-2", "i-1", "i-3"]);
    }

    #[tokio::test]
    async fn empty_request_makes_no_calls() {
        let mut provider = MockResourceProvider::new();
        provider.expect_issue().never();
        provider.expect_poll_state().never();
        let mut audit = MemoryAudit::new();

        let records = Executor::new(&provider, "delete-file")
            .execute(&ActionRequest::new(ActionKind::DeleteBatch, Vec::<String>::new()), &mut audit)
            .await;
        assert!(records.is_empty());
        assert!(audit.records.is_empty());
    }

    #[tokio::test]
    async fn batches_respect_the_provider_limit() {
        let mut provider = mock(ResourceFamily::StorageObject, 2);
        let calls = std::sync::Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        provider.expect_issue().returning(move |_, ids| {
            seen.lock().unwrap().push(ids.len());
            Ok(ids.iter().map(Ack::ok).collect())
        });

        let request = ActionRequest::new(ActionKind::DeleteBatch, ["a", "b", "c", "d", "e"]);
        let records = Executor::new(&provider, "delete-file")
            .execute(&request, &mut MemoryAudit::new())
            .await;

        assert_eq!(*calls.lock().unwrap(), vec![2, 2, 1]);
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.status == OutcomeStatus::Success));
    }

    #[tokio::test]
    async fn permanent_batch_error_falls_back_to_single_targets() {
        let mut provider = mock(ResourceFamily::ComputeInstance, 10);
        provider.expect_issue().returning(|_, ids| {
            if ids.iter().any(|id| id == "i-bad") {
                Err(ProviderError::Malformed {
                    message: "Invalid id: i-bad".to_string(),
                })
            } else {
                Ok(ids.iter().map(Ack::ok).collect())
            }
        });
        provider.expect_poll_state().returning(|_| Ok(ResourceState::Stopped));

        let request = ActionRequest::new(ActionKind::Stop, ["i-1", "i-bad", "i-2"]);
        let mut audit = MemoryAudit::new();
        let records = Executor::new(&provider, "stop-instances")
            .with_wait(WaitConfig::immediate(3))
            .execute(&request, &mut audit)
            .await;

        assert_eq!(
            statuses(&records),
            vec![
                ("i-1".to_string(), OutcomeStatus::Success),
                ("i-bad".to_string(), OutcomeStatus::Failed),
                ("i-2".to_string(), OutcomeStatus::Success),
            ]
        );
        assert_eq!(audit.records, records);
    }

    #[tokio::test]
    async fn throttled_batch_fails_every_target_without_retry() {
        let mut provider = mock(ResourceFamily::StorageObject, 1000);
        provider.expect_issue().times(1).returning(|_, _| {
            Err(ProviderError::Throttled {
                message: "SlowDown".to_string(),
            })
        });

        let request = ActionRequest::new(ActionKind::DeleteBatch, ["a", "b"]);
        let records = Executor::new(&provider, "delete-file")
            .execute(&request, &mut MemoryAudit::new())
            .await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_failed()));
        assert!(records[0].detail.as_deref().unwrap().contains("rate limit"));
    }

    #[tokio::test]
    async fn per_target_ack_errors_are_isolated() {
        let mut provider = mock(ResourceFamily::StorageObject, 1000);
        provider.expect_issue().returning(|_, ids| {
            Ok(ids
                .iter()
                .map(|id| {
                    if id == "locked" {
                        Ack::failed(id, ProviderError::AccessDenied { message: "denied".to_string() })
                    } else {
                        Ack::ok(id)
                    }
                })
                .collect())
        });

        let request = ActionRequest::new(ActionKind::DeleteBatch, ["a", "locked", "b"]);
        let records = Executor::new(&provider, "delete-file")
            .execute(&request, &mut MemoryAudit::new())
            .await;
        assert_eq!(
            statuses(&records),
            vec![
                ("a".to_string(), OutcomeStatus::Success),
                ("locked".to_string(), OutcomeStatus::Failed),
                ("b".to_string(), OutcomeStatus::Success),
            ]
        );
    }

    #[tokio::test]
    async fn confirmation_times_out() {
        let mut provider = mock(ResourceFamily::ComputeInstance, 10);
        provider.expect_issue().returning(|_, ids| Ok(ids.iter().map(Ack::ok).collect()));
        let polls = std::sync::Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        provider.expect_poll_state().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ResourceState::Stopping)
        });

        let records = Executor::new(&provider, "stop-instances")
            .with_wait(WaitConfig::immediate(4))
            .execute(&ActionRequest::new(ActionKind::Stop, ["i-1"]), &mut MemoryAudit::new())
            .await;

        assert_eq!(polls.load(Ordering::SeqCst), 4);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_failed());
        assert!(records[0].detail.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn throttled_polls_consume_attempts_and_continue() {
        let mut provider = mock(ResourceFamily::ComputeInstance, 10);
        provider.expect_issue().returning(|_, ids| Ok(ids.iter().map(Ack::ok).collect()));
        let polls = std::sync::Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        provider.expect_poll_state().returning(move |_| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(ProviderError::Throttled { message: "slow".to_string() }),
                1 => Ok(ResourceState::Stopping),
                _ => Ok(ResourceState::Stopped),
            }
        });

        let records = Executor::new(&provider, "stop-instances")
            .with_wait(WaitConfig::immediate(5))
            .execute(&ActionRequest::new(ActionKind::Stop, ["i-1"]), &mut MemoryAudit::new())
            .await;

        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(records[0].status, OutcomeStatus::Success);
    }

    #[tokio::test]
    async fn terminated_or_vanished_instances_fail_confirmation() {
        let mut provider = mock(ResourceFamily::ComputeInstance, 10);
        provider.expect_issue().returning(|_, ids| Ok(ids.iter().map(Ack::ok).collect()));
        provider.expect_poll_state().returning(|id| match id {
            "i-term" => Ok(ResourceState::Terminated),
            "i-gone" => Err(ProviderError::not_found("InvalidInstanceID.NotFound")),
            _ => Ok(ResourceState::Stopped),
        });

        let records = Executor::new(&provider, "stop-instances")
            .with_wait(WaitConfig::immediate(5))
            .execute(
                &ActionRequest::new(ActionKind::Stop, ["i-term", "i-ok", "i-gone"]),
                &mut MemoryAudit::new(),
            )
            .await;

        assert_eq!(
            statuses(&records),
            vec![
                ("i-term".to_string(), OutcomeStatus::Failed),
                ("i-ok".to_string(), OutcomeStatus::Success),
                ("i-gone".to_string(), OutcomeStatus::Failed),
            ]
        );
        assert!(records[0].detail.as_deref().unwrap().contains("terminated"));
    }

    #[tokio::test]
    async fn delete_one_issues_a_call_per_target() {
        let mut provider = mock(ResourceFamily::IdentityKey, 1000);
        provider
            .expect_issue()
            .withf(|action, ids| *action == ActionKind::DeleteOne && ids.len() == 1)
            .times(3)
            .returning(|_, ids| Ok(ids.iter().map(Ack::ok).collect()));
        provider.expect_poll_state().never();

        let records = Executor::new(&provider, "delete-old-keys")
            .execute(
                &ActionRequest::new(ActionKind::DeleteOne, ["AKIA1", "AKIA2", "AKIA3"]),
                &mut MemoryAudit::new(),
            )
            .await;
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn missing_acknowledgement_fails_the_target() {
        let mut provider = mock(ResourceFamily::StorageObject, 1000);
        provider
            .expect_issue()
            .returning(|_, _| Ok(vec![Ack::ok("a")]));

        let records = Executor::new(&provider, "delete-file")
            .execute(&ActionRequest::new(ActionKind::DeleteBatch, ["a", "b"]), &mut MemoryAudit::new())
            .await;
        assert_eq!(
            statuses(&records),
            vec![
                ("a".to_string(), OutcomeStatus::Success),
                ("b".to_string(), OutcomeStatus::Failed),
            ]
        );
    }
}
