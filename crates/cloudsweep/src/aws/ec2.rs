//! EC2 instance provider

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::convert::{extract_ec2_tags, to_utc};
use crate::aws::error::classify_sdk_error;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{Filter, Instance};
use cloudsweep_common::{
    ActionKind, Ack, Enumerated, ProviderError, Query, Resource, ResourceFamily,
    ResourceProvider, ResourceState,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Instance ids per `StopInstances` call
const STOP_BATCH_LIMIT: usize = 1000;

/// EC2 client for enumerating and stopping instances
#[derive(Clone)]
pub struct Ec2Client {
    client: Client,
}

impl FromAwsContext for Ec2Client {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }
}

impl Ec2Client {
    /// Server-side filters for the parts of the query EC2 understands
    fn filters(query: &Query) -> Vec<Filter> {
        let mut filters: Vec<Filter> = query
            .tag_filters()
            .map(|(key, value)| {
                Filter::builder()
                    .name(format!("tag:{key}"))
                    .values(value)
                    .build()
            })
            .collect();

        let states: Vec<String> = query.state_filters().map(|s| s.as_str().to_string()).collect();
        if !states.is_empty() {
            filters.push(
                Filter::builder()
                    .name("instance-state-name")
                    .set_values(Some(states))
                    .build(),
            );
        }

        filters
    }

    fn to_enumerated(instance: &Instance) -> Option<Enumerated> {
        let id = instance.instance_id()?;

        let Some(launched) = instance.launch_time().and_then(to_utc) else {
            return Some(Enumerated::Failed {
                id: Some(id.to_string()),
                error: ProviderError::other("launch time not reported"),
            });
        };

        let state = instance
            .state()
            .and_then(|s| s.name())
            .map(|name| ResourceState::parse(name.as_str()))
            .unwrap_or_else(|| ResourceState::Other("unknown".to_string()));

        let mut resource = Resource::new(ResourceFamily::ComputeInstance, id, state, launched);
        resource.tags = extract_ec2_tags(instance.tags());
        Some(Enumerated::Found(resource))
    }

    async fn stop(&self, ids: &[String]) -> Result<Vec<Ack>, ProviderError> {
        info!(count = ids.len(), instance_ids = ?ids, "Stopping instances");

        let response = self
            .client
            .stop_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let acknowledged: BTreeSet<&str> = response
            .stopping_instances()
            .iter()
            .filter_map(|change| change.instance_id())
            .collect();

        Ok(ids
            .iter()
            .map(|id| {
                if acknowledged.contains(id.as_str()) {
                    Ack::ok(id)
                } else {
                    warn!(instance_id = %id, "Instance missing from stop response");
                    Ack::failed(id, ProviderError::other("not acknowledged by StopInstances"))
                }
            })
            .collect())
    }
}

impl ResourceProvider for Ec2Client {
    fn family(&self) -> ResourceFamily {
        ResourceFamily::ComputeInstance
    }

    fn scope(&self) -> Option<String> {
        None
    }

    fn batch_limit(&self) -> usize {
        STOP_BATCH_LIMIT
    }

    async fn enumerate(&self, query: &Query) -> Result<Vec<Enumerated>, ProviderError> {
        let filters = Self::filters(query);
        let mut found = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_instances()
                .set_filters((!filters.is_empty()).then(|| filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            for reservation in response.reservations() {
                found.extend(reservation.instances().iter().filter_map(Self::to_enumerated));
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(count = found.len(), filters = filters.len(), "Described EC2 instances");
        Ok(found)
    }

    async fn issue(&self, action: ActionKind, ids: &[String]) -> Result<Vec<Ack>, ProviderError> {
        match action {
            ActionKind::Stop => self.stop(ids).await,
            ActionKind::DeleteOne | ActionKind::DeleteBatch => Err(ProviderError::Unsupported {
                operation: "delete instance",
            }),
        }
    }

    async fn poll_state(&self, id: &str) -> Result<ResourceState, ProviderError> {
        let response = self
            .client
            .describe_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        response
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .find(|i| i.instance_id() == Some(id))
            .and_then(|i| i.state())
            .and_then(|s| s.name())
            .map(|name| ResourceState::parse(name.as_str()))
            .ok_or_else(|| ProviderError::not_found(format!("instance {id} not reported")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::primitives::DateTime;
    use aws_sdk_ec2::types::{InstanceState, InstanceStateName, Tag};
    use cloudsweep_common::Criterion;

    #[test]
    fn filters_cover_tags_and_states_only() {
        let query = Query::new(vec![
            Criterion::tag_equals("env", "staging"),
            Criterion::StateEquals(ResourceState::Running),
            Criterion::older_than_days(3),
        ]);
        let filters = Ec2Client::filters(&query);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].name(), Some("tag:env"));
        assert_eq!(filters[0].values(), ["staging".to_string()]);
        assert_eq!(filters[1].name(), Some("instance-state-name"));
        assert_eq!(filters[1].values(), ["running".to_string()]);

        assert!(Ec2Client::filters(&Query::all()).is_empty());
    }

    #[test]
    fn instance_converts_to_resource() {
        let instance = Instance::builder()
            .instance_id("i-0abc")
            .launch_time(DateTime::from_secs(1_700_000_000))
            .state(InstanceState::builder().name(InstanceStateName::Running).build())
            .tags(Tag::builder().key("env").value("staging").build())
            .build();

        match Ec2Client::to_enumerated(&instance) {
            Some(Enumerated::Found(resource)) => {
                assert_eq!(resource.id, "i-0abc");
                assert_eq!(resource.state, ResourceState::Running);
                assert_eq!(resource.tags["env"], "staging");
                assert_eq!(resource.timestamp.timestamp(), 1_700_000_000);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn instance_without_launch_time_is_a_failure() {
        let instance = Instance::builder().instance_id("i-0abc").build();
        assert!(matches!(
            Ec2Client::to_enumerated(&instance),
            Some(Enumerated::Failed { id: Some(_), .. })
        ));
        assert!(Ec2Client::to_enumerated(&Instance::builder().build()).is_none());
    }
}
