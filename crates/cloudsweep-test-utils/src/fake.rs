//! In-memory cloud
//!
//! [`FakeCloud`] keeps instances, buckets and users in one shared state and
//! records every remote call, so tests can assert both outcomes and the
//! calls that produced them. Failures are injected per id.

use chrono::{DateTime, Utc};
use cloudsweep_common::defaults::S3_DELETE_BATCH_LIMIT;
use cloudsweep_common::{
    Ack, ActionKind, Cloud, Enumerated, Listing, NewAccessKey, ProviderError, Query, Resource,
    ResourceFamily, ResourceProvider, ResourceState,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One remote call seen by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Enumerate {
        family: ResourceFamily,
        scope: Option<String>,
    },
    Issue {
        action: ActionKind,
        ids: Vec<String>,
    },
    Poll(String),
    ListBuckets,
    ListUsers,
    Upload {
        bucket: String,
        key: String,
    },
    CreateKey(String),
}

/// A file passed to `upload_object`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub bucket: String,
    pub key: String,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
struct Container {
    created: Option<DateTime<Utc>>,
    items: BTreeMap<String, Resource>,
}

#[derive(Debug, Default)]
struct State {
    instances: BTreeMap<String, Resource>,
    buckets: BTreeMap<String, Container>,
    users: BTreeMap<String, Container>,
    /// Ids whose presence fails the whole request
    request_errors: HashMap<String, ProviderError>,
    /// Ids that fail individually inside an otherwise accepted request
    target_errors: HashMap<String, ProviderError>,
    /// Ids enumerated as unreadable
    unreadable: HashMap<String, ProviderError>,
    listing_error: Option<ProviderError>,
    /// States returned by successive polls before the real state
    poll_scripts: HashMap<String, VecDeque<Result<ResourceState, ProviderError>>>,
    reverse_listing: bool,
    batch_limit: Option<usize>,
    calls: Vec<Call>,
    uploads: Vec<Upload>,
    created_keys: u32,
}

impl State {
    fn container(&self, family: ResourceFamily, scope: Option<&str>) -> Option<&Container> {
        let scope = scope?;
        match family {
            ResourceFamily::StorageObject => self.buckets.get(scope),
            ResourceFamily::IdentityKey => self.users.get(scope),
            ResourceFamily::ComputeInstance => None,
        }
    }

    fn container_mut(&mut self, family: ResourceFamily, scope: Option<&str>) -> Option<&mut Container> {
        let scope = scope?;
        match family {
            ResourceFamily::StorageObject => self.buckets.get_mut(scope),
            ResourceFamily::IdentityKey => self.users.get_mut(scope),
            ResourceFamily::ComputeInstance => None,
        }
    }
}

/// Shared, cloneable in-memory cloud
#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn provider(&self, family: ResourceFamily, scope: Option<&str>) -> FakeProvider {
        FakeProvider {
            state: Arc::clone(&self.state),
            family,
            scope: scope.map(str::to_string),
        }
    }

    // Inventory

    pub fn with_instance(self, instance: Resource) -> Self {
        self.state().instances.insert(instance.id.clone(), instance);
        self
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.state().buckets.entry(bucket.to_string()).or_default();
        self
    }

    /// Adds the object's bucket if needed; the object's scope must be set
    pub fn with_object(self, object: Resource) -> Self {
        let bucket = object.scope.clone().unwrap_or_default();
        self.state()
            .buckets
            .entry(bucket)
            .or_default()
            .items
            .insert(object.id.clone(), object);
        self
    }

    pub fn with_user(self, user: &str) -> Self {
        self.state().users.entry(user.to_string()).or_default();
        self
    }

    /// Adds the key's user if needed; the key's scope must be set
    pub fn with_key(self, key: Resource) -> Self {
        let user = key.scope.clone().unwrap_or_default();
        self.state()
            .users
            .entry(user)
            .or_default()
            .items
            .insert(key.id.clone(), key);
        self
    }

    pub fn with_created(self, family: ResourceFamily, name: &str, created: DateTime<Utc>) -> Self {
        if let Some(container) = self.state().container_mut(family, Some(name)) {
            container.created = Some(created);
        }
        self
    }

    // Failure injection

    /// Any request naming `id` fails as a whole
    pub fn reject_requests_with(self, id: &str, error: ProviderError) -> Self {
        self.state().request_errors.insert(id.to_string(), error);
        self
    }

    /// `id` fails inside an otherwise accepted request
    pub fn fail_target(self, id: &str, error: ProviderError) -> Self {
        self.state().target_errors.insert(id.to_string(), error);
        self
    }

    /// `id` is enumerated but its details cannot be read
    pub fn unreadable(self, id: &str, error: ProviderError) -> Self {
        self.state().unreadable.insert(id.to_string(), error);
        self
    }

    /// Every enumeration and listing call fails
    pub fn fail_listing(self, error: ProviderError) -> Self {
        self.state().listing_error = Some(error);
        self
    }

    /// Poll results returned for `id` before its stored state
    pub fn script_polls(self, id: &str, polls: Vec<Result<ResourceState, ProviderError>>) -> Self {
        self.state().poll_scripts.insert(id.to_string(), polls.into());
        self
    }

    /// Enumerate in reverse id order
    pub fn reverse_listing(self) -> Self {
        self.state().reverse_listing = true;
        self
    }

    pub fn with_batch_limit(self, limit: usize) -> Self {
        self.state().batch_limit = Some(limit);
        self
    }

    // Inspection

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn issue_calls(&self) -> Vec<(ActionKind, Vec<String>)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Issue { action, ids } => Some((*action, ids.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn poll_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Poll(_)))
            .count()
    }

    pub fn instance_state(&self, id: &str) -> Option<ResourceState> {
        self.state().instances.get(id).map(|i| i.state.clone())
    }

    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .buckets
            .get(bucket)
            .map(|b| b.items.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn key_ids(&self, user: &str) -> Vec<String> {
        self.state()
            .users
            .get(user)
            .map(|u| u.items.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.state().uploads.clone()
    }
}

impl Cloud for FakeCloud {
    type Compute = FakeProvider;
    type Objects = FakeProvider;
    type Keys = FakeProvider;

    fn compute(&self) -> FakeProvider {
        self.provider(ResourceFamily::ComputeInstance, None)
    }

    fn objects(&self, bucket: &str) -> FakeProvider {
        self.provider(ResourceFamily::StorageObject, Some(bucket))
    }

    fn access_keys(&self, user: &str) -> FakeProvider {
        self.provider(ResourceFamily::IdentityKey, Some(user))
    }

    async fn list_buckets(&self) -> Result<Vec<Listing>, ProviderError> {
        let mut state = self.state();
        state.calls.push(Call::ListBuckets);
        if let Some(error) = &state.listing_error {
            return Err(error.clone());
        }
        Ok(listings(&state.buckets))
    }

    async fn list_users(&self) -> Result<Vec<Listing>, ProviderError> {
        let mut state = self.state();
        state.calls.push(Call::ListUsers);
        if let Some(error) = &state.listing_error {
            return Err(error.clone());
        }
        Ok(listings(&state.users))
    }

    async fn upload_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.calls.push(Call::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if let Some(error) = state.target_errors.get(key) {
            return Err(error.clone());
        }
        let Some(container) = state.buckets.get_mut(bucket) else {
            return Err(ProviderError::not_found(format!("NoSuchBucket: {bucket}")));
        };
        container.items.insert(
            key.to_string(),
            Resource::new(ResourceFamily::StorageObject, key, ResourceState::Present, Utc::now())
                .with_scope(bucket),
        );
        state.uploads.push(Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn create_access_key(&self, user: &str) -> Result<NewAccessKey, ProviderError> {
        let mut state = self.state();
        state.calls.push(Call::CreateKey(user.to_string()));
        if !state.users.contains_key(user) {
            return Err(ProviderError::not_found(format!("NoSuchEntity: user {user}")));
        }

        state.created_keys += 1;
        let id = format!("AKIAFAKE{:08}", state.created_keys);
        let created = Utc::now();
        if let Some(container) = state.users.get_mut(user) {
            container.items.insert(
                id.clone(),
                Resource::new(ResourceFamily::IdentityKey, &id, ResourceState::Active, created).with_scope(user),
            );
        }

        Ok(NewAccessKey {
            access_key_id: id,
            secret_access_key: format!("fake-secret-{}", state.created_keys),
            status: "Active".to_string(),
            created: Some(created),
        })
    }
}

fn listings(containers: &BTreeMap<String, Container>) -> Vec<Listing> {
    containers
        .iter()
        .map(|(name, c)| Listing {
            name: name.clone(),
            created: c.created,
        })
        .collect()
}

/// Provider for one family and scope over the shared state
#[derive(Debug, Clone)]
pub struct FakeProvider {
    state: Arc<Mutex<State>>,
    family: ResourceFamily,
    scope: Option<String>,
}

impl FakeProvider {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, state: &mut State, action: ActionKind, id: &str) -> Result<(), ProviderError> {
        if let Some(error) = state.target_errors.get(id) {
            return Err(error.clone());
        }

        match (self.family, action) {
            (ResourceFamily::ComputeInstance, ActionKind::Stop) => {
                let Some(instance) = state.instances.get_mut(id) else {
                    return Err(ProviderError::not_found(format!(
                        "InvalidInstanceID.NotFound: {id}"
                    )));
                };
                if instance.state == ResourceState::Running || instance.state == ResourceState::Pending {
                    instance.state = ResourceState::Stopping;
                }
                Ok(())
            }
            (ResourceFamily::StorageObject, ActionKind::DeleteBatch | ActionKind::DeleteOne) => {
                // Deleting a missing key succeeds, as in S3
                if let Some(bucket) = state.container_mut(self.family, self.scope.as_deref()) {
                    bucket.items.remove(id);
                }
                Ok(())
            }
            (ResourceFamily::IdentityKey, ActionKind::DeleteBatch | ActionKind::DeleteOne) => {
                let removed = state
                    .container_mut(self.family, self.scope.as_deref())
                    .and_then(|user| user.items.remove(id));
                match removed {
                    Some(_) => Ok(()),
                    None => Err(ProviderError::not_found(format!(
                        "NoSuchEntity: access key {id}"
                    ))),
                }
            }
            (family, action) => Err(ProviderError::Unsupported {
                operation: unsupported(family, action),
            }),
        }
    }
}

fn unsupported(family: ResourceFamily, action: ActionKind) -> &'static str {
    match (family, action) {
        (ResourceFamily::ComputeInstance, _) => "delete instances",
        (_, ActionKind::Stop) => "stop",
        _ => "action",
    }
}

impl ResourceProvider for FakeProvider {
    fn family(&self) -> ResourceFamily {
        self.family
    }

    fn scope(&self) -> Option<String> {
        self.scope.clone()
    }

    fn batch_limit(&self) -> usize {
        let configured = self.state().batch_limit;
        configured.unwrap_or(match self.family {
            ResourceFamily::StorageObject => S3_DELETE_BATCH_LIMIT,
            ResourceFamily::ComputeInstance => 1000,
            ResourceFamily::IdentityKey => 1,
        })
    }

    async fn enumerate(&self, _query: &Query) -> Result<Vec<Enumerated>, ProviderError> {
        let mut state = self.state();
        state.calls.push(Call::Enumerate {
            family: self.family,
            scope: self.scope.clone(),
        });
        if let Some(error) = &state.listing_error {
            return Err(error.clone());
        }

        let resources: Vec<&Resource> = match self.family {
            ResourceFamily::ComputeInstance => state.instances.values().collect(),
            family => match state.container(family, self.scope.as_deref()) {
                Some(container) => container.items.values().collect(),
                None => {
                    return Err(ProviderError::not_found(format!(
                        "no such {}: {}",
                        if family == ResourceFamily::StorageObject { "bucket" } else { "user" },
                        self.scope.as_deref().unwrap_or("")
                    )));
                }
            },
        };

        let mut candidates: Vec<Enumerated> = resources
            .into_iter()
            .map(|resource| match state.unreadable.get(&resource.id) {
                Some(error) => Enumerated::Failed {
                    id: Some(resource.id.clone()),
                    error: error.clone(),
                },
                None => Enumerated::Found(resource.clone()),
            })
            .collect();
        if state.reverse_listing {
            candidates.reverse();
        }
        Ok(candidates)
    }

    async fn issue(&self, action: ActionKind, ids: &[String]) -> Result<Vec<Ack>, ProviderError> {
        let mut state = self.state();
        state.calls.push(Call::Issue {
            action,
            ids: ids.to_vec(),
        });

        if let Some(error) = ids.iter().find_map(|id| state.request_errors.get(id)) {
            return Err(error.clone());
        }

        Ok(ids
            .iter()
            .map(|id| match self.apply(&mut state, action, id) {
                Ok(()) => Ack::ok(id),
                Err(error) => Ack::failed(id, error),
            })
            .collect())
    }

    async fn poll_state(&self, id: &str) -> Result<ResourceState, ProviderError> {
        let mut state = self.state();
        state.calls.push(Call::Poll(id.to_string()));

        if let Some(next) = state.poll_scripts.get_mut(id).and_then(VecDeque::pop_front) {
            return next;
        }

        match self.family {
            ResourceFamily::ComputeInstance => {
                let Some(instance) = state.instances.get_mut(id) else {
                    return Err(ProviderError::not_found(format!(
                        "InvalidInstanceID.NotFound: {id}"
                    )));
                };
                // A stopping instance has finished by the time it is polled
                if instance.state == ResourceState::Stopping {
                    instance.state = ResourceState::Stopped;
                }
                Ok(instance.state.clone())
            }
            _ => Err(ProviderError::Unsupported {
                operation: "poll state",
            }),
        }
    }
}
