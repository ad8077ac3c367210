//! The provider seam
//!
//! [`ResourceProvider`] is the narrow set of remote operations the selector
//! and executor need for one resource family. [`Cloud`] hands out providers
//! for one invocation and carries the few operations that do not fit the
//! select/act model (listing containers, uploading, creating keys).
//!
//! Both traits are implemented by the AWS clients and by the in-memory fake
//! used in tests.

use crate::criteria::Query;
use crate::error::ProviderError;
use crate::family::{ActionKind, ResourceFamily};
use crate::resource::{Resource, ResourceState};
use chrono::{DateTime, Utc};
use std::path::Path;

/// One candidate produced by enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enumerated {
    Found(Resource),
    /// The candidate (or its metadata) could not be read
    Failed {
        id: Option<String>,
        error: ProviderError,
    },
}

/// Per-target acknowledgement of an issued action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub id: String,
    pub result: Result<(), ProviderError>,
}

impl Ack {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: Ok(()),
        }
    }

    pub fn failed(id: impl Into<String>, error: ProviderError) -> Self {
        Self {
            id: id.into(),
            result: Err(error),
        }
    }
}

/// A container-level listing entry (bucket or user)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

/// Credentials returned once by key creation
#[derive(Clone, PartialEq, Eq)]
pub struct NewAccessKey {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub status: String,
    pub created: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for NewAccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccessKey")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("status", &self.status)
            .field("created", &self.created)
            .finish()
    }
}

/// Remote operations for one resource family, bound to one scope.
///
/// Implementations must not retry on their own; retry classification is
/// carried by [`ProviderError::is_retryable`].
#[allow(async_fn_in_trait)] // Driven sequentially on the invocation's task
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait ResourceProvider: Send + Sync {
    fn family(&self) -> ResourceFamily;

    /// Bucket or user the provider is bound to, if any
    fn scope(&self) -> Option<String>;

    /// Maximum targets per batched call
    fn batch_limit(&self) -> usize;

    /// Enumerate candidates. Providers may apply part of the query
    /// server-side; callers re-check every criterion.
    ///
    /// An `Err` means the listing call itself failed.
    async fn enumerate(&self, query: &Query) -> Result<Vec<Enumerated>, ProviderError>;

    /// Issue `action` for `ids`. `Err` is a whole-request failure; otherwise
    /// one [`Ack`] per target.
    async fn issue(&self, action: ActionKind, ids: &[String]) -> Result<Vec<Ack>, ProviderError>;

    /// Current state of one resource. Only families whose actions need
    /// confirmation (stop) override this.
    async fn poll_state(&self, id: &str) -> Result<ResourceState, ProviderError> {
        let _ = id;
        Err(ProviderError::Unsupported {
            operation: "poll state",
        })
    }
}

/// Provider factory for one invocation.
#[allow(async_fn_in_trait)]
pub trait Cloud {
    type Compute: ResourceProvider;
    type Objects: ResourceProvider;
    type Keys: ResourceProvider;

    fn compute(&self) -> Self::Compute;

    /// Objects inside one bucket
    fn objects(&self, bucket: &str) -> Self::Objects;

    /// Access keys of one user
    fn access_keys(&self, user: &str) -> Self::Keys;

    async fn list_buckets(&self) -> Result<Vec<Listing>, ProviderError>;

    async fn list_users(&self) -> Result<Vec<Listing>, ProviderError>;

    async fn upload_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), ProviderError>;

    async fn create_access_key(&self, user: &str) -> Result<NewAccessKey, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_key_debug_hides_secret() {
        let key = NewAccessKey {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "very-secret".to_string(),
            status: "Active".to_string(),
            created: None,
        };
        let rendered = format!("{key:?}");
        assert!(rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("very-secret"));
    }

    struct ListOnly;

    impl ResourceProvider for ListOnly {
        fn family(&self) -> ResourceFamily {
            ResourceFamily::StorageObject
        }

        fn scope(&self) -> Option<String> {
            None
        }

        fn batch_limit(&self) -> usize {
            1
        }

        async fn enumerate(&self, _query: &Query) -> Result<Vec<Enumerated>, ProviderError> {
            Ok(Vec::new())
        }

        async fn issue(&self, _action: ActionKind, _ids: &[String]) -> Result<Vec<Ack>, ProviderError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn polling_is_unsupported_unless_overridden() {
        let err = ListOnly.poll_state("logs/a.gz").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported { operation: "poll state" }));
    }

    #[test]
    fn ack_constructors() {
        assert!(Ack::ok("i-1").result.is_ok());
        let ack = Ack::failed("i-2", ProviderError::not_found("gone"));
        assert_eq!(ack.id, "i-2");
        assert!(ack.result.unwrap_err().is_not_found());
    }
}
