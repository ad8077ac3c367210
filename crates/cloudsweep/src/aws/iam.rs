//! IAM users and access keys

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::convert::to_utc;
use crate::aws::error::classify_sdk_error;
use aws_sdk_iam::Client;
use aws_sdk_iam::types::AccessKeyMetadata;
use cloudsweep_common::{
    ActionKind, Ack, Enumerated, Listing, NewAccessKey, ProviderError, Query, Resource,
    ResourceFamily, ResourceProvider, ResourceState,
};
use tracing::{debug, info};

/// IAM client for account-level operations
#[derive(Clone)]
pub struct IamClient {
    client: Client,
}

impl FromAwsContext for IamClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }
}

impl IamClient {
    /// Access keys of one user
    pub fn access_keys(&self, user: &str) -> IamAccessKeys {
        IamAccessKeys {
            client: self.client.clone(),
            user: user.to_string(),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<Listing>, ProviderError> {
        let mut users = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.list_users();
            if let Some(m) = &marker {
                request = request.marker(m);
            }
            let response = request.send().await.map_err(|e| classify_sdk_error(&e))?;

            users.extend(response.users().iter().map(|u| Listing {
                name: u.user_name().to_string(),
                created: to_utc(u.create_date()),
            }));

            marker = if response.is_truncated() {
                response.marker().map(|s| s.to_string())
            } else {
                None
            };
            if marker.is_none() {
                break;
            }
        }

        debug!(count = users.len(), "Listed IAM users");
        Ok(users)
    }

    pub async fn create_access_key(&self, user: &str) -> Result<NewAccessKey, ProviderError> {
        let response = self
            .client
            .create_access_key()
            .user_name(user)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let key = response
            .access_key()
            .ok_or_else(|| ProviderError::other("CreateAccessKey returned no key"))?;

        info!(user = %user, access_key_id = %key.access_key_id(), "Created access key");
        Ok(NewAccessKey {
            access_key_id: key.access_key_id().to_string(),
            secret_access_key: key.secret_access_key().to_string(),
            status: key.status().as_str().to_string(),
            created: key.create_date().and_then(to_utc),
        })
    }
}

fn key_to_enumerated(user: &str, key: &AccessKeyMetadata) -> Option<Enumerated> {
    let id = key.access_key_id()?;

    let Some(created) = key.create_date().and_then(to_utc) else {
        return Some(Enumerated::Failed {
            id: Some(id.to_string()),
            error: ProviderError::other("key creation date not reported"),
        });
    };

    let state = key
        .status()
        .map(|s| ResourceState::parse(s.as_str()))
        .unwrap_or_else(|| ResourceState::Other("unknown".to_string()));

    Some(Enumerated::Found(
        Resource::new(ResourceFamily::IdentityKey, id, state, created).with_scope(user),
    ))
}

/// Access keys belonging to one user
#[derive(Clone)]
pub struct IamAccessKeys {
    client: Client,
    user: String,
}

impl IamAccessKeys {
    async fn list(&self) -> Result<Vec<AccessKeyMetadata>, ProviderError> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.list_access_keys().user_name(&self.user);
            if let Some(m) = &marker {
                request = request.marker(m);
            }
            let response = request.send().await.map_err(|e| classify_sdk_error(&e))?;
            keys.extend(response.access_key_metadata().iter().cloned());

            marker = if response.is_truncated() {
                response.marker().map(|s| s.to_string())
            } else {
                None
            };
            if marker.is_none() {
                break;
            }
        }

        Ok(keys)
    }

    async fn delete(&self, id: &str) -> Ack {
        info!(user = %self.user, access_key_id = %id, "Deleting access key");
        match self
            .client
            .delete_access_key()
            .user_name(&self.user)
            .access_key_id(id)
            .send()
            .await
        {
            Ok(_) => Ack::ok(id),
            Err(e) => Ack::failed(id, classify_sdk_error(&e)),
        }
    }
}

impl ResourceProvider for IamAccessKeys {
    fn family(&self) -> ResourceFamily {
        ResourceFamily::IdentityKey
    }

    fn scope(&self) -> Option<String> {
        Some(self.user.clone())
    }

    /// DeleteAccessKey takes one key per call
    fn batch_limit(&self) -> usize {
        1
    }

    async fn enumerate(&self, _query: &Query) -> Result<Vec<Enumerated>, ProviderError> {
        let keys = self.list().await?;
        debug!(user = %self.user, count = keys.len(), "Listed access keys");
        Ok(keys.iter().filter_map(|k| key_to_enumerated(&self.user, k)).collect())
    }

    async fn issue(&self, action: ActionKind, ids: &[String]) -> Result<Vec<Ack>, ProviderError> {
        match action {
            ActionKind::DeleteOne | ActionKind::DeleteBatch => {
                let mut acks = Vec::with_capacity(ids.len());
                for id in ids {
                    acks.push(self.delete(id).await);
                }
                Ok(acks)
            }
            ActionKind::Stop => Err(ProviderError::Unsupported {
                operation: "stop access key",
            }),
        }
    }
}
