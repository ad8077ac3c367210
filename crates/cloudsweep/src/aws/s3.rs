//! S3 bucket listing, uploads and object deletion

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::convert::{extract_s3_tags, to_utc};
use crate::aws::error::{classify_s3_error, classify_sdk_error};
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, Object, ObjectIdentifier};
use cloudsweep_common::defaults::S3_DELETE_BATCH_LIMIT;
use cloudsweep_common::{
    ActionKind, Ack, Enumerated, Listing, ProviderError, Query, Resource, ResourceFamily,
    ResourceProvider, ResourceState,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// S3 client for account-level operations
#[derive(Clone)]
pub struct S3Client {
    client: Client,
}

impl FromAwsContext for S3Client {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
        }
    }
}

impl S3Client {
    /// Objects of one bucket
    pub fn objects(&self, bucket: &str) -> S3ObjectStore {
        S3ObjectStore {
            client: self.client.clone(),
            bucket: bucket.to_string(),
        }
    }

    pub async fn list_buckets(&self) -> Result<Vec<Listing>, ProviderError> {
        let response = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let buckets: Vec<Listing> = response
            .buckets()
            .iter()
            .filter_map(|b| {
                Some(Listing {
                    name: b.name()?.to_string(),
                    created: b.creation_date().and_then(to_utc),
                })
            })
            .collect();

        debug!(count = buckets.len(), "Listed S3 buckets");
        Ok(buckets)
    }

    /// Upload a file to S3
    pub async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), ProviderError> {
        debug!(bucket = %bucket, key = %key, path = %path.display(), "Uploading file");

        let body = ByteStream::from_path(path).await.map_err(|e| {
            ProviderError::other(format!("failed to read {}: {e}", path.display()))
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        info!(bucket = %bucket, key = %key, "Uploaded file");
        Ok(())
    }
}

/// Objects inside one bucket
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    async fn object_tags(&self, key: &str) -> Result<BTreeMap<String, String>, ProviderError> {
        let response = self
            .client
            .get_object_tagging()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(extract_s3_tags(response.tag_set()))
    }

    async fn to_enumerated(&self, object: &Object, with_tags: bool) -> Option<Enumerated> {
        let key = object.key()?;

        let Some(modified) = object.last_modified().and_then(to_utc) else {
            return Some(Enumerated::Failed {
                id: Some(key.to_string()),
                error: ProviderError::other("last-modified time not reported"),
            });
        };

        let mut resource = Resource::new(ResourceFamily::StorageObject, key, ResourceState::Present, modified)
            .with_scope(&self.bucket);

        if with_tags {
            match self.object_tags(key).await {
                Ok(tags) => resource.tags = tags,
                Err(error) => {
                    warn!(bucket = %self.bucket, key = %key, error = %error, "Failed to read object tags");
                    return Some(Enumerated::Failed {
                        id: Some(key.to_string()),
                        error,
                    });
                }
            }
        }

        Some(Enumerated::Found(resource))
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<Vec<Ack>, ProviderError> {
        info!(bucket = %self.bucket, count = ids.len(), "Deleting objects");

        let objects = ids
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProviderError::Malformed { message: e.to_string() })?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(false)
            .build()
            .map_err(|e| ProviderError::Malformed { message: e.to_string() })?;

        let response = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let errors: BTreeMap<&str, ProviderError> = response
            .errors()
            .iter()
            .filter_map(|e| Some((e.key()?, classify_s3_error(e))))
            .collect();
        let deleted: Vec<&str> = response.deleted().iter().filter_map(|d| d.key()).collect();

        Ok(ids
            .iter()
            .map(|key| match errors.get(key.as_str()) {
                Some(error) => Ack::failed(key, error.clone()),
                None if deleted.contains(&key.as_str()) => Ack::ok(key),
                None => Ack::failed(key, ProviderError::other("not acknowledged by DeleteObjects")),
            })
            .collect())
    }

    async fn delete_one(&self, key: &str) -> Ack {
        info!(bucket = %self.bucket, key = %key, "Deleting object");
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ack::ok(key),
            Err(e) => Ack::failed(key, classify_sdk_error(&e)),
        }
    }
}

impl ResourceProvider for S3ObjectStore {
    fn family(&self) -> ResourceFamily {
        ResourceFamily::StorageObject
    }

    fn scope(&self) -> Option<String> {
        Some(self.bucket.clone())
    }

    fn batch_limit(&self) -> usize {
        S3_DELETE_BATCH_LIMIT
    }

    async fn enumerate(&self, query: &Query) -> Result<Vec<Enumerated>, ProviderError> {
        let with_tags = query.needs_tags();
        let mut found = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            for object in response.contents() {
                if let Some(entry) = self.to_enumerated(object, with_tags).await {
                    found.push(entry);
                }
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated() == Some(true) => {
                    continuation = Some(token.to_string())
                }
                _ => break,
            }
        }

        debug!(bucket = %self.bucket, count = found.len(), "Listed S3 objects");
        Ok(found)
    }

    async fn issue(&self, action: ActionKind, ids: &[String]) -> Result<Vec<Ack>, ProviderError> {
        match action {
            ActionKind::DeleteBatch => self.delete_batch(ids).await,
            ActionKind::DeleteOne => {
                let mut acks = Vec::with_capacity(ids.len());
                for key in ids {
                    acks.push(self.delete_one(key).await);
                }
                Ok(acks)
            }
            ActionKind::Stop => Err(ProviderError::Unsupported {
                operation: "stop object",
            }),
        }
    }
}
