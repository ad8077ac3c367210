//! AWS provider implementations
//!
//! - EC2: instance enumeration, stop and state polling
//! - S3: bucket listing, uploads, object enumeration and deletion
//! - IAM: user listing, access key creation, enumeration and deletion

pub mod context;
pub mod convert;
pub mod ec2;
pub mod error;
pub mod iam;
pub mod s3;

pub use context::{AwsContext, FromAwsContext};
pub use ec2::Ec2Client;
pub use error::classify_sdk_error;
pub use iam::{IamAccessKeys, IamClient};
pub use s3::{S3Client, S3ObjectStore};

use cloudsweep_common::{Cloud, Listing, NewAccessKey, ProviderError};
use std::path::Path;

/// AWS-backed [`Cloud`] for one invocation
#[derive(Clone)]
pub struct AwsCloud {
    ec2: Ec2Client,
    s3: S3Client,
    iam: IamClient,
}

impl FromAwsContext for AwsCloud {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            ec2: Ec2Client::from_context(ctx),
            s3: S3Client::from_context(ctx),
            iam: IamClient::from_context(ctx),
        }
    }
}

impl Cloud for AwsCloud {
    type Compute = Ec2Client;
    type Objects = S3ObjectStore;
    type Keys = IamAccessKeys;

    fn compute(&self) -> Ec2Client {
        self.ec2.clone()
    }

    fn objects(&self, bucket: &str) -> S3ObjectStore {
        self.s3.objects(bucket)
    }

    fn access_keys(&self, user: &str) -> IamAccessKeys {
        self.iam.access_keys(user)
    }

    async fn list_buckets(&self) -> Result<Vec<Listing>, ProviderError> {
        self.s3.list_buckets().await
    }

    async fn list_users(&self) -> Result<Vec<Listing>, ProviderError> {
        self.iam.list_users().await
    }

    async fn upload_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), ProviderError> {
        self.s3.upload_file(bucket, key, path).await
    }

    async fn create_access_key(&self, user: &str) -> Result<NewAccessKey, ProviderError> {
        self.iam.create_access_key(user).await
    }
}
