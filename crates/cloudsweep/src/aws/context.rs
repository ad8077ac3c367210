//! Shared AWS configuration context
//!
//! Loads the SDK configuration once per invocation and hands out service
//! clients built from it.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::sync::Arc;
use tracing::debug;

/// Types constructible from a loaded [`AwsContext`]
pub trait FromAwsContext {
    fn from_context(ctx: &AwsContext) -> Self;
}

/// Loaded AWS SDK configuration for one invocation.
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: Option<String>,
}

impl AwsContext {
    /// Load credentials and settings from the environment, shared config
    /// files and instance metadata. `region` and `profile` override the
    /// environment when given.
    pub async fn new(region: Option<&str>, profile: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        let region = config.region().map(|r| r.to_string());
        debug!(region = ?region, profile = ?profile, "Loaded AWS configuration");

        Self {
            config: Arc::new(config),
            region,
        }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// Effective region, if one could be determined
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn ec2_client(&self) -> aws_sdk_ec2::Client {
        aws_sdk_ec2::Client::new(self.sdk_config())
    }

    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(self.sdk_config())
    }

    pub fn iam_client(&self) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(self.sdk_config())
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
