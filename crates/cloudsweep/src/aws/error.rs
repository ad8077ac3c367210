//! Mapping SDK errors onto [`ProviderError`]
//!
//! Uses the `ProvideErrorMetadata` code instead of string matching on the
//! Debug output. Transport and timeout failures carry no code and fall
//! through to `ProviderError::Sdk`.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use cloudsweep_common::{ProviderError, classify_error_code};

/// Classify any AWS SDK error (EC2, S3 or IAM operation errors, or the
/// `SdkError` wrapping them).
pub fn classify_sdk_error<E>(err: &E) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let meta = ProvideErrorMetadata::meta(err);
    match (meta.code(), meta.message()) {
        (None, None) => ProviderError::other(DisplayErrorContext(err).to_string()),
        (code, message) => classify_error_code(code, message),
    }
}

/// Turn a `DeleteObjects` per-key error into a [`ProviderError`]
pub fn classify_s3_error(error: &aws_sdk_s3::types::Error) -> ProviderError {
    classify_error_code(error.code(), error.message())
}
