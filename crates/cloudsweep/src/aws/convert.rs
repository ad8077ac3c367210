//! SDK type conversions shared by the service clients

use aws_sdk_ec2::primitives::DateTime as SmithyDateTime;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Collect key/value pairs from any SDK tag type
pub fn extract_tags<T>(
    tags: &[T],
    key: impl Fn(&T) -> Option<&str>,
    value: impl Fn(&T) -> Option<&str>,
) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|t| match (key(t), value(t)) {
            (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
            _ => None,
        })
        .collect()
}

pub fn extract_ec2_tags(tags: &[aws_sdk_ec2::types::Tag]) -> BTreeMap<String, String> {
    extract_tags(tags, |t| t.key(), |t| t.value())
}

pub fn extract_s3_tags(tags: &[aws_sdk_s3::types::Tag]) -> BTreeMap<String, String> {
    extract_tags(tags, |t| Some(t.key()), |t| Some(t.value()))
}

/// Smithy timestamp to chrono. The EC2, S3 and IAM crates all re-export
/// the same smithy `DateTime`.
pub fn to_utc(dt: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}
