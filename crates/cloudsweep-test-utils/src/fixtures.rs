//! Resource builders and canned inventories

use chrono::{DateTime, Duration, Utc};
use cloudsweep_common::{Resource, ResourceFamily, ResourceState};

use crate::fake::FakeCloud;

pub fn instance(id: &str, state: ResourceState, launched: DateTime<Utc>) -> Resource {
    Resource::new(ResourceFamily::ComputeInstance, id, state, launched)
}

pub fn object(bucket: &str, key: &str, modified: DateTime<Utc>) -> Resource {
    Resource::new(ResourceFamily::StorageObject, key, ResourceState::Present, modified).with_scope(bucket)
}

pub fn access_key(user: &str, id: &str, created: DateTime<Utc>) -> Resource {
    Resource::new(ResourceFamily::IdentityKey, id, ResourceState::Active, created).with_scope(user)
}

/// Five instances; exactly `i-0002` and `i-0004` are running with `env=dev`.
///
/// `i-0003` carries the tag but is already stopped, `i-0001` is running
/// with `env=prod` and `i-0005` is running untagged.
pub fn five_instances(now: DateTime<Utc>) -> FakeCloud {
    let launched = now - Duration::days(3);
    FakeCloud::new()
        .with_instance(instance("i-0001", ResourceState::Running, launched).with_tag("env", "prod"))
        .with_instance(instance("i-0002", ResourceState::Running, launched).with_tag("env", "dev"))
        .with_instance(instance("i-0003", ResourceState::Stopped, launched).with_tag("env", "dev"))
        .with_instance(
            instance("i-0004", ResourceState::Running, launched)
                .with_tag("env", "dev")
                .with_tag("team", "data"),
        )
        .with_instance(instance("i-0005", ResourceState::Running, launched))
}

/// Object ages in days for [`aged_bucket`]
pub const OBJECT_AGES: [(&str, i64); 6] = [
    ("logs/fresh.log", 1),
    ("logs/week.log", 7),
    ("logs/month.log", 31),
    ("logs/quarter.log", 95),
    ("logs/year.log", 370),
    ("logs/ancient.log", 1200),
];

/// One bucket holding [`OBJECT_AGES`], aged relative to `now`
pub fn aged_bucket(bucket: &str, now: DateTime<Utc>) -> FakeCloud {
    OBJECT_AGES
        .iter()
        .fold(FakeCloud::new().with_bucket(bucket), |cloud, (key, age)| {
            cloud.with_object(object(bucket, key, now - Duration::days(*age)))
        })
}

/// A user with one old and one recent access key
pub fn user_with_keys(user: &str, now: DateTime<Utc>) -> FakeCloud {
    FakeCloud::new()
        .with_user(user)
        .with_key(access_key(user, "AKIAOLD00000001", now - Duration::days(120)))
        .with_key(access_key(user, "AKIANEW00000002", now - Duration::days(5)))
}
