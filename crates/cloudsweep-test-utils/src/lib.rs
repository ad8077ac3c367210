//! Shared test utilities for cloudsweep
//!
//! ## Modules
//!
//! - [`fake`]: In-memory [`Cloud`](cloudsweep_common::Cloud) with call
//!   recording and per-id failure injection
//! - [`fixtures`]: Resource builders and canned inventories

pub mod fake;
pub mod fixtures;

// Re-export commonly used items
pub use fake::{Call, FakeCloud, FakeProvider, Upload};
pub use fixtures::{access_key, aged_bucket, five_instances, instance, object, user_with_keys};
