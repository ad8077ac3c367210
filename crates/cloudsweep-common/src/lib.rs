//! cloudsweep-common - Shared types for selection, actions and auditing
//!
//! This crate holds the provider-agnostic half of cloudsweep, without any
//! AWS SDK dependencies so the pipeline can be exercised against fakes.
//!
//! ## Modules
//!
//! - [`criteria`]: Selection predicates and the query pushed to providers
//! - [`defaults`]: Default option values and wait budgets
//! - [`error`]: Provider error taxonomy and error-code classification
//! - [`family`]: Resource families and terminal action kinds
//! - [`outcome`]: Immutable audit outcome records
//! - [`provider`]: The provider seam implemented by AWS clients and fakes
//! - [`resource`]: Remote resource snapshots and their states

pub mod criteria;
pub mod defaults;
pub mod error;
pub mod family;
pub mod outcome;
pub mod provider;
pub mod resource;

// Re-export commonly used types
pub use criteria::{Criterion, Query};
pub use error::{ProviderError, classify_error_code};
pub use family::{ActionKind, ResourceFamily};
pub use outcome::{OutcomeRecord, OutcomeStatus};
pub use provider::{Ack, Cloud, Enumerated, Listing, NewAccessKey, ResourceProvider};
pub use resource::{Resource, ResourceState};

#[cfg(feature = "mock")]
pub use provider::MockResourceProvider;
