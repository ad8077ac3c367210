//! cloudsweep - Select, act on and audit cloud resources
//!
//! One invocation runs one command: options are resolved from the command
//! line and a JSON config file, resources are selected by tag, state or age,
//! an action (stop or delete) is applied with per-target isolation, and
//! every outcome is appended to a CSV audit file.
//!
//! ## Modules
//!
//! - [`audit`]: CSV and in-memory audit sinks
//! - [`aws`]: EC2, S3 and IAM providers over the AWS SDK
//! - [`command`]: The runnable (family, action) pairs
//! - [`config`]: Option schema, config file loading and precedence
//! - [`error`]: Configuration and command-level errors
//! - [`execute`]: Action execution and confirmation
//! - [`orchestrator`]: Per-command dispatch
//! - [`report`]: Console output
//! - [`select`]: Resource selection
//! - [`wait`]: Bounded polling with backoff

pub mod audit;
pub mod aws;
pub mod command;
pub mod config;
pub mod error;
pub mod execute;
pub mod orchestrator;
pub mod report;
pub mod select;
pub mod wait;

pub use audit::{AuditSink, CsvAuditLog, MemoryAudit};
pub use command::Command;
pub use error::{ConfigError, RunError};
pub use execute::{ActionRequest, Executor};
pub use orchestrator::Orchestrator;
pub use select::{Selection, Selector};
pub use wait::WaitConfig;
