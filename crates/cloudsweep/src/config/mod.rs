//! Command options
//!
//! - [`schema`]: declared options per command
//! - [`resolve`]: CLI > config file > default precedence
//! - [`file`]: JSON config file loading

pub mod file;
pub mod resolve;
pub mod schema;

pub use file::{GlobalSettings, load_config_file};
pub use resolve::{ResolvedParams, resolve};
pub use schema::{OptionSpec, options_for};
