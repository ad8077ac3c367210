//! Default configuration values
//!
//! These constants are the documented defaults applied by the config
//! resolver when neither the command line nor the config file sets a value.

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Age threshold in days for `s3 delete-file` / `s3 filter-objects`
pub const DEFAULT_CUT_OFF_DAYS: u64 = 30;

/// Age threshold in days for `iam delete-old-keys`
pub const DEFAULT_KEY_MAX_AGE_DAYS: u64 = 30;

/// Key prefix for `s3 upload-file`
pub const DEFAULT_UPLOAD_PREFIX: &str = "default";

/// File name of the audit report inside the data directory
pub const DEFAULT_AUDIT_FILE_NAME: &str = "report.csv";

/// Maximum number of confirmation polls per stopped instance
pub const DEFAULT_CONFIRM_MAX_ATTEMPTS: u32 = 40;

/// First delay between confirmation polls, in milliseconds
pub const DEFAULT_CONFIRM_INITIAL_DELAY_MS: u64 = 2_000;

/// Upper bound for the delay between confirmation polls, in milliseconds
pub const DEFAULT_CONFIRM_MAX_DELAY_MS: u64 = 15_000;

/// S3 DeleteObjects accepts at most this many keys per request
pub const S3_DELETE_BATCH_LIMIT: usize = 1000;
