//! cloudsweep: select, stop or delete and audit AWS resources
//!
//! Each invocation runs one `<family> <action>` command, appends every
//! outcome to the CSV audit file and prints an outcome table.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloudsweep::audit::CsvAuditLog;
use cloudsweep::aws::{AwsCloud, AwsContext, FromAwsContext};
use cloudsweep::config::{GlobalSettings, load_config_file};
use cloudsweep::orchestrator::{Orchestrator, preview, record_failure};
use cloudsweep::report::{OutputFormat, Summary, render};
use cloudsweep::{Command, RunError};
use cloudsweep_common::defaults::DEFAULT_CONFIG_PATH;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cloudsweep")]
#[command(about = "Select, stop or delete and audit EC2 instances, S3 objects and IAM access keys")]
#[command(version)]
struct Args {
    /// JSON config file with option values
    #[arg(long, env = "CLOUDSWEEP_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    /// Print the resolved command without calling AWS or writing the audit file
    #[arg(long, global = true)]
    dry_run: bool,

    /// AWS region (overrides config `region` and the environment)
    #[arg(long, global = true)]
    region: Option<String>,

    /// AWS profile (overrides config `profile` and AWS_PROFILE)
    #[arg(long, global = true)]
    profile: Option<String>,

    /// CSV audit file (default: platform data dir)
    #[arg(long, global = true)]
    audit_file: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Outcome output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    family: Family,
}

#[derive(Subcommand, Debug)]
enum Family {
    /// EC2 instances
    Ec2 {
        #[command(subcommand)]
        action: Ec2Action,
    },
    /// S3 buckets and objects
    S3 {
        #[command(subcommand)]
        action: S3Action,
    },
    /// IAM users and access keys
    Iam {
        #[command(subcommand)]
        action: IamAction,
    },
}

/// Tag pair selecting instances
#[derive(clap::Args, Debug)]
struct TagArgs {
    /// Tag key to match
    #[arg(long)]
    tag_key: Option<String>,

    /// Tag value to match
    #[arg(long)]
    tag_value: Option<String>,
}

#[derive(clap::Args, Debug)]
struct BucketArgs {
    /// Bucket to operate on
    #[arg(long)]
    bucket_name: Option<String>,
}

#[derive(clap::Args, Debug)]
struct UserArgs {
    /// IAM user name
    #[arg(long)]
    username: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Ec2Action {
    /// List all instances
    ListInstances,
    /// List running instances carrying a tag
    FilterInstances(TagArgs),
    /// Stop instances by id, or running instances carrying a tag
    StopInstances {
        /// Comma-separated instance ids; skips tag selection
        #[arg(long, value_delimiter = ',')]
        instance_ids: Option<Vec<String>>,

        #[command(flatten)]
        tag: TagArgs,
    },
}

#[derive(Subcommand, Debug)]
enum S3Action {
    /// List buckets
    ListBuckets,
    /// List objects older than a cutoff
    FilterObjects {
        #[command(flatten)]
        bucket: BucketArgs,

        /// Age threshold in days
        #[arg(long)]
        cut_off_days: Option<u64>,
    },
    /// Upload a file, or every file in a directory
    UploadFile {
        #[command(flatten)]
        bucket: BucketArgs,

        /// File or directory to upload
        #[arg(long)]
        local_file_path: Option<PathBuf>,

        /// Key prefix; keys are `<prefix>/<YYYY-MM-DD>/<file name>`
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Delete objects older than a cutoff
    DeleteFile {
        #[command(flatten)]
        bucket: BucketArgs,

        /// Age threshold in days
        #[arg(long)]
        cut_off_days: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum IamAction {
    /// List users
    ListUsers,
    /// List a user's access keys
    ListKeys(UserArgs),
    /// Create an access key and print its secret once
    CreateKey(UserArgs),
    /// Delete one access key
    DeleteKey {
        #[command(flatten)]
        user: UserArgs,

        /// Access key id to delete
        #[arg(long)]
        access_key_id: Option<String>,
    },
    /// Delete access keys older than a threshold
    DeleteOldKeys {
        #[command(flatten)]
        user: UserArgs,

        /// Age threshold in days
        #[arg(long)]
        key_max_age: Option<u64>,
    },
}

/// Command-line option values, keyed by option name
#[derive(Default)]
struct CliArgs(BTreeMap<String, Value>);

impl CliArgs {
    fn set(mut self, name: &str, value: Option<impl Into<Value>>) -> Self {
        if let Some(value) = value {
            self.0.insert(name.to_string(), value.into());
        }
        self
    }

    fn tag(self, tag: TagArgs) -> Self {
        self.set("tag_key", tag.tag_key).set("tag_value", tag.tag_value)
    }

    fn bucket(self, bucket: BucketArgs) -> Self {
        self.set("bucket_name", bucket.bucket_name)
    }

    fn user(self, user: UserArgs) -> Self {
        self.set("username", user.username)
    }
}

impl Family {
    /// The command to run and the options given for it
    fn into_command(self) -> (Command, BTreeMap<String, Value>) {
        let args = CliArgs::default();
        let (command, args) = match self {
            Family::Ec2 { action } => match action {
                Ec2Action::ListInstances => (Command::ListInstances, args),
                Ec2Action::FilterInstances(tag) => (Command::FilterInstances, args.tag(tag)),
                Ec2Action::StopInstances { instance_ids, tag } => {
                    (Command::StopInstances, args.set("instance_ids", instance_ids).tag(tag))
                }
            },
            Family::S3 { action } => match action {
                S3Action::ListBuckets => (Command::ListBuckets, args),
                S3Action::FilterObjects { bucket, cut_off_days } => (
                    Command::FilterObjects,
                    args.bucket(bucket).set("cut_off_days", cut_off_days),
                ),
                S3Action::UploadFile {
                    bucket,
                    local_file_path,
                    prefix,
                } => (
                    Command::UploadFile,
                    args.bucket(bucket)
                        .set("local_file_path", local_file_path.map(|p| p.display().to_string()))
                        .set("prefix", prefix),
                ),
                S3Action::DeleteFile { bucket, cut_off_days } => (
                    Command::DeleteFile,
                    args.bucket(bucket).set("cut_off_days", cut_off_days),
                ),
            },
            Family::Iam { action } => match action {
                IamAction::ListUsers => (Command::ListUsers, args),
                IamAction::ListKeys(user) => (Command::ListKeys, args.user(user)),
                IamAction::CreateKey(user) => (Command::CreateKey, args.user(user)),
                IamAction::DeleteKey { user, access_key_id } => (
                    Command::DeleteKey,
                    args.user(user).set("access_key_id", access_key_id),
                ),
                IamAction::DeleteOldKeys { user, key_max_age } => (
                    Command::DeleteOldKeys,
                    args.user(user).set("key_max_age", key_max_age),
                ),
            },
        };
        (command, args.0)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(Outcome::Clean) => ExitCode::SUCCESS,
        Ok(Outcome::SomeFailed) => ExitCode::from(2),
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

/// How a completed command went
enum Outcome {
    Clean,
    SomeFailed,
}

/// Report a failed invocation on stderr, with a hint when one applies
fn report_failure(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr().lock();
    let run_error = e.downcast_ref::<RunError>();
    let kind = match run_error {
        Some(RunError::Config(_)) => "invalid configuration",
        Some(RunError::Provider(_)) => "AWS request failed",
        Some(RunError::Io { .. }) => "local file unusable",
        None => "failed",
    };
    let _ = writeln!(stderr, "\x1b[1;31mcloudsweep: {kind}:\x1b[0m {e}");

    for cause in e.chain().skip(1) {
        let _ = writeln!(stderr, "  \x1b[33mfrom:\x1b[0m {cause}");
    }

    if let Some(hint) = run_error.and_then(RunError::suggestion) {
        let _ = writeln!(stderr, "  \x1b[36mhint:\x1b[0m {hint}");
    }
}

/// stderr logging, plus a plain-text copy when `log_file` is set
fn init_tracing(log_file: Option<&PathBuf>) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    // Keep the AWS SDK quiet unless RUST_LOG asks otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,aws_config=warn,aws_sdk_ec2=warn,aws_sdk_s3=warn,aws_sdk_iam=warn,aws_smithy_runtime=warn")
    });

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

/// The configured audit file, or the platform default
fn audit_path(configured: Option<PathBuf>) -> Result<PathBuf> {
    match configured {
        Some(path) => Ok(path),
        None => CsvAuditLog::default_path().context("Could not determine a data directory for the audit file"),
    }
}

async fn run() -> Result<Outcome> {
    let args = Args::parse();
    init_tracing(args.log_file.as_ref())?;

    let (command, cli_args) = args.family.into_command();

    let loaded = load_config_file(&args.config).and_then(|config| {
        let settings = GlobalSettings::from_config(&config)?.overlay(
            args.region.clone(),
            args.profile.clone(),
            args.audit_file.clone(),
        );
        Ok((config, settings))
    });
    let (config, settings) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            let e = RunError::from(e);
            if !args.dry_run {
                // The file's own audit_file setting is unreadable here
                let mut audit = CsvAuditLog::new(audit_path(args.audit_file.clone())?);
                record_failure(command, &e, &mut audit);
            }
            return Err(e.into());
        }
    };

    if args.dry_run {
        preview(command, &cli_args, &config)?;
        return Ok(Outcome::Clean);
    }

    let mut audit = CsvAuditLog::new(audit_path(settings.audit_file)?);

    let ctx = AwsContext::new(settings.region.as_deref(), settings.profile.as_deref()).await;
    if let Some(profile) = &settings.profile {
        info!(profile = %profile, "Using AWS profile");
    }
    info!(
        command = %command,
        region = ?ctx.region(),
        audit_file = %audit.path().display(),
        "Starting"
    );

    let cloud = AwsCloud::from_context(&ctx);
    let records = Orchestrator::new(&cloud)
        .run(command, &cli_args, &config, &mut audit)
        .await?;

    println!("{}", render(&records, args.output)?);

    if Summary::of(&records).failed > 0 {
        Ok(Outcome::SomeFailed)
    } else {
        Ok(Outcome::Clean)
    }
}
