//! Command orchestration
//!
//! Resolves a command's options, then runs selection, execution and
//! auditing against the providers handed out by a [`Cloud`].

use crate::audit::AuditSink;
use crate::command::Command;
use crate::config::{ResolvedParams, resolve};
use crate::error::{ConfigError, RunError};
use crate::execute::{ActionRequest, Executor};
use crate::select::{Selection, Selector};
use crate::wait::WaitConfig;
use chrono::{DateTime, Utc};
use cloudsweep_common::resource::audit_name;
use cloudsweep_common::{
    ActionKind, Cloud, Criterion, Listing, OutcomeRecord, OutcomeStatus, ResourceProvider,
    ResourceState,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Runs commands against one cloud
pub struct Orchestrator<'a, C> {
    cloud: &'a C,
    dry_run: bool,
    wait: WaitConfig,
    now: Option<DateTime<Utc>>,
}

impl<'a, C: Cloud> Orchestrator<'a, C> {
    pub fn new(cloud: &'a C) -> Self {
        Self {
            cloud,
            dry_run: false,
            wait: WaitConfig::default(),
            now: None,
        }
    }

    /// Resolve and print, but make no remote calls and write no records
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Confirmation polling budget for stop actions
    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// Fix the clock for age criteria and upload key dates
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Run one command.
    ///
    /// A configuration or whole-command failure is recorded as one
    /// batch-level `Failed` record before it is returned.
    pub async fn run(
        &self,
        command: Command,
        cli_args: &BTreeMap<String, Value>,
        config: &Map<String, Value>,
        audit: &mut dyn AuditSink,
    ) -> Result<Vec<OutcomeRecord>, RunError> {
        if self.dry_run {
            preview(command, cli_args, config)?;
            return Ok(Vec::new());
        }

        let params = match resolve(command, cli_args, config) {
            Ok(params) => params,
            Err(e) => return Err(self.fail(command, e.into(), audit)),
        };

        let mut run = Run {
            command,
            audit,
            records: Vec::new(),
            now: self.now.unwrap_or_else(Utc::now),
        };

        let result = self.dispatch(&params, &mut run).await;
        match result {
            Ok(()) => Ok(run.records),
            Err(e) => Err(self.fail(command, e, run.audit)),
        }
    }

    fn fail(&self, command: Command, e: RunError, audit: &mut dyn AuditSink) -> RunError {
        record_failure(command, &e, audit);
        e
    }

    async fn dispatch(&self, params: &ResolvedParams, run: &mut Run<'_>) -> Result<(), RunError> {
        let command = params.command();
        info!(command = %command, mutating = command.is_mutating(), "Running command");

        match command {
            Command::ListInstances => {
                let compute = self.cloud.compute();
                let selection = self.selector(&compute, run).list(run.audit).await?;
                run.report_matches(selection);
            }
            Command::FilterInstances => {
                let compute = self.cloud.compute();
                let criteria = running_with_tag(params.str("tag_key")?, params.str("tag_value")?);
                let selection = self.selector(&compute, run).select(criteria, run.audit).await?;
                run.report_matches(selection);
            }
            Command::StopInstances => {
                let compute = self.cloud.compute();
                let targets = match params.string_list("instance_ids")? {
                    Some(ids) if !ids.is_empty() => ids,
                    _ => {
                        let criteria = stop_criteria(params)?;
                        let selection = self.selector(&compute, run).select(criteria, run.audit).await?;
                        run.absorb(selection.outcomes.clone());
                        selection.ids()
                    }
                };
                self.execute(&compute, ActionKind::Stop, targets, run).await;
            }
            Command::ListBuckets => {
                let buckets = self.cloud.list_buckets().await?;
                run.report_listing(&buckets);
            }
            Command::FilterObjects => {
                let objects = self.cloud.objects(params.non_empty("bucket_name")?);
                let criteria = vec![older_than(params.u64("cut_off_days")?)];
                let selection = self.selector(&objects, run).select(criteria, run.audit).await?;
                run.report_matches(selection);
            }
            Command::UploadFile => self.upload(params, run).await?,
            Command::DeleteFile => {
                let objects = self.cloud.objects(params.non_empty("bucket_name")?);
                let criteria = vec![older_than(params.u64("cut_off_days")?)];
                let selection = self.selector(&objects, run).select(criteria, run.audit).await?;
                run.absorb(selection.outcomes.clone());
                self.execute(&objects, ActionKind::DeleteBatch, selection.ids(), run).await;
            }
            Command::ListUsers => {
                let users = self.cloud.list_users().await?;
                run.report_listing(&users);
            }
            Command::ListKeys => {
                let keys = self.cloud.access_keys(params.non_empty("username")?);
                let selection = self.selector(&keys, run).list(run.audit).await?;
                if selection.matched.is_empty() && selection.outcomes.is_empty() {
                    run.emit(
                        OutcomeRecord::batch(command.family(), command.action(), OutcomeStatus::Empty)
                            .with_detail(format!("{} has no access keys", params.str("username")?)),
                    );
                } else {
                    run.report_matches(selection);
                }
            }
            Command::CreateKey => {
                let user = params.non_empty("username")?;
                let key = self.cloud.create_access_key(user).await?;
                println!("AccessKeyId: {}", key.access_key_id);
                println!("SecretAccessKey: {}", key.secret_access_key);
                println!("Status: {}", key.status);
                if let Some(created) = key.created {
                    println!("CreateDate: {}", created.to_rfc3339());
                }
                run.emit(
                    OutcomeRecord::for_resource(
                        command.family(),
                        audit_name(Some(user), &key.access_key_id),
                        command.action(),
                        OutcomeStatus::Success,
                    )
                    .with_detail(key.status.clone()),
                );
            }
            Command::DeleteKey => {
                let keys = self.cloud.access_keys(params.non_empty("username")?);
                let id = params.non_empty("access_key_id")?.to_string();
                self.execute(&keys, ActionKind::DeleteOne, vec![id], run).await;
            }
            Command::DeleteOldKeys => {
                let keys = self.cloud.access_keys(params.non_empty("username")?);
                let criteria = vec![older_than(params.u64("key_max_age")?)];
                let selection = self.selector(&keys, run).select(criteria, run.audit).await?;
                run.absorb(selection.outcomes.clone());
                self.execute(&keys, ActionKind::DeleteOne, selection.ids(), run).await;
            }
        }

        Ok(())
    }

    fn selector<'p, P: ResourceProvider>(&self, provider: &'p P, run: &Run<'_>) -> Selector<'p, P> {
        Selector::new(provider, run.command.action()).with_now(run.now)
    }

    async fn execute<P: ResourceProvider>(
        &self,
        provider: &P,
        action: ActionKind,
        targets: Vec<String>,
        run: &mut Run<'_>,
    ) {
        let request = ActionRequest::new(action, targets);
        let records = Executor::new(provider, run.command.action())
            .with_wait(self.wait.clone())
            .execute(&request, run.audit)
            .await;
        run.records.extend(records);
    }

    /// Upload one file, or every regular file directly inside a directory,
    /// to `<prefix>/<YYYY-MM-DD>/<file name>`.
    async fn upload(&self, params: &ResolvedParams, run: &mut Run<'_>) -> Result<(), RunError> {
        let bucket = params.non_empty("bucket_name")?;
        let local = PathBuf::from(params.non_empty("local_file_path")?);
        let prefix = params.str("prefix")?.trim_end_matches('/');
        let today = run.now.format("%Y-%m-%d").to_string();

        let files = files_to_upload(&local)?;
        if files.is_empty() {
            run.emit(
                OutcomeRecord::batch(run.command.family(), run.command.action(), OutcomeStatus::Empty)
                    .with_detail(format!("no files in {}", local.display())),
            );
            return Ok(());
        }

        for (name, path) in files {
            let key = format!("{prefix}/{today}/{name}");
            let resource = audit_name(Some(bucket), &key);
            let record = match self.cloud.upload_object(bucket, &key, &path).await {
                Ok(()) => OutcomeRecord::for_resource(
                    run.command.family(),
                    resource,
                    run.command.action(),
                    OutcomeStatus::Success,
                ),
                Err(e) => {
                    warn!(bucket = %bucket, key = %key, error = %e, "Upload failed");
                    OutcomeRecord::for_resource(
                        run.command.family(),
                        resource,
                        run.command.action(),
                        OutcomeStatus::Failed,
                    )
                    .with_detail(e.to_string())
                }
            };
            run.emit(record);
        }

        Ok(())
    }
}

/// Record a whole-command failure as one batch-level `Failed` record
pub fn record_failure(command: Command, e: &RunError, audit: &mut dyn AuditSink) {
    error!(command = %command, error = %e, "Command failed");
    let record = OutcomeRecord::batch(command.family(), command.action(), OutcomeStatus::Failed)
        .with_detail(e.to_string());
    audit.append(&record);
}

/// Resolve and print what `command` would do, without touching the cloud
pub fn preview(
    command: Command,
    cli_args: &BTreeMap<String, Value>,
    config: &Map<String, Value>,
) -> Result<ResolvedParams, ConfigError> {
    let params = resolve(command, cli_args, config)?;
    info!(command = %command, "Dry run, skipping remote calls");
    println!("[DryRun] Would execute: {params}");
    Ok(params)
}

/// State of one command run
struct Run<'a> {
    command: Command,
    audit: &'a mut dyn AuditSink,
    records: Vec<OutcomeRecord>,
    now: DateTime<Utc>,
}

impl Run<'_> {
    /// Record and keep
    fn emit(&mut self, record: OutcomeRecord) {
        self.audit.append(&record);
        self.records.push(record);
    }

    /// Keep records that were already appended to the audit sink
    fn absorb(&mut self, records: Vec<OutcomeRecord>) {
        self.records.extend(records);
    }

    /// One `Success` per matched resource, after any failure records
    fn report_matches(&mut self, selection: Selection) {
        self.absorb(selection.outcomes);
        for resource in selection.matched {
            self.emit(
                OutcomeRecord::for_resource(
                    resource.family,
                    resource.audit_name(),
                    self.command.action(),
                    OutcomeStatus::Success,
                )
                .with_detail(resource.state.to_string()),
            );
        }
    }

    fn report_listing(&mut self, items: &[Listing]) {
        for item in items {
            let mut record = OutcomeRecord::for_resource(
                self.command.family(),
                item.name.as_str(),
                self.command.action(),
                OutcomeStatus::Success,
            );
            if let Some(created) = item.created {
                record = record.with_detail(format!("created {}", created.format("%Y-%m-%d")));
            }
            self.emit(record);
        }
    }
}

/// Ages beyond this are treated as "older than anything"
const MAX_AGE_DAYS: i64 = 3_650_000;

fn older_than(days: u64) -> Criterion {
    Criterion::older_than_days(i64::try_from(days).unwrap_or(MAX_AGE_DAYS).min(MAX_AGE_DAYS))
}

fn running_with_tag(key: &str, value: &str) -> Vec<Criterion> {
    vec![
        Criterion::tag_equals(key, value),
        Criterion::StateEquals(ResourceState::Running),
    ]
}

/// Tag criteria for `stop-instances` when no ids were given
fn stop_criteria(params: &ResolvedParams) -> Result<Vec<Criterion>, ConfigError> {
    match (params.opt_str("tag_key")?, params.opt_str("tag_value")?) {
        (Some(key), Some(value)) => Ok(running_with_tag(key, value)),
        (None, None) => Err(ConfigError::NoCriteria {
            command: params.command().to_string(),
        }),
        (Some(_), None) => Err(ConfigError::MissingOption {
            option: "tag_value",
            flag: "--tag-value",
        }),
        (None, Some(_)) => Err(ConfigError::MissingOption {
            option: "tag_key",
            flag: "--tag-key",
        }),
    }
}

/// Regular files to upload, sorted by name
fn files_to_upload(path: &Path) -> Result<Vec<(String, PathBuf)>, RunError> {
    let metadata =
        fs::metadata(path).map_err(|e| RunError::io("failed to read", path.display().to_string(), e))?;

    let mut files = Vec::new();
    if metadata.is_file() {
        if let Some(name) = path.file_name() {
            files.push((name.to_string_lossy().into_owned(), path.to_path_buf()));
        }
        return Ok(files);
    }

    let entries =
        fs::read_dir(path).map_err(|e| RunError::io("failed to list", path.display().to_string(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RunError::io("failed to list", path.display().to_string(), e))?;
        let entry_path = entry.path();
        if entry_path.is_file() {
            files.push((entry.file_name().to_string_lossy().into_owned(), entry_path));
        }
    }
    files.sort();
    Ok(files)
}
