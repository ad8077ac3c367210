//! Audit trail
//!
//! Every attempted unit of work ends up as one CSV row:
//!
//! ```text
//! Service,Resource,Action,Status,Timestamp
//! EC2,i-0abc,stop-instances,Success,2024-03-09T14:05:07.123456+00:00
//! ```
//!
//! Rows are appended as soon as a record is produced. A failing audit write
//! is logged and never interrupts the command.

use anyhow::{Context, Result};
use cloudsweep_common::OutcomeRecord;
use cloudsweep_common::defaults::DEFAULT_AUDIT_FILE_NAME;
use directories::ProjectDirs;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Destination for outcome records
pub trait AuditSink {
    /// Persist one record. Must not fail the caller.
    fn append(&mut self, record: &OutcomeRecord);
}

impl<S: AuditSink + ?Sized> AuditSink for &mut S {
    fn append(&mut self, record: &OutcomeRecord) {
        (**self).append(record);
    }
}

/// One CSV row; field names are the header
#[derive(Debug, Serialize)]
struct AuditRow<'a> {
    #[serde(rename = "Service")]
    service: &'a str,
    #[serde(rename = "Resource")]
    resource: &'a str,
    #[serde(rename = "Action")]
    action: &'a str,
    #[serde(rename = "Status")]
    status: &'a str,
    #[serde(rename = "Timestamp")]
    timestamp: String,
}

impl<'a> From<&'a OutcomeRecord> for AuditRow<'a> {
    fn from(record: &'a OutcomeRecord) -> Self {
        Self {
            service: record.family.service_label(),
            resource: record.resource.as_deref().unwrap_or(""),
            action: &record.action,
            status: record.status.as_str(),
            timestamp: record.timestamp_iso(),
        }
    }
}

/// Append-only CSV audit file
#[derive(Debug, Clone)]
pub struct CsvAuditLog {
    path: PathBuf,
}

impl CsvAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/cloudsweep/report.csv` on this platform
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cloudsweep").map(|dirs| dirs.data_dir().join(DEFAULT_AUDIT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: &OutcomeRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create audit directory {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit file {}", self.path.display()))?;
        let needs_header = file.metadata().map(|m| m.len() == 0).unwrap_or(true);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(Vec::new());
        writer
            .serialize(AuditRow::from(record))
            .context("Failed to encode audit row")?;
        let row = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to encode audit row: {}", e.error()))?;

        file.write_all(&row)
            .with_context(|| format!("Failed to append to audit file {}", self.path.display()))?;
        Ok(())
    }
}

impl AuditSink for CsvAuditLog {
    fn append(&mut self, record: &OutcomeRecord) {
        match self.write(record) {
            Ok(()) => debug!(
                path = %self.path.display(),
                service = %record.family,
                status = %record.status,
                "Appended audit record"
            ),
            Err(e) => error!(
                path = %self.path.display(),
                error = ?e,
                "Failed to write audit record"
            ),
        }
    }
}

/// In-memory sink for tests and dry inspection
#[derive(Debug, Default, Clone)]
pub struct MemoryAudit {
    pub records: Vec<OutcomeRecord>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAudit {
    fn append(&mut self, record: &OutcomeRecord) {
        self.records.push(record.clone());
    }
}
