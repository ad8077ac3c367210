//! Console output for outcome records

use anyhow::Result;
use cloudsweep_common::{OutcomeRecord, OutcomeStatus};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

/// How outcome records are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Per-status totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub success: usize,
    pub failed: usize,
    pub empty: usize,
    pub no_match: usize,
}

impl Summary {
    pub fn of(records: &[OutcomeRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.status {
                OutcomeStatus::Success => summary.success += 1,
                OutcomeStatus::Failed => summary.failed += 1,
                OutcomeStatus::Empty => summary.empty += 1,
                OutcomeStatus::NoMatch => summary.no_match += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.success + self.failed + self.empty + self.no_match
    }
}

fn status_cell(status: OutcomeStatus) -> Cell {
    let color = match status {
        OutcomeStatus::Success => Color::Green,
        OutcomeStatus::Failed => Color::Red,
        OutcomeStatus::Empty | OutcomeStatus::NoMatch => Color::Yellow,
    };
    Cell::new(status.as_str()).fg(color)
}

/// Outcome table, one row per record
pub fn outcome_table(records: &[OutcomeRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Service"),
            Cell::new("Resource"),
            Cell::new("Action"),
            Cell::new("Status"),
            Cell::new("Detail"),
        ]);

    for record in records {
        table.add_row(vec![
            Cell::new(record.family.service_label()),
            Cell::new(record.resource.as_deref().unwrap_or("-")),
            Cell::new(&record.action),
            status_cell(record.status),
            Cell::new(record.detail.as_deref().unwrap_or("")),
        ]);
    }

    table
}

/// Render records in the requested format
pub fn render(records: &[OutcomeRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Table => {
            if records.is_empty() {
                return Ok("No outcomes recorded".to_string());
            }
            let summary = Summary::of(records);
            Ok(format!(
                "{}\n\nTotal: {} ({} succeeded, {} failed, {} empty, {} no match)",
                outcome_table(records),
                summary.total(),
                summary.success,
                summary.failed,
                summary.empty,
                summary.no_match,
            ))
        }
    }
}
