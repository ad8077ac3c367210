//! Option precedence and the CSV audit file, end to end

mod common;

use cloudsweep::config::{GlobalSettings, load_config_file};
use cloudsweep::orchestrator::record_failure;
use cloudsweep::{Command, ConfigError, CsvAuditLog, MemoryAudit, RunError};
use cloudsweep_common::OutcomeStatus;
use cloudsweep_test_utils::five_instances;
use common::*;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[tokio::test]
async fn legacy_config_keys_are_honoured() {
    let cloud = five_instances(now());
    let records = orchestrator(&cloud)
        .run(
            Command::FilterInstances,
            &no_args(),
            &config(&[("tag_to_check", json!("env")), ("stop_tag_value", json!("prod"))]),
            &mut MemoryAudit::new(),
        )
        .await
        .unwrap();

    assert_eq!(resources(&records, OutcomeStatus::Success), vec!["i-0001"]);
}

#[tokio::test]
async fn command_line_beats_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"tag_key": "env", "tag_value": "prod", "region": "eu-west-1"}"#,
    )
    .unwrap();
    let file = load_config_file(&path).unwrap();

    let cloud = five_instances(now());
    let records = orchestrator(&cloud)
        .run(
            Command::FilterInstances,
            &args(&[("tag_value", json!("dev"))]),
            &file,
            &mut MemoryAudit::new(),
        )
        .await
        .unwrap();
    assert_eq!(resources(&records, OutcomeStatus::Success), vec!["i-0002", "i-0004"]);

    let settings = GlobalSettings::from_config(&file)
        .unwrap()
        .overlay(Some("us-west-2".to_string()), None, None);
    assert_eq!(settings.region.as_deref(), Some("us-west-2"));
}

#[tokio::test]
async fn missing_config_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let file = load_config_file(&dir.path().join("absent.json")).unwrap();
    assert!(file.is_empty());

    let cloud = cloudsweep_test_utils::aged_bucket("archive", now());
    let records = orchestrator(&cloud)
        .run(
            Command::FilterObjects,
            &args(&[("bucket_name", json!("archive"))]),
            &file,
            &mut MemoryAudit::new(),
        )
        .await
        .unwrap();
    assert_eq!(count(&records, OutcomeStatus::Success), 4);
}

#[tokio::test]
async fn audit_file_accumulates_rows_under_one_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit/report.csv");
    let mut audit = CsvAuditLog::new(&path);
    let cloud = five_instances(now());
    let tag = args(&[("tag_key", json!("env")), ("tag_value", json!("dev"))]);

    orchestrator(&cloud)
        .run(Command::StopInstances, &tag, &config(&[]), &mut audit)
        .await
        .unwrap();
    // Everything tagged is stopped now, so the second run matches nothing
    orchestrator(&cloud)
        .run(Command::StopInstances, &tag, &config(&[]), &mut audit)
        .await
        .unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Service,Resource,Action,Status,Timestamp");
    assert!(lines[1].starts_with("EC2,i-0002,stop-instances,Success,"));
    assert!(lines[2].starts_with("EC2,i-0004,stop-instances,Success,"));
    assert!(lines[3].starts_with("EC2,,stop-instances,NoMatch,"));
}

#[tokio::test]
async fn config_errors_reach_the_audit_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("report.csv");
    let mut audit = CsvAuditLog::new(&path);
    let cloud = five_instances(now());

    let result = orchestrator(&cloud)
        .run(Command::DeleteFile, &no_args(), &config(&[]), &mut audit)
        .await;
    assert!(result.is_err());

    let content = fs::read_to_string(&path).unwrap();
    let rows: Vec<&str> = content.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("S3,,delete-file,Failed,"));
}

#[test]
fn unusable_config_file_is_audited() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, "[1,2]").unwrap();
    let audit_path = dir.path().join("report.csv");

    let err = RunError::from(load_config_file(&config_path).unwrap_err());
    assert!(matches!(err, RunError::Config(ConfigError::NotAnObject { .. })));
    record_failure(Command::DeleteFile, &err, &mut CsvAuditLog::new(&audit_path));

    let content = fs::read_to_string(&audit_path).unwrap();
    let rows: Vec<&str> = content.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("S3,,delete-file,Failed,"));
}

#[tokio::test]
async fn dry_run_writes_no_audit_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("report.csv");
    let mut audit = CsvAuditLog::new(&path);
    let cloud = five_instances(now());

    orchestrator(&cloud)
        .dry_run(true)
        .run(Command::ListInstances, &no_args(), &config(&[]), &mut audit)
        .await
        .unwrap();

    assert!(!path.exists());
    assert!(cloud.calls().is_empty());
}
