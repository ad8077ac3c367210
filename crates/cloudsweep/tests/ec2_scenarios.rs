//! EC2 scenarios against the in-memory cloud

mod common;

use cloudsweep::{Command, ConfigError, MemoryAudit, RunError, WaitConfig};
use cloudsweep_common::{ActionKind, OutcomeStatus, ProviderError, ResourceState};
use cloudsweep_test_utils::{Call, five_instances};
use common::*;
use serde_json::json;

#[tokio::test]
async fn stop_by_tag_stops_exactly_the_matching_instances() {
    let cloud = five_instances(now());
    let mut audit = MemoryAudit::new();

    let records = orchestrator(&cloud)
        .run(
            Command::StopInstances,
            &args(&[("tag_key", json!("env")), ("tag_value", json!("dev"))]),
            &config(&[]),
            &mut audit,
        )
        .await
        .unwrap();

    assert_eq!(
        outcomes(&records),
        vec![
            (Some("i-0002".to_string()), OutcomeStatus::Success),
            (Some("i-0004".to_string()), OutcomeStatus::Success),
        ]
    );
    // Intermediate polls leave no trace in the audit
    assert_eq!(audit.records, records);
    assert!(records.iter().all(|r| r.action == "stop-instances"));

    assert_eq!(cloud.issue_calls(), vec![(ActionKind::Stop, vec!["i-0002".to_string(), "i-0004".to_string()])]);
    assert_eq!(cloud.instance_state("i-0002"), Some(ResourceState::Stopped));
    assert_eq!(cloud.instance_state("i-0004"), Some(ResourceState::Stopped));
    assert_eq!(cloud.instance_state("i-0001"), Some(ResourceState::Running));
    assert_eq!(cloud.instance_state("i-0005"), Some(ResourceState::Running));
}

#[tokio::test]
async fn filter_instances_only_reports_running_matches() {
    let cloud = five_instances(now());
    let records = orchestrator(&cloud)
        .run(
            Command::FilterInstances,
            &args(&[("tag_key", json!("env")), ("tag_value", json!("dev"))]),
            &config(&[]),
            &mut MemoryAudit::new(),
        )
        .await
        .unwrap();

    assert_eq!(resources(&records, OutcomeStatus::Success), vec!["i-0002", "i-0004"]);
    assert!(records.iter().all(|r| r.detail.as_deref() == Some("running")));
    assert!(cloud.issue_calls().is_empty());
}

#[tokio::test]
async fn list_instances_reports_every_instance() {
    let cloud = five_instances(now());
    let records = orchestrator(&cloud)
        .run(Command::ListInstances, &no_args(), &config(&[]), &mut MemoryAudit::new())
        .await
        .unwrap();

    assert_eq!(count(&records, OutcomeStatus::Success), 5);
    assert_eq!(records[2].resource.as_deref(), Some("i-0003"));
    assert_eq!(records[2].detail.as_deref(), Some("stopped"));
}

#[tokio::test]
async fn unmatched_tag_emits_one_no_match() {
    let cloud = five_instances(now());
    let mut audit = MemoryAudit::new();

    let records = orchestrator(&cloud)
        .run(
            Command::StopInstances,
            &args(&[("tag_key", json!("env")), ("tag_value", json!("staging"))]),
            &config(&[]),
            &mut audit,
        )
        .await
        .unwrap();

    assert_eq!(outcomes(&records), vec![(None, OutcomeStatus::NoMatch)]);
    assert_eq!(audit.records.len(), 1);
    assert!(cloud.issue_calls().is_empty());
    assert_eq!(cloud.poll_count(), 0);
}

#[tokio::test]
async fn one_malformed_id_does_not_sink_the_batch() {
    let cloud = five_instances(now()).reject_requests_with(
        "i-bad",
        ProviderError::Malformed {
            message: "InvalidInstanceID.Malformed: i-bad".to_string(),
        },
    );

    let records = orchestrator(&cloud)
        .run(
            Command::StopInstances,
            &args(&[("instance_ids", json!(["i-0001", "i-bad", "i-0005"]))]),
            &config(&[]),
            &mut MemoryAudit::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcomes(&records),
        vec![
            (Some("i-0001".to_string()), OutcomeStatus::Success),
            (Some("i-bad".to_string()), OutcomeStatus::Failed),
            (Some("i-0005".to_string()), OutcomeStatus::Success),
        ]
    );
    assert_eq!(resources(&records, OutcomeStatus::Success), vec!["i-0001", "i-0005"]);
    assert_eq!(cloud.instance_state("i-0001"), Some(ResourceState::Stopped));
}

#[tokio::test]
async fn explicit_ids_skip_selection() {
    let cloud = five_instances(now());
    let records = orchestrator(&cloud)
        .run(
            Command::StopInstances,
            &args(&[("instance_ids", json!("i-0005, i-9999"))]),
            &config(&[]),
            &mut MemoryAudit::new(),
        )
        .await
        .unwrap();

    assert!(!cloud.calls().iter().any(|c| matches!(c, Call::Enumerate { .. })));
    assert_eq!(resources(&records, OutcomeStatus::Success), vec!["i-0005"]);
    let failed: Vec<_> = records.iter().filter(|r| r.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].resource.as_deref(), Some("i-9999"));
    assert!(failed[0].detail.as_deref().unwrap().contains("InvalidInstanceID.NotFound"));
}

#[tokio::test]
async fn instance_ids_can_come_from_config() {
    let cloud = five_instances(now());
    let records = orchestrator(&cloud)
        .run(
            Command::StopInstances,
            &no_args(),
            &config(&[("instance_ids", json!(["i-0001"]))]),
            &mut MemoryAudit::new(),
        )
        .await
        .unwrap();

    assert_eq!(resources(&records, OutcomeStatus::Success), vec!["i-0001"]);
}

#[tokio::test]
async fn stuck_instance_times_out_as_failed() {
    let cloud = five_instances(now()).script_polls("i-0002", vec![Ok(ResourceState::Stopping); 10]);

    let records = orchestrator(&cloud)
        .with_wait(WaitConfig::immediate(3))
        .run(
            Command::StopInstances,
            &args(&[("tag_key", json!("env")), ("tag_value", json!("dev"))]),
            &config(&[]),
            &mut MemoryAudit::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcomes(&records),
        vec![
            (Some("i-0002".to_string()), OutcomeStatus::Failed),
            (Some("i-0004".to_string()), OutcomeStatus::Success),
        ]
    );
    assert!(records[0].detail.as_deref().unwrap().contains("timed out after 3 checks"));
}

#[tokio::test]
async fn terminated_during_stop_is_failed() {
    let cloud = five_instances(now()).script_polls("i-0004", vec![Ok(ResourceState::Terminated)]);

    let records = orchestrator(&cloud)
        .run(
            Command::StopInstances,
            &args(&[("tag_key", json!("env")), ("tag_value", json!("dev"))]),
            &config(&[]),
            &mut MemoryAudit::new(),
        )
        .await
        .unwrap();

    assert_eq!(resources(&records, OutcomeStatus::Failed), vec!["i-0004"]);
    assert!(records.iter().any(|r| r.detail.as_deref() == Some("resource entered terminated state")));
}

#[tokio::test]
async fn half_a_tag_pair_is_a_config_error() {
    let cloud = five_instances(now());
    let mut audit = MemoryAudit::new();

    let err = orchestrator(&cloud)
        .run(
            Command::StopInstances,
            &args(&[("tag_key", json!("env"))]),
            &config(&[]),
            &mut audit,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::Config(ConfigError::MissingOption { option: "tag_value", .. })
    ));
    assert!(cloud.calls().is_empty());
    assert_eq!(outcomes(&audit.records), vec![(None, OutcomeStatus::Failed)]);
}

#[tokio::test]
async fn failed_listing_is_recorded_and_returned() {
    let cloud = five_instances(now()).fail_listing(ProviderError::AccessDenied {
        message: "UnauthorizedOperation".to_string(),
    });
    let mut audit = MemoryAudit::new();

    let err = orchestrator(&cloud)
        .run(Command::ListInstances, &no_args(), &config(&[]), &mut audit)
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Provider(ProviderError::AccessDenied { .. })));
    assert_eq!(audit.records.len(), 1);
    assert_eq!(audit.records[0].status, OutcomeStatus::Failed);
    assert!(audit.records[0].detail.as_deref().unwrap().contains("UnauthorizedOperation"));
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let cloud = five_instances(now());
    let mut audit = MemoryAudit::new();

    let records = orchestrator(&cloud)
        .dry_run(true)
        .run(
            Command::StopInstances,
            &args(&[("tag_key", json!("env")), ("tag_value", json!("dev"))]),
            &config(&[]),
            &mut audit,
        )
        .await
        .unwrap();

    assert!(records.is_empty());
    assert!(audit.records.is_empty());
    assert!(cloud.calls().is_empty());
    assert_eq!(cloud.instance_state("i-0002"), Some(ResourceState::Running));
}
