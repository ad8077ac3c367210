//! Shared helpers for scenario tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use cloudsweep::{Orchestrator, WaitConfig};
use cloudsweep_common::{Cloud, OutcomeRecord, OutcomeStatus};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Fixed clock for every scenario
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
}

/// Option map from `(name, value)` pairs
pub fn args(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Config object from `(key, value)` pairs
pub fn config(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Orchestrator with the fixed clock and no confirmation delays
pub fn orchestrator<C: Cloud>(cloud: &C) -> Orchestrator<'_, C> {
    Orchestrator::new(cloud).with_now(now()).with_wait(WaitConfig::immediate(5))
}

/// `(resource, status)` pairs, for comparing runs without timestamps
pub fn outcomes(records: &[OutcomeRecord]) -> Vec<(Option<String>, OutcomeStatus)> {
    records.iter().map(|r| (r.resource.clone(), r.status)).collect()
}

pub fn count(records: &[OutcomeRecord], status: OutcomeStatus) -> usize {
    records.iter().filter(|r| r.status == status).count()
}

pub fn resources(records: &[OutcomeRecord], status: OutcomeStatus) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.status == status)
        .filter_map(|r| r.resource.clone())
        .collect()
}

pub fn no_args() -> BTreeMap<String, Value> {
    BTreeMap::new()
}
