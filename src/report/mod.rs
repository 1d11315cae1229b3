use std::time::SystemTime;

use serde::Serialize;

use crate::runner::{RunStatus, ScenarioResult};

pub mod writer;

/// One line of the run report: one executed step of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub scenario: String,
    pub index: usize,
    pub step: String,
    pub started: SystemTime,
    pub elapsed_ms: u128,
    pub passed: bool,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
    /// Only set on the scenario's last executed step.
    pub status: Option<RunStatus>,
}

impl ReportEntry {
    pub fn from_result(result: &ScenarioResult) -> Vec<ReportEntry> {
        let last = result.steps.len().saturating_sub(1);
        result
            .steps
            .iter()
            .map(|record| ReportEntry {
                scenario: result.name.clone(),
                index: record.index,
                step: record.description.clone(),
                started: record.started,
                elapsed_ms: record.elapsed.as_millis(),
                passed: record.error.is_none(),
                error: record.error.clone(),
                error_kind: record.error_kind,
                status: (record.index == last).then_some(result.status),
            })
            .collect()
    }
}
