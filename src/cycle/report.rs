//! Cycle and run reports, serializable for the JSON export.

use crate::time::{duration_millis, SampleValue};
use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn as_millis<S: Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(duration_millis(*elapsed))
}

/// Sums exceed what JSON consumers hold exactly in a double.
fn as_decimal_string<S: Serializer>(value: &SampleValue, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_string())
}

/// Statistics extracted from one completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: usize,
    #[serde(rename = "load_ms", serialize_with = "as_millis")]
    pub load_time: Duration,
    #[serde(rename = "validation_ms", serialize_with = "as_millis")]
    pub validation_time: Duration,
    #[serde(rename = "total_ms", serialize_with = "as_millis")]
    pub total_time: Duration,
    pub validated_count: usize,
    #[serde(serialize_with = "as_decimal_string")]
    pub value_sum: SampleValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(CycleReport),
    Failed { cycle: usize, error: String },
}

impl CycleOutcome {
    pub fn cycle(&self) -> usize {
        match self {
            Self::Completed(report) => report.cycle,
            Self::Failed { cycle, .. } => *cycle,
        }
    }

    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Whole-run summary, produced after every cycle has joined.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub cores: usize,
    pub cycles: usize,
    pub samples_per_cycle: usize,
    /// Indexed by cycle number.
    pub outcomes: Vec<CycleOutcome>,
    #[serde(rename = "total_elapsed_ms", serialize_with = "as_millis")]
    pub total_elapsed: Duration,
}

impl RunReport {
    pub fn completed(&self) -> impl Iterator<Item = &CycleReport> {
        self.outcomes.iter().filter_map(CycleOutcome::report)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn outcome(&self, cycle: usize) -> Option<&CycleOutcome> {
        self.outcomes.iter().find(|o| o.cycle() == cycle)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize run report")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write run report to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> RunReport {
        RunReport {
            cores: 8,
            cycles: 2,
            samples_per_cycle: 10,
            outcomes: vec![
                CycleOutcome::Completed(CycleReport {
                    cycle: 0,
                    load_time: Duration::from_micros(1_500),
                    validation_time: Duration::from_millis(3),
                    total_time: Duration::from_millis(5),
                    validated_count: 10,
                    value_sum: 13_955_560_624_647_864_222,
                }),
                CycleOutcome::Failed {
                    cycle: 1,
                    error: "chain validation failed at sample 3".to_string(),
                },
            ],
            total_elapsed: Duration::from_millis(7),
        }
    }

    #[test]
    fn test_outcome_accessors() {
        let report = sample_report();
        assert_eq!(report.completed().count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(report.outcome(1).unwrap().is_failed());
        assert!(report.outcome(2).is_none());
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample_report()).unwrap();
        let outcomes = value["outcomes"].as_array().unwrap();

        assert_eq!(outcomes[0]["status"], "completed");
        assert_eq!(outcomes[0]["value_sum"], "13955560624647864222");
        assert_eq!(outcomes[0]["load_ms"], 1.5);
        assert_eq!(outcomes[1]["status"], "failed");
        assert_eq!(outcomes[1]["cycle"], 1);
        assert_eq!(value["total_elapsed_ms"], 7.0);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        sample_report().write_json(&path).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["cycles"], 2);
    }
}
