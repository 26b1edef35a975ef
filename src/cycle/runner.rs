//! Cycle Runner
//!
//! Fans `config.cycles` independent generate-validate cycles out over the
//! rayon pool. Each cycle owns its own generator; nothing mutable is shared
//! between cycles. A failing cycle (error or panic) is logged and recorded,
//! and never stops its siblings or the final report.

use super::report::{CycleOutcome, CycleReport, RunReport};
use crate::config::{available_cores, BenchConfig, FaultInjection};
use crate::logging::ReportLog;
use crate::sampling::SampleGenerator;
use crate::time::{format_grouped, format_millis};
use anyhow::{Context, Result};
use chrono::TimeDelta;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info_span, warn};

pub struct CycleRunner {
    config: BenchConfig,
    log: Arc<dyn ReportLog>,
}

impl CycleRunner {
    pub fn new(config: BenchConfig, log: Arc<dyn ReportLog>) -> Self {
        Self { config, log }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run every cycle to completion or failure, then report total time.
    pub fn run(&self) -> RunReport {
        let started = Instant::now();
        let cores = available_cores();

        self.log.log(&format!(
            "Starting Execution on a {} core system. A total of {} cycles will be run",
            cores, self.config.cycles
        ));

        let outcomes: Vec<CycleOutcome> = (0..self.config.cycles)
            .into_par_iter()
            .map(|cycle| self.run_isolated(cycle))
            .collect();

        let total_elapsed = started.elapsed();
        self.log.log("-----");
        self.log.log(&format!(
            "Execution Finished. Total Elapsed Time: {} ms.",
            format_millis(total_elapsed)
        ));

        RunReport {
            cores,
            cycles: self.config.cycles,
            samples_per_cycle: self.config.samples_per_cycle,
            outcomes,
            total_elapsed,
        }
    }

    /// Run one cycle, converting errors and panics into a failed outcome.
    fn run_isolated(&self, cycle: usize) -> CycleOutcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle(cycle)))
            .unwrap_or_else(|payload| {
                Err(anyhow::anyhow!(
                    "cycle panicked: {}",
                    panic_message(payload.as_ref())
                ))
            });

        match result {
            Ok(report) => CycleOutcome::Completed(report),
            Err(e) => {
                error!(cycle, error = %format!("{:#}", e), "cycle failed");
                self.log
                    .log(&format!("Cycle {} Execution Failed!\n{:?}", cycle, e));
                CycleOutcome::Failed {
                    cycle,
                    error: format!("{:#}", e),
                }
            }
        }
    }

    /// Load, validate and sum one cycle's samples.
    pub fn run_cycle(&self, cycle: usize) -> Result<CycleReport> {
        let _span = info_span!("cycle", index = cycle).entered();
        let samples = self.config.samples_per_cycle;
        let cycle_started = Instant::now();

        let mut generator =
            SampleGenerator::with_capacity(self.config.start, self.config.interval, samples);

        self.log.log(&format!("Cycle {} Started Sample Load.", cycle));
        let timer = Instant::now();
        generator
            .load(samples)
            .with_context(|| format!("cycle {} failed to load {} samples", cycle, samples))?;
        let load_time = timer.elapsed();
        self.log.log(&format!(
            "Cycle {} Finished Sample Load. Load Time: {} ms.",
            cycle,
            format_millis(load_time)
        ));

        if let Some(fault) = self.config.fault_for(cycle) {
            inject_fault(&mut generator, fault)
                .with_context(|| format!("cycle {} failed to inject fault", cycle))?;
        }

        self.log
            .log(&format!("Cycle {} Started Sample Validation.", cycle));
        let timer = Instant::now();
        let validated_count = generator
            .validate_all()
            .with_context(|| format!("cycle {} failed sample validation", cycle))?;
        let validation_time = timer.elapsed();
        self.log.log(&format!(
            "Cycle {} Finished Sample Validation. Total Samples Validated: {}. Validation Time: {} ms.",
            cycle,
            validated_count,
            format_millis(validation_time)
        ));

        let value_sum = generator
            .sum_values()
            .with_context(|| format!("cycle {} failed to sum sample values", cycle))?;
        self.log.log(&format!(
            "Cycle {} Sum of All Samples: {}.",
            cycle,
            format_grouped(value_sum)
        ));

        let total_time = cycle_started.elapsed();
        self.log.log(&format!(
            "Cycle {} Finished. Total Cycle Time: {} ms.",
            cycle,
            format_millis(total_time)
        ));

        Ok(CycleReport {
            cycle,
            load_time,
            validation_time,
            total_time,
            validated_count,
            value_sum,
        })
    }
}

/// Shift one sample by a second so both chain links touching it break.
fn inject_fault(generator: &mut SampleGenerator, fault: FaultInjection) -> Result<()> {
    let original = generator.timestamp_at(fault.sample_index)?;
    warn!(
        cycle = fault.cycle,
        sample_index = fault.sample_index,
        "injecting chain fault"
    );
    let shifted = original
        .checked_add_signed(TimeDelta::seconds(1))
        .context("fault timestamp out of calendar range")?;
    generator.overwrite_timestamp(fault.sample_index, shifted)?;
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLog;
    use chrono::NaiveDateTime;

    fn runner(config: BenchConfig) -> (CycleRunner, Arc<MemoryLog>) {
        let log = Arc::new(MemoryLog::new());
        (CycleRunner::new(config, log.clone()), log)
    }

    #[test]
    fn test_run_cycle_logs_phases_in_order() {
        let (runner, log) = runner(BenchConfig::default().with_cycles(1).with_samples(10));
        let report = runner.run_cycle(0).unwrap();

        assert_eq!(report.validated_count, 10);
        assert_eq!(report.value_sum, 627_667_538_110_010);

        let lines = log.messages();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Cycle 0 Started Sample Load.");
        assert!(lines[1].starts_with("Cycle 0 Finished Sample Load. Load Time: "));
        assert_eq!(lines[2], "Cycle 0 Started Sample Validation.");
        assert!(lines[3].contains("Total Samples Validated: 10."));
        assert_eq!(lines[4], "Cycle 0 Sum of All Samples: 627,667,538,110,010.");
        assert!(lines[5].starts_with("Cycle 0 Finished. Total Cycle Time: "));
    }

    #[test]
    fn test_fault_out_of_range_fails_cycle() {
        let config = BenchConfig::default()
            .with_cycles(1)
            .with_samples(5)
            .with_fault(0, 5);
        let (runner, _log) = runner(config);
        let err = runner.run_cycle(0).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to inject fault"));
    }

    #[test]
    fn test_fault_at_calendar_end_is_an_error() {
        let config = BenchConfig::default()
            .with_cycles(1)
            .with_samples(1)
            .with_start(NaiveDateTime::MAX)
            .with_fault(0, 0);
        let (runner, _log) = runner(config);

        let err = runner.run_cycle(0).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("failed to inject fault"), "{}", message);
        assert!(message.contains("out of calendar range"), "{}", message);
        assert!(!message.contains("panicked"));
    }

    #[test]
    fn test_failed_cycle_is_logged_with_detail() {
        let config = BenchConfig::default()
            .with_cycles(1)
            .with_samples(20)
            .with_fault(0, 19);
        let (runner, log) = runner(config);
        let report = runner.run();

        assert_eq!(report.failed_count(), 1);
        let failures = log.with_prefix("Cycle 0 Execution Failed!");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("chain validation failed at sample 19"));
        assert!(log.messages().last().unwrap().starts_with("Execution Finished."));
    }

    #[test]
    fn test_zero_cycles_still_reports() {
        let (runner, log) = runner(BenchConfig::default().with_cycles(0));
        let report = runner.run();
        assert!(report.outcomes.is_empty());
        assert_eq!(log.messages().len(), 3);
    }

    #[test]
    fn test_panic_message_payloads() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
