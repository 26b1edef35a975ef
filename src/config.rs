//! Benchmark Configuration
//!
//! Immutable run parameters, built once at startup and handed to the
//! cycle runner. Defaults reproduce the reference workload.

use crate::time::{default_interval, default_start};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Samples generated and validated by each cycle.
pub const DEFAULT_SAMPLES_PER_CYCLE: usize = 222_222;

/// Upper bound on concurrent cycles regardless of core count.
pub const MAX_CYCLES: usize = 4;

/// Hardware threads visible to this process (at least 1).
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// `clamp(cores / 2, 1, MAX_CYCLES)`.
pub fn cycles_for_cores(cores: usize) -> usize {
    (cores / 2).clamp(1, MAX_CYCLES)
}

/// Deliberately break one sample's chain in one cycle, after load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultInjection {
    pub cycle: usize,
    pub sample_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Concurrent cycles to run.
    pub cycles: usize,
    pub samples_per_cycle: usize,
    /// Timestamp of sample 0 in every cycle.
    pub start: NaiveDateTime,
    /// Step between consecutive samples.
    pub interval: TimeDelta,
    pub fault: Option<FaultInjection>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            cycles: Self::default_cycles(),
            samples_per_cycle: DEFAULT_SAMPLES_PER_CYCLE,
            start: default_start(),
            interval: default_interval(),
            fault: None,
        }
    }
}

impl BenchConfig {
    /// Cycle count for this machine: `clamp(available_cores() / 2, 1, MAX_CYCLES)`.
    pub fn default_cycles() -> usize {
        cycles_for_cores(available_cores())
    }

    pub fn with_cycles(mut self, cycles: usize) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn with_samples(mut self, samples_per_cycle: usize) -> Self {
        self.samples_per_cycle = samples_per_cycle;
        self
    }

    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    pub fn with_interval(mut self, interval: TimeDelta) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_fault(mut self, cycle: usize, sample_index: usize) -> Self {
        self.fault = Some(FaultInjection {
            cycle,
            sample_index,
        });
        self
    }

    /// Fault targeting `cycle`, if any.
    pub fn fault_for(&self, cycle: usize) -> Option<FaultInjection> {
        self.fault.filter(|f| f.cycle == cycle)
    }
}
