//! Chainbench Library
//!
//! Generates ordered, timestamped sample sequences and chain-validates them
//! in parallel partitions, repeated across concurrent cycles.

pub mod config;
pub mod cycle;
pub mod logging;
pub mod sampling;
pub mod time;

pub use config::{BenchConfig, FaultInjection};
pub use cycle::{CycleOutcome, CycleReport, CycleRunner, RunReport};
pub use logging::{FileLogger, MemoryLog, ReportLog};
pub use sampling::{ChainValidationError, GeneratorError, Sample, SampleGenerator};
