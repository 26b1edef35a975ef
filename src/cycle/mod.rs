//! Multi-cycle orchestration and reporting.

pub mod report;
pub mod runner;

pub use report::{CycleOutcome, CycleReport, RunReport};
pub use runner::CycleRunner;
