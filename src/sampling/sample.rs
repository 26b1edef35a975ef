//! Sample
//!
//! One timestamped observation and the value derived from it.
//!
//! # Lifecycle
//! - `Sample::new(is_first)` creates an empty sample
//! - `load_at()` sets timestamp + value exactly once, under an exclusive borrow
//! - `validate()` runs against a shared borrow so partitions can read
//!   neighbours while marking themselves validated

use crate::time::{self, SampleValue};
use chrono::{NaiveDateTime, TimeDelta};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Spin iterations paid by every `load_at()` call.
pub const LOAD_SPIN_ITERATIONS: u32 = 1_000;

/// Spin iterations paid by every `validate()` call.
pub const VALIDATE_SPIN_ITERATIONS: u32 = 5_000;

/// Fixed CPU cost. `black_box` keeps the loop alive under optimization.
#[inline(never)]
fn spin(iterations: u32) {
    for i in 0..iterations {
        std::hint::black_box(i);
    }
}

/// Why a single sample failed its chain check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainBreak {
    /// Sample was validated before `load_at()` ran.
    NotLoaded,
    /// No predecessor, and the sample is not marked first.
    MissingPredecessor,
    /// Predecessor's timestamp is not exactly one interval earlier.
    IntervalMismatch {
        expected_previous: Option<NaiveDateTime>,
        actual_previous: Option<NaiveDateTime>,
    },
}

fn fmt_opt_ts(ts: &Option<NaiveDateTime>) -> String {
    ts.map(time::format_timestamp)
        .unwrap_or_else(|| "<none>".to_string())
}

impl fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "sample validated before it was loaded"),
            Self::MissingPredecessor => {
                write!(f, "no previous sample and sample is not the first")
            }
            Self::IntervalMismatch {
                expected_previous,
                actual_previous,
            } => write!(
                f,
                "previous timestamp {} != expected {}",
                fmt_opt_ts(actual_previous),
                fmt_opt_ts(expected_previous)
            ),
        }
    }
}

impl std::error::Error for ChainBreak {}

#[derive(Debug)]
pub struct Sample {
    is_first: bool,
    timestamp: Option<NaiveDateTime>,
    value: SampleValue,
    validated: AtomicBool,
}

impl Sample {
    pub fn new(is_first: bool) -> Self {
        Self {
            is_first,
            timestamp: None,
            value: 0,
            validated: AtomicBool::new(false),
        }
    }

    /// Construct and load in one step.
    pub fn loaded(is_first: bool, timestamp: NaiveDateTime) -> Self {
        let mut sample = Self::new(is_first);
        sample.load_at(timestamp);
        sample
    }

    /// Set timestamp and derived value, then pay the fixed load cost.
    pub fn load_at(&mut self, timestamp: NaiveDateTime) {
        self.timestamp = Some(timestamp);
        self.value = time::value_at(timestamp);

        spin(LOAD_SPIN_ITERATIONS);
    }

    /// Chain check against the predecessor. The validation cost is paid on
    /// every call, pass or fail.
    pub fn validate(
        &self,
        previous: Option<&Sample>,
        interval: TimeDelta,
    ) -> Result<(), ChainBreak> {
        spin(VALIDATE_SPIN_ITERATIONS);

        let current = self.timestamp.ok_or(ChainBreak::NotLoaded)?;

        match previous {
            None if !self.is_first => return Err(ChainBreak::MissingPredecessor),
            None => {}
            Some(prev) => {
                let expected = current.checked_sub_signed(interval);
                if expected.is_none() || prev.timestamp != expected {
                    return Err(ChainBreak::IntervalMismatch {
                        expected_previous: expected,
                        actual_previous: prev.timestamp,
                    });
                }
            }
        }

        self.validated.store(true, Ordering::Release);
        Ok(())
    }

    /// Rewrite timestamp + value without the load cost and clear the
    /// validated flag. Fault injection only.
    pub(crate) fn overwrite(&mut self, timestamp: NaiveDateTime) {
        self.timestamp = Some(timestamp);
        self.value = time::value_at(timestamp);
        *self.validated.get_mut() = false;
    }

    #[inline]
    pub fn is_first(&self) -> bool {
        self.is_first
    }

    #[inline]
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }

    #[inline]
    pub fn value(&self) -> SampleValue {
        self.value
    }

    #[inline]
    pub fn is_validated(&self) -> bool {
        self.validated.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::default_start;

    #[test]
    fn test_load_sets_timestamp_and_value() {
        let mut sample = Sample::new(true);
        assert_eq!(sample.timestamp(), None);

        sample.load_at(default_start());
        assert_eq!(sample.timestamp(), Some(default_start()));
        assert_eq!(sample.value(), 62_766_752_461_001);
        assert!(!sample.is_validated());
    }

    #[test]
    fn test_first_sample_validates_without_predecessor() {
        let sample = Sample::loaded(true, default_start());
        assert_eq!(sample.validate(None, TimeDelta::minutes(5)), Ok(()));
        assert!(sample.is_validated());
    }

    #[test]
    fn test_non_first_without_predecessor_fails() {
        let sample = Sample::loaded(false, default_start());
        assert_eq!(
            sample.validate(None, TimeDelta::minutes(5)),
            Err(ChainBreak::MissingPredecessor)
        );
        assert!(!sample.is_validated());
    }

    #[test]
    fn test_consecutive_pair_validates() {
        let interval = TimeDelta::minutes(5);
        let prev = Sample::loaded(true, default_start());
        let next = Sample::loaded(false, default_start() + interval);
        assert_eq!(next.validate(Some(&prev), interval), Ok(()));
        assert!(next.is_validated());
    }

    #[test]
    fn test_gap_reports_expected_and_actual() {
        let interval = TimeDelta::minutes(5);
        let prev = Sample::loaded(true, default_start());
        let next = Sample::loaded(false, default_start() + interval * 2);

        let err = next.validate(Some(&prev), interval).unwrap_err();
        assert_eq!(
            err,
            ChainBreak::IntervalMismatch {
                expected_previous: Some(default_start() + interval),
                actual_previous: Some(default_start()),
            }
        );
        assert!(err.to_string().contains("1990-01-01T01:06:01.001"));
    }

    #[test]
    fn test_unloaded_sample_fails() {
        let sample = Sample::new(true);
        assert_eq!(
            sample.validate(None, TimeDelta::minutes(5)),
            Err(ChainBreak::NotLoaded)
        );
    }

    #[test]
    fn test_overwrite_clears_validated() {
        let mut sample = Sample::loaded(true, default_start());
        sample.validate(None, TimeDelta::minutes(5)).unwrap();
        sample.overwrite(default_start() + TimeDelta::seconds(1));
        assert!(!sample.is_validated());
        assert_eq!(sample.value(), 62_766_752_462_001);
    }
}
