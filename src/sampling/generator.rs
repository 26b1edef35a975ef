//! Sample Generator
//!
//! Owns one ordered sample sequence per cycle.
//!
//! # Phases
//! - `load(n)`: builds `n` samples at `start + i * interval`, ascending.
//!   Each timestamp is a pure function of `i`, so loading fans out by index.
//! - `validate_all()`: partitioned parallel chain check over the loaded,
//!   now read-only collection. Partitions run in descending index order and
//!   read their predecessor from whichever partition owns `i - 1`.
//!
//! `load` and `validate_all` both take `&mut self`, and rayon joins all load
//! workers before `load` returns, so every write from loading happens-before
//! any read in validation.

use super::error::{ChainValidationError, GeneratorError};
use super::sample::Sample;
use crate::time::SampleValue;
use chrono::{NaiveDateTime, TimeDelta};
use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Partitions handed to each rayon worker, on average.
const PARTITIONS_PER_THREAD: usize = 4;

const NANOS_PER_SEC: i128 = 1_000_000_000;

#[derive(Debug)]
pub struct SampleGenerator {
    start: NaiveDateTime,
    interval: TimeDelta,
    /// Chronologically ascending: index i holds `start + i * interval`.
    samples: Vec<Sample>,
    validated_count: usize,
}

impl SampleGenerator {
    pub fn new(start: NaiveDateTime, interval: TimeDelta) -> Self {
        Self {
            start,
            interval,
            samples: Vec::new(),
            validated_count: 0,
        }
    }

    /// Pre-size the collection for `capacity` samples.
    pub fn with_capacity(start: NaiveDateTime, interval: TimeDelta, capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            ..Self::new(start, interval)
        }
    }

    /// `start + index * interval`, or `TimestampOverflow` when the result
    /// leaves chrono's calendar.
    pub fn timestamp_at(&self, index: usize) -> Result<NaiveDateTime, GeneratorError> {
        scaled(self.interval, index)
            .and_then(|offset| self.start.checked_add_signed(offset))
            .ok_or(GeneratorError::TimestampOverflow { index })
    }

    /// Replace any existing samples with `count` freshly loaded ones.
    pub fn load(&mut self, count: usize) -> Result<(), GeneratorError> {
        self.samples.clear();
        self.validated_count = 0;

        let this = &*self;
        let loaded = (0..count)
            .into_par_iter()
            .map(|i| this.timestamp_at(i).map(|ts| Sample::loaded(i == 0, ts)))
            .collect::<Result<Vec<_>, _>>()?;

        self.samples = loaded;
        debug!(count, "samples loaded");
        Ok(())
    }

    /// Validate every sample against its predecessor in parallel partitions.
    ///
    /// A failing partition stops at its first bad sample. Rayon stops
    /// starting new partitions once an error is seen, but partitions already
    /// running finish their own range. `validated_count` then holds the
    /// number of samples that passed before the pass stopped.
    pub fn validate_all(&mut self) -> Result<usize, GeneratorError> {
        let len = self.samples.len();
        let partition_len = partition_len(len, rayon::current_num_threads());
        let partitions = len.div_ceil(partition_len);
        debug!(len, partition_len, partitions, "validating samples");

        let validated = AtomicUsize::new(0);
        let samples = self.samples.as_slice();
        let interval = self.interval;

        let outcome = (0..partitions).into_par_iter().try_for_each(|p| {
            let lo = p * partition_len;
            let hi = (lo + partition_len).min(len);
            validate_partition(samples, lo..hi, interval, &validated)
        });

        self.validated_count = validated.load(Ordering::Acquire);
        outcome?;
        Ok(self.validated_count)
    }

    /// Exact sum of every sample value.
    pub fn sum_values(&self) -> Result<SampleValue, GeneratorError> {
        self.samples
            .iter()
            .try_fold(0 as SampleValue, |acc, s| acc.checked_add(s.value()))
            .ok_or(GeneratorError::SumOverflow {
                count: self.samples.len(),
            })
    }

    /// Rewrite one sample's timestamp, breaking the chain on purpose.
    pub fn overwrite_timestamp(
        &mut self,
        index: usize,
        timestamp: NaiveDateTime,
    ) -> Result<(), GeneratorError> {
        let len = self.samples.len();
        let sample = self
            .samples
            .get_mut(index)
            .ok_or(GeneratorError::IndexOutOfRange { index, len })?;
        sample.overwrite(timestamp);
        Ok(())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn validated_count(&self) -> usize {
        self.validated_count
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }
}

/// `interval * index`, with seconds and sub-second nanos scaled separately
/// in i128 so no intermediate is capped at i64 nanoseconds.
fn scaled(interval: TimeDelta, index: usize) -> Option<TimeDelta> {
    let secs = interval.num_seconds();
    let sub_nanos = (interval - TimeDelta::seconds(secs)).num_nanoseconds()?;

    let index = i128::try_from(index).ok()?;
    let total_nanos = (sub_nanos as i128).checked_mul(index)?;
    let total_secs = (secs as i128)
        .checked_mul(index)?
        .checked_add(total_nanos.div_euclid(NANOS_PER_SEC))?;
    let rem_nanos = total_nanos.rem_euclid(NANOS_PER_SEC) as u32;

    TimeDelta::new(i64::try_from(total_secs).ok()?, rem_nanos)
}

/// Contiguous partition length for `len` samples across `threads` workers.
fn partition_len(len: usize, threads: usize) -> usize {
    (len / (threads.max(1) * PARTITIONS_PER_THREAD)).max(1)
}

/// Validate `range` from its top index down. Index `i` is checked against
/// global `i - 1`, which may sit in another partition.
fn validate_partition(
    samples: &[Sample],
    range: Range<usize>,
    interval: TimeDelta,
    validated: &AtomicUsize,
) -> Result<(), ChainValidationError> {
    let mut local = 0usize;
    let mut outcome = Ok(());

    for i in range.rev() {
        let sample = &samples[i];
        let previous = i.checked_sub(1).and_then(|p| samples.get(p));
        if let Err(cause) = sample.validate(previous, interval) {
            outcome = Err(ChainValidationError {
                index: i,
                timestamp: sample.timestamp(),
                cause,
            });
            break;
        }
        local += 1;
    }

    validated.fetch_add(local, Ordering::AcqRel);
    outcome
}
