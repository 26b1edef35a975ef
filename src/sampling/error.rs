//! Errors raised by sample generation and chain validation.

use super::sample::ChainBreak;
use chrono::NaiveDateTime;
use std::fmt;

/// A sample failed its chain check. Cycle-fatal, never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainValidationError {
    /// Global index of the sample that failed.
    pub index: usize,
    /// Timestamp of the failing sample.
    pub timestamp: Option<NaiveDateTime>,
    pub cause: ChainBreak,
}

impl fmt::Display for ChainValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp {
            Some(ts) => write!(
                f,
                "chain validation failed at sample {} ({}): {}",
                self.index,
                crate::time::format_timestamp(ts),
                self.cause
            ),
            None => write!(
                f,
                "chain validation failed at sample {}: {}",
                self.index, self.cause
            ),
        }
    }
}

impl std::error::Error for ChainValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    /// `start + interval * index` is not representable.
    TimestampOverflow { index: usize },
    /// Index past the end of the loaded collection.
    IndexOutOfRange { index: usize, len: usize },
    /// Value sum left the i128 range.
    SumOverflow { count: usize },
    Chain(ChainValidationError),
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimestampOverflow { index } => {
                write!(f, "timestamp overflow computing sample {}", index)
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "sample index {} out of range (len {})", index, len)
            }
            Self::SumOverflow { count } => {
                write!(f, "value sum overflow over {} samples", count)
            }
            Self::Chain(_) => write!(f, "sample chain broken"),
        }
    }
}

impl std::error::Error for GeneratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Chain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ChainValidationError> for GeneratorError {
    fn from(e: ChainValidationError) -> Self {
        Self::Chain(e)
    }
}
