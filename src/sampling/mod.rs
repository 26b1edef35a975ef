//! Sample generation and chain validation.

pub mod error;
pub mod generator;
pub mod sample;

pub use error::{ChainValidationError, GeneratorError};
pub use generator::SampleGenerator;
pub use sample::{ChainBreak, Sample, LOAD_SPIN_ITERATIONS, VALIDATE_SPIN_ITERATIONS};
