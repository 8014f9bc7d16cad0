// src/error.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors returned by the initialization entry points.
///
/// Both variants are recoverable: the factorization driver decides whether to
/// abort its run or retry with corrected parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The input matrix has a zero dimension, or the requested rank is zero.
    /// Either would make the seed computation divide by zero.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The matrix selector for single-factor initialization was neither `W` nor `H`.
    #[error("Invalid argument: specify either 'H' or 'W' when initializing one of the W and H matrices (got {got:?})")]
    InvalidArgument { got: String },
}

impl InitError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        InitError::InvalidInput { reason: reason.into() }
    }
}

/// Non-fatal diagnostic raised when `(mean - min) / rank` is negative.
///
/// The square root of that quantity is undefined, so the seed is clamped to
/// zero and the factors are filled with plain uniform noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericDomainWarning {
    /// Mean of the input over its full `n * m` shape.
    pub mean: f64,
    /// Minimum over the stored elements (`f64::MAX` if none were stored).
    pub min: f64,
    /// Factorization rank.
    pub rank: usize,
}

impl NumericDomainWarning {
    /// The unclamped argument of the square root.
    pub fn unclamped_argument(&self) -> f64 {
        (self.mean - self.min) / self.rank as f64
    }
}

impl fmt::Display for NumericDomainWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(mean - min) / rank = ({} - {}) / {} is negative; seed clamped to 0",
            self.mean, self.min, self.rank
        )
    }
}
