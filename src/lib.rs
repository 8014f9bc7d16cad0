// Average-value initialization for alternating matrix factorization

#![doc = include_str!("../README.md")]

pub mod average_init;
pub mod error;
pub mod matrix_access;


pub use average_init::{
    AverageInitialization, FactorMatrix, FactorSelector, InitializationRule, InitializedFactor,
    InitializedFactors, SeedDerivation,
};
pub use error::{InitError, NumericDomainWarning};
pub use matrix_access::{scaled_mean, summarize, StoredElements, ValueSummary};
