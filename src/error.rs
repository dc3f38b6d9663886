//! Error type of `spectral_hit`
//!
//! None of these errors is recovered locally. A distributed step
//! that failed half-way leaves the fields in an unspecified state,
//! so all of them end the run (see `main.rs`).
use crate::field::Decomp;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors of the solver
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration parameter
    #[error("invalid configuration `{key}`: {reason}")]
    Config {
        /// Offending key
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Grid and process count are incompatible
    #[error("topology error: {0}")]
    Topology(String),

    /// Field is in the wrong decomposition for the requested operation
    #[error("decomposition mismatch: expected {expected:?}, found {found:?}")]
    Layout {
        /// Decomposition the operation needs
        expected: Decomp,
        /// Decomposition of the supplied field
        found: Decomp,
    },

    /// Buffer shapes do not match the grid
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    Shape {
        /// Shape required by the grid
        expected: Vec<usize>,
        /// Shape of the supplied buffer
        found: Vec<usize>,
    },

    /// Data exchange failed or was called with malformed buffers
    #[error("communication failure: {0}")]
    Comm(String),

    /// A worker task of the transpose pipeline failed
    #[error("runtime failure: {0}")]
    Runtime(String),

    /// Simulation diverged
    #[error("non-finite {quantity} on rank {rank} at t = {time}")]
    NumericalInstability {
        /// Quantity that became non-finite
        quantity: &'static str,
        /// Rank that detected it
        rank: usize,
        /// Simulation time
        time: f64,
    },

    /// File system error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error of the hdf5 library
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),

    /// Configuration file is not valid toml
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for a configuration error
    pub fn config(key: &'static str, reason: impl Into<String>) -> Self {
        Error::Config {
            key,
            reason: reason.into(),
        }
    }
}
