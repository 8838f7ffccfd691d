//! Error types for spectral operations.

use thiserror::Error;

/// Errors that can occur while planning or running transforms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FftError {
    /// A signal handed to the engine had no samples
    #[error("signal {index} is empty")]
    EmptyInput {
        /// Position of the offending signal in its batch (0 for single transforms).
        index: usize,
    },

    /// A half spectrum did not match the requested output length
    #[error("expected {expected} bins, got {actual}")]
    LengthMismatch {
        /// Number of bins required for the requested length.
        expected: usize,
        /// Number of bins supplied.
        actual: usize,
    },

    /// A worker panicked while transforming a signal
    #[error("worker failed while transforming signal {index}")]
    WorkerFailed {
        /// Position of the signal whose transform failed.
        index: usize,
    },

    /// The worker pool is no longer accepting jobs
    #[error("worker pool has shut down")]
    PoolShutDown,

    /// Invalid pool or cache configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
