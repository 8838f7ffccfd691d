//! Error taxonomy shared by every cadence-core operation.
//!
//! Every mutating operation validates before it commits, so any `Err` returned
//! from this crate leaves the receiver exactly as it was.

use thiserror::Error;

/// Errors raised by buffers, kernels, fan-out adapters and pipelines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A configuration value is out of range or malformed
    #[error("invalid parameter '{param}': {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        param: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A stage could not be added or does not match its saved state
    #[error("invalid stage {index}: {reason}")]
    InvalidStage {
        /// Position of the stage in the pipeline.
        index: usize,
        /// Description of the problem.
        reason: String,
    },

    /// Input or restored data does not have the required shape
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// What was being checked (e.g. "ring buffer restore").
        context: String,
        /// Required size.
        expected: usize,
        /// Size actually supplied.
        actual: usize,
    },

    /// A saved state has a different number of stages than the pipeline
    #[error("stage count mismatch: pipeline has {expected}, state has {actual}")]
    StageCountMismatch {
        /// Number of stages in the live pipeline.
        expected: usize,
        /// Number of stages in the saved state.
        actual: usize,
    },

    /// Serialized state is structurally malformed
    #[error("failed to decode state: {0}")]
    DecodeFailure(String),
}

impl CoreError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(param: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid stage error.
    pub fn invalid_stage(index: usize, reason: impl Into<String>) -> Self {
        CoreError::InvalidStage {
            index,
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        CoreError::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Create a decode failure.
    pub fn decode(reason: impl Into<String>) -> Self {
        CoreError::DecodeFailure(reason.into())
    }
}

/// Result alias for cadence-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
