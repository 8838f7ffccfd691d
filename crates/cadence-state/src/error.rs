//! Error types for state encoding, decoding and storage.

use cadence_core::CoreError;
use thiserror::Error;

/// Errors raised while persisting or restoring pipeline state.
#[derive(Debug, Error)]
pub enum StateError {
    /// Input is not a well-formed state record
    #[error("failed to decode state: {0}")]
    Decode(String),

    /// JSON encoding failed
    #[error("failed to encode JSON state: {0}")]
    Json(#[source] serde_json::Error),

    /// Binary encoding failed
    #[error("failed to encode binary state: {0}")]
    Binary(#[source] bincode::Error),

    /// The decoded state does not fit the pipeline
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Store key is empty or not a plain name
    #[error("invalid store key '{0}'")]
    InvalidKey(String),

    /// Blob store I/O failed
    #[error("store error for key '{key}': {source}")]
    Store {
        /// Key being read or written.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl StateError {
    /// Create a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        StateError::Decode(reason.into())
    }

    /// Create a store error.
    pub fn store(key: impl Into<String>, source: std::io::Error) -> Self {
        StateError::Store {
            key: key.into(),
            source,
        }
    }

    /// True for malformed input, whether caught by the codec or by the core.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            StateError::Decode(_) | StateError::Core(CoreError::DecodeFailure(_))
        )
    }
}

impl From<StateError> for CoreError {
    /// Collapse into the core taxonomy, where every codec failure is a
    /// [`CoreError::DecodeFailure`].
    fn from(err: StateError) -> Self {
        match err {
            StateError::Core(core) => core,
            other => CoreError::decode(other.to_string()),
        }
    }
}

/// Result alias for cadence-state operations.
pub type Result<T> = std::result::Result<T, StateError>;
