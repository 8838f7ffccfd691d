//! Error types for configuration operations.

use std::path::PathBuf;

use cadence_core::CoreError;
use cadence_fft::FftError;
use thiserror::Error;

/// Errors that can occur while loading, saving or applying a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Unknown stage kind
    #[error("unknown stage kind: {0}")]
    UnknownStage(String),

    /// Invalid or missing stage parameter
    #[error("invalid parameter '{param}' for stage '{stage}': {reason}")]
    InvalidParameter {
        /// Kind of the stage containing the invalid parameter.
        stage: String,
        /// Name of the invalid parameter.
        param: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Pipeline construction failed
    #[error(transparent)]
    Core(#[from] CoreError),

    /// FFT engine settings were rejected
    #[error("invalid FFT settings: {0}")]
    Fft(#[from] FftError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(
        stage: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidParameter {
            stage: stage.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Attribute a core error to `stage`.
    ///
    /// Parameter errors become [`ConfigError::InvalidParameter`]; anything
    /// else is kept as [`ConfigError::Core`].
    pub fn in_stage(stage: &str, err: CoreError) -> Self {
        match err {
            CoreError::InvalidParameter { param, reason } => {
                Self::invalid_parameter(stage, param, reason)
            }
            other => ConfigError::Core(other),
        }
    }
}

/// Result alias for cadence-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
