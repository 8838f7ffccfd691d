//! Configuration for cadence pipelines.
//!
//! Pipelines are described in TOML: a name, a sample rate, FFT engine
//! settings and an ordered list of stages. A [`PipelineConfig`] resolves into
//! validated [`StageDescriptor`](cadence_core::StageDescriptor)s and from there
//! into a configured [`Pipeline`](cadence_core::Pipeline).
//!
//! # Features
//!
//! - **Stage configs**: flat `kind` + parameter tables, with filter design
//!   (windowed-sinc FIR, Butterworth, Chebyshev I, cookbook biquads) done at
//!   load time for the configured sample rate
//! - **FFT settings**: worker count and cache budgets for batch spectra
//! - **Built-in configs**: ready-made feature chains
//!
//! # Example
//!
//! ```rust
//! use cadence_config::{PipelineConfig, StageConfig};
//! use cadence_core::ProcessOptions;
//!
//! let config = PipelineConfig::new("envelope")
//!     .with_sample_rate(1000.0)
//!     .with_stage(
//!         StageConfig::new("butterworth")
//!             .with_response("highpass")
//!             .with_order(2)
//!             .with_cutoff(20.0),
//!     )
//!     .with_stage(StageConfig::new("rms").with_window_size(50));
//!
//! let mut pipeline = config.build_pipeline().unwrap();
//! let out = pipeline.process(&[0.5; 200], None, ProcessOptions::default()).unwrap();
//! assert_eq!(out.len(), 200);
//!
//! let text = config.to_toml().unwrap();
//! assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
//! ```

mod error;
mod fft_settings;
mod pipeline_config;
mod stage_config;

/// Built-in configurations bundled with the library.
pub mod builtin;

pub use builtin::{BUILTIN_NAMES, builtin_configs, get_builtin, is_builtin};
pub use error::{ConfigError, Result};
pub use fft_settings::FftSettings;
pub use pipeline_config::PipelineConfig;
pub use stage_config::{DEFAULT_Q, STAGE_KINDS, StageConfig};
