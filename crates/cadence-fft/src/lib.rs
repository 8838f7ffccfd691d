//! Cadence FFT - spectral transforms for streaming pipelines
//!
//! This crate provides the spectral side of the cadence engine:
//!
//! - [`engine`] - Planner-backed forward/inverse transforms of any length,
//!   including a real-input variant returning the non-redundant half spectrum
//! - [`window`] - Window functions for spectral analysis and FIR design
//! - [`cache`] - Fingerprint-keyed LRU cache of computed spectra
//! - [`batch`] - Fixed worker pool that transforms many independent signals
//!   and returns results in submission order
//!
//! ## Example
//!
//! ```rust
//! use cadence_fft::{BatchProcessor, SpectrumCache, CacheConfig, Transform};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(SpectrumCache::new(CacheConfig::default()).unwrap());
//! let pool = BatchProcessor::with_cache(2, Arc::clone(&cache)).unwrap();
//!
//! let signals = vec![vec![1.0f32, 0.0, -1.0, 0.0], vec![1.0; 8]];
//! let spectra = pool.process_real(&signals).unwrap();
//! assert_eq!(spectra[0].len(), 3);
//! assert_eq!(spectra[1].len(), 5);
//! pool.shutdown();
//! ```

pub mod batch;
pub mod cache;
pub mod engine;
mod error;
pub mod window;

pub use batch::BatchProcessor;
pub use cache::{CacheConfig, CacheStats, Fingerprint, SpectrumCache};
pub use engine::{Direction, FftEngine, Spectrum, Transform, magnitude, magnitude_db};
pub use error::FftError;
pub use rustfft::num_complex::Complex32;
pub use window::Window;
