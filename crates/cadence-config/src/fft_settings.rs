//! FFT batch engine settings.

use std::sync::Arc;

use cadence_fft::{BatchProcessor, CacheConfig, SpectrumCache, Window};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

fn default_cache_entries() -> usize {
    CacheConfig::default().max_entries
}

fn default_cache_bytes() -> usize {
    CacheConfig::default().max_bytes
}

fn default_window() -> String {
    "hann".to_string()
}

/// Worker pool, cache and framing settings for batch spectra.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FftSettings {
    /// Worker threads; unset uses the available parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Cached spectra limit; `0` disables the cache.
    #[serde(default = "default_cache_entries")]
    pub cache_entries: usize,

    /// Cache byte budget.
    #[serde(default = "default_cache_bytes")]
    pub cache_bytes: usize,

    /// Frame length for spectra; unset transforms whole signals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,

    /// Analysis window applied to each frame.
    #[serde(default = "default_window")]
    pub window: String,
}

impl Default for FftSettings {
    fn default() -> Self {
        Self {
            workers: None,
            cache_entries: default_cache_entries(),
            cache_bytes: default_cache_bytes(),
            size: None,
            window: default_window(),
        }
    }
}

impl FftSettings {
    /// Worker count after applying the default.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(BatchProcessor::default_workers)
    }

    /// Parsed analysis window.
    pub fn window_function(&self) -> Result<Window> {
        Window::from_name(&self.window).ok_or_else(|| {
            ConfigError::invalid_parameter(
                "fft",
                "window",
                format!("unknown window '{}'", self.window),
            )
        })
    }

    /// Start a batch processor with these settings.
    pub fn batch_processor(&self) -> Result<BatchProcessor> {
        let workers = self.worker_count();
        let processor = if self.cache_entries == 0 {
            BatchProcessor::new(workers)?
        } else {
            let cache = SpectrumCache::new(CacheConfig {
                max_entries: self.cache_entries,
                max_bytes: self.cache_bytes,
            })?;
            BatchProcessor::with_cache(workers, Arc::new(cache))?
        };
        tracing::debug!(
            workers,
            cache_entries = self.cache_entries,
            cache_bytes = self.cache_bytes,
            "batch processor configured"
        );
        Ok(processor)
    }
}
