//! LRU cache of computed spectra.
//!
//! Entries are keyed by a [`Fingerprint`] of the input (content hash, length,
//! transform). The cache is bounded both by entry count and by byte budget;
//! whichever is exceeded first triggers least-recently-used eviction.
//!
//! A hit returns the exact spectrum computed on the miss, so caching never
//! changes numeric results. The input is retained alongside its spectrum and
//! compared on lookup, which turns a fingerprint collision into a miss.
//!
//! The cache is shared between batch workers. A single `parking_lot::Mutex`
//! guards the LRU map; it is held only for lookup and insertion, never for the
//! transform itself, and values are `Arc`s so a hit is a pointer copy.

use lru::LruCache;
use parking_lot::Mutex;
use rustfft::num_complex::Complex32;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::{Spectrum, Transform};
use crate::error::FftError;

const COMPLEX_BYTES: usize = std::mem::size_of::<Complex32>();

/// Content-derived cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    hash: u64,
    len: usize,
    transform: Transform,
}

impl Fingerprint {
    /// Fingerprint an input signal for a given transform.
    ///
    /// Hashes the bit patterns of every sample, so `-0.0` and `0.0` are
    /// distinct inputs.
    pub fn of(input: &[Complex32], transform: Transform) -> Self {
        let mut hasher = DefaultHasher::new();
        for c in input {
            c.re.to_bits().hash(&mut hasher);
            c.im.to_bits().hash(&mut hasher);
        }
        Self {
            hash: hasher.finish(),
            len: input.len(),
            transform,
        }
    }

    /// Number of samples in the fingerprinted input.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the fingerprinted input was empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Transform the entry was computed for.
    pub fn transform(&self) -> Transform {
        self.transform
    }
}

/// Cache budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached spectra.
    pub max_entries: usize,
    /// Maximum bytes held by inputs and spectra together.
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Counters reported by [`SpectrumCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a cached spectrum.
    pub hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Entries removed to stay within budget.
    pub evictions: u64,
    /// Entries currently cached.
    pub entries: usize,
    /// Bytes currently held.
    pub bytes: usize,
}

struct Entry {
    input: Arc<[Complex32]>,
    spectrum: Spectrum,
    bytes: usize,
}

struct Inner {
    map: LruCache<Fingerprint, Entry>,
    bytes: usize,
}

/// Thread-safe LRU cache of spectra.
pub struct SpectrumCache {
    inner: Mutex<Inner>,
    max_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SpectrumCache {
    /// Create a cache with the given budgets.
    ///
    /// # Errors
    ///
    /// Returns [`FftError::InvalidConfig`] if either budget is zero.
    pub fn new(config: CacheConfig) -> Result<Self, FftError> {
        let capacity = NonZeroUsize::new(config.max_entries)
            .ok_or_else(|| FftError::InvalidConfig("cache max_entries must be > 0".to_string()))?;
        if config.max_bytes == 0 {
            return Err(FftError::InvalidConfig(
                "cache max_bytes must be > 0".to_string(),
            ));
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                map: LruCache::new(capacity),
                bytes: 0,
            }),
            max_bytes: config.max_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Look up a spectrum, marking it most recently used on a hit.
    pub fn get(&self, key: &Fingerprint, input: &[Complex32]) -> Option<Spectrum> {
        let found = {
            let mut inner = self.inner.lock();
            inner
                .map
                .get(key)
                .filter(|entry| same_bits(&entry.input, input))
                .map(|entry| Arc::clone(&entry.spectrum))
        };
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Insert a freshly computed spectrum, evicting LRU entries past budget.
    ///
    /// Entries larger than the whole byte budget are not cached.
    pub fn insert(&self, key: Fingerprint, input: Arc<[Complex32]>, spectrum: Spectrum) {
        let bytes = (input.len() + spectrum.len()) * COMPLEX_BYTES;
        if bytes > self.max_bytes {
            tracing::trace!(bytes, "spectrum exceeds cache byte budget, not cached");
            return;
        }

        let mut evicted = 0u64;
        let mut inner = self.inner.lock();
        if let Some((old_key, old)) = inner.map.push(
            key,
            Entry {
                input,
                spectrum,
                bytes,
            },
        ) {
            inner.bytes -= old.bytes;
            if old_key != key {
                evicted += 1;
            }
        }
        inner.bytes += bytes;

        while inner.bytes > self.max_bytes {
            match inner.map.pop_lru() {
                Some((_, old)) => {
                    inner.bytes -= old.bytes;
                    evicted += 1;
                }
                None => break,
            }
        }
        drop(inner);

        if evicted > 0 {
            tracing::trace!(evicted, "spectrum cache evicted entries");
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
    }

    /// Return the cached spectrum for `input`, computing and inserting it on a miss.
    ///
    /// `compute` runs without the cache lock held.
    pub fn get_or_compute<F>(
        &self,
        transform: Transform,
        input: &Arc<[Complex32]>,
        compute: F,
    ) -> Result<Spectrum, FftError>
    where
        F: FnOnce() -> Result<Vec<Complex32>, FftError>,
    {
        let key = Fingerprint::of(input, transform);
        if let Some(hit) = self.get(&key, input) {
            return Ok(hit);
        }
        let spectrum: Spectrum = compute()?.into();
        self.insert(key, Arc::clone(input), Arc::clone(&spectrum));
        Ok(spectrum)
    }

    /// Drop every entry; counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.bytes = 0;
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of hit/miss/eviction counters and current occupancy.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: inner.map.len(),
            bytes: inner.bytes,
        }
    }
}

fn same_bits(a: &[Complex32], b: &[Complex32]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.re.to_bits() == y.re.to_bits() && x.im.to_bits() == y.im.to_bits()
        })
}
