//! Parallel batch transforms over a fixed worker pool.
//!
//! [`BatchProcessor`] owns its workers: they are spawned once in the
//! constructor, reused for every batch, and joined by [`shutdown`] or on drop.
//! There is no global pool.
//!
//! # Ordering
//!
//! A batch of N signals is submitted as N jobs, each carrying its submission
//! index. Every job writes its result into a pre-sized slot array at that index
//! (`OnceLock` per slot, so no slot is ever written twice), and the worker that
//! completes the last job signals the caller over a channel. Results therefore
//! come back in submission order no matter which worker finishes first.
//!
//! ```text
//! caller ──jobs──▶ [worker 0] ─┐
//!                  [worker 1] ─┼─▶ slots[index] ──(last one)──▶ done ──▶ caller
//!                  [worker n] ─┘
//! ```
//!
//! [`shutdown`]: BatchProcessor::shutdown

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use rustfft::num_complex::Complex32;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crate::cache::SpectrumCache;
use crate::engine::{FftEngine, Spectrum, Transform};
use crate::error::FftError;

/// Result slots shared by the jobs of one batch.
struct BatchSlots {
    slots: Vec<OnceLock<Result<Spectrum, FftError>>>,
    remaining: AtomicUsize,
    done: Sender<()>,
}

struct Job {
    index: usize,
    input: Arc<[Complex32]>,
    transform: Transform,
    batch: Arc<BatchSlots>,
}

/// Fixed-size worker pool for batch FFTs, with an optional shared cache.
pub struct BatchProcessor {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    engine: Arc<FftEngine>,
    cache: Option<Arc<SpectrumCache>>,
}

impl BatchProcessor {
    /// Create a pool with `workers` threads and no cache.
    ///
    /// # Errors
    ///
    /// Returns [`FftError::InvalidConfig`] if `workers` is zero or a thread
    /// cannot be spawned.
    pub fn new(workers: usize) -> Result<Self, FftError> {
        Self::build(workers, None)
    }

    /// Create a pool whose workers consult `cache` before transforming.
    pub fn with_cache(workers: usize, cache: Arc<SpectrumCache>) -> Result<Self, FftError> {
        Self::build(workers, Some(cache))
    }

    /// Pool sized to the available hardware threads.
    pub fn default_workers() -> usize {
        thread::available_parallelism().map_or(1, |n| n.get())
    }

    fn build(workers: usize, cache: Option<Arc<SpectrumCache>>) -> Result<Self, FftError> {
        if workers == 0 {
            return Err(FftError::InvalidConfig(
                "worker count must be > 0".to_string(),
            ));
        }

        let engine = Arc::new(FftEngine::new());
        let (tx, rx) = unbounded::<Job>();
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let rx = rx.clone();
            let engine = Arc::clone(&engine);
            let cache = cache.clone();
            let handle = thread::Builder::new()
                .name(format!("cadence-fft-{id}"))
                .spawn(move || worker_loop(&rx, &engine, cache.as_deref()))
                .map_err(|e| FftError::InvalidConfig(format!("failed to spawn worker: {e}")))?;
            handles.push(handle);
        }

        tracing::debug!(workers, cached = cache.is_some(), "fft pool started");

        Ok(Self {
            jobs: Some(tx),
            workers: handles,
            engine,
            cache,
        })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// The shared cache, if any.
    pub fn cache(&self) -> Option<&Arc<SpectrumCache>> {
        self.cache.as_ref()
    }

    /// The engine the workers share (plans are reused across batches).
    pub fn engine(&self) -> &Arc<FftEngine> {
        &self.engine
    }

    /// Transform every signal; results are in submission order.
    ///
    /// # Errors
    ///
    /// [`FftError::EmptyInput`] if any signal is empty (nothing is submitted),
    /// [`FftError::WorkerFailed`] if a transform panicked,
    /// [`FftError::PoolShutDown`] if the workers are gone.
    pub fn process(
        &self,
        signals: &[Vec<Complex32>],
        transform: Transform,
    ) -> Result<Vec<Spectrum>, FftError> {
        let inputs: Vec<Arc<[Complex32]>> = signals.iter().map(|s| Arc::from(s.as_slice())).collect();
        self.submit(inputs, transform)
    }

    /// Real-input forward transforms; each result has `len/2 + 1` bins.
    pub fn process_real(&self, signals: &[Vec<f32>]) -> Result<Vec<Spectrum>, FftError> {
        let inputs: Vec<Arc<[Complex32]>> = signals
            .iter()
            .map(|s| s.iter().map(|&x| Complex32::new(x, 0.0)).collect::<Vec<_>>().into())
            .collect();
        self.submit(inputs, Transform::RealForward)
    }

    fn submit(
        &self,
        inputs: Vec<Arc<[Complex32]>>,
        transform: Transform,
    ) -> Result<Vec<Spectrum>, FftError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(index) = inputs.iter().position(|s| s.is_empty()) {
            return Err(FftError::EmptyInput { index });
        }
        let jobs = self.jobs.as_ref().ok_or(FftError::PoolShutDown)?;

        let count = inputs.len();
        let (done_tx, done_rx) = bounded(1);
        let batch = Arc::new(BatchSlots {
            slots: (0..count).map(|_| OnceLock::new()).collect(),
            remaining: AtomicUsize::new(count),
            done: done_tx,
        });

        for (index, input) in inputs.into_iter().enumerate() {
            jobs.send(Job {
                index,
                input,
                transform,
                batch: Arc::clone(&batch),
            })
            .map_err(|_| FftError::PoolShutDown)?;
        }

        done_rx.recv().map_err(|_| FftError::PoolShutDown)?;
        tracing::trace!(count, ?transform, "fft batch complete");

        batch
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| match slot.get() {
                Some(result) => result.clone(),
                None => Err(FftError::WorkerFailed { index }),
            })
            .collect()
    }

    /// Stop accepting work and join every worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the sender ends each worker's receive loop.
        if self.jobs.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("fft worker exited with a panic");
            }
        }
        tracing::debug!("fft pool stopped");
    }
}

impl Drop for BatchProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(jobs: &Receiver<Job>, engine: &FftEngine, cache: Option<&SpectrumCache>) {
    while let Ok(job) = jobs.recv() {
        let result = catch_unwind(AssertUnwindSafe(|| run_job(&job, engine, cache)))
            .unwrap_or(Err(FftError::WorkerFailed { index: job.index }));

        // Each index is submitted exactly once, so the slot is always empty here.
        let _ = job.batch.slots[job.index].set(result);
        if job.batch.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _ = job.batch.done.send(());
        }
    }
}

fn run_job(job: &Job, engine: &FftEngine, cache: Option<&SpectrumCache>) -> Result<Spectrum, FftError> {
    let compute = || {
        engine
            .execute(job.transform, &job.input)
            .map_err(|_| FftError::EmptyInput { index: job.index })
    };
    match cache {
        Some(cache) => cache.get_or_compute(job.transform, &job.input, compute),
        None => compute().map(Spectrum::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;

    fn ramp(len: usize, scale: f32) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * scale).sin()).collect()
    }

    #[test]
    fn results_follow_submission_order() {
        let pool = BatchProcessor::new(4).unwrap();
        // Very different lengths so completion order is scrambled
        let signals: Vec<Vec<f32>> = [4096, 8, 1024, 16, 2048, 32, 512, 64]
            .iter()
            .map(|&n| ramp(n, 0.01))
            .collect();
        let spectra = pool.process_real(&signals).unwrap();
        assert_eq!(spectra.len(), signals.len());
        for (signal, spectrum) in signals.iter().zip(&spectra) {
            assert_eq!(spectrum.len(), signal.len() / 2 + 1);
        }
    }

    #[test]
    fn batch_matches_engine() {
        let pool = BatchProcessor::new(3).unwrap();
        let engine = FftEngine::new();
        let signals: Vec<Vec<f32>> = (1..6).map(|k| ramp(100, k as f32 * 0.1)).collect();
        let spectra = pool.process_real(&signals).unwrap();
        for (signal, spectrum) in signals.iter().zip(&spectra) {
            let expected = engine.forward_real(signal).unwrap();
            assert_eq!(&expected[..], &spectrum[..]);
        }
    }

    #[test]
    fn empty_batch_is_empty() {
        let pool = BatchProcessor::new(1).unwrap();
        assert!(pool.process_real(&[]).unwrap().is_empty());
    }

    #[test]
    fn empty_signal_is_rejected_before_submission() {
        let pool = BatchProcessor::new(2).unwrap();
        let err = pool.process_real(&[vec![1.0], vec![]]).unwrap_err();
        assert_eq!(err, FftError::EmptyInput { index: 1 });
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(matches!(
            BatchProcessor::new(0),
            Err(FftError::InvalidConfig(_))
        ));
    }

    #[test]
    fn pool_is_reused_across_batches() {
        let pool = BatchProcessor::new(2).unwrap();
        for _ in 0..10 {
            let out = pool.process_real(&[ramp(64, 0.2), ramp(32, 0.3)]).unwrap();
            assert_eq!(out.len(), 2);
        }
        assert_eq!(pool.workers(), 2);
        pool.shutdown();
    }

    #[test]
    fn cached_pool_counts_hits() {
        let cache = Arc::new(SpectrumCache::new(CacheConfig::default()).unwrap());
        let pool = BatchProcessor::with_cache(2, Arc::clone(&cache)).unwrap();
        let signals = vec![ramp(128, 0.1), ramp(128, 0.1), ramp(64, 0.5)];
        let first = pool.process_real(&signals).unwrap();
        let second = pool.process_real(&signals).unwrap();
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(&a[..], &b[..]);
        }
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 6);
        assert!(stats.hits >= 3);
    }

    #[test]
    fn complex_inverse_roundtrip() {
        let pool = BatchProcessor::new(2).unwrap();
        let signals: Vec<Vec<Complex32>> = (0..4)
            .map(|k| (0..30).map(|i| Complex32::new((i * k) as f32, 1.0)).collect())
            .collect();
        let spectra = pool.process(&signals, Transform::Forward).unwrap();
        let back: Vec<Vec<Complex32>> = spectra.iter().map(|s| s.to_vec()).collect();
        let restored = pool.process(&back, Transform::Inverse).unwrap();
        for (orig, rest) in signals.iter().zip(&restored) {
            for (a, b) in orig.iter().zip(rest.iter()) {
                assert!((a - b).norm() < 1e-2);
            }
        }
    }
}
