//! FFT engine with plan caching
//!
//! Wraps `rustfft` so that any length (power-of-two, mixed-radix, or prime via
//! Bluestein) can be transformed through one shared object. Plans are built once
//! per `(length, direction)` and reused; the engine is `Sync` and is shared by
//! every worker of a [`BatchProcessor`](crate::BatchProcessor).
//!
//! Inverse transforms are normalized by `1/N`, so `inverse(forward(x)) == x`
//! up to rounding.

use parking_lot::Mutex;
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::FftError;

/// A computed spectrum, shared between the cache and its readers.
pub type Spectrum = Arc<[Complex32]>;

/// Transform direction for a complex FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Time → frequency
    Forward,
    /// Frequency → time (normalized by 1/N)
    Inverse,
}

impl Direction {
    fn as_rustfft(self) -> FftDirection {
        match self {
            Direction::Forward => FftDirection::Forward,
            Direction::Inverse => FftDirection::Inverse,
        }
    }
}

/// A transform request, as seen by the cache and the batch processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    /// Full complex forward transform (N bins)
    Forward,
    /// Full complex inverse transform, normalized (N samples)
    Inverse,
    /// Forward transform of a real signal, keeping DC through Nyquist (N/2 + 1 bins)
    RealForward,
}

impl Transform {
    /// The underlying complex FFT direction.
    pub fn direction(self) -> Direction {
        match self {
            Transform::Forward | Transform::RealForward => Direction::Forward,
            Transform::Inverse => Direction::Inverse,
        }
    }
}

/// Planner-backed FFT engine.
pub struct FftEngine {
    plans: Mutex<HashMap<(usize, Direction), Arc<dyn Fft<f32>>>>,
}

impl FftEngine {
    /// Create an engine with an empty plan cache.
    pub fn new() -> Self {
        Self {
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Get (or build) the plan for a length and direction.
    pub fn plan(&self, len: usize, direction: Direction) -> Arc<dyn Fft<f32>> {
        let mut plans = self.plans.lock();
        Arc::clone(plans.entry((len, direction)).or_insert_with(|| {
            tracing::trace!(len, ?direction, "planning fft");
            let mut planner = FftPlanner::new();
            planner.plan_fft(len, direction.as_rustfft())
        }))
    }

    /// Number of distinct plans built so far.
    pub fn plan_count(&self) -> usize {
        self.plans.lock().len()
    }

    /// Forward FFT in place (unnormalized).
    pub fn forward(&self, buffer: &mut [Complex32]) {
        if buffer.is_empty() {
            return;
        }
        self.plan(buffer.len(), Direction::Forward).process(buffer);
    }

    /// Inverse FFT in place, normalized by `1/N`.
    pub fn inverse(&self, buffer: &mut [Complex32]) {
        if buffer.is_empty() {
            return;
        }
        self.plan(buffer.len(), Direction::Inverse).process(buffer);
        let scale = 1.0 / buffer.len() as f32;
        for c in buffer.iter_mut() {
            *c *= scale;
        }
    }

    /// Forward FFT of a real signal.
    ///
    /// Returns `N/2 + 1` bins: DC through Nyquist (for odd `N`, the last bin is
    /// the highest positive frequency).
    pub fn forward_real(&self, input: &[f32]) -> Result<Vec<Complex32>, FftError> {
        if input.is_empty() {
            return Err(FftError::EmptyInput { index: 0 });
        }
        let mut buffer: Vec<Complex32> = input.iter().map(|&x| Complex32::new(x, 0.0)).collect();
        self.forward(&mut buffer);
        buffer.truncate(input.len() / 2 + 1);
        Ok(buffer)
    }

    /// Inverse of [`forward_real`](Self::forward_real).
    ///
    /// Rebuilds the conjugate-symmetric full spectrum and returns the real part
    /// of the normalized inverse.
    pub fn inverse_real(&self, half: &[Complex32], len: usize) -> Result<Vec<f32>, FftError> {
        if len == 0 {
            return Err(FftError::EmptyInput { index: 0 });
        }
        let expected = len / 2 + 1;
        if half.len() != expected {
            return Err(FftError::LengthMismatch {
                expected,
                actual: half.len(),
            });
        }

        let mut buffer = Vec::with_capacity(len);
        buffer.extend_from_slice(half);
        for k in expected..len {
            buffer.push(half[len - k].conj());
        }

        self.inverse(&mut buffer);
        Ok(buffer.iter().map(|c| c.re).collect())
    }

    /// Run a [`Transform`] on a copy of `input`.
    ///
    /// For [`Transform::RealForward`] the imaginary parts of `input` are
    /// expected to be zero.
    pub fn execute(&self, transform: Transform, input: &[Complex32]) -> Result<Vec<Complex32>, FftError> {
        if input.is_empty() {
            return Err(FftError::EmptyInput { index: 0 });
        }
        let mut buffer = input.to_vec();
        match transform {
            Transform::Forward => self.forward(&mut buffer),
            Transform::Inverse => self.inverse(&mut buffer),
            Transform::RealForward => {
                self.forward(&mut buffer);
                buffer.truncate(input.len() / 2 + 1);
            }
        }
        Ok(buffer)
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FftEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftEngine")
            .field("plans", &self.plan_count())
            .finish()
    }
}

/// Magnitude of each bin.
pub fn magnitude(spectrum: &[Complex32]) -> Vec<f32> {
    spectrum.iter().map(|c| c.norm()).collect()
}

/// Compute magnitude spectrum in dB
pub fn magnitude_db(spectrum: &[Complex32]) -> Vec<f32> {
    spectrum
        .iter()
        .map(|c| 20.0 * c.norm().max(1e-10).log10())
        .collect()
}
