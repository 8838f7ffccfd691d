//! Streaming FIR convolution.
//!
//! Two strategies produce the same output (within float tolerance):
//!
//! - **Direct**: keeps the last `taps` inputs in a [`RingBuffer`] and
//!   accumulates the dot product in `f64`. Used up to [`DIRECT_MAX_TAPS`].
//! - **Overlap-add**: splits each call's input into blocks of
//!   `B = N - L + 1` samples, convolves each block through an `N`-point `f64`
//!   FFT (`N = (2L).next_power_of_two()`), and carries the `L - 1` sample
//!   tail into the next block, across calls included.
//!
//! Either way the filter streams: splitting a signal into arbitrary chunks
//! gives the same output as filtering it in one call. Block boundaries follow
//! the calls, so the overlap-add path keeps its arithmetic and its tail in
//! `f64` and rounds to `f32` only on output.

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::buffer::{RingBuffer, RingSnapshot};
use crate::error::{CoreError, Result};

/// Longest kernel that [`ConvolutionMode::Auto`] convolves directly.
pub const DIRECT_MAX_TAPS: usize = 64;

/// Convolution strategy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvolutionMode {
    /// Direct up to [`DIRECT_MAX_TAPS`], overlap-add above
    #[default]
    Auto,
    /// Always direct
    Direct,
    /// Always FFT overlap-add
    OverlapAdd,
}

impl ConvolutionMode {
    /// Concrete strategy for a kernel of `taps` coefficients.
    pub fn resolve(self, taps: usize) -> Self {
        match self {
            ConvolutionMode::Auto if taps <= DIRECT_MAX_TAPS => ConvolutionMode::Direct,
            ConvolutionMode::Auto => ConvolutionMode::OverlapAdd,
            other => other,
        }
    }
}

#[derive(Clone)]
struct OverlapAdd {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    block: usize,
    /// Kernel spectrum, pre-scaled by `1/N`.
    taps_spectrum: Arc<[Complex64]>,
    tail: Vec<f64>,
    scratch: Vec<Complex64>,
    fft_scratch: Vec<Complex64>,
}

impl OverlapAdd {
    fn new(taps: &[f64]) -> Self {
        let l = taps.len();
        let fft_len = (2 * l).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let scale = 1.0 / fft_len as f64;
        let mut taps_spectrum = vec![Complex64::default(); fft_len];
        for (slot, &h) in taps_spectrum.iter_mut().zip(taps) {
            *slot = Complex64::new(h * scale, 0.0);
        }
        forward.process(&mut taps_spectrum);

        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            forward,
            inverse,
            block: fft_len - l + 1,
            taps_spectrum: taps_spectrum.into(),
            tail: vec![0.0; l - 1],
            scratch: vec![Complex64::default(); fft_len],
            fft_scratch: vec![Complex64::default(); scratch_len],
        }
    }

    fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        let tail_len = self.tail.len();
        for (chunk, out) in input.chunks(self.block).zip(output.chunks_mut(self.block)) {
            let n = chunk.len();
            self.scratch.fill(Complex64::default());
            for (s, &x) in self.scratch.iter_mut().zip(chunk) {
                *s = Complex64::new(f64::from(x), 0.0);
            }

            self.forward
                .process_with_scratch(&mut self.scratch, &mut self.fft_scratch);
            for (s, h) in self.scratch.iter_mut().zip(self.taps_spectrum.iter()) {
                *s *= *h;
            }
            self.inverse
                .process_with_scratch(&mut self.scratch, &mut self.fft_scratch);

            for (s, &t) in self.scratch.iter_mut().zip(&self.tail) {
                s.re += t;
            }
            for (o, s) in out.iter_mut().zip(&self.scratch[..n]) {
                *o = s.re as f32;
            }
            for (t, s) in self.tail.iter_mut().zip(&self.scratch[n..n + tail_len]) {
                *t = s.re;
            }
        }
    }
}

impl fmt::Debug for OverlapAdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlapAdd")
            .field("fft_len", &self.scratch.len())
            .field("block", &self.block)
            .field("tail", &self.tail.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum Path {
    Direct(RingBuffer<f32>),
    OverlapAdd(OverlapAdd),
}

/// FIR filter with fixed coefficients.
#[derive(Debug, Clone)]
pub struct FirFilter {
    taps: Vec<f64>,
    path: Path,
}

impl FirFilter {
    /// Create a filter. `mode` is resolved against the tap count.
    ///
    /// Fails with [`CoreError::InvalidParameter`] on an empty or non-finite kernel.
    pub fn new(taps: &[f64], mode: ConvolutionMode) -> Result<Self> {
        if taps.is_empty() {
            return Err(CoreError::invalid_parameter("taps", "must not be empty"));
        }
        if taps.iter().any(|t| !t.is_finite()) {
            return Err(CoreError::invalid_parameter("taps", "must be finite"));
        }
        let path = match mode.resolve(taps.len()) {
            ConvolutionMode::OverlapAdd => Path::OverlapAdd(OverlapAdd::new(taps)),
            _ => Path::Direct(RingBuffer::new(taps.len())),
        };
        Ok(Self {
            taps: taps.to_vec(),
            path,
        })
    }

    /// Filter coefficients.
    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    /// Strategy in use.
    pub fn mode(&self) -> ConvolutionMode {
        match self.path {
            Path::Direct(_) => ConvolutionMode::Direct,
            Path::OverlapAdd(_) => ConvolutionMode::OverlapAdd,
        }
    }

    /// Filter a block, continuing from the previous call.
    ///
    /// `output` must be at least as long as `input`.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        match &mut self.path {
            Path::Direct(history) => {
                for (out, &x) in output.iter_mut().zip(input) {
                    history.push(x);
                    let acc: f64 = self
                        .taps
                        .iter()
                        .enumerate()
                        .map_while(|(k, &h)| history.nth_newest(k).map(|v| h * f64::from(v)))
                        .sum();
                    *out = acc as f32;
                }
            }
            Path::OverlapAdd(ola) => ola.process_block(input, output),
        }
    }

    /// Input history of the direct path.
    pub fn history(&self) -> Option<RingSnapshot<f32>> {
        match &self.path {
            Path::Direct(history) => Some(history.snapshot()),
            Path::OverlapAdd(_) => None,
        }
    }

    /// Pending overlap tail of the overlap-add path (empty for direct).
    pub fn tail(&self) -> &[f64] {
        match &self.path {
            Path::Direct(_) => &[],
            Path::OverlapAdd(ola) => &ola.tail,
        }
    }

    /// Restore streaming state saved by [`history`](Self::history) and
    /// [`tail`](Self::tail). Nothing changes on error.
    pub fn restore(&mut self, history: Option<&RingSnapshot<f32>>, tail: &[f64]) -> Result<()> {
        match (&mut self.path, history) {
            (Path::Direct(ring), Some(snapshot)) if tail.is_empty() => ring.restore(snapshot),
            (Path::Direct(_), _) => Err(CoreError::invalid_parameter(
                "fir state",
                "direct convolution restores from input history only",
            )),
            (Path::OverlapAdd(ola), None) => {
                if tail.len() != ola.tail.len() {
                    return Err(CoreError::shape_mismatch(
                        "fir overlap tail",
                        ola.tail.len(),
                        tail.len(),
                    ));
                }
                ola.tail.copy_from_slice(tail);
                Ok(())
            }
            (Path::OverlapAdd(_), Some(_)) => Err(CoreError::invalid_parameter(
                "fir state",
                "overlap-add restores from its tail only",
            )),
        }
    }

    /// Clear all streaming state.
    pub fn reset(&mut self) {
        match &mut self.path {
            Path::Direct(history) => history.clear(),
            Path::OverlapAdd(ola) => ola.tail.fill(0.0),
        }
    }
}
