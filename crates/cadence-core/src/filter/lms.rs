//! LMS and NLMS adaptive line enhancer.
//!
//! The filter predicts the current sample from the samples `delay` steps and
//! further in the past, so the reference input is the signal itself:
//!
//! ```text
//! u[k]  = x[n - delay - k],  k = 0..order
//! y[n]  = Σ w[k] * u[k]            (prediction)
//! e[n]  = x[n] - y[n]              (error)
//! w[k] += μ * e[n] * u[k]          (LMS)
//! w[k] += μ / (uᵀu + δ) * e[n] * u[k]  (NLMS)
//! ```
//!
//! Periodic components are predictable across the delay and show up in the
//! prediction; broadband noise is not and stays in the error.
//!
//! Reference: Haykin, "Adaptive Filter Theory" (5th ed.), chapters 5 and 6.

use serde::{Deserialize, Serialize};

use crate::buffer::{RingBuffer, RingSnapshot};
use crate::error::{CoreError, Result};

/// NLMS regularization δ.
const REGULARIZATION: f32 = 1e-6;

/// Which signal an [`LmsFilter`] emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmsOutput {
    /// The prediction `y[n]` (enhanced periodic content)
    #[default]
    Prediction,
    /// The error `e[n]` (what the predictor could not explain)
    Error,
}

/// Adaptive line enhancer with LMS or NLMS weight updates.
#[derive(Debug, Clone)]
pub struct LmsFilter {
    weights: Vec<f32>,
    history: RingBuffer<f32>,
    step_size: f32,
    delay: usize,
    normalized: bool,
    output: LmsOutput,
}

impl LmsFilter {
    /// Create a filter with zero weights and empty history.
    ///
    /// * `order` - number of taps (>= 1)
    /// * `step_size` - μ; for NLMS `0 < μ < 2` is stable regardless of level
    /// * `delay` - decorrelation delay in samples (>= 1)
    pub fn new(
        order: usize,
        step_size: f32,
        delay: usize,
        normalized: bool,
        output: LmsOutput,
    ) -> Result<Self> {
        if order == 0 {
            return Err(CoreError::invalid_parameter("order", "must be >= 1"));
        }
        if delay == 0 {
            return Err(CoreError::invalid_parameter("delay", "must be >= 1"));
        }
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(CoreError::invalid_parameter(
                "step_size",
                format!("must be positive, got {step_size}"),
            ));
        }
        Ok(Self {
            weights: vec![0.0; order],
            history: RingBuffer::new(order + delay),
            step_size,
            delay,
            normalized,
            output,
        })
    }

    /// Number of taps.
    pub fn order(&self) -> usize {
        self.weights.len()
    }

    /// Current weights.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Capacity of the input history (`order + delay`).
    pub fn history_len(&self) -> usize {
        self.history.capacity()
    }

    #[inline]
    fn reference(&self, k: usize) -> f32 {
        self.history.nth_newest(self.delay - 1 + k).unwrap_or(0.0)
    }

    /// Process one sample, returning the prediction or the error.
    pub fn process(&mut self, input: f32) -> f32 {
        let order = self.weights.len();
        let prediction: f32 = (0..order).map(|k| self.weights[k] * self.reference(k)).sum();
        let error = input - prediction;

        let mu = if self.normalized {
            let power: f32 = (0..order).map(|k| self.reference(k).powi(2)).sum();
            self.step_size / (power + REGULARIZATION)
        } else {
            self.step_size
        };
        let mu_e = mu * error;
        for k in 0..order {
            self.weights[k] += mu_e * self.reference(k);
        }

        self.history.push(input);

        match self.output {
            LmsOutput::Prediction => prediction,
            LmsOutput::Error => error,
        }
    }

    /// Process a block sample by sample.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input) {
            *out = self.process(x);
        }
    }

    /// Input history snapshot.
    pub fn history(&self) -> RingSnapshot<f32> {
        self.history.snapshot()
    }

    /// Restore weights and history. Nothing changes on error.
    pub fn restore(&mut self, weights: &[f32], history: &RingSnapshot<f32>) -> Result<()> {
        if weights.len() != self.weights.len() {
            return Err(CoreError::shape_mismatch(
                "lms weights",
                self.weights.len(),
                weights.len(),
            ));
        }
        RingBuffer::check_snapshot(self.history.capacity(), history)?;
        self.history.restore(history)?;
        self.weights.copy_from_slice(weights);
        Ok(())
    }

    /// Zero the weights and clear the history. Step size is preserved.
    pub fn reset(&mut self) {
        self.weights.fill(0.0);
        self.history.clear();
    }
}
