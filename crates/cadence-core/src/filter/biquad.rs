//! Biquad (bi-quadratic) filter section.
//!
//! Second-order IIR section in Direct Form I with `f64` coefficients and
//! memory. Coefficient helpers use the RBJ Audio EQ Cookbook formulas and
//! return normalized [`BiquadCoefficients`] (`a0 == 1`).

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Normalized biquad coefficients.
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoefficients {
    /// Feedforward coefficient for x[n].
    pub b0: f64,
    /// Feedforward coefficient for x[n-1].
    pub b1: f64,
    /// Feedforward coefficient for x[n-2].
    pub b2: f64,
    /// Feedback coefficient for y[n-1].
    pub a1: f64,
    /// Feedback coefficient for y[n-2].
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Normalize raw cookbook coefficients by `a0`.
    pub fn from_raw(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let a0_inv = 1.0 / a0;
        Self {
            b0: b0 * a0_inv,
            b1: b1 * a0_inv,
            b2: b2 * a0_inv,
            a1: a1 * a0_inv,
            a2: a2 * a0_inv,
        }
    }

    /// Pass-through section.
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Scale the feedforward path by `gain`.
    pub fn scaled(self, gain: f64) -> Self {
        Self {
            b0: self.b0 * gain,
            b1: self.b1 * gain,
            b2: self.b2 * gain,
            ..self
        }
    }

    /// True if every coefficient is finite.
    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }

    /// Magnitude response at `frequency` Hz.
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = self.b1 * s1 + self.b2 * s2;
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = self.a1 * s1 + self.a2 * s2;
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }
}

/// One Direct Form I section with its memory.
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    /// Input delay line: x[n-1], x[n-2]
    x1: f64,
    x2: f64,
    /// Output delay line: y[n-1], y[n-2]
    y1: f64,
    y2: f64,
}

impl Biquad {
    /// Creates a section with cleared memory.
    pub fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Current coefficients.
    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coeffs
    }

    /// Processes a single sample.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Memory as `[x1, x2, y1, y2]`.
    pub fn memory(&self) -> [f64; 4] {
        [self.x1, self.x2, self.y1, self.y2]
    }

    /// Restore memory saved by [`memory`](Self::memory).
    pub fn set_memory(&mut self, memory: [f64; 4]) {
        [self.x1, self.x2, self.y1, self.y2] = memory;
    }

    /// Clears the delay lines; coefficients are kept.
    pub fn clear(&mut self) {
        self.set_memory([0.0; 4]);
    }
}

/// Low-pass coefficients (RBJ cookbook).
///
/// * `frequency` - Cutoff frequency in Hz
/// * `q` - Q factor (0.707 for a Butterworth response)
pub fn lowpass(frequency: f64, q: f64, sample_rate: f64) -> BiquadCoefficients {
    let omega = 2.0 * PI * frequency / sample_rate;
    lowpass_at(omega, q)
}

/// Low-pass section at angular frequency `omega` (radians per sample).
pub(crate) fn lowpass_at(omega: f64, q: f64) -> BiquadCoefficients {
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);
    BiquadCoefficients::from_raw(
        (1.0 - cos_omega) / 2.0,
        1.0 - cos_omega,
        (1.0 - cos_omega) / 2.0,
        1.0 + alpha,
        -2.0 * cos_omega,
        1.0 - alpha,
    )
}

/// High-pass coefficients (RBJ cookbook).
pub fn highpass(frequency: f64, q: f64, sample_rate: f64) -> BiquadCoefficients {
    let omega = 2.0 * PI * frequency / sample_rate;
    highpass_at(omega, q)
}

/// High-pass section at angular frequency `omega` (radians per sample).
pub(crate) fn highpass_at(omega: f64, q: f64) -> BiquadCoefficients {
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);
    BiquadCoefficients::from_raw(
        (1.0 + cos_omega) / 2.0,
        -(1.0 + cos_omega),
        (1.0 + cos_omega) / 2.0,
        1.0 + alpha,
        -2.0 * cos_omega,
        1.0 - alpha,
    )
}

/// Band-pass coefficients with 0 dB peak gain (RBJ cookbook).
///
/// * `frequency` - Center frequency in Hz
/// * `q` - Q factor (bandwidth = frequency / Q)
pub fn bandpass(frequency: f64, q: f64, sample_rate: f64) -> BiquadCoefficients {
    let omega = 2.0 * PI * frequency / sample_rate;
    let alpha = omega.sin() / (2.0 * q);
    BiquadCoefficients::from_raw(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * omega.cos(), 1.0 - alpha)
}

/// Notch (band-reject) coefficients (RBJ cookbook).
pub fn notch(frequency: f64, q: f64, sample_rate: f64) -> BiquadCoefficients {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);
    BiquadCoefficients::from_raw(
        1.0,
        -2.0 * cos_omega,
        1.0,
        1.0 + alpha,
        -2.0 * cos_omega,
        1.0 - alpha,
    )
}

/// Peaking EQ coefficients (RBJ cookbook).
///
/// Boosts (`gain_db > 0`) or cuts around `frequency` with bandwidth set by `q`.
pub fn peaking(frequency: f64, q: f64, gain_db: f64, sample_rate: f64) -> BiquadCoefficients {
    let a = 10f64.powf(gain_db / 40.0); // sqrt(10^(dB/20))
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);
    BiquadCoefficients::from_raw(
        1.0 + alpha * a,
        -2.0 * cos_omega,
        1.0 - alpha * a,
        1.0 + alpha / a,
        -2.0 * cos_omega,
        1.0 - alpha / a,
    )
}
