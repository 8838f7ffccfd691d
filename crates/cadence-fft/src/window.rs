//! Window functions
//!
//! Periodic windows (denominator `N`) suit spectral analysis where frames are
//! concatenated; symmetric windows (denominator `N - 1`) suit FIR design where
//! the taps must be symmetric about the centre.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// Rectangular (no windowing)
    Rectangular,
    /// Hann window (raised cosine)
    Hann,
    /// Hamming window
    Hamming,
    /// Blackman window
    Blackman,
    /// Blackman-Harris window (better sidelobe suppression)
    BlackmanHarris,
}

impl Window {
    /// Window value at phase `x` in `[0, 2π]`.
    fn value(self, x: f64) -> f64 {
        match self {
            Window::Rectangular => 1.0,
            Window::Hann => 0.5 * (1.0 - x.cos()),
            Window::Hamming => 0.54 - 0.46 * x.cos(),
            Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            Window::BlackmanHarris => {
                0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos()
                    - 0.01168 * (3.0 * x).cos()
            }
        }
    }

    /// Apply the periodic window to a buffer in place
    pub fn apply(&self, buffer: &mut [f32]) {
        let n = buffer.len();
        for (i, sample) in buffer.iter_mut().enumerate() {
            let x = 2.0 * PI * i as f64 / n as f64;
            *sample *= self.value(x) as f32;
        }
    }

    /// Periodic window coefficients
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        let mut coeffs = vec![1.0; size];
        self.apply(&mut coeffs);
        coeffs
    }

    /// Symmetric window coefficients, as used for FIR design.
    ///
    /// A single-point window is `[1.0]`.
    pub fn symmetric(&self, size: usize) -> Vec<f64> {
        if size == 1 {
            return vec![1.0];
        }
        let denom = (size - 1) as f64;
        (0..size)
            .map(|i| self.value(2.0 * PI * i as f64 / denom))
            .collect()
    }

    /// Parse a window name (`"hann"`, `"hanning"`, `"hamming"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rectangular" | "rect" | "none" => Some(Window::Rectangular),
            "hann" | "hanning" => Some(Window::Hann),
            "hamming" => Some(Window::Hamming),
            "blackman" => Some(Window::Blackman),
            "blackman_harris" | "blackmanharris" => Some(Window::BlackmanHarris),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_hann() {
        let mut buffer = vec![1.0; 100];
        Window::Hann.apply(&mut buffer);

        // Hann window should be 0 at edges, 1 at center
        assert!(buffer[0] < 0.01);
        assert!(buffer[99] < 0.01);
        assert!((buffer[50] - 1.0).abs() < 0.01);
    }

    #[test]
    fn symmetric_windows_are_symmetric() {
        for window in [Window::Hann, Window::Hamming, Window::Blackman] {
            let w = window.symmetric(31);
            for i in 0..31 {
                assert!((w[i] - w[30 - i]).abs() < 1e-12, "{window:?} asymmetric at {i}");
            }
            assert!((w[15] - 1.0).abs() < 1e-9, "{window:?} peak should be 1.0");
        }
    }

    #[test]
    fn hamming_endpoints() {
        let w = Window::Hamming.symmetric(11);
        assert!((w[0] - 0.08).abs() < 1e-12);
        assert!((w[10] - 0.08).abs() < 1e-12);
    }

    #[test]
    fn single_point_window_is_unity() {
        assert_eq!(Window::Blackman.symmetric(1), vec![1.0]);
    }

    #[test]
    fn parse_names() {
        assert_eq!(Window::from_name("Hanning"), Some(Window::Hann));
        assert_eq!(Window::from_name("blackman"), Some(Window::Blackman));
        assert_eq!(Window::from_name("kaiser"), None);
    }
}
