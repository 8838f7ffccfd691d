//! Streaming filters and their coefficient design.
//!
//! - [`FirFilter`] - fixed-coefficient FIR, direct or FFT overlap-add
//! - [`IirFilter`] - cascade of Direct Form I [`Biquad`] sections
//! - [`LmsFilter`] - LMS/NLMS adaptive line enhancer
//! - [`design`] - windowed-sinc, Butterworth, Chebyshev type I and RBJ designs

pub mod biquad;
pub mod design;
mod fir;
mod iir;
mod lms;

pub use biquad::{Biquad, BiquadCoefficients};
pub use fir::{ConvolutionMode, DIRECT_MAX_TAPS, FirFilter};
pub use iir::IirFilter;
pub use lms::{LmsFilter, LmsOutput};
