//! Filter coefficient design.
//!
//! Every function here is pure: the same arguments always give the same
//! coefficients, and invalid arguments fail with
//! [`CoreError::InvalidParameter`] before anything is computed.
//!
//! - [`windowed_sinc`] - linear-phase FIR low/high/band-pass/band-stop
//! - [`butterworth`] - maximally flat IIR low/high-pass as biquad sections
//! - [`chebyshev1`] - equiripple-passband IIR low/high-pass as biquad sections
//! - [`rbj`] - single cookbook biquads
//!
//! IIR designs map the analog prototype through the bilinear transform with
//! the cutoff prewarped, so the -3 dB (Butterworth) or ripple-edge (Chebyshev)
//! frequency lands exactly on `cutoff`.

use cadence_fft::Window;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::biquad::{self, BiquadCoefficients, highpass_at, lowpass_at};
use crate::error::{CoreError, Result};

/// FIR response shape with its band edges in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FirResponse {
    /// Pass below the cutoff
    Lowpass(f64),
    /// Pass above the cutoff (odd tap count)
    Highpass(f64),
    /// Pass between the edges
    Bandpass(f64, f64),
    /// Reject between the edges (odd tap count)
    Bandstop(f64, f64),
}

/// Low- or high-pass selection for IIR designs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassType {
    /// Low-pass
    Lowpass,
    /// High-pass
    Highpass,
}

/// Cookbook biquad shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RbjKind {
    /// Low-pass
    Lowpass,
    /// High-pass
    Highpass,
    /// Band-pass, 0 dB peak
    Bandpass,
    /// Notch
    Notch,
    /// Peaking EQ with the given gain in dB
    Peaking(f64),
}

fn check_sample_rate(sample_rate: f64) -> Result<()> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(CoreError::invalid_parameter(
            "sample_rate",
            format!("must be positive and finite, got {sample_rate}"),
        ))
    }
}

fn check_frequency(param: &str, frequency: f64, sample_rate: f64) -> Result<()> {
    let nyquist = sample_rate / 2.0;
    if frequency.is_finite() && frequency > 0.0 && frequency < nyquist {
        Ok(())
    } else {
        Err(CoreError::invalid_parameter(
            param,
            format!("must lie in (0, {nyquist}), got {frequency}"),
        ))
    }
}

fn check_order(order: usize) -> Result<()> {
    if order == 0 {
        return Err(CoreError::invalid_parameter("order", "must be >= 1"));
    }
    Ok(())
}

fn check_band(low: f64, high: f64, sample_rate: f64) -> Result<()> {
    check_frequency("low", low, sample_rate)?;
    check_frequency("high", high, sample_rate)?;
    if low >= high {
        return Err(CoreError::invalid_parameter(
            "band",
            format!("low edge {low} must be below high edge {high}"),
        ));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// FIR
// ----------------------------------------------------------------------------

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Windowed low-pass kernel normalized to unity DC gain.
fn lowpass_kernel(cutoff: f64, sample_rate: f64, window: &[f64]) -> Vec<f64> {
    let fc = cutoff / sample_rate;
    let centre = (window.len() - 1) as f64 / 2.0;
    let mut h: Vec<f64> = window
        .iter()
        .enumerate()
        .map(|(n, &w)| 2.0 * fc * sinc(2.0 * fc * (n as f64 - centre)) * w)
        .collect();
    let sum: f64 = h.iter().sum();
    if sum.abs() > f64::EPSILON {
        h.iter_mut().for_each(|c| *c /= sum);
    }
    h
}

/// `delta - h`, where `delta` is a unit impulse at the kernel centre.
fn spectral_inversion(mut h: Vec<f64>) -> Vec<f64> {
    let centre = h.len() / 2;
    h.iter_mut().for_each(|c| *c = -*c);
    h[centre] += 1.0;
    h
}

/// Design a linear-phase FIR kernel by the windowed-sinc method.
///
/// High-pass and band-stop responses need an odd `num_taps` (a centre tap to
/// invert around).
///
/// # Example
///
/// ```rust
/// use cadence_core::filter::design::{FirResponse, windowed_sinc};
/// use cadence_fft::Window;
///
/// let taps = windowed_sinc(FirResponse::Lowpass(100.0), 31, 1000.0, Window::Hamming).unwrap();
/// assert_eq!(taps.len(), 31);
/// assert!((taps.iter().sum::<f64>() - 1.0).abs() < 1e-9);
/// ```
pub fn windowed_sinc(
    response: FirResponse,
    num_taps: usize,
    sample_rate: f64,
    window: Window,
) -> Result<Vec<f64>> {
    check_sample_rate(sample_rate)?;
    if num_taps == 0 {
        return Err(CoreError::invalid_parameter("num_taps", "must be >= 1"));
    }
    let needs_odd = matches!(response, FirResponse::Highpass(_) | FirResponse::Bandstop(..));
    if needs_odd && num_taps % 2 == 0 {
        return Err(CoreError::invalid_parameter(
            "num_taps",
            format!("high-pass and band-stop kernels need an odd tap count, got {num_taps}"),
        ));
    }

    let w = window.symmetric(num_taps);
    let taps = match response {
        FirResponse::Lowpass(fc) => {
            check_frequency("cutoff", fc, sample_rate)?;
            lowpass_kernel(fc, sample_rate, &w)
        }
        FirResponse::Highpass(fc) => {
            check_frequency("cutoff", fc, sample_rate)?;
            spectral_inversion(lowpass_kernel(fc, sample_rate, &w))
        }
        FirResponse::Bandpass(low, high) => {
            check_band(low, high, sample_rate)?;
            band(low, high, sample_rate, &w)
        }
        FirResponse::Bandstop(low, high) => {
            check_band(low, high, sample_rate)?;
            spectral_inversion(band(low, high, sample_rate, &w))
        }
    };
    Ok(taps)
}

fn band(low: f64, high: f64, sample_rate: f64, window: &[f64]) -> Vec<f64> {
    let upper = lowpass_kernel(high, sample_rate, window);
    let lower = lowpass_kernel(low, sample_rate, window);
    upper.iter().zip(&lower).map(|(a, b)| a - b).collect()
}

// ----------------------------------------------------------------------------
// IIR
// ----------------------------------------------------------------------------

/// First-order section from the bilinear transform of `k / (s + k)` (low-pass)
/// or `s / (s + k)` (high-pass), where `k` is the prewarped corner.
fn first_order(pass: PassType, k: f64) -> BiquadCoefficients {
    let norm = 1.0 / (1.0 + k);
    let a1 = (k - 1.0) * norm;
    match pass {
        PassType::Lowpass => BiquadCoefficients {
            b0: k * norm,
            b1: k * norm,
            b2: 0.0,
            a1,
            a2: 0.0,
        },
        PassType::Highpass => BiquadCoefficients {
            b0: norm,
            b1: -norm,
            b2: 0.0,
            a1,
            a2: 0.0,
        },
    }
}

/// Second-order section for an analog pole pair of natural frequency `w0`
/// (relative to the prewarped cutoff) and quality `q`.
fn second_order(pass: PassType, prewarped: f64, w0: f64, q: f64) -> BiquadCoefficients {
    match pass {
        PassType::Lowpass => lowpass_at(2.0 * (w0 * prewarped).atan(), q),
        PassType::Highpass => highpass_at(2.0 * (prewarped / w0).atan(), q),
    }
}

/// Butterworth filter of the given order as cascaded biquads.
///
/// Odd orders end with a first-order section. The response is -3 dB at `cutoff`.
pub fn butterworth(
    pass: PassType,
    order: usize,
    cutoff: f64,
    sample_rate: f64,
) -> Result<Vec<BiquadCoefficients>> {
    check_sample_rate(sample_rate)?;
    check_order(order)?;
    check_frequency("cutoff", cutoff, sample_rate)?;

    let prewarped = (PI * cutoff / sample_rate).tan();
    let mut sections: Vec<BiquadCoefficients> = (1..=order / 2)
        .map(|k| {
            let theta = (2 * k - 1) as f64 * PI / (2 * order) as f64;
            second_order(pass, prewarped, 1.0, 1.0 / (2.0 * theta.sin()))
        })
        .collect();
    if order % 2 == 1 {
        sections.push(first_order(pass, prewarped));
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(order, cutoff, sections = sections.len(), "butterworth design");

    Ok(sections)
}

/// Chebyshev type I filter with `ripple_db` of passband ripple.
///
/// `cutoff` is the passband edge where the response last touches the ripple
/// floor. Even orders are scaled so the passband peaks at 0 dB.
pub fn chebyshev1(
    pass: PassType,
    order: usize,
    ripple_db: f64,
    cutoff: f64,
    sample_rate: f64,
) -> Result<Vec<BiquadCoefficients>> {
    check_sample_rate(sample_rate)?;
    check_order(order)?;
    check_frequency("cutoff", cutoff, sample_rate)?;
    if !(ripple_db.is_finite() && ripple_db > 0.0) {
        return Err(CoreError::invalid_parameter(
            "ripple_db",
            format!("must be positive, got {ripple_db}"),
        ));
    }

    let epsilon = (10f64.powf(ripple_db / 10.0) - 1.0).sqrt();
    let mu = (1.0 / epsilon).asinh() / order as f64;
    let (sinh_mu, cosh_mu) = (mu.sinh(), mu.cosh());
    let prewarped = (PI * cutoff / sample_rate).tan();

    let mut sections: Vec<BiquadCoefficients> = (1..=order / 2)
        .map(|k| {
            let theta = (2 * k - 1) as f64 * PI / (2 * order) as f64;
            let re = sinh_mu * theta.sin();
            let im = cosh_mu * theta.cos();
            let w0 = re.hypot(im);
            second_order(pass, prewarped, w0, w0 / (2.0 * re))
        })
        .collect();
    if order % 2 == 1 {
        let k = match pass {
            PassType::Lowpass => sinh_mu * prewarped,
            PassType::Highpass => prewarped / sinh_mu,
        };
        sections.push(first_order(pass, k));
    }
    if order % 2 == 0 {
        let gain = 1.0 / (1.0 + epsilon * epsilon).sqrt();
        if let Some(first) = sections.first_mut() {
            *first = first.scaled(gain);
        }
    }
    Ok(sections)
}

/// One cookbook biquad, validated.
pub fn rbj(kind: RbjKind, frequency: f64, q: f64, sample_rate: f64) -> Result<BiquadCoefficients> {
    check_sample_rate(sample_rate)?;
    check_frequency("frequency", frequency, sample_rate)?;
    if !(q.is_finite() && q > 0.0) {
        return Err(CoreError::invalid_parameter("q", format!("must be positive, got {q}")));
    }
    Ok(match kind {
        RbjKind::Lowpass => biquad::lowpass(frequency, q, sample_rate),
        RbjKind::Highpass => biquad::highpass(frequency, q, sample_rate),
        RbjKind::Bandpass => biquad::bandpass(frequency, q, sample_rate),
        RbjKind::Notch => biquad::notch(frequency, q, sample_rate),
        RbjKind::Peaking(gain_db) => {
            if !gain_db.is_finite() {
                return Err(CoreError::invalid_parameter("gain_db", "must be finite"));
            }
            biquad::peaking(frequency, q, gain_db, sample_rate)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 1000.0;

    fn cascade_gain(sections: &[BiquadCoefficients], f: f64) -> f64 {
        sections.iter().map(|s| s.magnitude_at(f, SR)).product()
    }

    fn fir_gain(taps: &[f64], f: f64) -> f64 {
        let w = 2.0 * PI * f / SR;
        let (re, im) = taps
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(re, im), (n, &h)| {
                (re + h * (w * n as f64).cos(), im - h * (w * n as f64).sin())
            });
        re.hypot(im)
    }

    fn db(x: f64) -> f64 {
        20.0 * x.log10()
    }

    #[test]
    fn test_butterworth_minus_3db_at_cutoff() {
        for order in 1..=8 {
            let lp = butterworth(PassType::Lowpass, order, 100.0, SR).unwrap();
            assert_eq!(lp.len(), order.div_ceil(2));
            assert!((cascade_gain(&lp, 0.001) - 1.0).abs() < 1e-6);
            assert!((db(cascade_gain(&lp, 100.0)) + 3.0103).abs() < 0.01, "order {order}");

            let hp = butterworth(PassType::Highpass, order, 100.0, SR).unwrap();
            assert!((db(cascade_gain(&hp, 100.0)) + 3.0103).abs() < 0.01, "order {order}");
            assert!(cascade_gain(&hp, 1.0) < 0.1);
        }
    }

    #[test]
    fn higher_order_rolls_off_faster() {
        let lp2 = butterworth(PassType::Lowpass, 2, 50.0, SR).unwrap();
        let lp6 = butterworth(PassType::Lowpass, 6, 50.0, SR).unwrap();
        assert!(cascade_gain(&lp6, 200.0) < cascade_gain(&lp2, 200.0) / 100.0);
    }

    #[test]
    fn test_chebyshev_ripple_and_edge() {
        for order in [2usize, 3, 4, 5] {
            let sections = chebyshev1(PassType::Lowpass, order, 1.0, 100.0, SR).unwrap();
            // Passband stays within [-1 dB, 0 dB]
            for f in (1..100).map(|i| i as f64) {
                let g = db(cascade_gain(&sections, f));
                assert!(g <= 1e-6 && g >= -1.0 - 1e-6, "order {order} at {f} Hz: {g} dB");
            }
            // Ripple edge sits at the cutoff
            assert!((db(cascade_gain(&sections, 100.0)) + 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn chebyshev_highpass_edge() {
        let sections = chebyshev1(PassType::Highpass, 4, 0.5, 100.0, SR).unwrap();
        assert!((db(cascade_gain(&sections, 100.0)) + 0.5).abs() < 1e-6);
        assert!(cascade_gain(&sections, 5.0) < 0.01);
    }

    #[test]
    fn test_windowed_sinc_lowpass() {
        let taps = windowed_sinc(FirResponse::Lowpass(100.0), 63, SR, Window::Hamming).unwrap();
        assert!((fir_gain(&taps, 0.0) - 1.0).abs() < 1e-9);
        assert!(fir_gain(&taps, 300.0) < 0.01);
        for i in 0..31 {
            assert!((taps[i] - taps[62 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_windowed_sinc_highpass_and_bands() {
        let hp = windowed_sinc(FirResponse::Highpass(100.0), 63, SR, Window::Blackman).unwrap();
        assert!(fir_gain(&hp, 0.0) < 1e-9);
        assert!((fir_gain(&hp, 400.0) - 1.0).abs() < 0.01);

        let bp = windowed_sinc(FirResponse::Bandpass(100.0, 200.0), 101, SR, Window::Hann).unwrap();
        assert!((fir_gain(&bp, 150.0) - 1.0).abs() < 0.02);
        assert!(fir_gain(&bp, 400.0) < 0.01);

        let bs = windowed_sinc(FirResponse::Bandstop(100.0, 200.0), 101, SR, Window::Hann).unwrap();
        assert!(fir_gain(&bs, 150.0) < 0.02);
        assert!((fir_gain(&bs, 0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn even_taps_rejected_for_highpass() {
        let err = windowed_sinc(FirResponse::Highpass(100.0), 64, SR, Window::Hamming).unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter { ref param, .. } if param == "num_taps"));
    }

    #[test]
    fn test_validation_rejects_bad_arguments() {
        assert!(butterworth(PassType::Lowpass, 0, 100.0, SR).is_err());
        assert!(butterworth(PassType::Lowpass, 2, 0.0, SR).is_err());
        assert!(butterworth(PassType::Lowpass, 2, 500.0, SR).is_err());
        assert!(butterworth(PassType::Lowpass, 2, 100.0, -1.0).is_err());
        assert!(chebyshev1(PassType::Lowpass, 2, 0.0, 100.0, SR).is_err());
        assert!(rbj(RbjKind::Notch, 100.0, 0.0, SR).is_err());
        assert!(windowed_sinc(FirResponse::Bandpass(200.0, 100.0), 31, SR, Window::Hann).is_err());
        assert!(windowed_sinc(FirResponse::Lowpass(100.0), 0, SR, Window::Hann).is_err());
    }

    #[test]
    fn design_is_pure() {
        let a = chebyshev1(PassType::Highpass, 5, 0.5, 80.0, SR).unwrap();
        let b = chebyshev1(PassType::Highpass, 5, 0.5, 80.0, SR).unwrap();
        assert_eq!(a, b);
    }
}
