//! Flat, TOML-friendly stage configuration.
//!
//! A [`StageConfig`] names its computation with a `kind` string and carries
//! only the fields that kind needs. Filter kinds may either give coefficients
//! directly (`fir` with `taps`, `iir` with `sections`) or ask for a design
//! (`fir` with `response`, `butterworth`, `chebyshev1`, `biquad`), in which
//! case coefficients are computed for the pipeline's sample rate.

use cadence_core::filter::design::{self, FirResponse, PassType, RbjKind};
use cadence_core::filter::{BiquadCoefficients, ConvolutionMode, LmsOutput};
use cadence_core::policy::DEFAULT_EPSILON;
use cadence_core::{Mode, StageDescriptor, StageKind, WindowSpec};
use cadence_fft::Window;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Stage kind names accepted by [`StageConfig::to_descriptor`].
pub static STAGE_KINDS: &[&str] = &[
    "mean",
    "rms",
    "mean_absolute_value",
    "variance",
    "z_score",
    "waveform_length",
    "slope_sign_change",
    "threshold_crossing",
    "fir",
    "iir",
    "butterworth",
    "chebyshev1",
    "biquad",
    "lms",
];

/// Default biquad quality factor (Butterworth Q).
pub const DEFAULT_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Configuration for a single stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    /// Stage kind (see [`STAGE_KINDS`]).
    pub kind: String,

    /// Batch or moving.
    #[serde(default)]
    pub mode: Mode,

    /// Count window length for moving statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,

    /// Duration window span in seconds for moving statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<f64>,

    /// Buffer capacity of a duration window. Defaults to
    /// `ceil(window_seconds * sample_rate) + 1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_samples: Option<usize>,

    /// Slope-sign-change or crossing threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    /// Z-score standard-deviation floor (default 1e-6).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,

    /// Explicit FIR coefficients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taps: Option<Vec<f64>>,

    /// Designed FIR length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_taps: Option<usize>,

    /// Design window name for FIR design (default `hamming`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,

    /// FIR convolution strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convolution: Option<ConvolutionMode>,

    /// Response shape: `lowpass`, `highpass`, `bandpass`, `bandstop`,
    /// `notch` or `peaking`, depending on the kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Cutoff or center frequency in Hz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<f64>,

    /// Upper band edge in Hz for band responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff_high: Option<f64>,

    /// IIR design order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,

    /// Chebyshev passband ripple in dB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ripple_db: Option<f64>,

    /// Biquad quality factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<f64>,

    /// Peaking biquad gain in dB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_db: Option<f64>,

    /// Explicit biquad sections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<BiquadCoefficients>>,

    /// LMS adaptation rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_size: Option<f32>,

    /// LMS decorrelation delay in samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<usize>,

    /// Use the normalized (NLMS) update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<bool>,

    /// LMS output signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<LmsOutput>,
}

impl StageConfig {
    /// Create a stage config of the given kind with every parameter unset.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Set the mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set a count window.
    pub fn with_window_size(mut self, n: usize) -> Self {
        self.window_size = Some(n);
        self
    }

    /// Set a duration window.
    pub fn with_window_seconds(mut self, seconds: f64) -> Self {
        self.window_seconds = Some(seconds);
        self
    }

    /// Set the threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Set the response shape.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Set the cutoff frequency.
    pub fn with_cutoff(mut self, hz: f64) -> Self {
        self.cutoff = Some(hz);
        self
    }

    /// Set the design order.
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = Some(order);
        self
    }

    /// Set explicit FIR taps.
    pub fn with_taps(mut self, taps: Vec<f64>) -> Self {
        self.taps = Some(taps);
        self
    }

    /// Resolve into a validated [`StageDescriptor`] for `sample_rate`.
    ///
    /// Unknown kinds fail with [`ConfigError::UnknownStage`]; missing or
    /// out-of-range values fail with [`ConfigError::InvalidParameter`].
    pub fn to_descriptor(&self, sample_rate: f64) -> Result<StageDescriptor> {
        let kind = self.stage_kind(sample_rate)?;
        let window = if kind.is_statistic() && self.mode == Mode::Moving {
            self.window_spec(sample_rate)?
        } else {
            WindowSpec::Samples(1)
        };
        let descriptor = StageDescriptor::new(kind, self.mode, window);
        descriptor
            .validate()
            .map_err(|e| ConfigError::in_stage(&self.kind, e))?;
        Ok(descriptor)
    }

    fn stage_kind(&self, sample_rate: f64) -> Result<StageKind> {
        let threshold = self.threshold.unwrap_or(0.0);
        Ok(match self.kind.as_str() {
            "mean" => StageKind::Mean,
            "rms" => StageKind::Rms,
            "mean_absolute_value" | "mav" => StageKind::MeanAbsoluteValue,
            "variance" => StageKind::Variance,
            "z_score" => StageKind::ZScore {
                epsilon: self.epsilon.unwrap_or(DEFAULT_EPSILON),
            },
            "waveform_length" => StageKind::WaveformLength,
            "slope_sign_change" => StageKind::SlopeSignChange { threshold },
            "threshold_crossing" => StageKind::ThresholdCrossing { threshold },
            "fir" => StageKind::Fir {
                taps: self.fir_taps(sample_rate)?,
                convolution: self.convolution.unwrap_or_default(),
            },
            "iir" => StageKind::Iir {
                sections: self.require("sections", self.sections.clone())?,
            },
            "butterworth" => StageKind::Iir {
                sections: design::butterworth(
                    self.pass_type()?,
                    self.require("order", self.order)?,
                    self.require("cutoff", self.cutoff)?,
                    sample_rate,
                )
                .map_err(|e| ConfigError::in_stage(&self.kind, e))?,
            },
            "chebyshev1" => StageKind::Iir {
                sections: design::chebyshev1(
                    self.pass_type()?,
                    self.require("order", self.order)?,
                    self.require("ripple_db", self.ripple_db)?,
                    self.require("cutoff", self.cutoff)?,
                    sample_rate,
                )
                .map_err(|e| ConfigError::in_stage(&self.kind, e))?,
            },
            "biquad" => StageKind::Iir {
                sections: vec![
                    design::rbj(
                        self.rbj_kind()?,
                        self.require("cutoff", self.cutoff)?,
                        self.q.unwrap_or(DEFAULT_Q),
                        sample_rate,
                    )
                    .map_err(|e| ConfigError::in_stage(&self.kind, e))?,
                ],
            },
            "lms" => StageKind::Lms {
                order: self.require("order", self.order)?,
                step_size: self.step_size.unwrap_or(0.01),
                delay: self.delay.unwrap_or(1),
                normalized: self.normalized.unwrap_or(true),
                output: self.output.unwrap_or_default(),
            },
            other => return Err(ConfigError::UnknownStage(other.to_string())),
        })
    }

    fn window_spec(&self, sample_rate: f64) -> Result<WindowSpec> {
        match (self.window_size, self.window_seconds) {
            (Some(n), None) => Ok(WindowSpec::Samples(n)),
            (None, Some(seconds)) => {
                let max_samples = match self.max_samples {
                    Some(n) => n,
                    None if seconds.is_finite() && seconds > 0.0 => {
                        (seconds * sample_rate).ceil() as usize + 1
                    }
                    None => 1,
                };
                Ok(WindowSpec::Duration {
                    seconds,
                    max_samples,
                })
            }
            (Some(_), Some(_)) => Err(ConfigError::invalid_parameter(
                &self.kind,
                "window_size",
                "cannot be combined with window_seconds",
            )),
            (None, None) => Err(ConfigError::invalid_parameter(
                &self.kind,
                "window_size",
                "moving statistics need window_size or window_seconds",
            )),
        }
    }

    fn fir_taps(&self, sample_rate: f64) -> Result<Vec<f64>> {
        if let Some(taps) = &self.taps {
            if self.response.is_some() {
                return Err(ConfigError::invalid_parameter(
                    &self.kind,
                    "taps",
                    "cannot be combined with a designed response",
                ));
            }
            return Ok(taps.clone());
        }

        let cutoff = self.require("cutoff", self.cutoff)?;
        let response = match self.require("response", self.response.as_deref())? {
            "lowpass" => FirResponse::Lowpass(cutoff),
            "highpass" => FirResponse::Highpass(cutoff),
            "bandpass" => FirResponse::Bandpass(cutoff, self.require("cutoff_high", self.cutoff_high)?),
            "bandstop" => FirResponse::Bandstop(cutoff, self.require("cutoff_high", self.cutoff_high)?),
            other => {
                return Err(ConfigError::invalid_parameter(
                    &self.kind,
                    "response",
                    format!("unknown FIR response '{other}'"),
                ));
            }
        };
        let window = match self.window.as_deref() {
            None => Window::Hamming,
            Some(name) => Window::from_name(name).ok_or_else(|| {
                ConfigError::invalid_parameter(&self.kind, "window", format!("unknown window '{name}'"))
            })?,
        };
        design::windowed_sinc(
            response,
            self.require("num_taps", self.num_taps)?,
            sample_rate,
            window,
        )
        .map_err(|e| ConfigError::in_stage(&self.kind, e))
    }

    fn pass_type(&self) -> Result<PassType> {
        match self.require("response", self.response.as_deref())? {
            "lowpass" => Ok(PassType::Lowpass),
            "highpass" => Ok(PassType::Highpass),
            other => Err(ConfigError::invalid_parameter(
                &self.kind,
                "response",
                format!("expected lowpass or highpass, got '{other}'"),
            )),
        }
    }

    fn rbj_kind(&self) -> Result<RbjKind> {
        Ok(match self.require("response", self.response.as_deref())? {
            "lowpass" => RbjKind::Lowpass,
            "highpass" => RbjKind::Highpass,
            "bandpass" => RbjKind::Bandpass,
            "notch" => RbjKind::Notch,
            "peaking" => RbjKind::Peaking(self.require("gain_db", self.gain_db)?),
            other => {
                return Err(ConfigError::invalid_parameter(
                    &self.kind,
                    "response",
                    format!("unknown biquad response '{other}'"),
                ));
            }
        })
    }

    fn require<T>(&self, param: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| ConfigError::invalid_parameter(&self.kind, param, "is required"))
    }
}
