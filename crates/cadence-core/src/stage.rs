//! Stage descriptors.
//!
//! A [`StageDescriptor`] is the immutable configuration of one pipeline stage:
//! what it computes ([`StageKind`], with its parameters), whether it keeps
//! state between calls ([`Mode`]), and how its window is sized
//! ([`WindowSpec`]). It fixes the shape of the stage's saved state, and a
//! saved state only loads into a stage with an equal descriptor.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::filter::{BiquadCoefficients, ConvolutionMode, LmsOutput};

/// Stateless whole-input computation or stateful streaming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Compute over each input as a whole; nothing persists between calls
    Batch,
    /// Slide over the stream, carrying state across calls
    #[default]
    Moving,
}

/// Window sizing for statistic stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSpec {
    /// The last `n` samples
    Samples(usize),
    /// Samples no older than `seconds`, at most `max_samples` of them
    Duration {
        /// Span in the caller's timestamp units (seconds).
        seconds: f64,
        /// Buffer capacity.
        #[serde(rename = "maxSamples")]
        max_samples: usize,
    },
}

impl WindowSpec {
    /// Buffer capacity this window needs.
    pub fn capacity(&self) -> usize {
        match *self {
            WindowSpec::Samples(n) => n,
            WindowSpec::Duration { max_samples, .. } => max_samples,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            WindowSpec::Samples(0) => Err(CoreError::invalid_parameter(
                "window_size",
                "must be >= 1",
            )),
            WindowSpec::Samples(_) => Ok(()),
            WindowSpec::Duration {
                seconds,
                max_samples,
            } => {
                if !(seconds.is_finite() && seconds > 0.0) {
                    return Err(CoreError::invalid_parameter(
                        "window_seconds",
                        format!("must be positive, got {seconds}"),
                    ));
                }
                if max_samples == 0 {
                    return Err(CoreError::invalid_parameter("max_samples", "must be >= 1"));
                }
                Ok(())
            }
        }
    }
}

/// What a stage computes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Arithmetic mean
    Mean,
    /// Root mean square
    Rms,
    /// Mean absolute value
    MeanAbsoluteValue,
    /// Population variance
    Variance,
    /// Standard score of the newest sample
    ZScore {
        /// Standard-deviation floor.
        epsilon: f64,
    },
    /// Sum of absolute first differences
    WaveformLength,
    /// Count of slope sign changes
    SlopeSignChange {
        /// Minimum product of adjacent slopes.
        threshold: f64,
    },
    /// Count of threshold crossings
    ThresholdCrossing {
        /// Crossing level.
        threshold: f64,
    },
    /// FIR convolution with designed taps
    Fir {
        /// Kernel coefficients.
        taps: Vec<f64>,
        /// Convolution strategy.
        convolution: ConvolutionMode,
    },
    /// Cascaded biquad IIR filter
    Iir {
        /// Normalized sections, applied in order.
        sections: Vec<BiquadCoefficients>,
    },
    /// LMS/NLMS adaptive line enhancer
    Lms {
        /// Number of taps.
        order: usize,
        /// Adaptation rate μ.
        #[serde(rename = "stepSize")]
        step_size: f32,
        /// Prediction delay in samples.
        delay: usize,
        /// Use the NLMS update.
        normalized: bool,
        /// Emitted signal.
        output: LmsOutput,
    },
}

impl StageKind {
    /// Type name written into saved state.
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Mean => "mean",
            StageKind::Rms => "rms",
            StageKind::MeanAbsoluteValue => "mean_absolute_value",
            StageKind::Variance => "variance",
            StageKind::ZScore { .. } => "z_score",
            StageKind::WaveformLength => "waveform_length",
            StageKind::SlopeSignChange { .. } => "slope_sign_change",
            StageKind::ThresholdCrossing { .. } => "threshold_crossing",
            StageKind::Fir { .. } => "fir",
            StageKind::Iir { .. } => "iir",
            StageKind::Lms { .. } => "lms",
        }
    }

    /// True for sliding-window statistics, false for filters.
    pub fn is_statistic(&self) -> bool {
        !matches!(
            self,
            StageKind::Fir { .. } | StageKind::Iir { .. } | StageKind::Lms { .. }
        )
    }

    fn validate(&self) -> Result<()> {
        match self {
            StageKind::ZScore { epsilon } if !(epsilon.is_finite() && *epsilon > 0.0) => Err(
                CoreError::invalid_parameter("epsilon", format!("must be positive, got {epsilon}")),
            ),
            StageKind::SlopeSignChange { threshold } | StageKind::ThresholdCrossing { threshold }
                if !threshold.is_finite() =>
            {
                Err(CoreError::invalid_parameter("threshold", "must be finite"))
            }
            // Filter parameters are checked by the kernel constructors
            _ => Ok(()),
        }
    }
}

/// Immutable configuration of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Computation and its parameters.
    pub kind: StageKind,
    /// Batch or moving.
    pub mode: Mode,
    /// Window sizing (used by moving statistics).
    pub window: WindowSpec,
}

impl StageDescriptor {
    /// Create a descriptor.
    pub fn new(kind: StageKind, mode: Mode, window: WindowSpec) -> Self {
        Self { kind, mode, window }
    }

    /// Moving-mode descriptor.
    pub fn moving(kind: StageKind, window: WindowSpec) -> Self {
        Self::new(kind, Mode::Moving, window)
    }

    /// Batch-mode descriptor; the window is unused.
    pub fn batch(kind: StageKind) -> Self {
        Self::new(kind, Mode::Batch, WindowSpec::Samples(1))
    }

    /// Moving filter descriptor; filters size their own buffers.
    pub fn filter(kind: StageKind) -> Self {
        Self::new(kind, Mode::Moving, WindowSpec::Samples(1))
    }

    /// True if processing this stage requires per-frame timestamps.
    pub fn needs_timestamps(&self) -> bool {
        self.mode == Mode::Moving
            && self.kind.is_statistic()
            && matches!(self.window, WindowSpec::Duration { .. })
    }

    /// Check parameters that do not depend on building a kernel.
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        self.kind.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_window_rejected() {
        let d = StageDescriptor::moving(StageKind::Mean, WindowSpec::Samples(0));
        assert!(matches!(d.validate(), Err(CoreError::InvalidParameter { .. })));
    }

    #[test]
    fn duration_window_needs_positive_span() {
        let d = StageDescriptor::moving(
            StageKind::Rms,
            WindowSpec::Duration {
                seconds: 0.0,
                max_samples: 10,
            },
        );
        assert!(d.validate().is_err());
    }

    #[test]
    fn epsilon_and_threshold_validated() {
        let z = StageDescriptor::moving(StageKind::ZScore { epsilon: -1.0 }, WindowSpec::Samples(4));
        assert!(z.validate().is_err());
        let t = StageDescriptor::moving(
            StageKind::ThresholdCrossing {
                threshold: f64::NAN,
            },
            WindowSpec::Samples(4),
        );
        assert!(t.validate().is_err());
    }

    #[test]
    fn needs_timestamps_only_for_moving_duration_statistics() {
        let span = WindowSpec::Duration {
            seconds: 1.0,
            max_samples: 8,
        };
        assert!(StageDescriptor::moving(StageKind::Mean, span).needs_timestamps());
        assert!(!StageDescriptor::new(StageKind::Mean, Mode::Batch, span).needs_timestamps());
        assert!(!StageDescriptor::moving(StageKind::Mean, WindowSpec::Samples(8)).needs_timestamps());
    }

    #[test]
    fn descriptor_json_shape() {
        let d = StageDescriptor::moving(
            StageKind::ThresholdCrossing { threshold: 1.0 },
            WindowSpec::Samples(100),
        );
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"]["threshold_crossing"]["threshold"], 1.0);
        assert_eq!(json["mode"], "moving");
        assert_eq!(json["window"]["samples"], 100);
        let back: StageDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn names_match_serde_tags() {
        for kind in [
            StageKind::Mean,
            StageKind::MeanAbsoluteValue,
            StageKind::WaveformLength,
        ] {
            let json = serde_json::to_value(&kind).unwrap();
            assert_eq!(json, kind.name());
        }
    }
}
