//! Persistable state tree.
//!
//! ```text
//! PipelineState
//! └── stages: [StageState]            one per stage, in order
//!     ├── descriptor                  immutable stage configuration
//!     └── state: FanoutState
//!         └── channels: [ChannelState]   one per channel, in index order
//!             ├── buffer / filled     ring contents, capacity-length
//!             ├── timestamps          duration windows only
//!             └── kernel: KernelState policy aggregate or filter memory
//! ```
//!
//! Field names serialize in camelCase. Human-readable encoders see each
//! channel flattened, with the kernel's fields beside its buffer and a
//! `kernel` tag naming their shape:
//!
//! ```text
//! {"buffer":[…], "filled":3, "timestamps":[], "kernel":"running", "sum":…, "sumSq":…}
//! ```
//!
//! Positional encoders (bincode) see the nested form, with externally tagged
//! enums.

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::buffer::RingSnapshot;
use crate::policy::PolicyState;
use crate::stage::{Mode, StageDescriptor};

/// Kernel-specific part of a channel's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KernelState {
    /// Batch-mode stages keep nothing between calls
    Stateless,
    /// Sliding-window statistic aggregate
    Policy(PolicyState),
    /// FIR overlap tail (empty for direct convolution, whose history is the buffer)
    Fir {
        /// Pending overlap-add tail, `taps - 1` samples.
        tail: Vec<f64>,
    },
    /// IIR section memories
    Iir {
        /// `[x1, x2, y1, y2]` per biquad section.
        memories: Vec<[f64; 4]>,
    },
    /// Adaptive weights (input history is the buffer)
    Lms {
        /// Current tap weights.
        weights: Vec<f32>,
    },
}

/// State of one channel of one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    /// Ring contents oldest to newest, padded to capacity.
    pub buffer: Vec<f32>,
    /// Number of meaningful values in `buffer`.
    pub filled: usize,
    /// Per-sample timestamps for duration windows, padded to capacity; empty otherwise.
    pub timestamps: Vec<f64>,
    /// Kernel aggregate or memory.
    pub kernel: KernelState,
}

/// Positional channel layout.
#[derive(Serialize, Deserialize)]
struct NestedChannel<'a> {
    buffer: Cow<'a, [f32]>,
    filled: usize,
    timestamps: Cow<'a, [f64]>,
    kernel: Cow<'a, KernelState>,
}

/// Self-describing channel layout.
#[derive(Serialize, Deserialize)]
struct FlatChannel<'a> {
    buffer: Cow<'a, [f32]>,
    filled: usize,
    timestamps: Cow<'a, [f64]>,
    #[serde(flatten)]
    kernel: FlatKernel<'a>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kernel", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum FlatKernel<'a> {
    Stateless,
    Running { sum: f64, sum_sq: f64 },
    WaveformLength { sum: f64 },
    EventCount { count: u32, flags: Cow<'a, [bool]> },
    Fir { tail: Cow<'a, [f64]> },
    Iir { memories: Cow<'a, [[f64; 4]]> },
    Lms { weights: Cow<'a, [f32]> },
}

impl<'a> From<&'a KernelState> for FlatKernel<'a> {
    fn from(kernel: &'a KernelState) -> Self {
        match kernel {
            KernelState::Stateless => FlatKernel::Stateless,
            KernelState::Policy(PolicyState::Running { sum, sum_sq }) => FlatKernel::Running {
                sum: *sum,
                sum_sq: *sum_sq,
            },
            KernelState::Policy(PolicyState::WaveformLength { sum }) => {
                FlatKernel::WaveformLength { sum: *sum }
            }
            KernelState::Policy(PolicyState::EventCount { count, flags }) => FlatKernel::EventCount {
                count: *count,
                flags: Cow::Borrowed(flags),
            },
            KernelState::Fir { tail } => FlatKernel::Fir {
                tail: Cow::Borrowed(tail),
            },
            KernelState::Iir { memories } => FlatKernel::Iir {
                memories: Cow::Borrowed(memories),
            },
            KernelState::Lms { weights } => FlatKernel::Lms {
                weights: Cow::Borrowed(weights),
            },
        }
    }
}

impl From<FlatKernel<'_>> for KernelState {
    fn from(kernel: FlatKernel<'_>) -> Self {
        match kernel {
            FlatKernel::Stateless => KernelState::Stateless,
            FlatKernel::Running { sum, sum_sq } => {
                KernelState::Policy(PolicyState::Running { sum, sum_sq })
            }
            FlatKernel::WaveformLength { sum } => {
                KernelState::Policy(PolicyState::WaveformLength { sum })
            }
            FlatKernel::EventCount { count, flags } => KernelState::Policy(PolicyState::EventCount {
                count,
                flags: flags.into_owned(),
            }),
            FlatKernel::Fir { tail } => KernelState::Fir {
                tail: tail.into_owned(),
            },
            FlatKernel::Iir { memories } => KernelState::Iir {
                memories: memories.into_owned(),
            },
            FlatKernel::Lms { weights } => KernelState::Lms {
                weights: weights.into_owned(),
            },
        }
    }
}

impl Serialize for ChannelState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let buffer = Cow::Borrowed(self.buffer.as_slice());
        let timestamps = Cow::Borrowed(self.timestamps.as_slice());
        if serializer.is_human_readable() {
            FlatChannel {
                buffer,
                filled: self.filled,
                timestamps,
                kernel: FlatKernel::from(&self.kernel),
            }
            .serialize(serializer)
        } else {
            NestedChannel {
                buffer,
                filled: self.filled,
                timestamps,
                kernel: Cow::Borrowed(&self.kernel),
            }
            .serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for ChannelState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let flat = FlatChannel::deserialize(deserializer)?;
            Ok(Self {
                buffer: flat.buffer.into_owned(),
                filled: flat.filled,
                timestamps: flat.timestamps.into_owned(),
                kernel: flat.kernel.into(),
            })
        } else {
            let nested = NestedChannel::deserialize(deserializer)?;
            Ok(Self {
                buffer: nested.buffer.into_owned(),
                filled: nested.filled,
                timestamps: nested.timestamps.into_owned(),
                kernel: nested.kernel.into_owned(),
            })
        }
    }
}

impl ChannelState {
    /// Channel state with no buffered samples.
    pub fn stateless() -> Self {
        Self {
            buffer: Vec::new(),
            filled: 0,
            timestamps: Vec::new(),
            kernel: KernelState::Stateless,
        }
    }

    /// The buffer as a ring snapshot.
    pub fn buffer_snapshot(&self) -> RingSnapshot<f32> {
        RingSnapshot {
            data: self.buffer.clone(),
            filled: self.filled,
        }
    }

    /// The timestamps as a ring snapshot sharing the buffer's occupancy.
    pub fn timestamp_snapshot(&self) -> RingSnapshot<f64> {
        RingSnapshot {
            data: self.timestamps.clone(),
            filled: self.filled,
        }
    }
}

/// State of one stage's channel fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutState {
    /// Capacity of each channel's buffer (0 for kernels without one).
    pub window_size: usize,
    /// Number of channels seen so far.
    pub num_channels: usize,
    /// One entry per channel, in index order.
    pub channels: Vec<ChannelState>,
}

/// One stage's descriptor and state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageState {
    /// Position in the pipeline.
    pub index: usize,
    /// Stage type name (e.g. `"rms"`, `"fir"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Configuration the state was produced under.
    pub descriptor: StageDescriptor,
    /// Per-channel state.
    pub state: FanoutState,
}

/// Whole-pipeline snapshot, the unit of save/restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Number of stages; always equals `stages.len()` in a valid state.
    pub stage_count: usize,
    /// Stage states in pipeline order.
    pub stages: Vec<StageState>,
}

impl PipelineState {
    /// Check the structural invariants a decoder must enforce.
    ///
    /// Returns a description of the first violation.
    pub fn check_structure(&self) -> std::result::Result<(), String> {
        if self.stage_count != self.stages.len() {
            return Err(format!(
                "stageCount is {} but {} stages are present",
                self.stage_count,
                self.stages.len()
            ));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.index != i {
                return Err(format!("stage at position {i} has index {}", stage.index));
            }
            if stage.kind != stage.descriptor.kind.name() {
                return Err(format!(
                    "stage {i} type '{}' does not match its descriptor ('{}')",
                    stage.kind,
                    stage.descriptor.kind.name()
                ));
            }
            let fanout = &stage.state;
            if fanout.num_channels != fanout.channels.len() {
                return Err(format!(
                    "stage {i} numChannels is {} but {} channels are present",
                    fanout.num_channels,
                    fanout.channels.len()
                ));
            }
            for (c, channel) in fanout.channels.iter().enumerate() {
                if channel.buffer.len() != fanout.window_size {
                    return Err(format!(
                        "stage {i} channel {c} buffer has {} values, windowSize is {}",
                        channel.buffer.len(),
                        fanout.window_size
                    ));
                }
                if channel.filled > channel.buffer.len() {
                    return Err(format!(
                        "stage {i} channel {c} filled {} exceeds its buffer",
                        channel.filled
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Summary row returned by [`Pipeline::list_state`](crate::Pipeline::list_state).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    /// Position in the pipeline.
    pub index: usize,
    /// Stage type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Batch or moving.
    pub mode: Mode,
    /// Per-channel buffer capacity.
    pub window_size: usize,
    /// Channels with live state.
    pub num_channels: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageKind, WindowSpec};

    fn sample_state() -> PipelineState {
        PipelineState {
            timestamp: 1,
            stage_count: 1,
            stages: vec![StageState {
                index: 0,
                kind: "mean".to_string(),
                descriptor: StageDescriptor::moving(StageKind::Mean, WindowSpec::Samples(2)),
                state: FanoutState {
                    window_size: 2,
                    num_channels: 1,
                    channels: vec![ChannelState {
                        buffer: vec![1.0, 0.0],
                        filled: 1,
                        timestamps: Vec::new(),
                        kernel: KernelState::Policy(PolicyState::Running {
                            sum: 1.0,
                            sum_sq: 1.0,
                        }),
                    }],
                },
            }],
        }
    }

    #[test]
    fn valid_structure_passes() {
        assert_eq!(sample_state().check_structure(), Ok(()));
    }

    #[test]
    fn stage_count_must_match() {
        let mut state = sample_state();
        state.stage_count = 2;
        assert!(state.check_structure().is_err());
    }

    #[test]
    fn buffer_length_must_match_window() {
        let mut state = sample_state();
        state.stages[0].state.channels[0].buffer.push(0.0);
        assert!(state.check_structure().is_err());
    }

    #[test]
    fn type_must_match_descriptor() {
        let mut state = sample_state();
        state.stages[0].kind = "rms".to_string();
        assert!(state.check_structure().is_err());
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let json = serde_json::to_value(sample_state()).unwrap();
        assert!(json.get("stageCount").is_some());
        let stage = &json["stages"][0];
        assert_eq!(stage["type"], "mean");
        assert!(stage["state"].get("windowSize").is_some());
        assert!(stage["state"].get("numChannels").is_some());
        let channel = &stage["state"]["channels"][0];
        assert_eq!(channel["kernel"], "running");
        assert_eq!(channel["sum"], 1.0);
        assert_eq!(channel["sumSq"], 1.0);
        assert_eq!(channel["buffer"], serde_json::json!([1.0, 0.0]));
    }

    #[test]
    fn json_channel_roundtrip_for_every_kernel_shape() {
        let kernels = [
            KernelState::Stateless,
            KernelState::Policy(PolicyState::WaveformLength { sum: 0.25 }),
            KernelState::Policy(PolicyState::EventCount {
                count: 1,
                flags: vec![true, false],
            }),
            KernelState::Fir {
                tail: vec![0.1, -0.2],
            },
            KernelState::Iir {
                memories: vec![[1.0, 2.0, 3.0, 4.0]],
            },
            KernelState::Lms {
                weights: vec![0.5, -0.5],
            },
        ];
        for kernel in kernels {
            let channel = ChannelState {
                buffer: vec![0.5, 0.0],
                filled: 1,
                timestamps: vec![0.0, 0.0],
                kernel,
            };
            let text = serde_json::to_string(&channel).unwrap();
            let back: ChannelState = serde_json::from_str(&text).unwrap();
            assert_eq!(back, channel, "{text}");
        }
    }

    #[test]
    fn json_channel_rejects_unknown_kernel_tag() {
        let text = r#"{"buffer":[],"filled":0,"timestamps":[],"kernel":"spline"}"#;
        assert!(serde_json::from_str::<ChannelState>(text).is_err());
    }
}
