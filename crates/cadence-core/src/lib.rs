//! Cadence Core - stateful streaming DSP
//!
//! This crate turns an interleaved multi-channel sample stream into derived
//! signals through a chain of stages, and can pause and resume that chain
//! anywhere without changing its output.
//!
//! # Building blocks
//!
//! ## Storage
//!
//! - [`RingBuffer`] - fixed-capacity FIFO behind every window and history
//!
//! ## Statistics
//!
//! - [`policy`] - mean, RMS, mean absolute value, variance, z-score, waveform
//!   length, slope sign changes and threshold crossings, each O(1) per sample
//! - [`SlidingWindow`] - drives a policy over a count- or duration-based window
//!
//! ## Filters
//!
//! - [`filter::FirFilter`] - direct or FFT overlap-add convolution
//! - [`filter::IirFilter`] - cascaded biquads
//! - [`filter::LmsFilter`] - adaptive line enhancer
//! - [`filter::design`] - coefficient design
//!
//! ## Orchestration
//!
//! - [`StageDescriptor`] - immutable configuration of one stage
//! - [`ChannelFanout`] - one kernel per channel, created on first use
//! - [`Pipeline`] - ordered stages with save, load, clear and list of state
//! - [`PipelineState`] - the serializable state tree
//!
//! # Continuity
//!
//! Splitting a stream into any sequence of `process` calls, with the state
//! saved and loaded into a fresh pipeline between any two of them, yields the
//! same output as one uninterrupted call.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{Pipeline, ProcessOptions, StageDescriptor, StageKind, WindowSpec};
//!
//! let mut live = Pipeline::new();
//! live.add_stage(StageDescriptor::moving(StageKind::Rms, WindowSpec::Samples(4)))
//!     .unwrap();
//! live.process(&[1.0, -1.0, 1.0], None, ProcessOptions::default()).unwrap();
//!
//! let mut resumed = live.clone();
//! resumed.clear_state();
//! resumed.load_state(&live.save_state()).unwrap();
//!
//! let a = live.process(&[0.5], None, ProcessOptions::default()).unwrap();
//! let b = resumed.process(&[0.5], None, ProcessOptions::default()).unwrap();
//! assert_eq!(a, b);
//! ```

pub mod buffer;
mod error;
pub mod fanout;
pub mod filter;
pub mod kernel;
pub mod pipeline;
pub mod policy;
pub mod stage;
pub mod state;
pub mod window;

pub use buffer::{RingBuffer, RingSnapshot};
pub use error::{CoreError, Result};
pub use fanout::ChannelFanout;
pub use kernel::StageKernel;
pub use pipeline::{Pipeline, PipelineStatus, ProcessOptions};
pub use policy::{PolicyState, StatisticPolicy};
pub use stage::{Mode, StageDescriptor, StageKind, WindowSpec};
pub use state::{ChannelState, FanoutState, KernelState, PipelineState, StageState, StageSummary};
pub use window::{AnyWindow, SlidingWindow};
