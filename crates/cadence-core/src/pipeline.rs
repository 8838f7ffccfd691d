//! Pipeline orchestration.
//!
//! A [`Pipeline`] is an ordered list of stages, each a [`ChannelFanout`].
//! Samples flow through the stages in declaration order, the output of one
//! feeding the next.
//!
//! ```text
//!            add_stage             process
//!   Empty ─────────────▶ Configured ───────▶ Active
//!                          ▲   │ load_state    │
//!                          │   └──────────────▶│
//!                          └───────────────────┘
//!                              clear_state
//! ```
//!
//! Every operation validates before it mutates. A failed `process` or
//! `load_state` leaves all stages exactly as they were.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{CoreError, Result};
use crate::fanout::ChannelFanout;
use crate::stage::StageDescriptor;
use crate::state::{PipelineState, StageState, StageSummary};

/// Lifecycle position of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// No stages
    Empty,
    /// Stages added, no state accumulated
    Configured,
    /// State accumulated by processing or loaded from a snapshot
    Active,
}

/// Per-call processing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Interleaved channel count (>= 1).
    pub num_channels: usize,
    /// Run the stages on a scoped worker thread instead of the caller's.
    pub offload: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            num_channels: 1,
            offload: false,
        }
    }
}

impl ProcessOptions {
    /// Options for `num_channels` interleaved channels.
    pub fn channels(num_channels: usize) -> Self {
        Self {
            num_channels,
            ..Self::default()
        }
    }

    /// Set whether processing runs on a worker thread.
    pub fn with_offload(mut self, offload: bool) -> Self {
        self.offload = offload;
        self
    }
}

/// Ordered chain of stateful stages over an interleaved multi-channel stream.
///
/// # Example
///
/// ```rust
/// use cadence_core::{Pipeline, ProcessOptions, StageDescriptor, StageKind, WindowSpec};
///
/// let mut pipeline = Pipeline::new();
/// pipeline
///     .add_stage(StageDescriptor::moving(StageKind::Mean, WindowSpec::Samples(3)))
///     .unwrap();
///
/// let out = pipeline
///     .process(&[1.0, 2.0, 3.0, 4.0, 5.0], None, ProcessOptions::default())
///     .unwrap();
/// assert_eq!(out, [1.0, 1.5, 2.0, 3.0, 4.0]);
///
/// // State carries over to the next call
/// let next = pipeline.process(&[6.0], None, ProcessOptions::default()).unwrap();
/// assert_eq!(next, [5.0]);
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<ChannelFanout>,
    status: PipelineStatus,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            status: PipelineStatus::Empty,
        }
    }

    /// Build a pipeline from descriptors, in order.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = StageDescriptor>) -> Result<Self> {
        let mut pipeline = Self::new();
        for descriptor in descriptors {
            pipeline.add_stage(descriptor)?;
        }
        Ok(pipeline)
    }

    /// Append a stage.
    ///
    /// Fails with [`CoreError::InvalidStage`] if the descriptor's parameters
    /// are invalid; the pipeline is unchanged.
    pub fn add_stage(&mut self, descriptor: StageDescriptor) -> Result<()> {
        let index = self.stages.len();
        let stage = ChannelFanout::new(descriptor)
            .map_err(|e| CoreError::invalid_stage(index, e.to_string()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "pipeline: add stage {index} ({})",
            stage.descriptor().kind.name()
        );

        self.stages.push(stage);
        if self.status == PipelineStatus::Empty {
            self.status = PipelineStatus::Configured;
        }
        Ok(())
    }

    /// Lifecycle status.
    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True if no stages have been added.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage descriptors in order.
    pub fn descriptors(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.stages.iter().map(ChannelFanout::descriptor)
    }

    /// True if any stage needs per-frame timestamps.
    pub fn needs_timestamps(&self) -> bool {
        self.descriptors().any(StageDescriptor::needs_timestamps)
    }

    fn validate_input(
        &self,
        samples: &[f32],
        timestamps: Option<&[f64]>,
        num_channels: usize,
    ) -> Result<()> {
        if num_channels == 0 {
            return Err(CoreError::shape_mismatch("channel count", 1, 0));
        }
        if samples.len() % num_channels != 0 {
            return Err(CoreError::shape_mismatch(
                "interleaved samples",
                samples.len().next_multiple_of(num_channels),
                samples.len(),
            ));
        }
        let frames = samples.len() / num_channels;
        match timestamps {
            Some(ts) => {
                if ts.len() != frames {
                    return Err(CoreError::shape_mismatch("timestamps", frames, ts.len()));
                }
                if ts.iter().any(|t| !t.is_finite()) {
                    return Err(CoreError::invalid_parameter("timestamps", "must be finite"));
                }
                if ts.windows(2).any(|w| w[1] < w[0]) {
                    return Err(CoreError::invalid_parameter(
                        "timestamps",
                        "must be non-decreasing",
                    ));
                }
            }
            None if self.needs_timestamps() => {
                return Err(CoreError::shape_mismatch("timestamps", frames, 0));
            }
            None => {}
        }
        Ok(())
    }

    fn run(
        stages: &mut [ChannelFanout],
        samples: &[f32],
        timestamps: Option<&[f64]>,
        num_channels: usize,
    ) -> Result<Vec<f32>> {
        let mut current = samples.to_vec();
        let mut next = vec![0.0; samples.len()];
        for stage in stages.iter_mut() {
            stage.process(&current, num_channels, timestamps, &mut next)?;
            std::mem::swap(&mut current, &mut next);
        }
        Ok(current)
    }

    /// Run interleaved `samples` through every stage.
    ///
    /// `timestamps` holds one non-decreasing value per frame and is required
    /// when any stage has a duration window. Fails with
    /// [`CoreError::ShapeMismatch`] if the sample count is not a multiple of
    /// the channel count, the timestamps have the wrong length, or required
    /// timestamps are missing.
    pub fn process(
        &mut self,
        samples: &[f32],
        timestamps: Option<&[f64]>,
        options: ProcessOptions,
    ) -> Result<Vec<f32>> {
        self.validate_input(samples, timestamps, options.num_channels)?;
        let ProcessOptions {
            num_channels,
            offload,
        } = options;

        let output = if offload {
            let stages = &mut self.stages;
            std::thread::scope(|scope| {
                let worker = std::thread::Builder::new()
                    .name("cadence-pipeline".into())
                    .spawn_scoped(scope, move || {
                        Self::run(stages, samples, timestamps, num_channels)
                    })
                    .map_err(|e| CoreError::invalid_parameter("offload", e.to_string()))?;
                match worker.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            })?
        } else {
            Self::run(&mut self.stages, samples, timestamps, num_channels)?
        };

        if !self.stages.is_empty() {
            self.status = PipelineStatus::Active;
        }
        Ok(output)
    }

    /// Output `process` would produce, without changing any state.
    pub fn process_copy(
        &self,
        samples: &[f32],
        timestamps: Option<&[f64]>,
        options: ProcessOptions,
    ) -> Result<Vec<f32>> {
        self.validate_input(samples, timestamps, options.num_channels)?;
        let mut stages = self.stages.clone();
        Self::run(&mut stages, samples, timestamps, options.num_channels)
    }

    /// Snapshot every stage's state.
    pub fn save_state(&self) -> PipelineState {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        let stages: Vec<StageState> = self
            .stages
            .iter()
            .enumerate()
            .map(|(index, stage)| StageState {
                index,
                kind: stage.descriptor().kind.name().to_string(),
                descriptor: stage.descriptor().clone(),
                state: stage.state(),
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!("pipeline: save state ({} stages)", stages.len());

        PipelineState {
            timestamp,
            stage_count: stages.len(),
            stages,
        }
    }

    /// Replace every stage's state.
    ///
    /// Fails with [`CoreError::StageCountMismatch`] if the stage counts differ,
    /// [`CoreError::InvalidStage`] if a stage's type or descriptor differs, and
    /// [`CoreError::ShapeMismatch`] if its buffers have the wrong shape. All
    /// stages are validated before any is updated.
    pub fn load_state(&mut self, state: &PipelineState) -> Result<()> {
        if state.stage_count != self.stages.len() || state.stages.len() != self.stages.len() {
            let actual = if state.stage_count != self.stages.len() {
                state.stage_count
            } else {
                state.stages.len()
            };
            return Err(CoreError::StageCountMismatch {
                expected: self.stages.len(),
                actual,
            });
        }

        let mut prepared = Vec::with_capacity(self.stages.len());
        for (i, (stage, saved)) in self.stages.iter().zip(&state.stages).enumerate() {
            if saved.index != i {
                return Err(CoreError::invalid_stage(
                    i,
                    format!("saved stage has index {}", saved.index),
                ));
            }
            let name = stage.descriptor().kind.name();
            if saved.kind != name {
                return Err(CoreError::invalid_stage(
                    i,
                    format!("saved type '{}' does not match '{name}'", saved.kind),
                ));
            }
            if saved.descriptor != *stage.descriptor() {
                return Err(CoreError::invalid_stage(
                    i,
                    "saved descriptor differs from the stage configuration",
                ));
            }
            let channels = stage.prepare_state(&saved.state).map_err(|e| match e {
                CoreError::ShapeMismatch { .. } => e,
                other => CoreError::invalid_stage(i, other.to_string()),
            })?;
            prepared.push(channels);
        }

        for (stage, channels) in self.stages.iter_mut().zip(prepared) {
            stage.commit(channels);
        }
        if !self.stages.is_empty() {
            self.status = PipelineStatus::Active;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("pipeline: load state ({} stages)", self.stages.len());

        Ok(())
    }

    /// Reset every stage. Descriptors and channel counts are kept.
    pub fn clear_state(&mut self) {
        for stage in &mut self.stages {
            stage.clear_state();
        }
        if !self.stages.is_empty() {
            self.status = PipelineStatus::Configured;
        }
    }

    /// One summary row per stage.
    pub fn list_state(&self) -> Vec<StageSummary> {
        self.stages
            .iter()
            .enumerate()
            .map(|(index, stage)| StageSummary {
                index,
                kind: stage.descriptor().kind.name().to_string(),
                mode: stage.descriptor().mode,
                window_size: stage.window_size(),
                num_channels: stage.num_channels(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageKind, WindowSpec};

    fn rms_then_crossing() -> Pipeline {
        Pipeline::from_descriptors([
            StageDescriptor::moving(StageKind::Rms, WindowSpec::Samples(4)),
            StageDescriptor::moving(
                StageKind::ThresholdCrossing { threshold: 0.5 },
                WindowSpec::Samples(8),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_lifecycle() {
        let mut p = Pipeline::new();
        assert_eq!(p.status(), PipelineStatus::Empty);
        p.add_stage(StageDescriptor::moving(StageKind::Mean, WindowSpec::Samples(2)))
            .unwrap();
        assert_eq!(p.status(), PipelineStatus::Configured);
        p.process(&[1.0], None, ProcessOptions::default()).unwrap();
        assert_eq!(p.status(), PipelineStatus::Active);
        p.clear_state();
        assert_eq!(p.status(), PipelineStatus::Configured);
    }

    #[test]
    fn invalid_stage_reports_index() {
        let mut p = rms_then_crossing();
        let err = p
            .add_stage(StageDescriptor::moving(StageKind::Mean, WindowSpec::Samples(0)))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStage { index: 2, .. }));
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn empty_pipeline_passes_samples_through() {
        let mut p = Pipeline::new();
        let out = p.process(&[1.0, 2.0], None, ProcessOptions::channels(2)).unwrap();
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(p.status(), PipelineStatus::Empty);
    }

    #[test]
    fn ragged_samples_rejected_without_change() {
        let mut p = rms_then_crossing();
        let before = p.save_state().stages;
        let err = p.process(&[0.0; 5], None, ProcessOptions::channels(2)).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { .. }));
        assert_eq!(p.save_state().stages, before);
        assert_eq!(p.status(), PipelineStatus::Configured);
    }

    #[test]
    fn duration_stage_requires_timestamps() {
        let mut p = Pipeline::from_descriptors([StageDescriptor::moving(
            StageKind::Mean,
            WindowSpec::Duration {
                seconds: 1.0,
                max_samples: 16,
            },
        )])
        .unwrap();
        let opts = ProcessOptions::default();
        assert!(matches!(
            p.process(&[1.0, 2.0], None, opts),
            Err(CoreError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            p.process(&[1.0, 2.0], Some(&[0.0]), opts),
            Err(CoreError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            p.process(&[1.0, 2.0], Some(&[1.0, 0.5]), opts),
            Err(CoreError::InvalidParameter { .. })
        ));
        let out = p.process(&[1.0, 3.0], Some(&[0.0, 0.5]), opts).unwrap();
        assert_eq!(out, [1.0, 2.0]);
    }

    #[test]
    fn process_copy_leaves_state_alone() {
        let mut p = rms_then_crossing();
        let input: Vec<f32> = (0..32).map(|i| (i as f32 * 0.4).sin()).collect();
        p.process(&input[..16], None, ProcessOptions::default()).unwrap();
        let before = p.save_state().stages;
        let copy = p.process_copy(&input[16..], None, ProcessOptions::default()).unwrap();
        assert_eq!(p.save_state().stages, before);
        let real = p.process(&input[16..], None, ProcessOptions::default()).unwrap();
        assert_eq!(copy, real);
    }

    #[test]
    fn offload_matches_inline() {
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).cos()).collect();
        let mut inline = rms_then_crossing();
        let mut offloaded = rms_then_crossing();
        let a = inline.process(&input, None, ProcessOptions::channels(2)).unwrap();
        let b = offloaded
            .process(&input, None, ProcessOptions::channels(2).with_offload(true))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(inline.save_state().stages, offloaded.save_state().stages);
    }

    #[test]
    fn stage_count_mismatch_on_load() {
        let mut p = rms_then_crossing();
        let mut one = Pipeline::from_descriptors([StageDescriptor::moving(
            StageKind::Rms,
            WindowSpec::Samples(4),
        )])
        .unwrap();
        let err = p.load_state(&one.save_state()).unwrap_err();
        assert_eq!(
            err,
            CoreError::StageCountMismatch {
                expected: 2,
                actual: 1
            }
        );
        let err = one.load_state(&p.save_state()).unwrap_err();
        assert!(matches!(err, CoreError::StageCountMismatch { .. }));
    }

    #[test]
    fn descriptor_mismatch_on_load() {
        let mut p = rms_then_crossing();
        let other = Pipeline::from_descriptors([
            StageDescriptor::moving(StageKind::Rms, WindowSpec::Samples(4)),
            StageDescriptor::moving(
                StageKind::ThresholdCrossing { threshold: 0.9 },
                WindowSpec::Samples(8),
            ),
        ])
        .unwrap();
        let err = p.load_state(&other.save_state()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStage { index: 1, .. }));
    }

    #[test]
    fn list_state_rows() {
        let mut p = rms_then_crossing();
        p.process(&[0.0; 6], None, ProcessOptions::channels(3)).unwrap();
        let rows = p.list_state();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, "rms");
        assert_eq!(rows[0].window_size, 4);
        assert_eq!(rows[1].kind, "threshold_crossing");
        assert_eq!(rows[1].num_channels, 3);
    }
}
