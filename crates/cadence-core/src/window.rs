//! Sliding-window engine.
//!
//! [`SlidingWindow`] owns a [`RingBuffer`] of samples and drives a
//! [`StatisticPolicy`] through it: every push reports the evicted and incoming
//! values to the policy, which keeps its aggregate in step with the buffer.
//!
//! A window is either count-based (the last `capacity` samples) or
//! duration-based: samples also carry timestamps, and after each push every
//! sample older than `newest_timestamp - seconds` is evicted, with the buffer
//! capacity as an upper bound.
//!
//! [`AnyWindow`] closes the set of policies into one enum so that stages can
//! hold any statistic without boxing.

use crate::buffer::{RingBuffer, RingSnapshot};
use crate::error::{CoreError, Result};
use crate::policy::{
    Mean, MeanAbsoluteValue, Rms, SlopeSignChange, StatisticPolicy, ThresholdCrossing, Variance,
    WaveformLength, ZScore,
};
use crate::stage::{StageKind, WindowSpec};
use crate::state::{ChannelState, KernelState};

#[derive(Debug, Clone)]
struct TimeSpan {
    seconds: f64,
    stamps: RingBuffer<f64>,
}

/// A statistic over the most recent samples of a stream.
///
/// # Example
///
/// ```rust
/// use cadence_core::policy::Mean;
/// use cadence_core::SlidingWindow;
///
/// let mut window = SlidingWindow::new(Mean::new(), 3).unwrap();
/// let out: Vec<f32> = [1.0, 2.0, 3.0, 4.0].iter().map(|&x| window.process(x)).collect();
/// assert_eq!(out, [1.0, 1.5, 2.0, 3.0]);
/// ```
#[derive(Debug, Clone)]
pub struct SlidingWindow<P> {
    policy: P,
    buffer: RingBuffer<f32>,
    span: Option<TimeSpan>,
}

impl<P: StatisticPolicy> SlidingWindow<P> {
    /// Count-based window of `capacity` samples.
    pub fn new(mut policy: P, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CoreError::invalid_parameter("window_size", "must be >= 1"));
        }
        policy.attach(capacity);
        Ok(Self {
            policy,
            buffer: RingBuffer::new(capacity),
            span: None,
        })
    }

    /// Duration-based window spanning `seconds`, holding at most `max_samples`.
    pub fn with_duration(policy: P, seconds: f64, max_samples: usize) -> Result<Self> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(CoreError::invalid_parameter(
                "window_seconds",
                format!("must be positive, got {seconds}"),
            ));
        }
        let mut window = Self::new(policy, max_samples)?;
        window.span = Some(TimeSpan {
            seconds,
            stamps: RingBuffer::new(max_samples),
        });
        Ok(window)
    }

    /// The policy driving this window.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Samples currently in the window.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// True for duration-based windows.
    pub fn is_timed(&self) -> bool {
        self.span.is_some()
    }

    /// Push one sample and return the statistic.
    ///
    /// A duration window reuses its newest timestamp, so nothing ages out.
    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        match self.span.as_ref().map(|s| s.stamps.newest().unwrap_or(0.0)) {
            Some(now) => self.process_timed(sample, now),
            None => self.push(sample),
        }
    }

    /// Push one sample stamped `timestamp` and return the statistic.
    ///
    /// Count-based windows ignore the timestamp.
    pub fn process_timed(&mut self, sample: f32, timestamp: f64) -> f32 {
        let Some(span) = self.span.as_mut() else {
            return self.push(sample);
        };
        let evicted = self.buffer.push(sample);
        span.stamps.push(timestamp);
        self.policy.update(evicted, sample, &self.buffer);

        let horizon = timestamp - span.seconds;
        while span.stamps.oldest().is_some_and(|t| t < horizon) {
            span.stamps.pop_front();
            if let Some(old) = self.buffer.pop_front() {
                self.policy.evict(old, &self.buffer);
            }
        }
        self.policy.compute(&self.buffer)
    }

    #[inline]
    fn push(&mut self, sample: f32) -> f32 {
        let evicted = self.buffer.push(sample);
        self.policy.update(evicted, sample, &self.buffer);
        self.policy.compute(&self.buffer)
    }

    /// Stream a block through the window.
    ///
    /// `timestamps`, when given, must be as long as `input`.
    pub fn process_block(&mut self, input: &[f32], timestamps: Option<&[f64]>, output: &mut [f32]) {
        match timestamps {
            Some(ts) => {
                for ((out, &x), &t) in output.iter_mut().zip(input).zip(ts) {
                    *out = self.process_timed(x, t);
                }
            }
            None => {
                for (out, &x) in output.iter_mut().zip(input) {
                    *out = self.process(x);
                }
            }
        }
    }

    /// Batch mode: the closed-form statistic of the whole input, written to
    /// every output position. The buffer is not touched.
    pub fn batch(&self, input: &[f32], output: &mut [f32]) {
        let value = self.policy.batch(input);
        output[..input.len()].fill(value);
    }

    /// Persistable state of buffer, timestamps and aggregate.
    pub fn state(&self) -> ChannelState {
        let RingSnapshot { data, filled } = self.buffer.snapshot();
        ChannelState {
            buffer: data,
            filled,
            timestamps: self
                .span
                .as_ref()
                .map(|s| s.stamps.snapshot().data)
                .unwrap_or_default(),
            kernel: KernelState::Policy(self.policy.state()),
        }
    }

    /// Load state produced by [`state`](Self::state) on an identically
    /// configured window. Validates everything first; nothing changes on error.
    pub fn set_state(&mut self, state: &ChannelState) -> Result<()> {
        let KernelState::Policy(aggregate) = &state.kernel else {
            return Err(CoreError::invalid_parameter(
                "channel state",
                "window stages need a policy aggregate",
            ));
        };

        let mut buffer = RingBuffer::new(self.buffer.capacity());
        buffer.restore(&state.buffer_snapshot())?;

        let stamps = match &self.span {
            Some(span) => {
                let mut stamps = RingBuffer::new(span.stamps.capacity());
                stamps.restore(&state.timestamp_snapshot())?;
                Some(stamps)
            }
            None if state.timestamps.is_empty() => None,
            None => {
                return Err(CoreError::shape_mismatch(
                    "window timestamps",
                    0,
                    state.timestamps.len(),
                ));
            }
        };

        let mut policy = self.policy.clone();
        policy.set_state(aggregate, state.filled)?;

        self.buffer = buffer;
        self.policy = policy;
        if let (Some(span), Some(stamps)) = (self.span.as_mut(), stamps) {
            span.stamps = stamps;
        }
        Ok(())
    }

    /// Empty the window and reset the aggregate.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.policy.reset();
        if let Some(span) = self.span.as_mut() {
            span.stamps.clear();
        }
    }
}

/// A sliding window over any built-in statistic.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum AnyWindow {
    Mean(SlidingWindow<Mean>),
    Rms(SlidingWindow<Rms>),
    MeanAbsoluteValue(SlidingWindow<MeanAbsoluteValue>),
    Variance(SlidingWindow<Variance>),
    ZScore(SlidingWindow<ZScore>),
    WaveformLength(SlidingWindow<WaveformLength>),
    SlopeSignChange(SlidingWindow<SlopeSignChange>),
    ThresholdCrossing(SlidingWindow<ThresholdCrossing>),
}

macro_rules! dispatch {
    ($self:expr, $w:ident => $body:expr) => {
        match $self {
            AnyWindow::Mean($w) => $body,
            AnyWindow::Rms($w) => $body,
            AnyWindow::MeanAbsoluteValue($w) => $body,
            AnyWindow::Variance($w) => $body,
            AnyWindow::ZScore($w) => $body,
            AnyWindow::WaveformLength($w) => $body,
            AnyWindow::SlopeSignChange($w) => $body,
            AnyWindow::ThresholdCrossing($w) => $body,
        }
    };
}

fn build<P: StatisticPolicy>(policy: P, window: WindowSpec) -> Result<SlidingWindow<P>> {
    match window {
        WindowSpec::Samples(n) => SlidingWindow::new(policy, n),
        WindowSpec::Duration {
            seconds,
            max_samples,
        } => SlidingWindow::with_duration(policy, seconds, max_samples),
    }
}

impl AnyWindow {
    /// Build the window for a statistic stage kind.
    ///
    /// Fails with [`CoreError::InvalidParameter`] for filter kinds or invalid
    /// window parameters.
    pub fn new(kind: &StageKind, window: WindowSpec) -> Result<Self> {
        Ok(match *kind {
            StageKind::Mean => AnyWindow::Mean(build(Mean::new(), window)?),
            StageKind::Rms => AnyWindow::Rms(build(Rms::new(), window)?),
            StageKind::MeanAbsoluteValue => {
                AnyWindow::MeanAbsoluteValue(build(MeanAbsoluteValue::new(), window)?)
            }
            StageKind::Variance => AnyWindow::Variance(build(Variance::new(), window)?),
            StageKind::ZScore { epsilon } => AnyWindow::ZScore(build(ZScore::new(epsilon), window)?),
            StageKind::WaveformLength => {
                AnyWindow::WaveformLength(build(WaveformLength::new(), window)?)
            }
            StageKind::SlopeSignChange { threshold } => {
                AnyWindow::SlopeSignChange(build(SlopeSignChange::new(threshold), window)?)
            }
            StageKind::ThresholdCrossing { threshold } => {
                AnyWindow::ThresholdCrossing(build(ThresholdCrossing::new(threshold), window)?)
            }
            StageKind::Fir { .. } | StageKind::Iir { .. } | StageKind::Lms { .. } => {
                return Err(CoreError::invalid_parameter(
                    "kind",
                    format!("'{}' is not a window statistic", kind.name()),
                ));
            }
        })
    }

    /// See [`SlidingWindow::process_block`].
    pub fn process_block(&mut self, input: &[f32], timestamps: Option<&[f64]>, output: &mut [f32]) {
        dispatch!(self, w => w.process_block(input, timestamps, output))
    }

    /// See [`SlidingWindow::batch`].
    pub fn batch(&self, input: &[f32], output: &mut [f32]) {
        dispatch!(self, w => w.batch(input, output))
    }

    /// See [`SlidingWindow::state`].
    pub fn state(&self) -> ChannelState {
        dispatch!(self, w => w.state())
    }

    /// See [`SlidingWindow::set_state`].
    pub fn set_state(&mut self, state: &ChannelState) -> Result<()> {
        dispatch!(self, w => w.set_state(state))
    }

    /// See [`SlidingWindow::reset`].
    pub fn reset(&mut self) {
        dispatch!(self, w => w.reset())
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        dispatch!(self, w => w.capacity())
    }
}
