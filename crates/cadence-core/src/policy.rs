//! Statistic policies for sliding windows.
//!
//! A policy maps the contents of a window to one output value while keeping
//! the smallest running aggregate that lets it do so in O(1) per sample. The
//! [`SlidingWindow`](crate::SlidingWindow) owns the sample buffer; the policy
//! only sees it, and is told about every value entering or leaving.
//!
//! | Policy | Aggregate | Output |
//! |--------|-----------|--------|
//! | [`Mean`] | Σx | Σx / n |
//! | [`Rms`] | Σx² | √(Σx² / n) |
//! | [`MeanAbsoluteValue`] | Σ\|x\| | Σ\|x\| / n |
//! | [`Variance`] | Σx, Σx² | Σx²/n − mean², clamped at 0 |
//! | [`ZScore`] | Σx, Σx² | (newest − mean) / max(σ, ε) |
//! | [`WaveformLength`] | Σ\|x[i] − x[i−1]\| | the sum |
//! | [`SlopeSignChange`] | event flags | number of flagged samples |
//! | [`ThresholdCrossing`] | event flags | number of flagged samples |
//!
//! Accumulators are `f64`. The invariant every policy keeps: its aggregate,
//! maintained incrementally through pushes and evictions, equals the same
//! aggregate recomputed from the buffer contents.
//!
//! # Event policies
//!
//! Slope sign changes and threshold crossings are attributed to the sample
//! that completes them. Each policy keeps a [`RingBuffer<bool>`] of flags in
//! lockstep with the sample window, so when a flagged sample leaves the window
//! its event leaves the count with it. Neighbours are read from the window, so
//! a slope sign change needs a window of at least 3 samples and a crossing
//! needs at least 2.

use serde::{Deserialize, Serialize};

use crate::buffer::{RingBuffer, RingSnapshot};
use crate::error::{CoreError, Result};

/// Default floor for the z-score standard deviation.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Persistable aggregate of a policy, one shape per policy family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyState {
    /// Running sums (mean, rms, mean absolute value, variance, z-score)
    Running {
        /// Σx, or Σ|x| for mean absolute value.
        sum: f64,
        /// Σx².
        #[serde(rename = "sumSq")]
        sum_sq: f64,
    },
    /// Running waveform length
    WaveformLength {
        /// Σ|x[i] − x[i−1]| over adjacent pairs in the window.
        sum: f64,
    },
    /// Event count plus per-sample contribution flags
    EventCount {
        /// Number of flagged samples in the window.
        count: u32,
        /// Capacity-length flags, oldest first, padded with `false`.
        flags: Vec<bool>,
    },
}

impl PolicyState {
    fn family(&self) -> &'static str {
        match self {
            PolicyState::Running { .. } => "running",
            PolicyState::WaveformLength { .. } => "waveformLength",
            PolicyState::EventCount { .. } => "eventCount",
        }
    }
}

fn wrong_family(expected: &str, got: &PolicyState) -> CoreError {
    CoreError::invalid_parameter(
        "policy state",
        format!("expected {expected} state, got {}", got.family()),
    )
}

/// Strategy computing one statistic over a sliding window.
///
/// `window` is always the buffer as it stands after the triggering change:
/// in [`update`](Self::update) it already contains `incoming`, in
/// [`evict`](Self::evict) it no longer contains `evicted`.
pub trait StatisticPolicy: Clone + Send + std::fmt::Debug {
    /// Stage type name, as written into saved state.
    fn name(&self) -> &'static str;

    /// Size any per-sample side storage to the window capacity.
    fn attach(&mut self, _capacity: usize) {}

    /// Account for `incoming` entering and `evicted` (if any) leaving.
    fn update(&mut self, evicted: Option<f32>, incoming: f32, window: &RingBuffer<f32>);

    /// Account for the oldest sample leaving without a replacement.
    fn evict(&mut self, evicted: f32, window: &RingBuffer<f32>);

    /// Current output for the window. An empty window yields 0.
    fn compute(&self, window: &RingBuffer<f32>) -> f32;

    /// Closed-form result over a whole input slice.
    fn batch(&self, input: &[f32]) -> f32;

    /// Snapshot of the aggregate.
    fn state(&self) -> PolicyState;

    /// Replace the aggregate. `filled` is the occupancy of the window being
    /// restored alongside. Nothing changes on error.
    fn set_state(&mut self, state: &PolicyState, filled: usize) -> Result<()>;

    /// Return to the empty-window aggregate.
    fn reset(&mut self);
}

// ----------------------------------------------------------------------------
// Running-sum family
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RunningSums {
    sum: f64,
    sum_sq: f64,
}

impl RunningSums {
    #[inline]
    fn add(&mut self, x: f32, abs: bool) {
        let x = f64::from(x);
        self.sum += if abs { x.abs() } else { x };
        self.sum_sq += x * x;
    }

    #[inline]
    fn remove(&mut self, x: f32, abs: bool) {
        let x = f64::from(x);
        self.sum -= if abs { x.abs() } else { x };
        self.sum_sq -= x * x;
    }

    fn state(&self) -> PolicyState {
        PolicyState::Running {
            sum: self.sum,
            sum_sq: self.sum_sq,
        }
    }

    fn load(state: &PolicyState) -> Result<Self> {
        match *state {
            PolicyState::Running { sum, sum_sq } => Ok(Self { sum, sum_sq }),
            ref other => Err(wrong_family("running", other)),
        }
    }

    fn mean(&self, n: usize) -> f64 {
        self.sum / n as f64
    }

    /// Population variance, clamped against cancellation.
    fn variance(&self, n: usize) -> f64 {
        let mean = self.mean(n);
        (self.sum_sq / n as f64 - mean * mean).max(0.0)
    }
}

macro_rules! running_policy_common {
    ($name:literal, $abs:expr) => {
        fn name(&self) -> &'static str {
            $name
        }

        fn update(&mut self, evicted: Option<f32>, incoming: f32, _window: &RingBuffer<f32>) {
            if let Some(old) = evicted {
                self.sums.remove(old, $abs);
            }
            self.sums.add(incoming, $abs);
        }

        fn evict(&mut self, evicted: f32, _window: &RingBuffer<f32>) {
            self.sums.remove(evicted, $abs);
        }

        fn state(&self) -> PolicyState {
            self.sums.state()
        }

        fn set_state(&mut self, state: &PolicyState, _filled: usize) -> Result<()> {
            self.sums = RunningSums::load(state)?;
            Ok(())
        }

        fn reset(&mut self) {
            self.sums = RunningSums::default();
        }
    };
}

/// Arithmetic mean.
#[derive(Debug, Clone, Default)]
pub struct Mean {
    sums: RunningSums,
}

impl Mean {
    /// Create a mean policy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatisticPolicy for Mean {
    running_policy_common!("mean", false);

    fn compute(&self, window: &RingBuffer<f32>) -> f32 {
        if window.is_empty() {
            return 0.0;
        }
        self.sums.mean(window.len()) as f32
    }

    fn batch(&self, input: &[f32]) -> f32 {
        if input.is_empty() {
            return 0.0;
        }
        let sum: f64 = input.iter().map(|&x| f64::from(x)).sum();
        (sum / input.len() as f64) as f32
    }
}

/// Root mean square.
#[derive(Debug, Clone, Default)]
pub struct Rms {
    sums: RunningSums,
}

impl Rms {
    /// Create an RMS policy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatisticPolicy for Rms {
    running_policy_common!("rms", false);

    fn compute(&self, window: &RingBuffer<f32>) -> f32 {
        if window.is_empty() {
            return 0.0;
        }
        (self.sums.sum_sq / window.len() as f64).max(0.0).sqrt() as f32
    }

    fn batch(&self, input: &[f32]) -> f32 {
        if input.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = input.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
        (sum_sq / input.len() as f64).sqrt() as f32
    }
}

/// Mean absolute value.
#[derive(Debug, Clone, Default)]
pub struct MeanAbsoluteValue {
    sums: RunningSums,
}

impl MeanAbsoluteValue {
    /// Create a mean-absolute-value policy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatisticPolicy for MeanAbsoluteValue {
    running_policy_common!("mean_absolute_value", true);

    fn compute(&self, window: &RingBuffer<f32>) -> f32 {
        if window.is_empty() {
            return 0.0;
        }
        self.sums.mean(window.len()).max(0.0) as f32
    }

    fn batch(&self, input: &[f32]) -> f32 {
        if input.is_empty() {
            return 0.0;
        }
        let sum: f64 = input.iter().map(|&x| f64::from(x).abs()).sum();
        (sum / input.len() as f64) as f32
    }
}

/// Two-pass population mean and variance.
fn mean_and_variance(input: &[f32]) -> (f64, f64) {
    let n = input.len() as f64;
    let mean = input.iter().map(|&x| f64::from(x)).sum::<f64>() / n;
    let var = input
        .iter()
        .map(|&x| {
            let d = f64::from(x) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var)
}

/// Population variance.
#[derive(Debug, Clone, Default)]
pub struct Variance {
    sums: RunningSums,
}

impl Variance {
    /// Create a variance policy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatisticPolicy for Variance {
    running_policy_common!("variance", false);

    fn compute(&self, window: &RingBuffer<f32>) -> f32 {
        if window.is_empty() {
            return 0.0;
        }
        self.sums.variance(window.len()) as f32
    }

    fn batch(&self, input: &[f32]) -> f32 {
        if input.is_empty() {
            return 0.0;
        }
        mean_and_variance(input).1 as f32
    }
}

/// Standard score of the newest sample against the window.
///
/// The batch form scores the last sample of the input against the whole input.
#[derive(Debug, Clone)]
pub struct ZScore {
    sums: RunningSums,
    epsilon: f64,
}

impl ZScore {
    /// Create a z-score policy with the given standard-deviation floor.
    pub fn new(epsilon: f64) -> Self {
        Self {
            sums: RunningSums::default(),
            epsilon,
        }
    }

    /// Standard-deviation floor.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn score(&self, x: f32, mean: f64, variance: f64) -> f32 {
        let std = variance.max(0.0).sqrt().max(self.epsilon);
        ((f64::from(x) - mean) / std) as f32
    }
}

impl Default for ZScore {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl StatisticPolicy for ZScore {
    running_policy_common!("z_score", false);

    fn compute(&self, window: &RingBuffer<f32>) -> f32 {
        match window.newest() {
            Some(x) => {
                let n = window.len();
                self.score(x, self.sums.mean(n), self.sums.variance(n))
            }
            None => 0.0,
        }
    }

    fn batch(&self, input: &[f32]) -> f32 {
        match input.last() {
            Some(&x) => {
                let (mean, var) = mean_and_variance(input);
                self.score(x, mean, var)
            }
            None => 0.0,
        }
    }
}

// ----------------------------------------------------------------------------
// Waveform length
// ----------------------------------------------------------------------------

/// Cumulative absolute first difference across the window.
#[derive(Debug, Clone, Default)]
pub struct WaveformLength {
    sum: f64,
}

impl WaveformLength {
    /// Create a waveform-length policy.
    pub fn new() -> Self {
        Self::default()
    }
}

#[inline]
fn abs_diff(a: f32, b: f32) -> f64 {
    (f64::from(a) - f64::from(b)).abs()
}

impl StatisticPolicy for WaveformLength {
    fn name(&self) -> &'static str {
        "waveform_length"
    }

    fn update(&mut self, evicted: Option<f32>, incoming: f32, window: &RingBuffer<f32>) {
        if let Some(prev) = window.nth_newest(1) {
            self.sum += abs_diff(incoming, prev);
        }
        // The pair (evicted, new oldest) was counted only if both were in the window
        match (evicted, window.oldest()) {
            (Some(old), Some(first)) if window.len() >= 2 => self.sum -= abs_diff(first, old),
            _ => {}
        }
    }

    fn evict(&mut self, evicted: f32, window: &RingBuffer<f32>) {
        if let Some(first) = window.oldest() {
            self.sum -= abs_diff(first, evicted);
        }
    }

    fn compute(&self, window: &RingBuffer<f32>) -> f32 {
        if window.len() < 2 {
            return 0.0;
        }
        self.sum.max(0.0) as f32
    }

    fn batch(&self, input: &[f32]) -> f32 {
        input.windows(2).map(|w| abs_diff(w[1], w[0])).sum::<f64>() as f32
    }

    fn state(&self) -> PolicyState {
        PolicyState::WaveformLength { sum: self.sum }
    }

    fn set_state(&mut self, state: &PolicyState, _filled: usize) -> Result<()> {
        match *state {
            PolicyState::WaveformLength { sum } => {
                self.sum = sum;
                Ok(())
            }
            ref other => Err(wrong_family("waveformLength", other)),
        }
    }

    fn reset(&mut self) {
        self.sum = 0.0;
    }
}

// ----------------------------------------------------------------------------
// Event counting
// ----------------------------------------------------------------------------

/// Count of flagged samples plus the flags themselves.
#[derive(Debug, Clone)]
struct EventTrack {
    count: u32,
    flags: Option<RingBuffer<bool>>,
}

impl EventTrack {
    fn new() -> Self {
        Self {
            count: 0,
            flags: None,
        }
    }

    fn attach(&mut self, capacity: usize) {
        self.flags = Some(RingBuffer::new(capacity));
        self.count = 0;
    }

    fn push(&mut self, flagged: bool) {
        // Without an attached window there is nothing to evict against
        let evicted = match self.flags.as_mut() {
            Some(flags) => flags.push(flagged),
            None => None,
        };
        if evicted == Some(true) {
            self.count = self.count.saturating_sub(1);
        }
        if flagged {
            self.count += 1;
        }
    }

    fn pop(&mut self) {
        if let Some(true) = self.flags.as_mut().and_then(RingBuffer::pop_front) {
            self.count = self.count.saturating_sub(1);
        }
    }

    fn state(&self) -> PolicyState {
        PolicyState::EventCount {
            count: self.count,
            flags: self
                .flags
                .as_ref()
                .map(|f| f.snapshot().data)
                .unwrap_or_default(),
        }
    }

    fn set_state(&mut self, state: &PolicyState, filled: usize) -> Result<()> {
        let (count, flags) = match state {
            PolicyState::EventCount { count, flags } => (*count, flags),
            other => return Err(wrong_family("eventCount", other)),
        };
        let snapshot = RingSnapshot {
            data: flags.clone(),
            filled,
        };
        let Some(ring) = self.flags.as_mut() else {
            return Err(CoreError::invalid_parameter(
                "policy state",
                "event policy is not attached to a window",
            ));
        };
        RingBuffer::check_snapshot(ring.capacity(), &snapshot)?;
        let flagged = flags[..filled].iter().filter(|&&f| f).count();
        if flagged != count as usize {
            return Err(CoreError::decode(format!(
                "event count {count} disagrees with {flagged} flagged samples"
            )));
        }
        ring.restore(&snapshot)?;
        self.count = count;
        Ok(())
    }

    fn reset(&mut self) {
        self.count = 0;
        if let Some(flags) = self.flags.as_mut() {
            flags.clear();
        }
    }
}

macro_rules! event_policy_common {
    ($name:literal) => {
        fn name(&self) -> &'static str {
            $name
        }

        fn attach(&mut self, capacity: usize) {
            self.track.attach(capacity);
        }

        fn update(&mut self, _evicted: Option<f32>, incoming: f32, window: &RingBuffer<f32>) {
            let flagged = self.is_event(incoming, window);
            self.track.push(flagged);
        }

        fn evict(&mut self, _evicted: f32, _window: &RingBuffer<f32>) {
            self.track.pop();
        }

        fn compute(&self, window: &RingBuffer<f32>) -> f32 {
            if window.is_empty() {
                return 0.0;
            }
            self.track.count as f32
        }

        fn state(&self) -> PolicyState {
            self.track.state()
        }

        fn set_state(&mut self, state: &PolicyState, filled: usize) -> Result<()> {
            self.track.set_state(state, filled)
        }

        fn reset(&mut self) {
            self.track.reset();
        }
    };
}

/// Number of slope sign changes in the window.
///
/// The middle sample of `(x[i-2], x[i-1], x[i])` is a turning point when
/// `(x[i-1] - x[i-2]) * (x[i-1] - x[i]) > threshold`; the event belongs to `x[i]`.
#[derive(Debug, Clone)]
pub struct SlopeSignChange {
    threshold: f64,
    track: EventTrack,
}

impl SlopeSignChange {
    /// Create a slope-sign-change policy.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            track: EventTrack::new(),
        }
    }

    /// Turning-point threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[inline]
    fn turning(&self, before: f32, middle: f32, after: f32) -> bool {
        let (a, b, c) = (f64::from(before), f64::from(middle), f64::from(after));
        (b - a) * (b - c) > self.threshold
    }

    fn is_event(&self, incoming: f32, window: &RingBuffer<f32>) -> bool {
        match (window.nth_newest(2), window.nth_newest(1)) {
            (Some(before), Some(middle)) => self.turning(before, middle, incoming),
            _ => false,
        }
    }
}

impl Default for SlopeSignChange {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl StatisticPolicy for SlopeSignChange {
    event_policy_common!("slope_sign_change");

    fn batch(&self, input: &[f32]) -> f32 {
        input
            .windows(3)
            .filter(|w| self.turning(w[0], w[1], w[2]))
            .count() as f32
    }
}

/// Number of threshold crossings in the window.
///
/// Consecutive samples cross when exactly one of them lies above the
/// threshold; the event belongs to the later sample.
#[derive(Debug, Clone)]
pub struct ThresholdCrossing {
    threshold: f64,
    track: EventTrack,
}

impl ThresholdCrossing {
    /// Create a threshold-crossing policy.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            track: EventTrack::new(),
        }
    }

    /// Crossing threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[inline]
    fn crosses(&self, prev: f32, curr: f32) -> bool {
        (f64::from(prev) > self.threshold) != (f64::from(curr) > self.threshold)
    }

    fn is_event(&self, incoming: f32, window: &RingBuffer<f32>) -> bool {
        window
            .nth_newest(1)
            .is_some_and(|prev| self.crosses(prev, incoming))
    }
}

impl StatisticPolicy for ThresholdCrossing {
    event_policy_common!("threshold_crossing");

    fn batch(&self, input: &[f32]) -> f32 {
        input
            .windows(2)
            .filter(|w| self.crosses(w[0], w[1]))
            .count() as f32
    }
}
