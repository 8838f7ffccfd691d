//! Multi-channel fan-out.
//!
//! A [`ChannelFanout`] runs one independent [`StageKernel`] per channel of an
//! interleaved stream (`[c0 c1 c2 c0 c1 c2 ...]`). Kernels are created lazily
//! the first time a channel index appears, so the channel count may grow
//! between calls; channels missing from a later, narrower call keep their
//! state untouched.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::kernel::StageKernel;
use crate::stage::StageDescriptor;
use crate::state::FanoutState;

/// One stage applied independently to every channel.
#[derive(Debug, Clone)]
pub struct ChannelFanout {
    descriptor: StageDescriptor,
    prototype: StageKernel,
    channels: BTreeMap<usize, StageKernel>,
    scratch_in: Vec<f32>,
    scratch_out: Vec<f32>,
}

impl ChannelFanout {
    /// Create an adapter with no channels yet.
    ///
    /// Fails if the descriptor cannot produce a kernel.
    pub fn new(descriptor: StageDescriptor) -> Result<Self> {
        let prototype = StageKernel::new(&descriptor)?;
        Ok(Self {
            descriptor,
            prototype,
            channels: BTreeMap::new(),
            scratch_in: Vec::new(),
            scratch_out: Vec::new(),
        })
    }

    /// Stage configuration.
    pub fn descriptor(&self) -> &StageDescriptor {
        &self.descriptor
    }

    /// Channels with a live kernel.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Per-channel buffer length in saved state.
    pub fn window_size(&self) -> usize {
        self.prototype.window_size()
    }

    /// Process an interleaved block.
    ///
    /// `timestamps`, if given, holds one value per frame. `output` must be at
    /// least as long as `input`.
    pub fn process(
        &mut self,
        input: &[f32],
        num_channels: usize,
        timestamps: Option<&[f64]>,
        output: &mut [f32],
    ) -> Result<()> {
        if num_channels == 0 {
            return Err(CoreError::shape_mismatch("channel count", 1, 0));
        }
        if input.len() % num_channels != 0 {
            return Err(CoreError::shape_mismatch(
                "interleaved samples",
                input.len().next_multiple_of(num_channels),
                input.len(),
            ));
        }
        if output.len() < input.len() {
            return Err(CoreError::shape_mismatch(
                "output buffer",
                input.len(),
                output.len(),
            ));
        }
        let frames = input.len() / num_channels;
        if let Some(ts) = timestamps {
            if ts.len() != frames {
                return Err(CoreError::shape_mismatch("timestamps", frames, ts.len()));
            }
        }

        self.scratch_in.resize(frames, 0.0);
        self.scratch_out.resize(frames, 0.0);
        for ch in 0..num_channels {
            let kernel = self
                .channels
                .entry(ch)
                .or_insert_with(|| self.prototype.clone());

            for (dst, &x) in self
                .scratch_in
                .iter_mut()
                .zip(input.iter().skip(ch).step_by(num_channels))
            {
                *dst = x;
            }
            kernel.process_block(&self.scratch_in, timestamps, &mut self.scratch_out);
            for (dst, &y) in output
                .iter_mut()
                .skip(ch)
                .step_by(num_channels)
                .zip(&self.scratch_out)
            {
                *dst = y;
            }
        }
        Ok(())
    }

    /// Persistable state, channels in index order.
    pub fn state(&self) -> FanoutState {
        FanoutState {
            window_size: self.window_size(),
            num_channels: self.channels.len(),
            channels: self.channels.values().map(StageKernel::state).collect(),
        }
    }

    /// Build kernels holding `state` without touching the live ones.
    pub fn prepare_state(&self, state: &FanoutState) -> Result<BTreeMap<usize, StageKernel>> {
        let window_size = self.window_size();
        if state.window_size != window_size {
            return Err(CoreError::shape_mismatch(
                "window size",
                window_size,
                state.window_size,
            ));
        }
        if state.num_channels != state.channels.len() {
            return Err(CoreError::shape_mismatch(
                "channel count",
                state.num_channels,
                state.channels.len(),
            ));
        }
        state
            .channels
            .iter()
            .enumerate()
            .map(|(ch, channel)| Ok((ch, self.prototype.with_state(channel)?)))
            .collect()
    }

    /// Install kernels built by [`prepare_state`](Self::prepare_state).
    pub fn commit(&mut self, channels: BTreeMap<usize, StageKernel>) {
        self.channels = channels;
    }

    /// Load `state`. Nothing changes on error.
    pub fn set_state(&mut self, state: &FanoutState) -> Result<()> {
        let channels = self.prepare_state(state)?;
        self.commit(channels);
        Ok(())
    }

    /// Reset every channel's kernel. The channel count is kept.
    pub fn clear_state(&mut self) {
        for kernel in self.channels.values_mut() {
            kernel.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageKind, WindowSpec};

    fn mean(n: usize) -> ChannelFanout {
        ChannelFanout::new(StageDescriptor::moving(StageKind::Mean, WindowSpec::Samples(n))).unwrap()
    }

    #[test]
    fn test_channels_are_independent() {
        let mut fan = mean(2);
        let input = [1.0, 10.0, 3.0, 30.0, 5.0, 50.0];
        let mut out = [0.0; 6];
        fan.process(&input, 2, None, &mut out).unwrap();
        assert_eq!(out, [1.0, 10.0, 2.0, 20.0, 4.0, 40.0]);
        assert_eq!(fan.num_channels(), 2);
    }

    #[test]
    fn channel_count_grows_lazily() {
        let mut fan = mean(4);
        let mut out = [0.0; 4];
        fan.process(&[2.0, 4.0], 1, None, &mut out[..2]).unwrap();
        assert_eq!(fan.num_channels(), 1);
        fan.process(&[6.0, 100.0], 2, None, &mut out[..2]).unwrap();
        assert_eq!(fan.num_channels(), 2);
        // Channel 0 continued, channel 1 started fresh
        assert_eq!(&out[..2], &[4.0, 100.0]);
    }

    #[test]
    fn ragged_input_rejected() {
        let mut fan = mean(2);
        let mut out = [0.0; 5];
        let err = fan.process(&[0.0; 5], 2, None, &mut out).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { .. }));
        assert_eq!(fan.num_channels(), 0);
    }

    #[test]
    fn state_roundtrip_and_clear() {
        let mut fan = mean(3);
        let mut out = [0.0; 6];
        fan.process(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, None, &mut out).unwrap();
        let saved = fan.state();
        assert_eq!(saved.num_channels, 2);
        assert_eq!(saved.window_size, 3);

        let mut other = mean(3);
        other.set_state(&saved).unwrap();
        assert_eq!(other.state(), saved);

        other.clear_state();
        assert_eq!(other.num_channels(), 2);
        assert!(other.state().channels.iter().all(|c| c.filled == 0));
    }

    #[test]
    fn wrong_window_size_rejected_without_change() {
        let mut fan = mean(3);
        let mut out = [0.0; 2];
        fan.process(&[1.0, 2.0], 1, None, &mut out).unwrap();
        let before = fan.state();
        assert!(fan.set_state(&mean(4).state()).is_err());
        assert_eq!(fan.state(), before);
    }
}
