//! Single-channel stage kernels.
//!
//! [`StageKernel`] is what a stage runs on one channel: a sliding-window
//! statistic or one of the filters, in batch or moving mode. It turns a
//! [`StageDescriptor`] into a live processor and maps that processor's
//! internals to and from [`ChannelState`].
//!
//! | Kernel | `buffer` in state | `kernel` in state |
//! |--------|-------------------|-------------------|
//! | window statistic | sample window | policy aggregate |
//! | FIR, direct | last `taps` inputs | empty tail |
//! | FIR, overlap-add | empty | overlap tail |
//! | IIR | empty | section memories |
//! | LMS | input history | weights |
//! | any, batch mode | empty | stateless |

use crate::buffer::RingSnapshot;
use crate::error::{CoreError, Result};
use crate::filter::{FirFilter, IirFilter, LmsFilter};
use crate::stage::{Mode, StageDescriptor, StageKind};
use crate::state::{ChannelState, KernelState};
use crate::window::AnyWindow;

#[derive(Debug, Clone)]
enum Kernel {
    Window(AnyWindow),
    Fir(FirFilter),
    Iir(IirFilter),
    Lms(LmsFilter),
}

/// One channel's processor for a stage.
#[derive(Debug, Clone)]
pub struct StageKernel {
    mode: Mode,
    kernel: Kernel,
}

impl StageKernel {
    /// Build a fresh kernel for `descriptor`.
    ///
    /// Fails with [`CoreError::InvalidParameter`] if any parameter is invalid.
    pub fn new(descriptor: &StageDescriptor) -> Result<Self> {
        descriptor.validate()?;
        let kernel = match &descriptor.kind {
            StageKind::Fir { taps, convolution } => Kernel::Fir(FirFilter::new(taps, *convolution)?),
            StageKind::Iir { sections } => Kernel::Iir(IirFilter::new(sections)?),
            StageKind::Lms {
                order,
                step_size,
                delay,
                normalized,
                output,
            } => Kernel::Lms(LmsFilter::new(
                *order,
                *step_size,
                *delay,
                *normalized,
                *output,
            )?),
            statistic => Kernel::Window(AnyWindow::new(statistic, descriptor.window)?),
        };
        Ok(Self {
            mode: descriptor.mode,
            kernel,
        })
    }

    /// Batch or moving.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Length of the `buffer` field in this kernel's saved state.
    pub fn window_size(&self) -> usize {
        if self.mode == Mode::Batch {
            return 0;
        }
        match &self.kernel {
            Kernel::Window(w) => w.capacity(),
            Kernel::Fir(f) => f.history().map_or(0, |h| h.data.len()),
            Kernel::Iir(_) => 0,
            Kernel::Lms(l) => l.history_len(),
        }
    }

    /// Process one channel's block. `output` must be as long as `input`.
    ///
    /// Batch mode leaves no trace: filters start from rest and are returned
    /// to rest afterwards.
    pub fn process_block(&mut self, input: &[f32], timestamps: Option<&[f64]>, output: &mut [f32]) {
        match (self.mode, &mut self.kernel) {
            (Mode::Batch, Kernel::Window(w)) => w.batch(input, output),
            (Mode::Batch, kernel) => {
                reset(kernel);
                stream(kernel, input, timestamps, output);
                reset(kernel);
            }
            (Mode::Moving, kernel) => stream(kernel, input, timestamps, output),
        }
    }

    /// Persistable state.
    pub fn state(&self) -> ChannelState {
        if self.mode == Mode::Batch {
            return ChannelState::stateless();
        }
        match &self.kernel {
            Kernel::Window(w) => w.state(),
            Kernel::Fir(f) => {
                let RingSnapshot { data, filled } = f.history().unwrap_or(RingSnapshot {
                    data: Vec::new(),
                    filled: 0,
                });
                ChannelState {
                    buffer: data,
                    filled,
                    timestamps: Vec::new(),
                    kernel: KernelState::Fir {
                        tail: f.tail().to_vec(),
                    },
                }
            }
            Kernel::Iir(f) => ChannelState {
                kernel: KernelState::Iir {
                    memories: f.memories(),
                },
                ..ChannelState::stateless()
            },
            Kernel::Lms(f) => {
                let RingSnapshot { data, filled } = f.history();
                ChannelState {
                    buffer: data,
                    filled,
                    timestamps: Vec::new(),
                    kernel: KernelState::Lms {
                        weights: f.weights().to_vec(),
                    },
                }
            }
        }
    }

    /// A copy of this kernel with `state` loaded. `self` is never modified.
    pub fn with_state(&self, state: &ChannelState) -> Result<Self> {
        let expected = self.window_size();
        if state.buffer.len() != expected {
            return Err(CoreError::shape_mismatch(
                "channel buffer",
                expected,
                state.buffer.len(),
            ));
        }

        let mut next = self.clone();
        match (self.mode, &mut next.kernel, &state.kernel) {
            (Mode::Batch, _, KernelState::Stateless) => {}
            (Mode::Moving, Kernel::Window(w), _) => w.set_state(state)?,
            (Mode::Moving, Kernel::Fir(f), KernelState::Fir { tail }) => {
                let history = f.history().map(|_| state.buffer_snapshot());
                f.restore(history.as_ref(), tail)?;
            }
            (Mode::Moving, Kernel::Iir(f), KernelState::Iir { memories }) => {
                f.set_memories(memories)?;
            }
            (Mode::Moving, Kernel::Lms(f), KernelState::Lms { weights }) => {
                f.restore(weights, &state.buffer_snapshot())?;
            }
            _ => {
                return Err(CoreError::invalid_parameter(
                    "channel state",
                    "kernel state does not match the stage kind",
                ));
            }
        }
        Ok(next)
    }

    /// Load `state`. Nothing changes on error.
    pub fn set_state(&mut self, state: &ChannelState) -> Result<()> {
        *self = self.with_state(state)?;
        Ok(())
    }

    /// Return to the freshly constructed state.
    pub fn reset(&mut self) {
        reset(&mut self.kernel);
    }
}

fn stream(kernel: &mut Kernel, input: &[f32], timestamps: Option<&[f64]>, output: &mut [f32]) {
    match kernel {
        Kernel::Window(w) => w.process_block(input, timestamps, output),
        Kernel::Fir(f) => f.process_block(input, output),
        Kernel::Iir(f) => f.process_block(input, output),
        Kernel::Lms(f) => f.process_block(input, output),
    }
}

fn reset(kernel: &mut Kernel) {
    match kernel {
        Kernel::Window(w) => w.reset(),
        Kernel::Fir(f) => f.reset(),
        Kernel::Iir(f) => f.reset(),
        Kernel::Lms(f) => f.reset(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ConvolutionMode, LmsOutput, biquad};
    use crate::stage::WindowSpec;

    fn fir(len: usize, convolution: ConvolutionMode) -> StageDescriptor {
        StageDescriptor::filter(StageKind::Fir {
            taps: (0..len).map(|k| 1.0 / (k + 1) as f64).collect(),
            convolution,
        })
    }

    fn lms() -> StageDescriptor {
        StageDescriptor::filter(StageKind::Lms {
            order: 8,
            step_size: 0.05,
            delay: 2,
            normalized: true,
            output: LmsOutput::Error,
        })
    }

    fn signal(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.21).sin() * 0.9).collect()
    }

    #[test]
    fn window_sizes_per_kernel() {
        let rms = StageDescriptor::moving(StageKind::Rms, WindowSpec::Samples(50));
        assert_eq!(StageKernel::new(&rms).unwrap().window_size(), 50);
        assert_eq!(
            StageKernel::new(&fir(5, ConvolutionMode::Direct)).unwrap().window_size(),
            5
        );
        assert_eq!(
            StageKernel::new(&fir(5, ConvolutionMode::OverlapAdd)).unwrap().window_size(),
            0
        );
        assert_eq!(StageKernel::new(&lms()).unwrap().window_size(), 10);
        let batch = StageDescriptor::batch(StageKind::Rms);
        assert_eq!(StageKernel::new(&batch).unwrap().window_size(), 0);
    }

    #[test]
    fn test_batch_filter_leaves_no_state() {
        let mut desc = fir(4, ConvolutionMode::Direct);
        desc.mode = Mode::Batch;
        let mut kernel = StageKernel::new(&desc).unwrap();
        let input = signal(16);
        let mut a = vec![0.0; 16];
        let mut b = vec![0.0; 16];
        kernel.process_block(&input, None, &mut a);
        kernel.process_block(&input, None, &mut b);
        assert_eq!(a, b);
        assert_eq!(kernel.state(), ChannelState::stateless());
    }

    #[test]
    fn filter_states_roundtrip() {
        let sections = vec![biquad::lowpass(100.0, 0.707, 1000.0)];
        let descriptors = [
            fir(7, ConvolutionMode::Direct),
            fir(90, ConvolutionMode::Auto),
            StageDescriptor::filter(StageKind::Iir { sections }),
            lms(),
        ];
        let input = signal(300);
        for desc in &descriptors {
            let mut a = StageKernel::new(desc).unwrap();
            let mut sink = vec![0.0; 170];
            a.process_block(&input[..170], None, &mut sink);

            let mut b = StageKernel::new(desc).unwrap().with_state(&a.state()).unwrap();
            let mut out_a = vec![0.0; 130];
            let mut out_b = vec![0.0; 130];
            a.process_block(&input[170..], None, &mut out_a);
            b.process_block(&input[170..], None, &mut out_b);
            assert_eq!(out_a, out_b, "{}", desc.kind.name());
        }
    }

    #[test]
    fn mismatched_kernel_state_rejected() {
        let mut iir = StageKernel::new(&StageDescriptor::filter(StageKind::Iir {
            sections: vec![biquad::highpass(50.0, 0.707, 1000.0)],
        }))
        .unwrap();
        let lms_state = StageKernel::new(&lms()).unwrap().state();
        assert!(iir.set_state(&lms_state).is_err());

        let wrong = ChannelState {
            kernel: KernelState::Lms { weights: vec![] },
            ..ChannelState::stateless()
        };
        assert!(iir.set_state(&wrong).is_err());
    }

    #[test]
    fn reset_matches_fresh_kernel() {
        let desc = StageDescriptor::moving(StageKind::WaveformLength, WindowSpec::Samples(4));
        let fresh = StageKernel::new(&desc).unwrap();
        let mut used = fresh.clone();
        let mut sink = [0.0; 6];
        used.process_block(&[1.0, -1.0, 2.0, 0.5, 3.0, 1.0], None, &mut sink);
        used.reset();
        assert_eq!(used.state(), fresh.state());
    }
}
