//! Property-based tests for cadence-core.
//!
//! Ring buffer ordering, policy aggregates against recomputation, continuity
//! of pipelines split at arbitrary points, and agreement of the two FIR
//! convolution paths, all over randomized inputs.

use cadence_core::filter::{ConvolutionMode, FirFilter};
use cadence_core::{
    Pipeline, ProcessOptions, RingBuffer, SlidingWindow, StageDescriptor, StageKind, WindowSpec,
    policy::{Mean, Variance, WaveformLength},
};
use proptest::prelude::*;

/// Stage kinds indexed 0..8.
fn statistic(variant: usize, threshold: f64) -> StageKind {
    match variant % 8 {
        0 => StageKind::Mean,
        1 => StageKind::Rms,
        2 => StageKind::MeanAbsoluteValue,
        3 => StageKind::Variance,
        4 => StageKind::ZScore { epsilon: 1e-3 },
        5 => StageKind::WaveformLength,
        6 => StageKind::SlopeSignChange { threshold },
        _ => StageKind::ThresholdCrossing { threshold },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// After at least `capacity` pushes the linear sequence is exactly the
    /// last `capacity` values pushed, oldest first.
    #[test]
    fn ring_buffer_keeps_last_values(
        capacity in 1usize..64,
        values in prop::collection::vec(-1000i32..1000, 0..256),
    ) {
        let mut ring = RingBuffer::new(capacity);
        for &v in &values {
            ring.push(v);
        }
        let linear = ring.to_linear_sequence();
        let keep = values.len().min(capacity);
        prop_assert_eq!(linear.len(), keep);
        prop_assert_eq!(&linear[..], &values[values.len() - keep..]);
    }

    /// Snapshot then restore reproduces the buffer at any occupancy.
    #[test]
    fn ring_snapshot_roundtrip(
        capacity in 1usize..32,
        values in prop::collection::vec(-1.0f32..1.0, 0..80),
    ) {
        let mut ring = RingBuffer::new(capacity);
        for &v in &values {
            ring.push(v);
        }
        let mut other = RingBuffer::new(capacity);
        other.restore(&ring.snapshot()).unwrap();
        prop_assert_eq!(other.to_linear_sequence(), ring.to_linear_sequence());
        prop_assert_eq!(other.len(), ring.len());
    }

    /// Incremental aggregates stay within rounding of a recomputation over
    /// the window contents.
    #[test]
    fn incremental_matches_recomputed(
        capacity in 1usize..40,
        input in prop::collection::vec(-10.0f32..10.0, 1..300),
    ) {
        let mut mean = SlidingWindow::new(Mean::new(), capacity).unwrap();
        let mut var = SlidingWindow::new(Variance::new(), capacity).unwrap();
        let mut wl = SlidingWindow::new(WaveformLength::new(), capacity).unwrap();
        for (i, &x) in input.iter().enumerate() {
            let m = mean.process(x);
            let v = var.process(x);
            let w = wl.process(x);

            let start = (i + 1).saturating_sub(capacity);
            let window = &input[start..=i];
            let n = window.len() as f64;
            let exact_mean = window.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
            let exact_var = window.iter().map(|&s| (f64::from(s) - exact_mean).powi(2)).sum::<f64>() / n;
            let exact_wl: f64 = window.windows(2).map(|p| f64::from((p[1] - p[0]).abs())).sum();

            prop_assert!((f64::from(m) - exact_mean).abs() < 1e-3);
            prop_assert!((f64::from(v) - exact_var).abs() < 1e-2);
            prop_assert!((f64::from(w) - exact_wl).abs() < 1e-2);
        }
    }

    /// Save at any split point, load into a fresh pipeline, and the output
    /// matches an uninterrupted run.
    #[test]
    fn pipeline_continuity(
        variant in 0usize..8,
        window in 3usize..24,
        threshold in -0.5f64..0.5,
        channels in 1usize..4,
        frames in prop::collection::vec(-1.0f32..1.0, 1..120),
        split_frac in 0.0f64..=1.0,
    ) {
        let descriptor = StageDescriptor::moving(statistic(variant, threshold), WindowSpec::Samples(window));
        let samples: Vec<f32> = frames
            .iter()
            .flat_map(|&x| (0..channels).map(move |c| x * (c + 1) as f32))
            .collect();
        let opts = ProcessOptions::channels(channels);
        let split = ((frames.len() as f64 * split_frac) as usize).min(frames.len()) * channels;

        let mut whole = Pipeline::from_descriptors([descriptor.clone()]).unwrap();
        let expected = whole.process(&samples, None, opts).unwrap();

        let mut first = Pipeline::from_descriptors([descriptor.clone()]).unwrap();
        let mut got = first.process(&samples[..split], None, opts).unwrap();
        let mut second = Pipeline::from_descriptors([descriptor]).unwrap();
        second.load_state(&first.save_state()).unwrap();
        got.extend(second.process(&samples[split..], None, opts).unwrap());

        prop_assert_eq!(got.len(), expected.len());
        for (a, b) in got.iter().zip(&expected) {
            prop_assert!((a - b).abs() <= 1e-6, "{} vs {}", a, b);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// Direct and overlap-add convolution agree for any kernel and chunking.
    #[test]
    fn fir_paths_agree(
        taps in prop::collection::vec(-0.5f64..0.5, 1..160),
        input in prop::collection::vec(-1.0f32..1.0, 1..600),
        chunk in 1usize..200,
    ) {
        let mut direct = FirFilter::new(&taps, ConvolutionMode::Direct).unwrap();
        let mut ola = FirFilter::new(&taps, ConvolutionMode::OverlapAdd).unwrap();
        let mut a = vec![0.0; input.len()];
        let mut b = vec![0.0; input.len()];
        direct.process_block(&input, &mut a);
        for (src, dst) in input.chunks(chunk).zip(b.chunks_mut(chunk)) {
            ola.process_block(src, dst);
        }
        let scale: f32 = taps.iter().map(|t| t.abs() as f32).sum::<f32>().max(1.0);
        for (x, y) in a.iter().zip(&b) {
            prop_assert!((x - y).abs() <= 1e-4 * scale, "{} vs {}", x, y);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// A long FIR (overlap-add under `Auto`) saved at any split point and
    /// resumed in a fresh pipeline matches an uninterrupted run.
    #[test]
    fn overlap_add_pipeline_continuity(
        raw_taps in prop::collection::vec(-1.0f64..1.0, 65..200),
        input in prop::collection::vec(-1.0f32..1.0, 1..800),
        amplitude in 0.1f32..8.0,
        split_frac in 0.0f64..=1.0,
    ) {
        let norm: f64 = raw_taps.iter().map(|t| t.abs()).sum::<f64>().max(1e-9);
        let taps: Vec<f64> = raw_taps.iter().map(|t| t / norm).collect();
        let descriptor = StageDescriptor::filter(StageKind::Fir {
            taps,
            convolution: ConvolutionMode::Auto,
        });
        let samples: Vec<f32> = input.iter().map(|x| x * amplitude).collect();
        let split = ((samples.len() as f64 * split_frac) as usize).min(samples.len());
        let opts = ProcessOptions::default();

        let mut whole = Pipeline::from_descriptors([descriptor.clone()]).unwrap();
        let expected = whole.process(&samples, None, opts).unwrap();

        let mut first = Pipeline::from_descriptors([descriptor.clone()]).unwrap();
        let mut got = first.process(&samples[..split], None, opts).unwrap();
        let mut second = Pipeline::from_descriptors([descriptor]).unwrap();
        second.load_state(&first.save_state()).unwrap();
        got.extend(second.process(&samples[split..], None, opts).unwrap());

        prop_assert_eq!(got.len(), expected.len());
        for (a, b) in got.iter().zip(&expected) {
            prop_assert!((a - b).abs() <= 1e-6, "{} vs {}", a, b);
        }
    }
}
