//! Integration tests for cadence-state.
//!
//! Format equivalence (JSON and binary snapshots resume identically),
//! directory-store persistence across store instances, and rejection of
//! corrupted or mismatched blobs without touching the target pipeline.

use cadence_core::filter::design::{self, PassType};
use cadence_core::filter::{ConvolutionMode, LmsOutput};
use cadence_core::{CoreError, Pipeline, ProcessOptions, StageDescriptor, StageKind, WindowSpec};
use cadence_state::{
    BlobStore, DirStore, Format, MemoryStore, StateError, decode_binary, decode_json,
    encode_binary, encode_json, restore_pipeline, save_pipeline,
};
use proptest::prelude::*;

fn descriptors() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor::filter(StageKind::Iir {
            sections: design::butterworth(PassType::Highpass, 3, 10.0, 500.0).unwrap(),
        }),
        StageDescriptor::filter(StageKind::Fir {
            taps: (0..80).map(|k| 1.0 / (80.0 + k as f64)).collect(),
            convolution: ConvolutionMode::Auto,
        }),
        StageDescriptor::filter(StageKind::Lms {
            order: 6,
            step_size: 0.1,
            delay: 2,
            normalized: true,
            output: LmsOutput::Error,
        }),
        StageDescriptor::moving(StageKind::ZScore { epsilon: 1e-6 }, WindowSpec::Samples(12)),
        StageDescriptor::moving(
            StageKind::SlopeSignChange { threshold: 0.01 },
            WindowSpec::Samples(20),
        ),
    ]
}

fn signal(len: usize, phase: f32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32;
            (t * 0.17 + phase).sin() + 0.3 * (t * 1.3).cos()
        })
        .collect()
}

fn primed(channels: usize) -> Pipeline {
    let mut p = Pipeline::from_descriptors(descriptors()).unwrap();
    p.process(&signal(150 * channels, 0.0), None, ProcessOptions::channels(channels))
        .unwrap();
    p
}

// ----------------------------------------------------------------------------
// Format equivalence
// ----------------------------------------------------------------------------

#[test]
fn json_and_binary_resume_identically() {
    let channels = 2;
    let opts = ProcessOptions::channels(channels);
    let source = primed(channels);
    let state = source.save_state();

    let mut from_json = Pipeline::from_descriptors(descriptors()).unwrap();
    from_json
        .load_state(&decode_json(&encode_json(&state).unwrap()).unwrap())
        .unwrap();
    let mut from_binary = Pipeline::from_descriptors(descriptors()).unwrap();
    from_binary
        .load_state(&decode_binary(&encode_binary(&state).unwrap()).unwrap())
        .unwrap();

    let mut original = source.clone();
    let next = signal(90 * channels, 1.0);
    let expected = original.process(&next, None, opts).unwrap();
    assert_eq!(from_json.process(&next, None, opts).unwrap(), expected);
    assert_eq!(from_binary.process(&next, None, opts).unwrap(), expected);
}

#[test]
fn cross_format_transcoding_is_lossless() {
    let state = primed(3).save_state();
    let via_json = decode_json(&encode_json(&state).unwrap()).unwrap();
    let via_both = decode_binary(&encode_binary(&via_json).unwrap()).unwrap();
    assert_eq!(via_both, state);
}

#[test]
fn binary_is_smaller_than_json() {
    let state = primed(4).save_state();
    let json = encode_json(&state).unwrap();
    let binary = encode_binary(&state).unwrap();
    assert!(binary.len() < json.len(), "{} vs {}", binary.len(), json.len());
}

// ----------------------------------------------------------------------------
// Stores
// ----------------------------------------------------------------------------

#[test]
fn dir_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let source = primed(1);
    {
        let store = DirStore::new(dir.path()).unwrap();
        save_pipeline(&store, "session-1", &source, Format::Binary).unwrap();
    }

    let store = DirStore::new(dir.path()).unwrap();
    let mut target = Pipeline::from_descriptors(descriptors()).unwrap();
    assert!(restore_pipeline(&store, "session-1", &mut target, Format::Binary).unwrap());
    assert_eq!(target.save_state().stages, source.save_state().stages);
}

#[test]
fn restore_missing_key_is_not_an_error() {
    let store = MemoryStore::new();
    let mut target = Pipeline::from_descriptors(descriptors()).unwrap();
    assert!(!restore_pipeline(&store, "absent", &mut target, Format::Json).unwrap());
}

#[test]
fn corrupted_blob_leaves_pipeline_untouched() {
    let store = MemoryStore::new();
    let source = primed(1);
    save_pipeline(&store, "k", &source, Format::Binary).unwrap();
    let mut blob = store.get("k").unwrap().unwrap();
    blob.truncate(blob.len() / 2);
    store.set("k", &blob).unwrap();

    let mut target = primed(1);
    let before = target.save_state().stages;
    let err = restore_pipeline(&store, "k", &mut target, Format::Binary).unwrap_err();
    assert!(err.is_decode_failure());
    assert_eq!(target.save_state().stages, before);
}

#[test]
fn stage_count_mismatch_surfaces_from_core() {
    let store = MemoryStore::new();
    save_pipeline(&store, "k", &primed(1), Format::Json).unwrap();

    let mut shorter = Pipeline::from_descriptors(descriptors().into_iter().take(2)).unwrap();
    let err = restore_pipeline(&store, "k", &mut shorter, Format::Json).unwrap_err();
    assert!(matches!(
        err,
        StateError::Core(CoreError::StageCountMismatch {
            expected: 2,
            actual: 5
        })
    ));
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever was processed before, both formats resume to the same output.
    #[test]
    fn formats_agree_after_random_history(
        history in prop::collection::vec(-2.0f32..2.0, 0..200),
        next in prop::collection::vec(-2.0f32..2.0, 1..100),
    ) {
        let mut source = Pipeline::from_descriptors(descriptors()).unwrap();
        source.process(&history, None, ProcessOptions::default()).unwrap();
        let state = source.save_state();

        let mut outputs = Vec::new();
        for format in [Format::Json, Format::Binary] {
            let decoded = format.decode(&format.encode(&state).unwrap()).unwrap();
            let mut p = Pipeline::from_descriptors(descriptors()).unwrap();
            p.load_state(&decoded).unwrap();
            outputs.push(p.process(&next, None, ProcessOptions::default()).unwrap());
        }
        prop_assert_eq!(&outputs[0], &outputs[1]);
    }
}
