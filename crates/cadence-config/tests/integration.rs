//! Integration tests for cadence-config.
//!
//! Config files on disk, configured pipelines processing data, and the FFT
//! settings driving a real batch processor.

use cadence_config::{ConfigError, PipelineConfig, StageConfig, builtin_configs, get_builtin};
use cadence_core::{Mode, PipelineStatus, ProcessOptions};
use tempfile::TempDir;

fn sine(len: usize, freq: f32, sample_rate: f32) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
        .collect()
}

/// Save, reload, and build the same pipeline.
#[test]
fn test_save_load_build() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("configs").join("features.toml");

    let config = PipelineConfig::new("features")
        .with_description("saved and reloaded")
        .with_stage(
            StageConfig::new("chebyshev1")
                .with_response("lowpass")
                .with_order(3)
                .with_cutoff(100.0),
        )
        .with_stage(StageConfig::new("variance").with_window_size(25));

    // chebyshev1 needs a ripple
    assert!(matches!(
        config.build_pipeline(),
        Err(ConfigError::InvalidParameter { ref param, .. }) if param == "ripple_db"
    ));

    let mut config = config;
    config.stages[0].ripple_db = Some(0.5);
    config.save(&path).unwrap();
    assert!(path.exists());

    let loaded = PipelineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    let mut a = config.build_pipeline().unwrap();
    let mut b = loaded.build_pipeline().unwrap();
    let input = sine(400, 30.0, 1000.0);
    let opts = ProcessOptions::default();
    assert_eq!(a.process(&input, None, opts).unwrap(), b.process(&input, None, opts).unwrap());
    assert_eq!(a.status(), PipelineStatus::Active);
}

#[test]
fn test_load_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = PipelineConfig::load(temp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
fn test_unknown_stage_in_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.toml");
    std::fs::write(&path, "name = \"bad\"\n\n[[stages]]\nkind = \"wavelet\"\n").unwrap();
    let config = PipelineConfig::load(&path).unwrap();
    assert!(matches!(
        config.build_pipeline(),
        Err(ConfigError::UnknownStage(ref k)) if k == "wavelet"
    ));
}

/// Batch and moving stage configs agree on the final sample.
#[test]
fn test_batch_mode_from_config() {
    let input: Vec<f32> = (1..=8).map(|v| v as f32).collect();
    let opts = ProcessOptions::default();

    let mut moving = PipelineConfig::new("m")
        .with_stage(StageConfig::new("waveform_length").with_window_size(8))
        .build_pipeline()
        .unwrap();
    let mut batch = PipelineConfig::new("b")
        .with_stage(StageConfig::new("waveform_length").with_mode(Mode::Batch))
        .build_pipeline()
        .unwrap();

    let m = moving.process(&input, None, opts).unwrap();
    let b = batch.process(&input, None, opts).unwrap();
    assert!((m[7] - b[7]).abs() < 1e-6);
}

#[test]
fn test_builtins_process_multichannel() {
    for config in builtin_configs() {
        let mut pipeline = config.build_pipeline().unwrap();
        let frames = 300;
        let channels = 2;
        let input = sine(frames * channels, 60.0, 1000.0);
        let timestamps: Vec<f64> = (0..frames).map(|i| i as f64 / config.sample_rate).collect();
        let ts = pipeline.needs_timestamps().then_some(timestamps.as_slice());
        let out = pipeline
            .process(&input, ts, ProcessOptions::channels(channels))
            .unwrap();
        assert_eq!(out.len(), input.len(), "{}", config.name);
        assert!(out.iter().all(|v| v.is_finite()), "{}", config.name);
    }
}

#[test]
fn test_fft_settings_drive_batch_processor() {
    let mut config = get_builtin("emg-envelope").unwrap();
    config.fft.workers = Some(2);
    config.fft.cache_entries = 8;

    let processor = config.fft.batch_processor().unwrap();
    let signals = vec![sine(64, 125.0, 1000.0), sine(64, 250.0, 1000.0)];
    let first = processor.process_real(&signals).unwrap();
    let second = processor.process_real(&signals).unwrap();
    assert_eq!(first, second);

    let stats = processor.cache().unwrap().stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 2);
    processor.shutdown();
}
