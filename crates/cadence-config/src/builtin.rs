//! Built-in pipeline configurations.
//!
//! Embedded at compile time and always available, these cover common
//! biosignal feature chains and serve as starting points for custom files.

use crate::PipelineConfig;

/// Names of the built-in configurations.
pub static BUILTIN_NAMES: &[&str] = &[
    "emg-envelope",
    "activity-detector",
    "hum-removal",
    "drift-normalizer",
];

static BUILTIN_TOML: &[(&str, &str)] = &[
    ("emg-envelope", EMG_ENVELOPE),
    ("activity-detector", ACTIVITY_DETECTOR),
    ("hum-removal", HUM_REMOVAL),
    ("drift-normalizer", DRIFT_NORMALIZER),
];

/// High-pass, then a 100 ms RMS envelope.
const EMG_ENVELOPE: &str = r#"
name = "emg-envelope"
description = "Remove motion artifacts below 20 Hz, then a 100 ms RMS envelope"
sample_rate = 1000.0

[[stages]]
kind = "butterworth"
response = "highpass"
order = 4
cutoff = 20.0

[[stages]]
kind = "rms"
window_size = 100
"#;

const ACTIVITY_DETECTOR: &str = r#"
name = "activity-detector"
description = "Band-limit, rectify-and-average, count onsets over 200 ms"
sample_rate = 1000.0

[[stages]]
kind = "fir"
response = "bandpass"
cutoff = 20.0
cutoff_high = 450.0
num_taps = 101
window = "hamming"

[[stages]]
kind = "mean_absolute_value"
window_size = 50

[[stages]]
kind = "threshold_crossing"
window_size = 200
threshold = 0.1
"#;

const HUM_REMOVAL: &str = r#"
name = "hum-removal"
description = "Notch out 50 Hz mains and cancel what is left adaptively"
sample_rate = 1000.0

[[stages]]
kind = "biquad"
response = "notch"
cutoff = 50.0
q = 30.0

[[stages]]
kind = "lms"
order = 16
step_size = 0.05
delay = 1
normalized = true
output = "error"
"#;

const DRIFT_NORMALIZER: &str = r#"
name = "drift-normalizer"
description = "Z-score over the last two seconds of timestamped samples"
sample_rate = 1000.0

[[stages]]
kind = "z_score"
window_seconds = 2.0
epsilon = 1e-6
"#;

/// Parse every built-in configuration.
pub fn builtin_configs() -> Vec<PipelineConfig> {
    BUILTIN_TOML
        .iter()
        .filter_map(|(_, toml)| PipelineConfig::from_toml(toml).ok())
        .collect()
}

/// Built-in configuration by name.
pub fn get_builtin(name: &str) -> Option<PipelineConfig> {
    BUILTIN_TOML
        .iter()
        .find(|(n, _)| *n == name)
        .and_then(|(_, toml)| PipelineConfig::from_toml(toml).ok())
}

/// True if `name` is a built-in configuration.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}
