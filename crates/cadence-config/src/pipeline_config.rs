//! Pipeline configuration file format and operations.

use std::path::Path;

use cadence_core::{Pipeline, StageDescriptor};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::fft_settings::FftSettings;
use crate::stage_config::StageConfig;

/// A named pipeline: stages in processing order plus engine settings.
///
/// # TOML Format
///
/// ```toml
/// name = "emg-features"
/// sample_rate = 1000.0
///
/// [fft]
/// workers = 4
/// cache_entries = 256
///
/// [[stages]]
/// kind = "butterworth"
/// response = "highpass"
/// order = 4
/// cutoff = 20.0
///
/// [[stages]]
/// kind = "rms"
/// window_size = 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Sample rate in Hz used by filter designs and duration windows
    /// (defaults to 1000).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    /// Batch spectrum engine settings.
    #[serde(default)]
    pub fft: FftSettings,

    /// Stages in processing order.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

fn default_sample_rate() -> f64 {
    1000.0
}

impl PipelineConfig {
    /// Create an empty configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            sample_rate: default_sample_rate(),
            fft: FftSettings::default(),
            stages: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.stages.push(stage);
        self
    }

    /// Set the FFT settings.
    pub fn with_fft(mut self, fft: FftSettings) -> Self {
        self.fft = fft;
        self
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), name = %config.name, stages = config.len(), "loaded pipeline config");
        Ok(config)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True if there are no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage kinds in order.
    pub fn stage_kinds(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.kind.as_str()).collect()
    }

    /// Resolve every stage into a validated descriptor.
    pub fn descriptors(&self) -> Result<Vec<StageDescriptor>> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::invalid_parameter(
                &self.name,
                "sample_rate",
                format!("must be positive, got {}", self.sample_rate),
            ));
        }
        self.stages
            .iter()
            .map(|stage| stage.to_descriptor(self.sample_rate))
            .collect()
    }

    /// Check the whole configuration, including FFT settings, without
    /// building anything.
    pub fn validate(&self) -> Result<()> {
        self.descriptors()?;
        self.fft.window_function()?;
        if self.fft.workers == Some(0) {
            return Err(ConfigError::invalid_parameter("fft", "workers", "must be >= 1"));
        }
        Ok(())
    }

    /// Build a configured pipeline.
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let pipeline = Pipeline::from_descriptors(self.descriptors()?)?;
        tracing::debug!(name = %self.name, stages = pipeline.len(), "built pipeline");
        Ok(pipeline)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new("untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Mode, PipelineStatus, StageKind, WindowSpec};

    const SAMPLE: &str = r#"
name = "emg-features"
sample_rate = 1000.0

[fft]
workers = 4
cache_entries = 256
cache_bytes = 16777216

[[stages]]
kind = "rms"
mode = "moving"
window_size = 100

[[stages]]
kind = "threshold_crossing"
window_size = 100
threshold = 1.0

[[stages]]
kind = "butterworth"
response = "lowpass"
order = 4
cutoff = 40.0
"#;

    #[test]
    fn parse_sample() {
        let config = PipelineConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.name, "emg-features");
        assert_eq!(config.fft.workers, Some(4));
        assert_eq!(config.stage_kinds(), ["rms", "threshold_crossing", "butterworth"]);

        let descriptors = config.descriptors().unwrap();
        assert_eq!(
            descriptors[1],
            StageDescriptor::moving(
                StageKind::ThresholdCrossing { threshold: 1.0 },
                WindowSpec::Samples(100)
            )
        );
        assert_eq!(descriptors[2].mode, Mode::Moving);
    }

    #[test]
    fn defaults_apply() {
        let config = PipelineConfig::from_toml("name = \"bare\"").unwrap();
        assert_eq!(config.sample_rate, 1000.0);
        assert_eq!(config.fft, FftSettings::default());
        assert!(config.is_empty());
        assert_eq!(config.build_pipeline().unwrap().status(), PipelineStatus::Empty);
    }

    #[test]
    fn toml_roundtrip() {
        let config = PipelineConfig::from_toml(SAMPLE).unwrap().with_description("features");
        let back = PipelineConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn build_pipeline_configures_every_stage() {
        let p = PipelineConfig::from_toml(SAMPLE).unwrap().build_pipeline().unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.status(), PipelineStatus::Configured);
    }

    #[test]
    fn bad_sample_rate() {
        let config = PipelineConfig::from_toml(SAMPLE).unwrap().with_sample_rate(0.0);
        assert!(matches!(
            config.descriptors(),
            Err(ConfigError::InvalidParameter { ref param, .. }) if param == "sample_rate"
        ));
    }

    #[test]
    fn parse_errors_surface_as_toml_errors() {
        assert!(matches!(
            PipelineConfig::from_toml("name = 3"),
            Err(ConfigError::TomlParse(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("name = \"x\"\nstgaes = []"),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn validate_checks_fft_settings() {
        let mut config = PipelineConfig::from_toml(SAMPLE).unwrap();
        assert!(config.validate().is_ok());
        config.fft.workers = Some(0);
        assert!(config.validate().is_err());
    }
}
