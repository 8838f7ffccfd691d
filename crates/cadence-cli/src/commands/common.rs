//! Shared CLI helpers used across multiple commands.

use std::path::Path;

use cadence_config::{PipelineConfig, get_builtin};
use cadence_core::Mode;

/// Load a configuration by built-in name or file path.
///
/// Built-in names win; anything else is read as a TOML file.
pub fn load_config(name: &str) -> anyhow::Result<PipelineConfig> {
    if let Some(config) = get_builtin(name) {
        return Ok(config);
    }

    let path = Path::new(name);
    if path.exists() {
        return Ok(PipelineConfig::load(path)?);
    }

    anyhow::bail!(
        "Config '{}' not found. Use 'cadence configs' to see the built-in configs.",
        name
    )
}

/// Lowercase mode name as written in config files.
pub fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Batch => "batch",
        Mode::Moving => "moving",
    }
}
