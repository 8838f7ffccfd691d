//! Saved state inspection command.

use std::path::PathBuf;

use cadence_core::Pipeline;
use cadence_state::{DirStore, Format, fetch_state};
use clap::Args;

use super::common::{load_config, mode_name};

#[derive(Args)]
pub struct StateArgs {
    /// Directory holding saved state
    #[arg(long)]
    state_dir: PathBuf,

    /// State key
    #[arg(long)]
    key: String,

    /// State encoding
    #[arg(long, default_value = "json")]
    format: Format,

    /// Check the state against this config instead of the descriptors it
    /// carries
    #[arg(short, long)]
    config: Option<String>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: StateArgs) -> anyhow::Result<()> {
    let store = DirStore::new(&args.state_dir)?;
    let Some(state) = fetch_state(&store, &args.key, args.format)? else {
        anyhow::bail!(
            "no state saved under '{}' in {}",
            args.key,
            args.state_dir.display()
        );
    };

    let mut pipeline = match &args.config {
        Some(name) => load_config(name)?.build_pipeline()?,
        None => Pipeline::from_descriptors(state.stages.iter().map(|s| s.descriptor.clone()))?,
    };
    pipeline.load_state(&state)?;
    let summary = pipeline.list_state();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("State '{}' ({} stages, saved at {} ms)", args.key, state.stage_count, state.timestamp);
    println!();
    println!("  {:<5} {:<20} {:<8} {:>8} {:>9}", "#", "type", "mode", "window", "channels");
    for row in &summary {
        println!(
            "  {:<5} {:<20} {:<8} {:>8} {:>9}",
            row.index,
            row.kind,
            mode_name(row.mode),
            row.window_size,
            row.num_channels
        );
    }
    Ok(())
}
