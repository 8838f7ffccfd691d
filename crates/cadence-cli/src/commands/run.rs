//! Pipeline processing command.

use std::path::PathBuf;

use anyhow::Context;
use cadence_core::ProcessOptions;
use cadence_state::{DirStore, Format, restore_pipeline, save_pipeline};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::common::load_config;
use crate::csv;

#[derive(Args)]
pub struct RunArgs {
    /// Built-in config name or TOML config file
    #[arg(short, long)]
    config: String,

    /// Input CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Channels per row
    #[arg(long, default_value = "1")]
    channels: usize,

    /// The first CSV column holds timestamps in seconds
    #[arg(long)]
    timestamps: bool,

    /// Directory holding saved state between runs
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// State key (defaults to the config name)
    #[arg(long)]
    key: Option<String>,

    /// State encoding
    #[arg(long, default_value = "json")]
    format: Format,

    /// Output CSV file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run each block on a worker thread
    #[arg(long)]
    offload: bool,

    /// Frames per processing call
    #[arg(long, default_value = "4096")]
    block_size: usize,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    if args.block_size == 0 {
        anyhow::bail!("--block-size must be at least 1");
    }

    let config = load_config(&args.config)?;
    let mut pipeline = config.build_pipeline()?;
    tracing::info!(config = %config.name, stages = pipeline.len(), "pipeline configured");

    let store = args
        .state_dir
        .as_ref()
        .map(DirStore::new)
        .transpose()
        .context("failed to open state directory")?;
    let key = args.key.clone().unwrap_or_else(|| config.name.clone());
    if let Some(store) = &store {
        if restore_pipeline(store, &key, &mut pipeline, args.format)? {
            tracing::info!(%key, "resumed saved state");
        } else {
            tracing::info!(%key, "no saved state, starting fresh");
        }
    }

    let frames = csv::read(&args.input, args.channels, args.timestamps)?;
    if pipeline.needs_timestamps() && frames.timestamps.is_none() {
        anyhow::bail!(
            "config '{}' has duration windows; pass --timestamps with a timestamp column",
            config.name
        );
    }
    tracing::info!(frames = frames.len(), channels = frames.channels, "input loaded");

    let options = ProcessOptions::channels(args.channels).with_offload(args.offload);
    let block = args.block_size * args.channels;

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(frames.len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({eta})")?
            .progress_chars("##-"),
    );

    let mut output = Vec::with_capacity(frames.samples.len());
    for (i, chunk) in frames.samples.chunks(block).enumerate() {
        let start = i * args.block_size;
        let count = chunk.len() / args.channels;
        let ts = frames
            .timestamps
            .as_deref()
            .map(|t| &t[start..start + count]);
        output.extend(pipeline.process(chunk, ts, options)?);
        pb.set_position((start + count) as u64);
    }
    pb.finish_and_clear();

    if let Some(store) = &store {
        save_pipeline(store, &key, &pipeline, args.format)?;
        tracing::info!(%key, format = %args.format, "state saved");
    }

    let text = csv::render(&output, args.channels, frames.timestamps.as_deref());
    csv::write(args.output.as_deref(), &text)?;
    Ok(())
}
