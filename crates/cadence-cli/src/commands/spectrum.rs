//! Batch spectrum command.

use std::path::PathBuf;

use cadence_config::FftSettings;
use cadence_fft::magnitude;
use clap::Args;

use super::common::load_config;
use crate::csv;

#[derive(Args)]
pub struct SpectrumArgs {
    /// Input CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Channels per row
    #[arg(long, default_value = "1")]
    channels: usize,

    /// The first CSV column holds timestamps (ignored here)
    #[arg(long)]
    timestamps: bool,

    /// Frame length; each channel is split into frames of this size
    /// (whole channel if omitted)
    #[arg(long)]
    size: Option<usize>,

    /// Worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Analysis window name
    #[arg(long)]
    window: Option<String>,

    /// Config supplying FFT settings and the sample rate
    #[arg(short, long)]
    config: Option<String>,

    /// Sample rate in Hz for bin frequencies
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Peaks to report per channel
    #[arg(long, default_value = "3")]
    peaks: usize,
}

pub fn run(args: SpectrumArgs) -> anyhow::Result<()> {
    let (mut settings, config_rate) = match &args.config {
        Some(name) => {
            let config = load_config(name)?;
            (config.fft, Some(config.sample_rate))
        }
        None => (FftSettings::default(), None),
    };
    if args.workers.is_some() {
        settings.workers = args.workers;
    }
    if args.size.is_some() {
        settings.size = args.size;
    }
    if let Some(window) = args.window {
        settings.window = window;
    }
    let sample_rate = args.sample_rate.or(config_rate).unwrap_or(1000.0);
    let window = settings.window_function()?;

    let frames = csv::read(&args.input, args.channels, args.timestamps)?;
    if frames.is_empty() {
        anyhow::bail!("{} has no samples", args.input.display());
    }
    let size = settings.size.unwrap_or(frames.len());
    if size == 0 || size > frames.len() {
        anyhow::bail!("frame size {size} must be between 1 and {}", frames.len());
    }

    // Frames of every channel, channel-major.
    let mut signals = Vec::new();
    let per_channel = frames.len() / size;
    for channel in 0..args.channels {
        let samples = frames.channel(channel);
        for frame in samples.chunks_exact(size) {
            let mut frame = frame.to_vec();
            window.apply(&mut frame);
            signals.push(frame);
        }
    }

    let processor = settings.batch_processor()?;
    tracing::info!(
        signals = signals.len(),
        size,
        workers = processor.workers(),
        "computing spectra"
    );
    let spectra = processor.process_real(&signals)?;

    let bins = size / 2 + 1;
    let bin_hz = sample_rate / size as f64;
    println!("Spectrum ({size}-point, {window:?} window, {per_channel} frame(s) per channel)");
    for channel in 0..args.channels {
        let mut average = vec![0.0f32; bins];
        for spectrum in &spectra[channel * per_channel..(channel + 1) * per_channel] {
            for (acc, m) in average.iter_mut().zip(magnitude(spectrum)) {
                *acc += m / per_channel as f32;
            }
        }
        let mut ranked: Vec<usize> = (0..bins).collect();
        ranked.sort_by(|&a, &b| average[b].total_cmp(&average[a]));

        println!("\nchannel {channel}:");
        for &bin in ranked.iter().take(args.peaks) {
            println!(
                "  bin {bin:>6}  {:>10.2} Hz  magnitude {:.4}",
                bin as f64 * bin_hz,
                average[bin]
            );
        }
    }

    if let Some(cache) = processor.cache() {
        let stats = cache.stats();
        println!(
            "\ncache: {} hits, {} misses, {} evictions, {} entries, {} bytes",
            stats.hits, stats.misses, stats.evictions, stats.entries, stats.bytes
        );
    }
    processor.shutdown();
    Ok(())
}
