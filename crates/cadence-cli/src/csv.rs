//! CSV sample files.
//!
//! One row per frame, channel values separated by commas, optionally preceded
//! by a timestamp column. Blank lines and lines starting with `#` are ignored,
//! as is a header row whose first field is not a number.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, bail};

/// Interleaved frames read from a CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct Frames {
    /// Interleaved samples, `channels` per frame.
    pub samples: Vec<f32>,
    /// One timestamp per frame, if the file has a timestamp column.
    pub timestamps: Option<Vec<f64>>,
    /// Values per frame.
    pub channels: usize,
}

impl Frames {
    /// Number of frames.
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// True if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples of one channel.
    pub fn channel(&self, channel: usize) -> Vec<f32> {
        self.samples
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .copied()
            .collect()
    }
}

/// Parse CSV text.
pub fn parse(text: &str, channels: usize, timestamps: bool) -> anyhow::Result<Frames> {
    if channels == 0 {
        bail!("channel count must be at least 1");
    }
    let columns = channels + usize::from(timestamps);
    let mut samples = Vec::new();
    let mut stamps = Vec::new();
    let mut seen_data = false;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if !seen_data && fields[0].parse::<f64>().is_err() {
            // header
            seen_data = true;
            continue;
        }
        seen_data = true;

        if fields.len() != columns {
            bail!(
                "line {}: expected {columns} columns, found {}",
                line_no + 1,
                fields.len()
            );
        }
        let mut values = fields.iter();
        if timestamps && let Some(field) = values.next() {
            let ts: f64 = field
                .parse()
                .with_context(|| format!("line {}: bad timestamp '{field}'", line_no + 1))?;
            stamps.push(ts);
        }
        for field in values {
            let v: f32 = field
                .parse()
                .with_context(|| format!("line {}: bad sample '{field}'", line_no + 1))?;
            samples.push(v);
        }
    }

    Ok(Frames {
        samples,
        timestamps: timestamps.then_some(stamps),
        channels,
    })
}

/// Read and parse a CSV file.
pub fn read(path: &Path, channels: usize, timestamps: bool) -> anyhow::Result<Frames> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse(&text, channels, timestamps).with_context(|| format!("in {}", path.display()))
}

/// Render interleaved samples as CSV.
pub fn render(samples: &[f32], channels: usize, timestamps: Option<&[f64]>) -> String {
    let mut out = String::new();
    for (frame, values) in samples.chunks(channels.max(1)).enumerate() {
        if let Some(ts) = timestamps.and_then(|t| t.get(frame)) {
            let _ = write!(out, "{ts},");
        }
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{v}");
        }
        out.push('\n');
    }
    out
}

/// Write CSV text to `path`, or to stdout when no path is given.
pub fn write(path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_header_comments_and_timestamps() {
        let text = "# recorded at rest\nt,left,right\n0.0,1,2\n\n0.5,3,4\n";
        let frames = parse(text, 2, true).unwrap();
        assert_eq!(frames.samples, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frames.timestamps, Some(vec![0.0, 0.5]));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.channel(1), vec![2.0, 4.0]);
    }

    #[test]
    fn parse_rejects_ragged_rows() {
        let err = parse("1,2\n3\n", 2, false).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn parse_rejects_bad_numbers() {
        assert!(parse("1\nx\n", 1, false).is_err());
        assert!(parse("1", 0, false).is_err());
    }

    #[test]
    fn render_matches_parse() {
        let samples = [0.25, -1.5, 3.0, 4.0];
        let ts = [1.0, 2.0];
        let text = render(&samples, 2, Some(&ts));
        assert_eq!(text, "1,0.25,-1.5\n2,3,4\n");
        let back = parse(&text, 2, true).unwrap();
        assert_eq!(back.samples, samples);
    }
}
