//! Text and binary encodings of [`PipelineState`].
//!
//! Both formats carry the same logical tree, so a state encoded in one and
//! decoded from the other loads identically.
//!
//! ```text
//! JSON    {"timestamp":…, "stageCount":…, "stages":[{"index":…, "type":…, …}]}
//!
//! binary  ┌──────┬─────────┬────────────────────────────────────┐
//!         │ CDST │ version │ bincode (fixed-width, little-endian) │
//!         │ 4 B  │ u16 LE  │                                    │
//!         └──────┴─────────┴────────────────────────────────────┘
//! ```
//!
//! Decoding never fills in defaults: a missing field, a trailing byte or a
//! structural inconsistency (see [`PipelineState::check_structure`]) is a
//! [`StateError::Decode`].

use std::fmt;
use std::str::FromStr;

use bincode::Options;
use cadence_core::PipelineState;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError};

/// Leading bytes of every binary state blob.
pub const MAGIC: [u8; 4] = *b"CDST";

/// Current binary format version.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Encode as JSON text.
pub fn encode_json(state: &PipelineState) -> Result<String> {
    serde_json::to_string(state).map_err(StateError::Json)
}

/// Encode as pretty-printed JSON text.
pub fn encode_json_pretty(state: &PipelineState) -> Result<String> {
    serde_json::to_string_pretty(state).map_err(StateError::Json)
}

/// Decode JSON text and validate its structure.
pub fn decode_json(text: &str) -> Result<PipelineState> {
    let state: PipelineState =
        serde_json::from_str(text).map_err(|e| StateError::decode(e.to_string()))?;
    state.check_structure().map_err(StateError::Decode)?;
    Ok(state)
}

/// Encode as a versioned binary blob.
pub fn encode_binary(state: &PipelineState) -> Result<Vec<u8>> {
    let body = bincode_options()
        .serialize(state)
        .map_err(StateError::Binary)?;
    let mut blob = Vec::with_capacity(HEADER_LEN + body.len());
    blob.extend_from_slice(&MAGIC);
    blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    blob.extend_from_slice(&body);
    Ok(blob)
}

/// Decode a binary blob and validate its structure.
pub fn decode_binary(blob: &[u8]) -> Result<PipelineState> {
    if blob.len() < HEADER_LEN {
        return Err(StateError::decode(format!(
            "binary state is {} bytes, shorter than its header",
            blob.len()
        )));
    }
    let (header, body) = blob.split_at(HEADER_LEN);
    if header[..4] != MAGIC {
        return Err(StateError::decode("missing CDST magic"));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(StateError::decode(format!(
            "unsupported binary format version {version}"
        )));
    }
    let state: PipelineState = bincode_options()
        .deserialize(body)
        .map_err(|e| StateError::decode(e.to_string()))?;
    state.check_structure().map_err(StateError::Decode)?;
    Ok(state)
}

/// Serialization format selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Self-describing JSON text
    #[default]
    Json,
    /// Compact versioned bincode
    Binary,
}

impl Format {
    /// Encode `state` in this format.
    pub fn encode(self, state: &PipelineState) -> Result<Vec<u8>> {
        match self {
            Format::Json => encode_json(state).map(String::into_bytes),
            Format::Binary => encode_binary(state),
        }
    }

    /// Decode bytes produced by [`encode`](Self::encode).
    pub fn decode(self, bytes: &[u8]) -> Result<PipelineState> {
        match self {
            Format::Json => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| StateError::decode(format!("JSON state is not UTF-8: {e}")))?;
                decode_json(text)
            }
            Format::Binary => decode_binary(bytes),
        }
    }

    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Binary => "cdst",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Binary => "binary",
        })
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "binary" | "bin" | "cdst" => Ok(Format::Binary),
            other => Err(format!("unknown state format '{other}' (expected json or binary)")),
        }
    }
}
