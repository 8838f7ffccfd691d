//! Cadence State - persistence for pipeline state
//!
//! Encodes a [`PipelineState`] as JSON or as a compact binary blob, and moves
//! encoded blobs through an opaque [`BlobStore`].
//!
//! - [`codec`] - JSON and `CDST` binary formats, both validated on decode
//! - [`store`] - in-memory and directory-backed stores
//! - [`save_pipeline`] / [`restore_pipeline`] - the round trip in one call
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{Pipeline, ProcessOptions, StageDescriptor, StageKind, WindowSpec};
//! use cadence_state::{Format, MemoryStore, restore_pipeline, save_pipeline};
//!
//! let descriptor = StageDescriptor::moving(StageKind::Mean, WindowSpec::Samples(4));
//! let mut live = Pipeline::from_descriptors([descriptor.clone()]).unwrap();
//! live.process(&[1.0, 2.0, 3.0], None, ProcessOptions::default()).unwrap();
//!
//! let store = MemoryStore::new();
//! save_pipeline(&store, "emg", &live, Format::Binary).unwrap();
//!
//! let mut resumed = Pipeline::from_descriptors([descriptor]).unwrap();
//! assert!(restore_pipeline(&store, "emg", &mut resumed, Format::Binary).unwrap());
//! assert_eq!(resumed.save_state().stages, live.save_state().stages);
//! ```

pub mod codec;
mod error;
pub mod store;

pub use codec::{Format, decode_binary, decode_json, encode_binary, encode_json};
pub use error::{Result, StateError};
pub use store::{BlobStore, DirStore, MemoryStore};

use cadence_core::{Pipeline, PipelineState};

/// Encode `pipeline`'s state in `format` and store it under `key`.
pub fn save_pipeline(
    store: &dyn BlobStore,
    key: &str,
    pipeline: &Pipeline,
    format: Format,
) -> Result<()> {
    let state = pipeline.save_state();
    let blob = format.encode(&state)?;
    store.set(key, &blob)?;
    tracing::debug!(
        key,
        %format,
        stages = state.stage_count,
        bytes = blob.len(),
        "saved pipeline state"
    );
    Ok(())
}

/// Fetch and decode the state stored under `key`, if any.
pub fn fetch_state(store: &dyn BlobStore, key: &str, format: Format) -> Result<Option<PipelineState>> {
    store
        .get(key)?
        .map(|blob| format.decode(&blob))
        .transpose()
}

/// Load the state stored under `key` into `pipeline`.
///
/// Returns `Ok(false)` if nothing is stored under `key`. On any error the
/// pipeline is unchanged.
pub fn restore_pipeline(
    store: &dyn BlobStore,
    key: &str,
    pipeline: &mut Pipeline,
    format: Format,
) -> Result<bool> {
    let Some(state) = fetch_state(store, key, format)? else {
        tracing::debug!(key, "no stored state");
        return Ok(false);
    };
    pipeline.load_state(&state)?;
    tracing::debug!(key, %format, stages = state.stage_count, "restored pipeline state");
    Ok(true)
}
