//! CLI command implementations.

pub mod common;
pub mod configs;
pub mod run;
pub mod spectrum;
pub mod state;
