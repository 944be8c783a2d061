//! Core library for the Infra-Lab toolkit
//!
//! Everything the `ilab` CLI does lives here: preset lookup, configuration
//! rendering, ingest cost estimation, risk linting, rollout orchestration,
//! and post-rollout validation against NRDB.

pub mod cost;
pub mod error;
pub mod lint;
pub mod models;
pub mod nrdb;
pub mod preset;
pub mod render;
pub mod rollout;
pub mod validate;

pub use error::{LabError, NrdbError, Result};
pub use models::{FilterMode, RenderedConfig};
