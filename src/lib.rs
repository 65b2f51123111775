//! `bankrecon-core` — bank/ERP transaction reconciliation engine.
//!
//! Pure, synchronous engine: takes pre-loaded, pre-filtered rows from
//! both sides and returns validated matches, per-side unreconciled
//! rows, and daily/monthly aggregates. Source/sink persistence, CLI
//! parsing, and the downstream exporter are out of scope — see the
//! crate's design notes.

pub mod aggregate;
pub mod calendar;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod keywords;
pub mod model;
pub mod normalize;
pub mod stages;
pub mod subset_sum;

pub use config::Limits;
pub use engine::run;
pub use error::ReconError;
pub use model::{ReconInput, ReconOutput};
