//! How3 - protocol scoring engine
//!
//! - `scoring`: configuration, source adapters, statistics, calculators and the engine
//! - `store`: report persistence (SQLite, JSON files) and CSV/JSON export
//! - `config`: runtime settings from environment variables


pub mod config;
pub mod scoring;
pub mod store;

pub use scoring::{ConfigStore, ScoreRecord, ScoringEngine, ScoringError};
pub use store::{ReportStore, StoreError};
