// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod ingest;
pub mod metrics;
pub mod news;
pub mod report;
pub mod sink;

// ---- Re-exports for stable public API ----
pub use crate::ingest::{
    run_pipeline, run_pipeline_with_cancel, PipelineConfig, PipelineError, RunSummary,
};
pub use crate::news::{NewsItem, Place};
