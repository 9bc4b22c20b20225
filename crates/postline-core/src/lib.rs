//! # Postline Core
//!
//! Shared, I/O-free logic for Postline: the quality rule catalog, document
//! chunking, the pre-validation → correction → formatting → post-validation
//! pipeline, data models, the store abstraction, and retry scheduling.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Async traits
//! ([`store::Store`], [`publish::Publisher`]) are implemented by the
//! `postline` application crate.

pub mod chunk;
pub mod clock;
pub mod correct;
pub mod format;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod retry;
pub mod rules;
pub mod store;
pub mod validate;

pub use pipeline::{run_quality_pipeline, run_quality_pipeline_with, PipelineConfig};
