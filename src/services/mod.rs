//! Service layer containing the pipeline stages and side-effect helpers.
//!
//! ## Service map
//! - `sources.rs` — provider adapters returning raw candidate records.
//! - `scoring.rs` — tier-table confidence scoring.
//! - `selection.rs` — candidate filtering + weighted random selection.
//! - `collect.rs` — solution/citation collection for one candidate.
//! - `aggregate.rs` — rank/dedup/summarize collected material.
//! - `synthesis.rs` — article generation via the text-generation API.
//! - `quality.rs` — multi-dimensional article quality gate.
//! - `publish.rs` — WordPress REST publishing.
//! - `library.rs` — numbered article directories + processed history.
//! - `output.rs` — JSON/text output helpers.
//!
//! ## Conventions
//! - Prefer pure helpers where possible.
//! - Side effects should be explicit and localized.
//! - Keep command handlers thin; delegate to services.
//! - Randomized stages take an explicit `&mut impl Rng`; nothing reaches
//!   for a global random source.

pub mod aggregate;
pub mod collect;
pub mod library;
pub mod output;
pub mod publish;
pub mod quality;
pub mod scoring;
pub mod selection;
pub mod sources;
pub mod synthesis;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("article not found: {0:04}")]
    ArticleNotFound(u32),
    #[error("synthesis api key not configured")]
    SynthesisKeyMissing,
    #[error("publishing endpoint not configured")]
    PublisherNotConfigured,
}
