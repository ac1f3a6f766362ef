// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod digest;
pub mod engine;
pub mod metrics;
pub mod registry;
pub mod sanitize;

// Sources → candidates
pub mod ingest;

// Candidates → two regional buckets
pub mod curation;

// Summaries and delivery
pub mod notify;
pub mod summarize;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::curation::{curate, CurationConfig, CurationOutcome, Curator};
pub use crate::engine::{DigestEngine, DigestRun};
pub use crate::ingest::types::{Candidate, Region, SourceProvider};
pub use crate::sanitize::{sanitize, OutputLimits, RawSummary, SummaryRecord};
