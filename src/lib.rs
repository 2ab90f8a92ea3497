//! # rustlitmerge
//!
//! Literature review toolkit: merge, deduplicate, score and rank publication
//! lists harvested by several queries against scholarly metadata APIs.
//!
//! ## Modules
//!
//! - [`record`] - Publication record types
//! - [`title`] - Title normalization
//! - [`index`] - Per-source title indices
//! - [`rbo`] - Rank-biased overlap
//! - [`matching`] - Cross-source match sets
//! - [`scoring`] - Rank, keyword and similarity scores
//! - [`merge`] - Reconciliation into one list
//! - [`compare`] - Query redundancy check
//! - [`loader`] - Result file loading and export
//! - [`pipeline`] - End-to-end orchestration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustlitmerge::{loader, pipeline};
//!
//! fn main() -> rustlitmerge::Result<()> {
//!     let sources = loader::load_sources(std::path::Path::new("./results"))?;
//!     let report = pipeline::run(sources, &Default::default())?;
//!     println!("Merged into {} unique papers", report.merged.len());
//!     Ok(())
//! }
//! ```

pub mod compare;
pub mod error;
pub mod index;
pub mod loader;
pub mod matching;
pub mod merge;
pub mod pipeline;
pub mod rbo;
pub mod record;
pub mod scoring;
pub mod title;

pub use error::{MergeError, Result};
