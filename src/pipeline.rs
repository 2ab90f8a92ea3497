//! End-to-end reconciliation pipeline.
//!
//! Stages, in order:
//! 1. drop records without a title
//! 2. score each source (rank, keyword match, similarity)
//! 3. build per-source title indices
//! 4. find cross-source matches (optional)
//! 5. merge into one ranked list

use crate::error::{MergeError, Result};
use crate::index::{build_indices, drop_untitled, TitleIndex};
use crate::matching::{find_matches, MatchEntry};
use crate::merge::{merge, MergeOptions};
use crate::record::{MergedRecord, ScoredRecord, ScoredSource, SourceResultSet};
use crate::scoring::{score_sources, KeywordMatcher, SimilarityScorer};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Keywords for title/abstract match scores; empty disables match scoring
    pub keywords: Vec<String>,
    /// Reference text for similarity scores; `None` disables similarity scoring
    pub reference_document: Option<String>,
    /// Compute cross-source match sets and occurrence counts
    pub find_matches: bool,
    #[serde(flatten)]
    pub merge: MergeOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            reference_document: None,
            find_matches: true,
            merge: MergeOptions::default(),
        }
    }
}

/// Per-source summary
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub label: String,
    pub records: usize,
    pub dropped_untitled: usize,
    pub unique_titles: usize,
    pub title_collisions: usize,
}

/// Everything the pipeline produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub sources: Vec<SourceSummary>,
    /// Per-source records with scores, in provider order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scored: Vec<ScoredSource>,
    /// Cross-source match report, empty when matching was disabled
    pub matches: Vec<MatchEntry>,
    pub merged: Vec<MergedRecord>,
}

/// Run the full pipeline over fetched result lists.
///
/// # Errors
///
/// - `NotEnoughSources` when matching is enabled with fewer than two sources.
/// - `Inconsistent` on internal defects (fatal).
pub fn run(mut sources: Vec<SourceResultSet>, options: &PipelineOptions) -> Result<PipelineReport> {
    info!(sources = sources.len(), "Starting reconciliation pipeline");

    if options.find_matches && sources.len() < 2 {
        return Err(MergeError::NotEnoughSources { got: sources.len() });
    }

    // Stage 1: title presence
    let dropped = drop_untitled(&mut sources);

    // Stage 2: scoring
    let keywords = if options.keywords.iter().any(|k| !k.trim().is_empty()) {
        Some(KeywordMatcher::new(&options.keywords)?)
    } else {
        None
    };
    let similarity = options
        .reference_document
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(SimilarityScorer::new);

    let mut scored: Vec<ScoredSource> = sources.into_iter().map(ScoredSource::from).collect();
    score_sources(&mut scored, keywords.as_ref(), similarity.as_ref());

    // Stage 3: title indices
    let records: Vec<&[ScoredRecord]> = scored.iter().map(|s| s.records.as_slice()).collect();
    let indices: Vec<TitleIndex> = build_indices(&records)?;

    let collisions: usize = indices.iter().map(|i| i.collisions).sum();
    if collisions > 0 {
        warn!(collisions, "Records shadowed by a same-titled record in the same source");
    }

    // Stage 4: cross-source matches
    let matches = if options.find_matches {
        let title_sets: Vec<_> = indices.iter().map(|i| &i.titles).collect();
        Some(find_matches(&title_sets)?)
    } else {
        None
    };

    // Stage 5: merge
    let merged = merge(&scored, &indices, matches.as_ref(), options.merge)?;
    info!(merged = merged.len(), "Pipeline complete");

    let summaries = scored
        .iter()
        .zip(&indices)
        .zip(dropped)
        .map(|((source, index), dropped_untitled)| SourceSummary {
            label: source.label.clone(),
            records: source.records.len(),
            dropped_untitled,
            unique_titles: index.len(),
            title_collisions: index.collisions,
        })
        .collect();

    Ok(PipelineReport {
        sources: summaries,
        scored,
        matches: matches.map(|m| m.to_entries()).unwrap_or_default(),
        merged,
    })
}
