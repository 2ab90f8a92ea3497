//! Merge scored sources into one de-duplicated, ranked publication list.
//!
//! Candidates are the union of all normalized titles. For each candidate every
//! source is scanned in index order; each source holding the title contributes
//! its rank score to an unweighted average, and one of them supplies the
//! descriptive fields according to the [`CanonicalPolicy`].

use crate::error::{MergeError, OptionExt, Result};
use crate::index::TitleIndex;
use crate::matching::MatchSet;
use crate::record::{int_or_unknown, MergedRecord, ScoredRecord, ScoredSource};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info};

/// Which duplicate supplies title, authors, abstract, BibTeX, year and citations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanonicalPolicy {
    /// The last source in scan order containing the title
    #[default]
    LastFound,
    /// The first source in scan order containing the title
    FirstFound,
    /// The duplicate with the highest citation count (later source on ties)
    MostCited,
}

impl FromStr for CanonicalPolicy {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "last" | "last-found" => Ok(Self::LastFound),
            "first" | "first-found" => Ok(Self::FirstFound),
            "most-cited" => Ok(Self::MostCited),
            other => Err(MergeError::Config(format!(
                "Unknown canonical policy '{}' (expected last, first or most-cited)",
                other
            ))),
        }
    }
}

/// Final ordering of the merged list; the normalized title breaks ties
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Alphabetical by normalized title
    #[default]
    Title,
    /// Ascending average rank score (best first)
    RankScore,
    /// Most widely found first, then by rank score
    Occurrence,
    /// Highest similarity to the reference document first
    Similarity,
}

impl FromStr for SortOrder {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(Self::Title),
            "rank" | "rank-score" => Ok(Self::RankScore),
            "occurrence" => Ok(Self::Occurrence),
            "similarity" => Ok(Self::Similarity),
            other => Err(MergeError::Config(format!(
                "Unknown sort order '{}' (expected title, rank, occurrence or similarity)",
                other
            ))),
        }
    }
}

/// Merge behaviour knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub canonical: CanonicalPolicy,
    pub sort: SortOrder,
}

/// Merge sources into one list of unique publications.
///
/// `indices[i]` must be the title index of `sources[i]`. When `matches` is
/// given, each merged record carries an occurrence count.
///
/// # Errors
///
/// - `Validation` if sources and indices differ in length.
/// - `Inconsistent` if a candidate title cannot be resolved to a record. This
///   indicates indices that do not belong to the sources and is fatal.
pub fn merge(
    sources: &[ScoredSource],
    indices: &[TitleIndex],
    matches: Option<&MatchSet>,
    options: MergeOptions,
) -> Result<Vec<MergedRecord>> {
    if sources.len() != indices.len() {
        return Err(MergeError::Validation(format!(
            "{} sources but {} title indices",
            sources.len(),
            indices.len()
        )));
    }

    info!("Merging publication data");

    // Union of all per-source title sets, ascending
    let candidates: BTreeSet<&str> = indices
        .iter()
        .flat_map(|index| index.titles.iter().map(String::as_str))
        .collect();
    info!(unique = candidates.len(), "Number of unique papers");

    let mut merged = candidates
        .into_iter()
        .map(|key| merge_one(key, sources, indices, matches, options.canonical))
        .collect::<Result<Vec<_>>>()?;

    sort_merged(&mut merged, options.sort);
    Ok(merged)
}

fn merge_one(
    key: &str,
    sources: &[ScoredSource],
    indices: &[TitleIndex],
    matches: Option<&MatchSet>,
    policy: CanonicalPolicy,
) -> Result<MergedRecord> {
    let mut rank_sum = 0.0;
    let mut found = 0usize;
    let mut chosen: Option<&ScoredRecord> = None;

    for (source_idx, (source, index)) in sources.iter().zip(indices).enumerate() {
        let Some(position) = index.position(key) else {
            continue;
        };
        let record = source.records.get(position).ok_or_inconsistent_with(|| {
            format!(
                "title index of source {} points past its {} records",
                source_idx,
                source.records.len()
            )
        })?;

        rank_sum += record.rank_score;
        found += 1;
        chosen = Some(match (policy, chosen) {
            (CanonicalPolicy::FirstFound, Some(first)) => first,
            (CanonicalPolicy::MostCited, Some(best))
                if int_or_unknown(best.record.citations.as_ref())
                    > int_or_unknown(record.record.citations.as_ref()) =>
            {
                best
            }
            _ => record,
        });
    }

    let chosen = chosen.ok_or_inconsistent_with(|| format!("title '{}' not found in any source", key))?;
    let title = chosen
        .record
        .title
        .clone()
        .ok_or_inconsistent_with(|| format!("indexed record for '{}' lost its title", key))?;

    let occurrence_count = matches.map(|m| m.occurrence(key));
    debug!(key, found, occurrence = ?occurrence_count, "Merged title");

    Ok(MergedRecord {
        key: key.to_string(),
        title,
        authors: chosen.record.authors.clone(),
        abstract_text: chosen.record.abstract_text.clone(),
        bibtex: chosen.record.bibtex.clone(),
        doi: chosen.record.doi.clone(),
        year: int_or_unknown(chosen.record.year.as_ref()),
        citations: int_or_unknown(chosen.record.citations.as_ref()),
        rank_score: rank_sum / found as f64,
        title_match_score: chosen.title_match_score,
        abstract_match_score: chosen.abstract_match_score,
        similarity_score: chosen.similarity_score,
        found_in: found,
        occurrence_count,
    })
}

/// Sort merged records in place
pub fn sort_merged(records: &mut [MergedRecord], order: SortOrder) {
    records.sort_by(|a, b| compare(a, b, order).then_with(|| a.key.cmp(&b.key)));
}

fn compare(a: &MergedRecord, b: &MergedRecord, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Title => Ordering::Equal,
        SortOrder::RankScore => a.rank_score.total_cmp(&b.rank_score),
        SortOrder::Occurrence => {
            let occ_a = a.occurrence_count.unwrap_or(a.found_in);
            let occ_b = b.occurrence_count.unwrap_or(b.found_in);
            occ_b
                .cmp(&occ_a)
                .then_with(|| a.rank_score.total_cmp(&b.rank_score))
        }
        SortOrder::Similarity => b.similarity_score.total_cmp(&a.similarity_score),
    }
}
