//! Pairwise comparison of query result lists.
//!
//! Before merging, it pays to know which queries return essentially the same
//! papers. Every pair of ranked identifier lists is compared by raw overlap and
//! by rank-biased overlap; pairs above either threshold are flagged so one of
//! the two queries can be dropped.

use crate::error::Result;
use crate::rbo::{prefix_weight, rbo, DEFAULT_PERSISTENCE};
use crate::record::SourceResultSet;
use crate::title::normalize;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Thresholds for flagging redundant query pairs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// RBO persistence parameter
    pub persistence: f64,
    /// Flag pairs sharing more than this fraction of results
    pub min_match: f64,
    /// Flag pairs whose RBO exceeds this value
    pub min_rbo: f64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            persistence: DEFAULT_PERSISTENCE,
            min_match: 0.7,
            min_rbo: 0.5,
        }
    }
}

/// A labelled, ranked list of record identifiers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankedList {
    pub label: String,
    pub ids: Vec<String>,
}

/// Which identifier to compare lists by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdField {
    /// Normalized title
    #[default]
    Title,
    /// Lowercased DOI; records without one are skipped
    Doi,
}

impl RankedList {
    /// Identifiers of a source in rank order
    pub fn from_source(source: &SourceResultSet, field: IdField) -> Self {
        let ids = source
            .records
            .iter()
            .filter_map(|r| match field {
                IdField::Title => r.title.as_deref().map(normalize),
                IdField::Doi => r
                    .doi
                    .as_deref()
                    .map(|d| d.trim().trim_start_matches("https://doi.org/").to_lowercase())
                    .filter(|d| !d.is_empty()),
            })
            .collect();
        Self {
            label: source.label.clone(),
            ids,
        }
    }
}

/// Comparison of one pair of lists
#[derive(Debug, Clone, Serialize)]
pub struct PairComparison {
    pub first: String,
    pub second: String,
    /// Identifiers present in both full lists
    pub matches: usize,
    /// `matches` relative to the shorter list
    pub match_fraction: f64,
    /// RBO of both lists truncated to the shorter length
    pub rbo: f64,
    /// Length both lists were truncated to for the RBO
    pub depth: usize,
    /// Share of the total RBO weight the compared depth accounts for
    pub depth_weight: f64,
    /// Whether either threshold was exceeded
    pub redundant: bool,
}

/// Compare every unordered pair of non-empty lists.
///
/// # Errors
///
/// Returns `InvalidPersistence` for a persistence outside (0, 1).
pub fn compare_lists(lists: &[RankedList], options: &CompareOptions) -> Result<Vec<PairComparison>> {
    let usable: Vec<&RankedList> = lists
        .iter()
        .filter(|list| {
            if list.ids.is_empty() {
                warn!(label = %list.label, "Skipping empty result list");
            }
            !list.ids.is_empty()
        })
        .collect();

    let mut comparisons = Vec::new();
    for (i, first) in usable.iter().enumerate() {
        for second in &usable[i + 1..] {
            comparisons.push(compare_pair(first, second, options)?);
        }
    }

    let redundant = comparisons.iter().filter(|c| c.redundant).count();
    info!(
        lists = usable.len(),
        pairs = comparisons.len(),
        redundant,
        "Query comparison complete"
    );
    Ok(comparisons)
}

fn compare_pair(first: &RankedList, second: &RankedList, options: &CompareOptions) -> Result<PairComparison> {
    let set_a: HashSet<&String> = first.ids.iter().collect();
    let set_b: HashSet<&String> = second.ids.iter().collect();
    let matches = set_a.intersection(&set_b).count();

    let depth = first.ids.len().min(second.ids.len());
    let rank_overlap = rbo(&first.ids[..depth], &second.ids[..depth], options.persistence)?;
    let depth_weight = prefix_weight(options.persistence, depth)?;
    let match_fraction = matches as f64 / depth as f64;

    let redundant = match_fraction > options.min_match || rank_overlap > options.min_rbo;
    info!(
        first = %first.label,
        second = %second.label,
        matches,
        rbo = rank_overlap,
        depth_weight,
        redundant,
        "Compared queries"
    );

    Ok(PairComparison {
        first: first.label.clone(),
        second: second.label.clone(),
        matches,
        match_fraction,
        rbo: rank_overlap,
        depth,
        depth_weight,
        redundant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MergeError;
    use crate::record::PublicationRecord;

    fn list(label: &str, ids: &[&str]) -> RankedList {
        RankedList {
            label: label.to_string(),
            ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_identical_queries_are_redundant() -> Result<()> {
        let lists = vec![list("q0", &["a", "b", "c"]), list("q1", &["a", "b", "c"])];
        let result = compare_lists(&lists, &CompareOptions::default())?;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].matches, 3);
        assert!((result[0].match_fraction - 1.0).abs() < 1e-9);
        assert!((result[0].rbo - 1.0).abs() < 1e-9);
        assert!(result[0].redundant);
        Ok(())
    }

    #[test]
    fn test_distinct_queries_are_kept() -> Result<()> {
        let lists = vec![list("q0", &["a", "b", "c"]), list("q1", &["x", "y", "c"])];
        let result = compare_lists(&lists, &CompareOptions::default())?;
        assert_eq!(result[0].matches, 1);
        assert!(!result[0].redundant);
        Ok(())
    }

    #[test]
    fn test_all_pairs_and_empty_skipped() -> Result<()> {
        let lists = vec![
            list("q0", &["a"]),
            list("empty", &[]),
            list("q1", &["a", "b"]),
            list("q2", &["b"]),
        ];
        let result = compare_lists(&lists, &CompareOptions::default())?;
        let pairs: Vec<(&str, &str)> = result.iter().map(|c| (c.first.as_str(), c.second.as_str())).collect();
        assert_eq!(pairs, vec![("q0", "q1"), ("q0", "q2"), ("q1", "q2")]);
        Ok(())
    }

    #[test]
    fn test_fraction_uses_shorter_list() -> Result<()> {
        let lists = vec![list("short", &["a", "b"]), list("long", &["b", "x", "y", "a"])];
        let result = compare_lists(&lists, &CompareOptions::default())?;
        // both ids of the short list appear in the long one
        assert!((result[0].match_fraction - 1.0).abs() < 1e-9);
        assert!(result[0].redundant);
        Ok(())
    }

    #[test]
    fn test_depth_weight_reported() -> Result<()> {
        let ids: Vec<String> = (0..10).map(|i| format!("p{}", i)).collect();
        let lists = vec![
            RankedList { label: "q0".to_string(), ids: ids.clone() },
            RankedList { label: "q1".to_string(), ids: ids.iter().rev().cloned().collect() },
            list("q2", &["p0", "p1"]),
        ];
        let result = compare_lists(&lists, &CompareOptions::default())?;

        assert_eq!(result[0].depth, 10);
        assert!((result[0].depth_weight - 0.8556).abs() < 1e-3);
        // q0 vs q2 only looks at the top two ranks
        assert_eq!(result[1].depth, 2);
        assert!(result[1].depth_weight < result[0].depth_weight);
        Ok(())
    }

    #[test]
    fn test_invalid_persistence_propagates() {
        let lists = vec![list("q0", &["a"]), list("q1", &["a"])];
        let options = CompareOptions {
            persistence: 1.0,
            ..Default::default()
        };
        assert!(matches!(compare_lists(&lists, &options), Err(MergeError::InvalidPersistence(_))));
    }

    #[test]
    fn test_ranked_list_from_source() {
        let mut with_doi = PublicationRecord::with_title("Deep Nets!");
        with_doi.doi = Some("https://doi.org/10.1000/ABC".to_string());
        let source = SourceResultSet::new("q", vec![with_doi, PublicationRecord::with_title("Plain")]);

        assert_eq!(RankedList::from_source(&source, IdField::Title).ids, vec!["deep nets", "plain"]);
        assert_eq!(RankedList::from_source(&source, IdField::Doi).ids, vec!["10.1000/abc"]);
    }
}
