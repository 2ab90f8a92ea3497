//! Cross-source match finding.
//!
//! For every subset of at least two sources, the titles present in all of
//! them. The number of subsets is `2^N - N - 1`, so this is meant for tens of
//! sources, not thousands; beyond [`LARGE_SOURCE_COUNT`] a warning is logged
//! and the work is done anyway.

use crate::error::{MergeError, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Source count above which the combinatorial cost becomes noticeable
pub const LARGE_SOURCE_COUNT: usize = 16;

/// An unordered set of source indices, stored ascending.
///
/// Ordered by size first, then lexicographically, so iterating a [`MatchSet`]
/// visits all pairs, then all triples, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Combination(Vec<usize>);

impl Combination {
    /// Build from arbitrary indices; duplicates are dropped and order is normalized
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        let set: BTreeSet<usize> = indices.into_iter().collect();
        Self(set.into_iter().collect())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, source: usize) -> bool {
        self.0.binary_search(&source).is_ok()
    }
}

impl Ord for Combination {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Combination {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Titles common to each combination of sources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSet {
    entries: BTreeMap<Combination, Vec<String>>,
}

/// One row of the match report
#[derive(Debug, Clone, Serialize)]
pub struct MatchEntry {
    pub sources: Combination,
    pub count: usize,
    pub titles: Vec<String>,
}

impl MatchSet {
    /// Titles shared by exactly the given sources (sorted), if the combination was computed
    pub fn get(&self, combination: &Combination) -> Option<&[String]> {
        self.entries.get(combination).map(Vec::as_slice)
    }

    /// Iterate combinations in ascending (size, indices) order
    pub fn iter(&self) -> impl Iterator<Item = (&Combination, &[String])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `title` is listed under `combination`
    pub fn contains(&self, combination: &Combination, title: &str) -> bool {
        self.entries
            .get(combination)
            .is_some_and(|titles| titles.binary_search_by(|t| t.as_str().cmp(title)).is_ok())
    }

    /// Occurrence count of a normalized title.
    ///
    /// Combinations are visited in ascending size order and the last one
    /// containing the title wins, which makes this the size of the largest
    /// combination listing the title. A title found in no combination has an
    /// occurrence count of 1.
    pub fn occurrence(&self, title: &str) -> usize {
        self.entries
            .iter()
            .filter(|(_, titles)| titles.binary_search_by(|t| t.as_str().cmp(title)).is_ok())
            .map(|(combination, _)| combination.len())
            .last()
            .unwrap_or(1)
    }

    /// Flatten into a serializable report, one entry per combination
    pub fn to_entries(&self) -> Vec<MatchEntry> {
        self.entries
            .iter()
            .map(|(sources, titles)| MatchEntry {
                sources: sources.clone(),
                count: titles.len(),
                titles: titles.clone(),
            })
            .collect()
    }
}

/// All `k`-element combinations of `0..n` in lexicographic order
pub fn combinations(n: usize, k: usize) -> Vec<Combination> {
    if k == 0 || k > n {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        out.push(Combination(current.clone()));

        // Rightmost position that can still be advanced
        let Some(pos) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            break;
        };
        current[pos] += 1;
        for i in pos + 1..k {
            current[i] = current[i - 1] + 1;
        }
    }
    out
}

/// Titles present in every listed set, sorted
fn intersect<S: Borrow<BTreeSet<String>>>(title_sets: &[S], combination: &Combination) -> Vec<String> {
    // Probe from the smallest set
    let mut members: Vec<&BTreeSet<String>> = combination
        .indices()
        .iter()
        .map(|&i| title_sets[i].borrow())
        .collect();
    members.sort_by_key(|s| s.len());

    let Some((smallest, rest)) = members.split_first() else {
        return Vec::new();
    };
    smallest
        .iter()
        .filter(|title| rest.iter().all(|s| s.contains(*title)))
        .cloned()
        .collect()
}

/// Compute the match set for every combination of two or more sources.
///
/// # Errors
///
/// Returns `NotEnoughSources` for fewer than two title sets.
pub fn find_matches<S>(title_sets: &[S]) -> Result<MatchSet>
where
    S: Borrow<BTreeSet<String>> + Sync,
{
    let n = title_sets.len();
    if n < 2 {
        return Err(MergeError::NotEnoughSources { got: n });
    }
    if n > LARGE_SOURCE_COUNT {
        warn!(
            sources = n,
            combinations = (1u128 << n.min(127)) - n as u128 - 1,
            "Match finding over many sources is exponential"
        );
    }

    info!(sources = n, "Finding matches");

    // Each size is independent and read-only over the title sets
    let per_size: Vec<Vec<(Combination, Vec<String>)>> = (2..=n)
        .into_par_iter()
        .map(|size| {
            combinations(n, size)
                .into_iter()
                .map(|combination| {
                    let titles = intersect(title_sets, &combination);
                    (combination, titles)
                })
                .collect()
        })
        .collect();

    let mut entries = BTreeMap::new();
    for (combination, titles) in per_size.into_iter().flatten() {
        debug!(sources = ?combination.indices(), matches = titles.len(), "Found matching papers");
        entries.insert(combination, titles);
    }

    Ok(MatchSet { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(titles: &[&str]) -> BTreeSet<String> {
        titles.iter().map(|t| t.to_string()).collect()
    }

    fn combo(indices: &[usize]) -> Combination {
        Combination::new(indices.iter().copied())
    }

    #[test]
    fn test_combinations_enumeration() {
        let pairs: Vec<Vec<usize>> = combinations(4, 2).iter().map(|c| c.indices().to_vec()).collect();
        assert_eq!(
            pairs,
            vec![vec![0, 1], vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3], vec![2, 3]]
        );
        assert_eq!(combinations(5, 3).len(), 10);
        assert_eq!(combinations(3, 3).len(), 1);
        assert!(combinations(2, 3).is_empty());
        assert!(combinations(3, 0).is_empty());
    }

    #[test]
    fn test_combination_ordering() {
        let mut combos = vec![combo(&[0, 1, 2]), combo(&[1, 2]), combo(&[0, 2]), combo(&[0, 1])];
        combos.sort();
        assert_eq!(
            combos,
            vec![combo(&[0, 1]), combo(&[0, 2]), combo(&[1, 2]), combo(&[0, 1, 2])]
        );
        assert_eq!(combo(&[2, 0, 2]).indices(), &[0, 2]);
    }

    #[test]
    fn test_two_sources_is_plain_intersection() -> Result<()> {
        let sets = vec![set(&["a", "b", "c"]), set(&["b", "c", "d"])];
        let matches = find_matches(&sets)?;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches.get(&combo(&[0, 1])), Some(&["b".to_string(), "c".to_string()][..]));
        Ok(())
    }

    #[test]
    fn test_fewer_than_two_sources_is_error() {
        let one = vec![set(&["a"])];
        assert!(matches!(find_matches(&one), Err(MergeError::NotEnoughSources { got: 1 })));
        let none: Vec<BTreeSet<String>> = Vec::new();
        assert!(matches!(find_matches(&none), Err(MergeError::NotEnoughSources { got: 0 })));
    }

    #[test]
    fn test_three_sources_one_shared_title() -> Result<()> {
        let sets = vec![set(&["shared", "a only"]), set(&["shared", "b only"]), set(&["shared", "c only"])];
        let matches = find_matches(&sets)?;

        // C(3,2) + C(3,3)
        assert_eq!(matches.len(), 4);
        assert!(matches.contains(&combo(&[0, 1, 2]), "shared"));
        for pair in [[0, 1], [0, 2], [1, 2]] {
            assert!(matches.contains(&combo(&pair), "shared"));
            assert_eq!(matches.get(&combo(&pair)).map(<[String]>::len), Some(1));
        }
        Ok(())
    }

    #[test]
    fn test_title_not_reported_for_excluding_pairs() -> Result<()> {
        let sets = vec![set(&["x", "p"]), set(&["x", "q"]), set(&["y", "q"])];
        let matches = find_matches(&sets)?;
        assert!(matches.contains(&combo(&[0, 1]), "x"));
        assert!(!matches.contains(&combo(&[0, 2]), "x"));
        assert!(!matches.contains(&combo(&[1, 2]), "x"));
        assert!(matches.contains(&combo(&[1, 2]), "q"));
        assert!(matches.get(&combo(&[0, 1, 2])).is_some_and(<[String]>::is_empty));
        Ok(())
    }

    #[test]
    fn test_full_combination_is_subset_of_smaller_ones() -> Result<()> {
        let sets = vec![
            set(&["a", "b", "c", "d"]),
            set(&["a", "b", "c", "e"]),
            set(&["a", "b", "f"]),
            set(&["a", "c", "b", "g"]),
        ];
        let matches = find_matches(&sets)?;
        assert_eq!(matches.len(), 11);

        let full = combo(&[0, 1, 2, 3]);
        let full_titles = matches.get(&full).map(<[String]>::to_vec).unwrap_or_default();
        assert_eq!(full_titles, vec!["a".to_string(), "b".to_string()]);
        for (combination, _) in matches.iter() {
            for title in &full_titles {
                assert!(matches.contains(combination, title), "{:?} lacks {}", combination, title);
            }
        }
        Ok(())
    }

    #[test]
    fn test_occurrence_is_largest_combination() -> Result<()> {
        let sets = vec![set(&["all", "pair"]), set(&["all", "pair"]), set(&["all", "solo"])];
        let matches = find_matches(&sets)?;
        assert_eq!(matches.occurrence("all"), 3);
        assert_eq!(matches.occurrence("pair"), 2);
        assert_eq!(matches.occurrence("solo"), 1);
        Ok(())
    }

    #[test]
    fn test_report_entries_are_ordered() -> Result<()> {
        let sets = vec![set(&["a"]), set(&["a"]), set(&["a"])];
        let entries = find_matches(&sets)?.to_entries();
        let sizes: Vec<usize> = entries.iter().map(|e| e.sources.len()).collect();
        assert_eq!(sizes, vec![2, 2, 2, 3]);
        assert!(entries.iter().all(|e| e.count == 1));
        Ok(())
    }
}
