//! Per-source title index.
//!
//! Each source is reduced to the set of its normalized titles plus a map from
//! normalized title back to the record position in the source list.
//!
//! Titles are the only record identity available across providers, so two
//! records in one source with the same normalized title collapse: the set keeps
//! one key and the map points at the *later* record. Collections whose chapters
//! share a book title are the usual victims.

use crate::error::Result;
use crate::record::{PublicationRecord, ScoredRecord, SourceResultSet};
use crate::title::title_key;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Anything that carries an optional title
pub trait Titled {
    fn title(&self) -> Option<&str>;
}

impl Titled for PublicationRecord {
    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

impl Titled for ScoredRecord {
    fn title(&self) -> Option<&str> {
        self.record.title.as_deref()
    }
}

/// Normalized titles of one source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitleIndex {
    /// Membership set of normalized titles
    pub titles: BTreeSet<String>,
    /// Normalized title -> position in the source list (last occurrence wins)
    pub positions: BTreeMap<String, usize>,
    /// Records shadowed by a later record with the same normalized title
    pub collisions: usize,
}

impl TitleIndex {
    pub fn contains(&self, key: &str) -> bool {
        self.titles.contains(key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// Build the title index of one source.
///
/// # Errors
///
/// Returns `MissingTitle` for the first record without a title.
pub fn build_index<R: Titled>(source_index: usize, records: &[R]) -> Result<TitleIndex> {
    let mut index = TitleIndex::default();

    for (position, record) in records.iter().enumerate() {
        let key = title_key(record.title(), source_index, position)?;
        if index.positions.insert(key.clone(), position).is_some() {
            index.collisions += 1;
            debug!(source = source_index, position, key = %key, "Title collides with an earlier record");
        }
        index.titles.insert(key);
    }

    debug!(
        source = source_index,
        records = records.len(),
        unique = index.len(),
        "Built title index"
    );
    Ok(index)
}

/// Build the indices of every source, in source order
pub fn build_indices<R: Titled>(sources: &[&[R]]) -> Result<Vec<TitleIndex>> {
    sources
        .iter()
        .enumerate()
        .map(|(i, records)| build_index(i, records))
        .collect()
}

/// Remove records without a title from every source.
///
/// Returns the number of records removed per source.
pub fn drop_untitled(sources: &mut [SourceResultSet]) -> Vec<usize> {
    sources
        .iter_mut()
        .enumerate()
        .map(|(i, source)| {
            let before = source.records.len();
            source.records.retain(|r| r.title.is_some());
            let removed = before - source.records.len();
            info!(source = i, label = %source.label, removed, "Dropped entries without title");
            removed
        })
        .collect()
}
