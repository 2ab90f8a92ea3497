//! Publication record types shared by every pipeline stage.
//!
//! Records arrive from the fetch/format layer as JSON objects keyed by the
//! spreadsheet column names (`Title`, `Abstract`, `Year`, ...). Every field is
//! optional; providers disagree on which fields they fill and on their types.

use serde::{Deserialize, Serialize};

/// Sentinel stored in merged output for an unknown year or citation count
pub const UNKNOWN: i64 = -1;

/// A loosely typed field value as delivered by a provider.
///
/// Years and citation counts show up as integers, digit strings, free text
/// ("n/a", "forthcoming") or something else entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    Other(serde_json::Value),
}

impl FieldValue {
    /// Coerce to an integer, or [`UNKNOWN`] when the value is not a plain integer.
    ///
    /// Text is accepted only when it consists entirely of ASCII digits.
    pub fn to_int(&self) -> i64 {
        match self {
            FieldValue::Integer(n) => *n,
            FieldValue::Text(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
                s.parse().unwrap_or(UNKNOWN)
            }
            FieldValue::Text(_) | FieldValue::Other(_) => UNKNOWN,
        }
    }
}

/// Coerce an optional field, mapping absence to [`UNKNOWN`]
pub fn int_or_unknown(value: Option<&FieldValue>) -> i64 {
    value.map(FieldValue::to_int).unwrap_or(UNKNOWN)
}

/// One entry from one source query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(rename = "Authors", default)]
    pub authors: Option<String>,
    #[serde(rename = "Year", default)]
    pub year: Option<FieldValue>,
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
    #[serde(rename = "BibTex", default)]
    pub bibtex: Option<String>,
    #[serde(rename = "Citations", default)]
    pub citations: Option<FieldValue>,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    #[serde(rename = "Full text url", default)]
    pub full_text_url: Option<String>,
    #[serde(rename = "CORE PDF link", default)]
    pub pdf_link: Option<String>,
    #[serde(rename = "Fields of Study", default)]
    pub fields_of_study: Option<String>,
    #[serde(rename = "Open Access", default)]
    pub open_access: Option<bool>,
}

impl PublicationRecord {
    /// Convenience constructor used by tests and callers that only know the title
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

/// Ordered result list for one query; position encodes provider rank
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceResultSet {
    /// Human-readable origin (file name or query label)
    #[serde(default)]
    pub label: String,
    pub records: Vec<PublicationRecord>,
}

impl SourceResultSet {
    pub fn new(label: impl Into<String>, records: Vec<PublicationRecord>) -> Self {
        Self {
            label: label.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A record with its per-source scores attached
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: PublicationRecord,
    #[serde(rename = "Rank score", default)]
    pub rank_score: f64,
    #[serde(rename = "Title match score", default)]
    pub title_match_score: f64,
    #[serde(rename = "Abstract match score", default)]
    pub abstract_match_score: f64,
    #[serde(rename = "Similarity score", default)]
    pub similarity_score: f64,
}

impl From<PublicationRecord> for ScoredRecord {
    fn from(record: PublicationRecord) -> Self {
        Self {
            record,
            ..Default::default()
        }
    }
}

/// A source whose records carry scores, still in provider rank order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoredSource {
    pub label: String,
    pub records: Vec<ScoredRecord>,
}

impl From<SourceResultSet> for ScoredSource {
    fn from(source: SourceResultSet) -> Self {
        Self {
            label: source.label,
            records: source.records.into_iter().map(ScoredRecord::from).collect(),
        }
    }
}

/// Final output unit of the merge step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    /// Normalized title the record was merged under
    #[serde(skip)]
    pub key: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Authors")]
    pub authors: Option<String>,
    #[serde(rename = "Abstract")]
    pub abstract_text: Option<String>,
    #[serde(rename = "BibTex")]
    pub bibtex: Option<String>,
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
    /// Publication year, or [`UNKNOWN`]
    #[serde(rename = "Year")]
    pub year: i64,
    /// Citation count, or [`UNKNOWN`]
    #[serde(rename = "Citations")]
    pub citations: i64,
    /// Rank score averaged over every source containing the title
    #[serde(rename = "Rank score")]
    pub rank_score: f64,
    #[serde(rename = "Title match score")]
    pub title_match_score: f64,
    #[serde(rename = "Abstract match score")]
    pub abstract_match_score: f64,
    #[serde(rename = "Similarity score")]
    pub similarity_score: f64,
    /// Number of sources the title was found in
    #[serde(rename = "Sources found")]
    pub found_in: usize,
    /// Size of the resolved match combination, present only when matches were used
    #[serde(rename = "Occurrence count", skip_serializing_if = "Option::is_none")]
    pub occurrence_count: Option<usize>,
}
