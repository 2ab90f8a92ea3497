//! Per-source record scoring.
//!
//! Three independent scores are attached to every record of a source:
//!
//! - **Rank score**: linear in provider position, `0.0` for the top hit and
//!   `1.0` for the last one (lower is better).
//! - **Match scores**: fraction of keywords found in the title and in the
//!   abstract.
//! - **Similarity score**: TF-IDF cosine similarity between the abstract and
//!   a reference document (e.g. a project description).

use crate::error::{MergeError, Result};
use crate::record::ScoredSource;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Linear rank scores for a list of `n` records.
///
/// `score[i] = i / (n - 1)`; a single record scores `0.0`.
pub fn rank_scores(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![0.0; n];
    }
    let norm = (n - 1) as f64;
    (0..n).map(|i| i as f64 / norm).collect()
}

/// Attach rank scores to a source in its current order
pub fn apply_rank_scores(source: &mut ScoredSource) {
    let scores = rank_scores(source.records.len());
    for (record, score) in source.records.iter_mut().zip(scores) {
        record.rank_score = score;
    }
    debug!(label = %source.label, records = source.records.len(), "Rank scores calculated");
}

/// Keyword matcher for title and abstract scoring
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    /// Create a matcher; keywords are trimmed and lowercased, blanks dropped.
    ///
    /// # Errors
    ///
    /// Returns `EmptyKeywords` if no non-blank keyword remains.
    pub fn new<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return Err(MergeError::EmptyKeywords);
        }
        Ok(Self { keywords })
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Fraction of keywords occurring as substrings of the lowercased text.
    ///
    /// Absent text scores `0.0`.
    pub fn score(&self, text: Option<&str>) -> f64 {
        let Some(text) = text else {
            return 0.0;
        };
        let text = text.to_lowercase();
        let hits = self.keywords.iter().filter(|k| text.contains(k.as_str())).count();
        hits as f64 / self.keywords.len() as f64
    }

    /// Attach title and abstract match scores to every record of a source
    pub fn apply(&self, source: &mut ScoredSource) {
        for scored in &mut source.records {
            scored.title_match_score = self.score(scored.record.title.as_deref());
            scored.abstract_match_score = self.score(scored.record.abstract_text.as_deref());
        }
        debug!(label = %source.label, keywords = self.keywords.len(), "Match scores calculated");
    }
}

/// Word tokens of two or more characters (lowercased input expected)
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

fn term_counts(tokens: &[String]) -> BTreeMap<&str, f64> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

/// TF-IDF cosine similarity of two documents, fitted on just those two.
///
/// Raw term counts weighted by the smoothed inverse document frequency
/// `ln((1 + n) / (1 + df)) + 1` with `n = 2`. Returns `0.0` when either
/// document has no tokens.
pub fn tfidf_cosine(doc_a: &str, doc_b: &str) -> f64 {
    let tokens_a = tokenize(doc_a);
    let tokens_b = tokenize(doc_b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let counts_a = term_counts(&tokens_a);
    let counts_b = term_counts(&tokens_b);

    let vocabulary: BTreeSet<&str> = counts_a.keys().chain(counts_b.keys()).copied().collect();
    let n_docs = 2.0_f64;

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for term in vocabulary {
        let tf_a = counts_a.get(term).copied().unwrap_or(0.0);
        let tf_b = counts_b.get(term).copied().unwrap_or(0.0);
        let df = (tf_a > 0.0) as u8 as f64 + (tf_b > 0.0) as u8 as f64;
        let idf = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;

        let w_a = tf_a * idf;
        let w_b = tf_b * idf;
        dot += w_a * w_b;
        norm_a += w_a * w_a;
        norm_b += w_b * w_b;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Similarity scorer against a fixed reference document
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    reference: String,
}

impl SimilarityScorer {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    /// Similarity of an abstract to the reference; absent abstracts score `0.0`
    pub fn score(&self, abstract_text: Option<&str>) -> f64 {
        abstract_text
            .map(|a| tfidf_cosine(&self.reference, a))
            .unwrap_or(0.0)
    }

    /// Attach similarity scores to every record of a source
    pub fn apply(&self, source: &mut ScoredSource) {
        for scored in &mut source.records {
            scored.similarity_score = self.score(scored.record.abstract_text.as_deref());
        }
        debug!(label = %source.label, "Similarity scores calculated");
    }
}

/// Score every source with whatever scorers are configured
pub fn score_sources(
    sources: &mut [ScoredSource],
    keywords: Option<&KeywordMatcher>,
    similarity: Option<&SimilarityScorer>,
) {
    for source in sources.iter_mut() {
        apply_rank_scores(source);
        if let Some(matcher) = keywords {
            matcher.apply(source);
        }
        if let Some(scorer) = similarity {
            scorer.apply(source);
        }
    }
    info!(
        sources = sources.len(),
        keywords = keywords.is_some(),
        similarity = similarity.is_some(),
        "Scores calculated and added to publication data"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PublicationRecord, SourceResultSet};

    const EPS: f64 = 1e-9;

    #[test]
    fn test_rank_scores_linear() {
        assert_eq!(rank_scores(5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(rank_scores(2), vec![0.0, 1.0]);
    }

    #[test]
    fn test_rank_scores_degenerate() {
        assert_eq!(rank_scores(1), vec![0.0]);
        assert!(rank_scores(0).is_empty());
    }

    #[test]
    fn test_rank_scores_monotonic() {
        for n in 2..30 {
            let scores = rank_scores(n);
            assert_eq!(scores[0], 0.0);
            assert!((scores[n - 1] - 1.0).abs() < EPS);
            assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_apply_rank_scores() {
        let mut source = ScoredSource::from(SourceResultSet::new(
            "q",
            vec![PublicationRecord::with_title("a"), PublicationRecord::with_title("b"), PublicationRecord::with_title("c")],
        ));
        apply_rank_scores(&mut source);
        let scores: Vec<f64> = source.records.iter().map(|r| r.rank_score).collect();
        assert_eq!(scores, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_keyword_matcher_fraction() -> Result<()> {
        let matcher = KeywordMatcher::new(["Machine Learning", "graph", "  ", "survey"])?;
        assert_eq!(matcher.keywords().len(), 3);
        assert!((matcher.score(Some("A Survey of Graph Neural Networks")) - 2.0 / 3.0).abs() < EPS);
        assert_eq!(matcher.score(Some("Unrelated")), 0.0);
        assert_eq!(matcher.score(None), 0.0);
        Ok(())
    }

    #[test]
    fn test_keyword_matcher_requires_keywords() {
        assert!(matches!(KeywordMatcher::new(Vec::<String>::new()), Err(MergeError::EmptyKeywords)));
        assert!(matches!(KeywordMatcher::new(["", " "]), Err(MergeError::EmptyKeywords)));
    }

    #[test]
    fn test_keyword_matcher_apply() -> Result<()> {
        let mut record = PublicationRecord::with_title("Graph methods");
        record.abstract_text = Some("We study graph learning and machine learning.".to_string());
        let mut source = ScoredSource::from(SourceResultSet::new("q", vec![record, PublicationRecord::with_title("none")]));

        KeywordMatcher::new(["graph", "machine learning"])?.apply(&mut source);
        assert!((source.records[0].title_match_score - 0.5).abs() < EPS);
        assert!((source.records[0].abstract_match_score - 1.0).abs() < EPS);
        assert_eq!(source.records[1].abstract_match_score, 0.0);
        Ok(())
    }

    #[test]
    fn test_tfidf_identical_documents() {
        let doc = "Rank biased overlap compares ranked lists";
        assert!((tfidf_cosine(doc, doc) - 1.0).abs() < EPS);
        assert!((tfidf_cosine(doc, &doc.to_uppercase()) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_tfidf_disjoint_documents() {
        assert_eq!(tfidf_cosine("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn test_tfidf_known_value() {
        // vocabulary {aa, bb, cc}: aa shared (idf 1), bb and cc unique (idf 1 + ln 1.5)
        // a = [1, w, 0], b = [1, 0, w] -> cos = 1 / (1 + w^2)
        let w = 1.0 + 1.5_f64.ln();
        let expected = 1.0 / (1.0 + w * w);
        assert!((tfidf_cosine("aa bb", "aa cc") - expected).abs() < EPS);
    }

    #[test]
    fn test_tfidf_ignores_single_characters() {
        assert_eq!(tfidf_cosine("a b c", "a b c"), 0.0);
        assert_eq!(tfidf_cosine("", "something"), 0.0);
    }

    #[test]
    fn test_similarity_absent_abstract_is_zero() {
        let scorer = SimilarityScorer::new("neural ranking models");
        assert_eq!(scorer.score(None), 0.0);
        assert!(scorer.score(Some("Neural models for ranking")) > 0.0);
    }

    #[test]
    fn test_score_sources_without_optional_scorers() {
        let mut sources = vec![ScoredSource::from(SourceResultSet::new(
            "q",
            vec![PublicationRecord::with_title("a"), PublicationRecord::with_title("b")],
        ))];
        score_sources(&mut sources, None, None);
        assert_eq!(sources[0].records[1].rank_score, 1.0);
        assert_eq!(sources[0].records[1].title_match_score, 0.0);
        assert_eq!(sources[0].records[1].similarity_score, 0.0);
    }
}
