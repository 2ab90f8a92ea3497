//! Error type shared by the reconciliation stages.
//!
//! Input problems such as too few sources or an unreadable file are
//! recoverable. [`MergeError::Inconsistent`] marks a broken invariant between
//! stages and must abort the run; see [`MergeError::is_fatal`].

use thiserror::Error;

/// Everything that can go wrong between loading result lists and writing the merged list
#[derive(Debug, Error)]
pub enum MergeError {
    /// Cross-source matching needs at least two sources
    #[error("Not enough sources for matching: got {got}, need 2 or more")]
    NotEnoughSources {
        /// Number of sources supplied
        got: usize,
    },

    /// A record reached title normalization without a title
    #[error("Record {position} of source {source_index} has no title")]
    MissingTitle {
        /// Source index
        source_index: usize,
        /// Position of the record within its source
        position: usize,
    },

    /// RBO persistence parameter outside the open interval (0, 1)
    #[error("Persistence parameter must lie in (0, 1), got {0}")]
    InvalidPersistence(f64),

    /// Keyword match scoring was requested with no keywords
    #[error("Keyword list is empty")]
    EmptyKeywords,

    /// Internal consistency violation (logic defect upstream, not an input error)
    #[error("Internal consistency error: {0}")]
    Inconsistent(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl MergeError {
    /// Whether this error signals a defect rather than bad input.
    ///
    /// Callers must abort on fatal errors instead of retrying or skipping.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MergeError::Inconsistent(_))
    }
}

/// Result type alias using `MergeError`
pub type Result<T> = std::result::Result<T, MergeError>;

/// Turn a lookup that cannot fail on consistent data into an `Inconsistent` error
pub trait OptionExt<T> {
    /// The message is only built when the value is missing
    fn ok_or_inconsistent_with<F: FnOnce() -> String>(self, msg: F) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_inconsistent_with<F: FnOnce() -> String>(self, msg: F) -> Result<T> {
        self.ok_or_else(|| MergeError::Inconsistent(msg()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_inconsistency_is_fatal() {
        assert!(MergeError::Inconsistent("x".to_string()).is_fatal());
        assert!(!MergeError::NotEnoughSources { got: 1 }.is_fatal());
        assert!(!MergeError::EmptyKeywords.is_fatal());
    }

    #[test]
    fn test_ok_or_inconsistent_with_builds_message_only_on_miss() {
        let mut built = 0;
        let found = Some(1).ok_or_inconsistent_with(|| {
            built += 1;
            "unused".to_string()
        });
        assert_eq!(found.ok(), Some(1));
        assert_eq!(built, 0);

        let err = None::<u8>.ok_or_inconsistent_with(|| format!("slot {} empty", 4)).err();
        assert!(matches!(err, Some(MergeError::Inconsistent(ref m)) if m == "slot 4 empty"));
    }
}
