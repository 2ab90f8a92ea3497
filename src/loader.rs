//! Loading fetched result lists and exporting merged results.
//!
//! Each query's results live in one JSON file holding an array of records in
//! provider rank order. Files are read in file-name order, which fixes the
//! source indices used by matching and merging.

use crate::error::{MergeError, Result};
use crate::record::{MergedRecord, PublicationRecord, SourceResultSet};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read a single result file
pub fn load_source_file(path: &Path) -> Result<SourceResultSet> {
    let content = fs::read_to_string(path)?;
    let records: Vec<PublicationRecord> = serde_json::from_str(&content)?;
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    info!(file = %label, publications = records.len(), "Loaded result file");
    Ok(SourceResultSet::new(label, records))
}

/// Read every `*.json` file of a directory, sorted by file name
pub fn load_sources(dir: &Path) -> Result<Vec<SourceResultSet>> {
    if !dir.is_dir() {
        return Err(MergeError::Config(format!("Not a directory: {}", dir.display())));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    files.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"));
    files.sort();

    info!(dir = %dir.display(), files = files.len(), "Found result files");
    files.iter().map(|p| load_source_file(p)).collect()
}

/// Save records to a CSV file with a header row
pub fn write_csv<T: Serialize>(path: &Path, data: &[T]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
    for item in data {
        wtr.serialize(item)?;
    }
    wtr.flush()?;
    debug!(path = %path.display(), rows = data.len(), "Saved CSV");
    Ok(())
}

/// Save any serializable value as pretty-printed JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data)?;
    fs::write(path, content)?;
    debug!(path = %path.display(), "Saved JSON");
    Ok(())
}

/// Save all present BibTeX entries, separated by a blank line.
///
/// Returns the number of entries written.
pub fn write_bibtex(path: &Path, records: &[MergedRecord]) -> Result<usize> {
    let entries: Vec<&str> = records
        .iter()
        .filter_map(|r| r.bibtex.as_deref())
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect();
    fs::write(path, entries.join("\n\n"))?;
    debug!(path = %path.display(), entries = entries.len(), "Saved BibTeX");
    Ok(entries.len())
}
