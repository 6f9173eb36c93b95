//! Directory ingestion: extracted `.txt` files → chunks → index, one file at a time.
//!
//! Every file gets its own outcome in the report; a failing file never hides
//! the result of the others.

use std::fs;
use std::path::{Path, PathBuf};

use crate::chunker::Chunker;
use crate::traits::VectorIndex;

#[derive(Debug)]
pub struct IngestOutcome {
    pub source: String,
    pub path: PathBuf,
    /// Number of chunks added, or the rendered error.
    pub result: Result<usize, String>,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &IngestOutcome> { self.outcomes.iter().filter(|o| o.result.is_ok()) }

    pub fn failed(&self) -> impl Iterator<Item = &IngestOutcome> { self.outcomes.iter().filter(|o| o.result.is_err()) }

    pub fn total_chunks(&self) -> usize { self.outcomes.iter().filter_map(|o| o.result.as_ref().ok()).sum() }
}

/// Sorted list of `.txt` files under `root`.
pub fn list_text_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.path().to_path_buf())
        .collect();
    txt_files.sort();
    txt_files
}

/// Reads a document, falling back to lossy UTF-8 for odd encodings.
pub fn read_document(path: &Path) -> std::io::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

/// Source identifier for a file: its path relative to `root`, `/`-separated.
pub fn source_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// Chunks and indexes every `.txt` file under `root`.
///
/// `on_file` observes each outcome as soon as it is known (progress reporting).
pub fn ingest_directory(
    root: &Path,
    chunker: &Chunker,
    index: &mut dyn VectorIndex,
    mut on_file: impl FnMut(&IngestOutcome),
) -> IngestReport {
    let files = list_text_files(root);
    if files.is_empty() {
        tracing::warn!(dir = %root.display(), "no .txt files found");
    }
    let mut report = IngestReport::default();
    for path in files {
        let source = source_id(root, &path);
        let result = ingest_file(&path, &source, chunker, index);
        match &result {
            Ok(n) => tracing::info!(source = %source, chunks = n, "indexed document"),
            Err(e) => tracing::warn!(source = %source, error = %e, "failed to index document"),
        }
        let outcome = IngestOutcome { source, path, result };
        on_file(&outcome);
        report.outcomes.push(outcome);
    }
    report
}

fn ingest_file(path: &Path, source: &str, chunker: &Chunker, index: &mut dyn VectorIndex) -> Result<usize, String> {
    let text = read_document(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    let chunks = chunker.chunk(&text, source);
    index.add(&chunks).map_err(|e| e.to_string())?;
    Ok(chunks.len())
}
