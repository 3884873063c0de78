//! On-disk knowledge document corpus.
//!
//! Plain text/markdown files identified by filename. Missing files are
//! logged and skipped, never fatal: the generator treats "no bodies loaded"
//! as a hallucination risk and falls back to a canned reply.

use std::fs;
use std::path::{Path, PathBuf};

/// Maximum characters of a document used as its router-facing summary.
const SUMMARY_CHARS: usize = 200;

/// A document identifier with a short summary for the router prompt.
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    /// File name (without directory) identifying the document.
    pub id: String,
    /// First meaningful line, truncated.
    pub summary: String,
}

/// Loader for the document corpus directory.
pub struct DocumentStore {
    dir: PathBuf,
    summaries: Vec<DocumentSummary>,
}

impl DocumentStore {
    /// Scans a directory for `.md`/`.txt` documents and builds summaries.
    ///
    /// An unreadable directory yields an empty corpus; the router will then
    /// classify everything as offtopic rather than hallucinate.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let summaries = scan(&dir);
        if summaries.is_empty() {
            tracing::warn!(dir = %dir.display(), "document corpus is empty");
        }
        Self { dir, summaries }
    }

    /// Document summaries for the router prompt.
    #[must_use]
    pub fn summaries(&self) -> &[DocumentSummary] {
        &self.summaries
    }

    /// Known document identifiers.
    #[must_use]
    pub fn known_ids(&self) -> Vec<&str> {
        self.summaries.iter().map(|s| s.id.as_str()).collect()
    }

    /// Loads full bodies for the given identifiers, skipping missing files.
    #[must_use]
    pub fn load_bodies(&self, ids: &[String]) -> Vec<(String, String)> {
        let mut bodies = Vec::with_capacity(ids.len());
        for id in ids {
            // Identifiers are bare filenames; refuse anything path-like
            if id.contains('/') || id.contains('\\') || id.contains("..") {
                tracing::warn!(document = %id, "rejected path-like document id");
                continue;
            }
            let path = self.dir.join(id);
            match fs::read_to_string(&path) {
                Ok(body) => bodies.push((id.clone(), body)),
                Err(err) => {
                    tracing::warn!(document = %id, error = %err, "failed to load document, skipping");
                }
            }
        }
        bodies
    }
}

fn scan(dir: &Path) -> Vec<DocumentSummary> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut summaries: Vec<DocumentSummary> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            let ext = path.extension()?.to_str()?;
            if !matches!(ext, "md" | "txt") {
                return None;
            }
            let id = path.file_name()?.to_str()?.to_string();
            let body = fs::read_to_string(&path).ok()?;
            Some(DocumentSummary {
                id,
                summary: summarize(&body),
            })
        })
        .collect();
    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    summaries
}

/// First non-empty, non-heading-marker line, truncated to the summary cap.
fn summarize(body: &str) -> String {
    let line = body
        .lines()
        .map(|l| l.trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .unwrap_or("");
    line.chars().take(SUMMARY_CHARS).collect()
}
