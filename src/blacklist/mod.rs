//! # Blacklist Loader
//!
//! Ingests operator-supplied URL lists at startup and installs forced-
//! positive cache overrides (spec.md §4.5). Grounded in
//! `examples/original_source/services/load_blacklist.go`: line-by-line
//! streaming, `canonicalizeURL`'s strip-trailing-slash behavior (the
//! resolution of spec.md's Open Question, see DESIGN.md), and the
//! 1000-entry pipeline batching. The CSV variant is a supplement sourced
//! from spec.md's own prose (the Go source has no CSV handling).

use base64::Engine;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cache::Cache;
use crate::error::AppError;

const BATCH_SIZE: usize = 1000;

/// Regex accepting either a bare URL or a bare `host.tld[/path]` cell,
/// used only by the CSV variant (spec.md §4.5).
static CSV_CELL_PATTERN: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
    regex::Regex::new(r"^(https?://[^\s/$.?#].[^\s]*|[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}(/[^\s]*)?)$").unwrap()
});

#[derive(Clone)]
pub struct BlacklistLoader {
    cache: Cache,
}

impl BlacklistLoader {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    /// Load a single file, dispatching to the CSV variant for a `.csv`
    /// extension and the line-oriented variant otherwise. Spawned as one
    /// task per file by the caller (spec.md §5).
    pub async fn load_file(&self, path: &Path) -> Result<(), AppError> {
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("blacklist")
            .to_string();

        if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            self.load_csv(path, &source).await
        } else {
            self.load_lines(path, &source).await
        }
    }

    async fn load_lines(&self, path: &Path, source: &str) -> Result<(), AppError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| AppError::StoreError(format!("failed to open blacklist file {path:?}: {e}")))?;
        let mut lines = BufReader::new(file).lines();

        let mut batch = Vec::with_capacity(BATCH_SIZE);
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| AppError::StoreError(format!("failed to read blacklist file {path:?}: {e}")))?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let candidate = trimmed.strip_prefix('.').unwrap_or(trimmed);

            match canonicalize(candidate) {
                Ok(canonical) => {
                    batch.push((encode(&canonical), format!("{source}:BLACKLISTED_URL")));
                    if batch.len() >= BATCH_SIZE {
                        self.cache.pipeline_set_nx(std::mem::take(&mut batch)).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(line = trimmed, error = %e, "skipping unparseable blacklist entry");
                }
            }
        }

        if !batch.is_empty() {
            self.cache.pipeline_set_nx(batch).await;
        }

        Ok(())
    }

    async fn load_csv(&self, path: &Path, source: &str) -> Result<(), AppError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::StoreError(format!("failed to open blacklist csv {path:?}: {e}")))?;

        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(contents.as_bytes());
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unparseable csv row");
                    continue;
                }
            };

            for cell in record.iter() {
                let trimmed = cell.trim();
                if trimmed.is_empty() || !CSV_CELL_PATTERN.is_match(trimmed) {
                    if !trimmed.is_empty() {
                        tracing::warn!(cell = trimmed, "skipping invalid csv cell");
                    }
                    continue;
                }

                match canonicalize(trimmed) {
                    Ok(canonical) => {
                        batch.push((encode(&canonical), format!("{source}:BLACKLISTED_URL")));
                        if batch.len() >= BATCH_SIZE {
                            self.cache.pipeline_set_nx(std::mem::take(&mut batch)).await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(cell = trimmed, error = %e, "skipping unparseable csv entry");
                    }
                }
            }
        }

        if !batch.is_empty() {
            self.cache.pipeline_set_nx(batch).await;
        }

        Ok(())
    }
}

/// Lowercase scheme (default `https`) and host, clear fragment, strip a
/// single trailing `/` from the path. Grounded in `load_blacklist.go`'s
/// `canonicalizeURL`, which trims rather than appends a trailing slash —
/// the resolution of spec.md's dual-canonicalization Open Question.
fn canonicalize(raw: &str) -> Result<String, url::ParseError> {
    let with_scheme = if raw.contains("://") { raw.to_string() } else { format!("https://{raw}") };
    let mut parsed = url::Url::parse(&with_scheme)?;

    parsed.set_fragment(None);
    let scheme = parsed.scheme().to_lowercase();
    let host = parsed.host_str().unwrap_or("").to_lowercase();
    let path = parsed.path().strip_suffix('/').unwrap_or_else(|| parsed.path()).to_string();
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    let query = parsed.query().map(|q| format!("?{q}")).unwrap_or_default();

    Ok(format!("{scheme}://{host}{port}{path}{query}"))
}

fn encode(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_trailing_slash() {
        let canonical = canonicalize("https://Example.com/Path/").unwrap();
        assert_eq!(canonical, "https://example.com/Path");
    }

    #[test]
    fn canonicalize_defaults_to_https_scheme() {
        let canonical = canonicalize("example.com").unwrap();
        assert!(canonical.starts_with("https://example.com"));
    }

    #[test]
    fn canonicalize_root_path_collapses_to_empty() {
        let canonical = canonicalize("https://example.com/").unwrap();
        assert_eq!(canonical, "https://example.com");
    }

    #[test]
    fn csv_cell_pattern_accepts_bare_domain() {
        assert!(CSV_CELL_PATTERN.is_match("example.com"));
        assert!(CSV_CELL_PATTERN.is_match("https://example.com/path"));
        assert!(!CSV_CELL_PATTERN.is_match("not a url"));
    }

    #[test]
    fn encode_is_stable_for_same_input() {
        assert_eq!(encode("https://example.com/a"), encode("https://example.com/a"));
    }
}
