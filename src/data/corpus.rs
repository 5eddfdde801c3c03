// ============================================================
// Layer 4 — Parallel Corpus Loader
// ============================================================
// Reads a tab-separated parallel corpus: one sentence pair per
// line, source and target split by the first tab. Blank lines
// and lines starting with '#' are ignored; malformed lines are
// warned about and skipped rather than failing the run.
//

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::domain::sentence::SentencePair;
use crate::domain::traits::CorpusSource;

pub struct TsvCorpusLoader {
    path: PathBuf,
}

impl TsvCorpusLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Collapse runs of whitespace so token counting, vocabulary
/// building and batching all see the same words.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl CorpusSource for TsvCorpusLoader {
    fn load_all(&self) -> Result<Vec<SentencePair>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading parallel corpus '{}'", self.path.display()))?;

        let mut pairs = Vec::new();
        let mut skipped = 0usize;
        for (lineno, line) in raw.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match line.split_once('\t') {
                Some((source, target)) => {
                    let (source, target) = (normalize(source), normalize(target));
                    if source.is_empty() || target.is_empty() {
                        skipped += 1;
                        tracing::warn!("line {}: empty side, skipping", lineno + 1);
                        continue;
                    }
                    pairs.push(SentencePair::new(source, target));
                }
                None => {
                    skipped += 1;
                    tracing::warn!("line {}: no tab separator, skipping", lineno + 1);
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "skipped {skipped} malformed line(s) in '{}'",
                self.path.display()
            );
        }
        tracing::info!("loaded {} pair(s) from '{}'", pairs.len(), self.path.display());
        Ok(pairs)
    }
}
