// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against this trait instead of
// a concrete loader, so the corpus format can change (TSV
// today, sentence-aligned files tomorrow) without touching the
// training orchestration.
//

use anyhow::Result;

use super::sentence::SentencePair;

/// Anything that can produce aligned sentence pairs.
pub trait CorpusSource {
    /// Load every pair this source holds.
    fn load_all(&self) -> Result<Vec<SentencePair>>;
}
