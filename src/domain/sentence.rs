// ============================================================
// Layer 3 — Sentence Pair Domain Type
// ============================================================
// One aligned pair from a parallel corpus: a source-language
// sentence and its target-language translation. Plain data,
// already whitespace-normalised by the loader.
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentencePair {
    /// Sentence in the source language
    pub source: String,
    /// Its translation in the target language
    pub target: String,
}

impl SentencePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}
