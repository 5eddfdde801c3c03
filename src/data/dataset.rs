// ============================================================
// Layer 4 — Translation Dataset
// ============================================================
// Turns sentence pairs into id samples and serves them to the
// Burn dataloader. Target ids are framed <bos> ... <eos> here,
// once, so everything downstream (teacher forcing, loss,
// generation) agrees on the framing.
//
// Bucketing (optional): when the options name a bucket_by
// language, samples longer than max_len on that side are
// dropped and the rest are sorted by that side's length, so
// each batch pads against similar lengths. A shuffle before
// the stable sort keeps equal-length samples in random order.
//

use burn::data::dataset::Dataset;
use rand::seq::SliceRandom;

use anyhow::Result;

use crate::domain::direction::Direction;
use crate::domain::sentence::SentencePair;
use crate::infra::vocab_store::{Vocabulary, BOS_ID, EOS_ID};
use crate::ml::options::ModelOptions;

/// One pair as token ids. `trg_ids` includes the
/// <bos>/<eos> framing; `src_ids` is unframed.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationSample {
    pub src_ids: Vec<u32>,
    pub trg_ids: Vec<u32>,
}

/// Encode pairs into samples, dropping any pair where either
/// side encodes to nothing.
pub fn build_samples(
    pairs: &[SentencePair],
    src_vocab: &Vocabulary,
    trg_vocab: &Vocabulary,
) -> Result<Vec<TranslationSample>> {
    let mut samples = Vec::with_capacity(pairs.len());
    let mut dropped = 0usize;
    for pair in pairs {
        let src_ids = src_vocab.encode(&pair.source)?;
        let body = trg_vocab.encode(&pair.target)?;
        if src_ids.is_empty() || body.is_empty() {
            dropped += 1;
            continue;
        }
        let mut trg_ids = Vec::with_capacity(body.len() + 2);
        trg_ids.push(BOS_ID);
        trg_ids.extend(body);
        trg_ids.push(EOS_ID);
        samples.push(TranslationSample { src_ids, trg_ids });
    }
    if dropped > 0 {
        tracing::warn!("dropped {dropped} pair(s) with an empty encoding");
    }
    Ok(samples)
}

/// Apply the training-time max_len filter and length bucketing.
/// A no-op when the options set no bucket_by language.
pub fn bucket_samples(
    mut samples: Vec<TranslationSample>,
    opts: &ModelOptions,
    direction: &Direction,
) -> Vec<TranslationSample> {
    let Some(lang) = &opts.bucket_by else {
        return samples;
    };
    let by_src = lang == &direction.src;
    // raw token count: the target side discounts its framing
    let length = |s: &TranslationSample| {
        if by_src {
            s.src_ids.len()
        } else {
            s.trg_ids.len().saturating_sub(2)
        }
    };

    let before = samples.len();
    samples.retain(|s| length(s) <= opts.max_len);
    let over = before - samples.len();
    if over > 0 {
        tracing::info!(
            "dropped {over} sample(s) longer than {} '{lang}' token(s)",
            opts.max_len
        );
    }

    samples.shuffle(&mut rand::thread_rng());
    samples.sort_by_key(length);
    samples
}

/// In-memory dataset of encoded samples.
pub struct TranslationDataset {
    samples: Vec<TranslationSample>,
}

impl TranslationDataset {
    pub fn new(samples: Vec<TranslationSample>) -> Self {
        Self { samples }
    }
}

impl Dataset<TranslationSample> for TranslationDataset {
    fn get(&self, index: usize) -> Option<TranslationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::vocab_store::{VocabStore, UNK_ID};

    fn vocabs(dir: &std::path::Path) -> (Vocabulary, Vocabulary) {
        let store = VocabStore::new(dir);
        let src = store
            .load_or_build("en", &["the cat sat on the mat", "a dog ran"])
            .unwrap();
        let trg = store
            .load_or_build("de", &["die katze sass auf der matte", "ein hund rannte"])
            .unwrap();
        (src, trg)
    }

    #[test]
    fn test_target_is_framed_with_bos_eos() {
        let dir = tempfile::tempdir().unwrap();
        let (src, trg) = vocabs(dir.path());
        let pairs = vec![SentencePair::new("a dog ran", "ein hund rannte")];
        let samples = build_samples(&pairs, &src, &trg).unwrap();
        assert_eq!(samples.len(), 1);
        let s = &samples[0];
        assert_eq!(s.src_ids.len(), 3);
        assert_eq!(s.trg_ids.len(), 5);
        assert_eq!(s.trg_ids[0], BOS_ID);
        assert_eq!(*s.trg_ids.last().unwrap(), EOS_ID);
    }

    #[test]
    fn test_unknown_words_become_unk() {
        let dir = tempfile::tempdir().unwrap();
        let (src, trg) = vocabs(dir.path());
        let pairs = vec![SentencePair::new("zebra", "zebra")];
        let samples = build_samples(&pairs, &src, &trg).unwrap();
        assert_eq!(samples[0].src_ids, vec![UNK_ID]);
    }

    #[test]
    fn test_bucketing_filters_and_sorts_by_source_length() {
        let opts = ModelOptions {
            max_len: 3,
            bucket_by: Some("en".into()),
            ..Default::default()
        };
        let direction = Direction::new("en", "de");
        let make = |n: usize| TranslationSample {
            src_ids: vec![4; n],
            trg_ids: vec![BOS_ID, 5, EOS_ID],
        };
        let samples = vec![make(3), make(1), make(4), make(2)];
        let bucketed = bucket_samples(samples, &opts, &direction);
        let lengths: Vec<usize> = bucketed.iter().map(|s| s.src_ids.len()).collect();
        assert_eq!(lengths, vec![1, 2, 3]);
    }

    #[test]
    fn test_bucketing_by_target_ignores_framing() {
        let opts = ModelOptions {
            max_len: 2,
            bucket_by: Some("de".into()),
            ..Default::default()
        };
        let direction = Direction::new("en", "de");
        let make = |n: usize| {
            let mut trg_ids = vec![BOS_ID];
            trg_ids.extend(vec![5; n]);
            trg_ids.push(EOS_ID);
            TranslationSample {
                src_ids: vec![4],
                trg_ids,
            }
        };
        // 2 real target tokens passes a max_len of 2, 3 does not
        let bucketed = bucket_samples(vec![make(2), make(3)], &opts, &direction);
        assert_eq!(bucketed.len(), 1);
        assert_eq!(bucketed[0].trg_ids.len(), 4);
    }

    #[test]
    fn test_no_bucketing_keeps_order() {
        let opts = ModelOptions::default();
        let direction = Direction::new("en", "de");
        let make = |n: usize| TranslationSample {
            src_ids: vec![4; n],
            trg_ids: vec![BOS_ID, 5, EOS_ID],
        };
        let samples = vec![make(3), make(1), make(2)];
        let bucketed = bucket_samples(samples.clone(), &opts, &direction);
        assert_eq!(bucketed, samples);
    }

    #[test]
    fn test_dataset_serves_samples() {
        let s = TranslationSample {
            src_ids: vec![4],
            trg_ids: vec![BOS_ID, 5, EOS_ID],
        };
        let ds = TranslationDataset::new(vec![s.clone()]);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get(0), Some(s));
        assert_eq!(ds.get(1), None);
    }
}
