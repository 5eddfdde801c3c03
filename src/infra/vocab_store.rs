// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// One word-level vocabulary per language, persisted as a
// tokenizers JSON file (vocab.<lang>.json) next to the model
// checkpoints.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper; building the tokenizer JSON by hand
// and loading it back sidesteps that type mismatch entirely.
//
// Special tokens sit at fixed low ids:
//   <pad>=0  <bos>=1  <eos>=2  <unk>=3
// Pad being id 0 is load-bearing: loss masking and the n_items
// count both test against it.
//

use anyhow::{anyhow, ensure, Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tokenizers::Tokenizer;

pub const PAD_TOKEN: &str = "<pad>";
pub const BOS_TOKEN: &str = "<bos>";
pub const EOS_TOKEN: &str = "<eos>";
pub const UNK_TOKEN: &str = "<unk>";

pub const PAD_ID: u32 = 0;
pub const BOS_ID: u32 = 1;
pub const EOS_ID: u32 = 2;
pub const UNK_ID: u32 = 3;

const SPECIALS: [(&str, u32); 4] = [
    (PAD_TOKEN, PAD_ID),
    (BOS_TOKEN, BOS_ID),
    (EOS_TOKEN, EOS_ID),
    (UNK_TOKEN, UNK_ID),
];

/// A single language's word-level vocabulary.
pub struct Vocabulary {
    tokenizer: Tokenizer,
    lang: String,
}

impl Vocabulary {
    /// Wrap a loaded tokenizer, checking the special-token ids
    /// this crate assumes everywhere.
    fn new(tokenizer: Tokenizer, lang: impl Into<String>) -> Result<Self> {
        for (token, id) in SPECIALS {
            ensure!(
                tokenizer.token_to_id(token) == Some(id),
                "vocabulary is missing '{token}' at id {id}; the file was not built by this tool"
            );
        }
        Ok(Self {
            tokenizer,
            lang: lang.into(),
        })
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Total number of tokens, special tokens included.
    pub fn n_tokens(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    /// Token ids for a sentence. Unknown words map to `<unk>`;
    /// no `<bos>`/`<eos>` framing is added here.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("tokenizing '{text}': {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Text for a sequence of ids, special tokens skipped.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| anyhow!("decoding ids {ids:?}: {e}"))
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vocabulary of {} items ('{}')", self.n_tokens(), self.lang)
    }
}

/// Builds, saves and loads per-language vocabularies.
pub struct VocabStore {
    dir: PathBuf,
}

impl VocabStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn vocab_path(&self, lang: &str) -> PathBuf {
        self.dir.join(format!("vocab.{lang}.json"))
    }

    /// Load the vocabulary for `lang` if its file exists,
    /// otherwise build one from the given corpus lines.
    pub fn load_or_build(&self, lang: &str, texts: &[&str]) -> Result<Vocabulary> {
        if self.vocab_path(lang).exists() {
            tracing::info!("loading existing '{lang}' vocabulary from disk");
            self.load(lang)
        } else {
            tracing::info!("building '{lang}' vocabulary from {} line(s)", texts.len());
            self.build_and_save(lang, texts)
        }
    }

    /// Load a previously saved vocabulary.
    pub fn load(&self, lang: &str) -> Result<Vocabulary> {
        let path = self.vocab_path(lang);
        let tokenizer = Tokenizer::from_file(&path).map_err(|e| {
            anyhow!("cannot load vocabulary from '{}': {}", path.display(), e)
        })?;
        Vocabulary::new(tokenizer, lang)
    }

    /// Count whitespace-separated tokens and write a word-level
    /// tokenizer JSON directly, then load it back.
    ///
    /// Tokens are ordered by frequency (descending) with ties
    /// broken alphabetically, so the same corpus always builds
    /// the identical file. WhitespaceSplit mirrors the counting
    /// exactly: a token seen during building never encodes to
    /// `<unk>` later.
    fn build_and_save(&self, lang: &str, texts: &[&str]) -> Result<Vocabulary> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating vocabulary dir '{}'", self.dir.display()))?;

        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                *freq.entry(word.to_string()).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut vocab = serde_json::Map::new();
        for (token, id) in SPECIALS {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        let mut next_id = SPECIALS.len() as u32;
        for (word, _) in &words {
            if !vocab.contains_key(word) {
                vocab.insert(word.clone(), serde_json::json!(next_id));
                next_id += 1;
            }
        }

        let added_tokens: Vec<serde_json::Value> = SPECIALS
            .iter()
            .map(|(token, id)| {
                serde_json::json!({
                    "id": id,
                    "content": token,
                    "single_word": false,
                    "lstrip": false,
                    "rstrip": false,
                    "normalized": false,
                    "special": true
                })
            })
            .collect();

        // The format Tokenizer::from_file() expects
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": {
                "type": "WhitespaceSplit"
            },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let path = self.vocab_path(lang);
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("cannot write vocabulary '{}'", path.display()))?;

        tracing::info!(
            "'{lang}' vocabulary built with {next_id} tokens, saved to '{}'",
            path.display()
        );

        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("cannot reload vocabulary '{}': {}", path.display(), e))?;
        Vocabulary::new(tokenizer, lang)
    }
}
