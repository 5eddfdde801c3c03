// ============================================================
// Layer 2 — TranslateUseCase
// ============================================================
// Turns source-language text into target-language text with a
// trained model:
//
//   Step 1: Collect input lines (argument or --input file)
//   Step 2: Load saved config + vocabularies
//   Step 3: Restore the latest checkpoint
//   Step 4: Greedy or beam-search decode, line by line
//
// Output lines align 1:1 with input lines, so file input can
// be post-processed with the usual shell tools.

use anyhow::{bail, Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    tensor::backend::Backend,
};
use std::fs;

use crate::application::train_use_case::{wgpu_available, TrainConfig};
use crate::domain::direction::Direction;
use crate::infra::{
    checkpoint::CheckpointManager,
    vocab_store::{VocabStore, Vocabulary},
};
use crate::ml::{
    generator::{beam, greedy},
    model::NmtModel,
};

#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub checkpoint_dir: String,
    /// A single sentence given on the command line.
    pub text:           Option<String>,
    /// A file with one source sentence per line.
    pub input_file:     Option<String>,
    /// 1 = greedy, anything larger = beam search.
    pub beam_width:     usize,
    pub max_len:        usize,
    pub backend:        String,
}

pub struct TranslateUseCase {
    config: TranslateConfig,
}

impl TranslateUseCase {
    pub fn new(config: TranslateConfig) -> Self {
        Self { config }
    }

    /// Translate every input line, in order.
    pub fn execute(&self) -> Result<Vec<String>> {
        let cfg = &self.config;

        // ── Step 1: Input lines ───────────────────────────────────────────────
        let lines = collect_lines(cfg)?;

        // ── Step 2: Saved config + vocabularies ───────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let train_cfg = ckpt_manager.load_config()?;
        let direction: Direction = train_cfg.direction.parse()?;
        tracing::info!("Translating {} ({} sentences)", direction, lines.len());

        let store = VocabStore::new(&cfg.checkpoint_dir);
        let src_vocab = store.load(&direction.src)?;
        let trg_vocab = store.load(&direction.trg)?;

        // ── Steps 3–4: Restore + decode ───────────────────────────────────────
        match cfg.backend.as_str() {
            "wgpu" => run_translation::<Wgpu>(
                &train_cfg,
                cfg,
                &lines,
                &src_vocab,
                &trg_vocab,
                &ckpt_manager,
                WgpuDevice::default(),
            ),
            "ndarray" => run_translation::<NdArray>(
                &train_cfg,
                cfg,
                &lines,
                &src_vocab,
                &trg_vocab,
                &ckpt_manager,
                NdArrayDevice::default(),
            ),
            "auto" => {
                if wgpu_available() {
                    run_translation::<Wgpu>(
                        &train_cfg,
                        cfg,
                        &lines,
                        &src_vocab,
                        &trg_vocab,
                        &ckpt_manager,
                        WgpuDevice::default(),
                    )
                } else {
                    run_translation::<NdArray>(
                        &train_cfg,
                        cfg,
                        &lines,
                        &src_vocab,
                        &trg_vocab,
                        &ckpt_manager,
                        NdArrayDevice::default(),
                    )
                }
            }
            other => bail!("unknown backend '{other}' (expected 'auto', 'wgpu' or 'ndarray')"),
        }
    }
}

/// Gather input lines from exactly one of the two sources.
fn collect_lines(cfg: &TranslateConfig) -> Result<Vec<String>> {
    match (&cfg.text, &cfg.input_file) {
        (Some(_), Some(_)) => bail!("pass either a sentence or --input, not both"),
        (None, None) => bail!("nothing to translate: pass a sentence or --input FILE"),
        (Some(text), None) => Ok(vec![text.clone()]),
        (None, Some(path)) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Cannot read input file '{}'", path))?;
            Ok(content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect())
        }
    }
}

fn run_translation<B: Backend>(
    train_cfg: &TrainConfig,
    cfg: &TranslateConfig,
    lines: &[String],
    src_vocab: &Vocabulary,
    trg_vocab: &Vocabulary,
    ckpt_manager: &CheckpointManager,
    device: B::Device,
) -> Result<Vec<String>> {
    let model = NmtModel::<B>::new(
        &train_cfg.model,
        src_vocab.n_tokens(),
        trg_vocab.n_tokens(),
        &device,
    );
    let model = ckpt_manager.load_model(model, &device)?;

    let mut outputs = Vec::with_capacity(lines.len());
    for line in lines {
        let src_ids = src_vocab.encode(line)?;
        if src_ids.is_empty() {
            tracing::warn!("no tokens in '{line}', emitting an empty line");
            outputs.push(String::new());
            continue;
        }

        let out_ids = if cfg.beam_width > 1 {
            beam(&model, &src_ids, cfg.beam_width, cfg.max_len, &device)?
        } else {
            greedy(&model, &src_ids, cfg.max_len, &device)?
        };
        outputs.push(trg_vocab.decode(&out_ids)?);
    }

    Ok(outputs)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> TranslateConfig {
        TranslateConfig {
            checkpoint_dir: "checkpoints".to_string(),
            text:           None,
            input_file:     None,
            beam_width:     1,
            max_len:        80,
            backend:        "ndarray".to_string(),
        }
    }

    #[test]
    fn test_collect_lines_from_text() {
        let mut cfg = config();
        cfg.text = Some("hello world".to_string());
        assert_eq!(collect_lines(&cfg).unwrap(), vec!["hello world"]);
    }

    #[test]
    fn test_collect_lines_from_file_skips_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "first line").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "  second line  ").unwrap();

        let mut cfg = config();
        cfg.input_file = Some(path.to_string_lossy().to_string());
        assert_eq!(
            collect_lines(&cfg).unwrap(),
            vec!["first line", "second line"]
        );
    }

    #[test]
    fn test_collect_lines_rejects_both_and_neither() {
        assert!(collect_lines(&config()).is_err());

        let mut cfg = config();
        cfg.text = Some("a".to_string());
        cfg.input_file = Some("b.txt".to_string());
        assert!(collect_lines(&cfg).is_err());
    }
}
