// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Resolve model options      (Layer 5 - ml)
//   Step 2: Load parallel corpora      (Layer 4 - data)
//   Step 3: Build / load vocabularies  (Layer 6 - infra)
//   Step 4: Validate model options     (Layer 5 - ml)
//   Step 5: Numericise + bucket        (Layer 4 - data)
//   Step 6: Save config                (Layer 6 - infra)
//   Step 7: Run training loop          (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::Tensor,
};

use crate::data::{
    corpus::TsvCorpusLoader,
    dataset::{bucket_samples, build_samples},
};
use crate::domain::{direction::Direction, sentence::SentencePair, traits::CorpusSource};
use crate::infra::{checkpoint::CheckpointManager, vocab_store::VocabStore};
use crate::ml::{options::ModelOptions, trainer::run_training};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a training run needs, architecture included.
// Serialisable so it can be saved to disk and reloaded for
// evaluation and translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_file:     String,
    pub val_file:       String,
    /// Translation direction, e.g. "en->de".
    pub direction:      String,
    pub checkpoint_dir: String,
    pub epochs:         usize,
    pub batch_size:     usize,
    pub learning_rate:  f64,
    pub seed:           u64,
    /// "auto", "wgpu" or "ndarray".
    pub backend:        String,
    /// Optional JSON file overriding the default model options.
    pub model_config:   Option<String>,
    #[serde(default)]
    pub model:          ModelOptions,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_file:     "data/train.tsv".to_string(),
            val_file:       "data/val.tsv".to_string(),
            direction:      "en->de".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            epochs:         10,
            batch_size:     32,
            learning_rate:  1e-3,
            seed:           42,
            backend:        "auto".to_string(),
            model_config:   None,
            model:          ModelOptions::default(),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    /// Create a new TrainUseCase with the given configuration
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let mut cfg = self.config.clone();

        // ── Step 1: Resolve model options ─────────────────────────────────────
        // CLI flags cover the run; the architecture comes from an
        // optional JSON file overlaid on the defaults.
        if let Some(path) = &cfg.model_config {
            tracing::info!("Loading model options from '{}'", path);
            cfg.model = ModelOptions::from_json_file(path)?;
        }

        let direction: Direction = cfg.direction.parse()?;
        tracing::info!("Training direction: {}", direction);

        // ── Step 2: Load parallel corpora ─────────────────────────────────────
        let train_pairs = TsvCorpusLoader::new(&cfg.train_file).load_all()?;
        ensure!(
            !train_pairs.is_empty(),
            "no usable sentence pairs in '{}'",
            cfg.train_file
        );
        let val_pairs = TsvCorpusLoader::new(&cfg.val_file).load_all()?;
        ensure!(
            !val_pairs.is_empty(),
            "no usable sentence pairs in '{}'",
            cfg.val_file
        );

        // ── Step 3: Build / load vocabularies ─────────────────────────────────
        // One word-level vocabulary per language, stored next to
        // the checkpoints so every later run sees the same ids.
        let store = VocabStore::new(&cfg.checkpoint_dir);
        let src_vocab = store.load_or_build(&direction.src, &side_texts(&train_pairs, true))?;
        let trg_vocab = store.load_or_build(&direction.trg, &side_texts(&train_pairs, false))?;
        tracing::info!("Source: {}", src_vocab);
        tracing::info!("Target: {}", trg_vocab);

        // ── Step 4: Validate model options ────────────────────────────────────
        // Cross-field checks need the direction and vocab sizes.
        cfg.model
            .validate(&direction, src_vocab.n_tokens(), trg_vocab.n_tokens())?;

        // ── Step 5: Numericise and bucket ─────────────────────────────────────
        // Training samples get length-filtered and bucketed;
        // validation keeps every sentence.
        let train_samples = bucket_samples(
            build_samples(&train_pairs, &src_vocab, &trg_vocab)?,
            &cfg.model,
            &direction,
        );
        ensure!(
            !train_samples.is_empty(),
            "every training pair was filtered out (max_len = {})",
            cfg.model.max_len
        );
        let val_samples = build_samples(&val_pairs, &src_vocab, &trg_vocab)?;
        ensure!(!val_samples.is_empty(), "every validation pair was filtered out");
        tracing::info!(
            "Samples: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 6: Save config for evaluation / translation ──────────────────
        // Saved with the resolved model options, so later runs
        // rebuild the exact architecture without the options file.
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(&cfg)?;

        // ── Step 7: Run training loop (Layer 5) ───────────────────────────────
        match cfg.backend.as_str() {
            "wgpu" => run_training::<Autodiff<Wgpu>>(
                &cfg,
                train_samples,
                val_samples,
                &src_vocab,
                &trg_vocab,
                &ckpt_manager,
                WgpuDevice::default(),
            ),
            "ndarray" => run_training::<Autodiff<NdArray>>(
                &cfg,
                train_samples,
                val_samples,
                &src_vocab,
                &trg_vocab,
                &ckpt_manager,
                NdArrayDevice::default(),
            ),
            "auto" => {
                if wgpu_available() {
                    tracing::info!("Backend: wgpu");
                    run_training::<Autodiff<Wgpu>>(
                        &cfg,
                        train_samples,
                        val_samples,
                        &src_vocab,
                        &trg_vocab,
                        &ckpt_manager,
                        WgpuDevice::default(),
                    )
                } else {
                    tracing::warn!("No usable GPU found, falling back to the ndarray backend");
                    run_training::<Autodiff<NdArray>>(
                        &cfg,
                        train_samples,
                        val_samples,
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

/// Borrow one side of every pair, in corpus order.
pub(crate) fn side_texts(pairs: &[SentencePair], source_side: bool) -> Vec<&str> {
    pairs
        .iter()
        .map(|p| {
            if source_side {
                p.source.as_str()
            } else {
                p.target.as_str()
            }
        })
        .collect()
}

/// Probe the wgpu backend by pushing one tensor through it.
/// Device initialisation panics on machines without an adapter,
/// so the probe runs under catch_unwind with the hook silenced.
pub(crate) fn wgpu_available() -> bool {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let ok = std::panic::catch_unwind(|| {
        let device = WgpuDevice::default();
        let probe = Tensor::<Wgpu, 1>::from_floats([1.0f32].as_slice(), &device);
        let _ = probe.into_scalar();
    })
    .is_ok();
    std::panic::set_hook(hook);
    ok
}
