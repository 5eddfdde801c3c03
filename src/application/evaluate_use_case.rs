// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores a trained model on a held-out parallel corpus:
//
//   Step 1: Load saved config + vocabularies
//   Step 2: Load the corpus and numericise it
//   Step 3: Restore the latest checkpoint
//   Step 4: Teacher-forced forward pass over every batch
//
// Reports the same two numbers training watches per epoch:
//   LOSS — per-token cross-entropy (lower is better)
//   MRR  — mean reciprocal rank of the gold token under the
//          model's scores (higher is better)

use anyhow::{bail, ensure, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    tensor::{backend::Backend, ElementConversion},
};

use crate::application::train_use_case::{wgpu_available, TrainConfig};
use crate::data::{
    batcher::TranslationBatcher,
    corpus::TsvCorpusLoader,
    dataset::{build_samples, TranslationDataset, TranslationSample},
};
use crate::domain::{direction::Direction, traits::CorpusSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{LossTracker, MeanReciprocalRank, Metric},
    vocab_store::{VocabStore, Vocabulary},
};
use crate::ml::model::NmtModel;

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub checkpoint_dir: String,
    pub data_file:      String,
    pub batch_size:     usize,
    pub backend:        String,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    /// Score the latest checkpoint on the given corpus.
    pub fn execute(&self) -> Result<Vec<Metric>> {
        let cfg = &self.config;

        // ── Step 1: Saved config + vocabularies ───────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let train_cfg = ckpt_manager.load_config()?;
        let direction: Direction = train_cfg.direction.parse()?;

        let store = VocabStore::new(&cfg.checkpoint_dir);
        let src_vocab = store.load(&direction.src)?;
        let trg_vocab = store.load(&direction.trg)?;

        // ── Step 2: Corpus ────────────────────────────────────────────────────
        // No length filtering here: evaluation sees every pair.
        let pairs = TsvCorpusLoader::new(&cfg.data_file).load_all()?;
        ensure!(
            !pairs.is_empty(),
            "no usable sentence pairs in '{}'",
            cfg.data_file
        );
        let samples = build_samples(&pairs, &src_vocab, &trg_vocab)?;
        ensure!(!samples.is_empty(), "every pair of '{}' was dropped", cfg.data_file);

        // ── Steps 3–4: Restore + score ────────────────────────────────────────
        match cfg.backend.as_str() {
            "wgpu" => run_evaluation::<Wgpu>(
                &train_cfg,
                cfg.batch_size,
                samples,
                &src_vocab,
                &trg_vocab,
                &ckpt_manager,
                WgpuDevice::default(),
            ),
            "ndarray" => run_evaluation::<NdArray>(
                &train_cfg,
                cfg.batch_size,
                samples,
                &src_vocab,
                &trg_vocab,
                &ckpt_manager,
                NdArrayDevice::default(),
            ),
            "auto" => {
                if wgpu_available() {
                    run_evaluation::<Wgpu>(
                        &train_cfg,
                        cfg.batch_size,
                        samples,
                        &src_vocab,
                        &trg_vocab,
                        &ckpt_manager,
                        WgpuDevice::default(),
                    )
                } else {
                    run_evaluation::<NdArray>(
                        &train_cfg,
                        cfg.batch_size,
                        samples,
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

fn run_evaluation<B: Backend>(
    train_cfg: &TrainConfig,
    batch_size: usize,
    samples: Vec<TranslationSample>,
    src_vocab: &Vocabulary,
    trg_vocab: &Vocabulary,
    ckpt_manager: &CheckpointManager,
    device: B::Device,
) -> Result<Vec<Metric>> {
    let model = NmtModel::<B>::new(
        &train_cfg.model,
        src_vocab.n_tokens(),
        trg_vocab.n_tokens(),
        &device,
    );
    let model = ckpt_manager.load_model(model, &device)?;

    let batcher = TranslationBatcher::<B>::new(device);
    let loader = DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .num_workers(1)
        .build(TranslationDataset::new(samples));

    let mut loss = LossTracker::new();
    let mut mrr = MeanReciprocalRank::new();

    for batch in loader.iter() {
        let out = model.forward_loss(&batch);
        let loss_value: f64 = out.loss.into_scalar().elem::<f64>();
        loss.update(loss_value, out.n_items);

        let [b, t] = batch.trg_tokens.dims();
        let gold = batch.trg_tokens.slice([0..b, 1..t]);
        mrr.update_from_logits(&out.logits, &gold)?;
    }

    tracing::info!("Evaluated {} target tokens", loss.n_items());

    Ok(vec![
        Metric::new("LOSS", loss.value(), false),
        Metric::new("MRR", mrr.normalized_mrr(), true),
    ])
}
