// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam.
//
// Key Burn insight:
//   - Training runs on an AutodiffBackend for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Validation batcher must also use B::InnerBackend
//   - Batch losses are means over non-pad tokens, so epoch
//     aggregation re-weights them by token count
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::TranslationBatcher,
    dataset::{TranslationDataset, TranslationSample},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, LossTracker, MeanReciprocalRank, MetricsLogger},
    vocab_store::Vocabulary,
};
use crate::ml::model::NmtModel;

pub fn run_training<B: AutodiffBackend>(
    cfg: &TrainConfig,
    train_samples: Vec<TranslationSample>,
    val_samples: Vec<TranslationSample>,
    src_vocab: &Vocabulary,
    trg_vocab: &Vocabulary,
    checkpoints: &CheckpointManager,
    device: B::Device,
) -> Result<()> {
    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: NmtModel<B> =
        NmtModel::new(&cfg.model, src_vocab.n_tokens(), trg_vocab.n_tokens(), &device);
    tracing::info!(
        "model initialised:\n{}",
        model.summary(&cfg.model, src_vocab, trg_vocab)
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    let mut optim = optim_cfg.init();

    let logger = MetricsLogger::new(checkpoints.dir())?;

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = TranslationBatcher::<B>::new(device.clone());
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(TranslationDataset::new(train_samples));

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_batcher = TranslationBatcher::<B::InnerBackend>::new(device.clone());
    let val_loader = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(TranslationDataset::new(val_samples));

    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss = LossTracker::new();

        for batch in train_loader.iter() {
            let out = model.forward_loss(&batch);

            // Read the scalar before backward() consumes the loss.
            let loss_value: f64 = out.loss.clone().into_scalar().elem::<f64>();
            train_loss.update(loss_value, out.n_items);

            // Backward pass + Adam update
            let grads = out.loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        // model.valid() → NmtModel<B::InnerBackend>
        // dropout disabled for deterministic evaluation
        let model_valid = model.valid();

        let mut val_loss = LossTracker::new();
        let mut val_mrr = MeanReciprocalRank::new();

        for batch in val_loader.iter() {
            let out = model_valid.forward_loss(&batch);
            let loss_value: f64 = out.loss.into_scalar().elem::<f64>();
            val_loss.update(loss_value, out.n_items);

            let [b, t] = batch.trg_tokens.dims();
            let gold = batch.trg_tokens.slice([0..b, 1..t]);
            val_mrr.update_from_logits(&out.logits, &gold)?;
        }

        let metrics = EpochMetrics::new(
            epoch,
            train_loss.value(),
            val_loss.value(),
            val_mrr.normalized_mrr(),
        );
        logger.log(&metrics)?;

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_mrr={:.4}",
            epoch, cfg.epochs, metrics.train_loss, metrics.val_loss, metrics.val_mrr,
        );

        if metrics.is_improvement(best_val_loss) {
            best_val_loss = metrics.val_loss;
            tracing::info!(
                "new best validation loss {:.4} at epoch {}",
                best_val_loss,
                epoch
            );
        }

        checkpoints.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete!");
    Ok(())
}
