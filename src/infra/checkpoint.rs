// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved per checkpoint:
//   1. Model weights (.mpk file)  — all learned parameters
//   2. latest_epoch.json          — which epoch was last saved
//   3. train_config.json          — full training configuration,
//                                   model options included
//
// Loading for evaluation or translation needs the exact
// architecture (enc_dim, att_type, ...) to rebuild the model
// before the weights can be restored into it; that is what
// train_config.json carries.
//
// Burn's CompactRecorder:
//   - Serialises model parameters to MessagePack format
//   - Stores floats at half precision
//   - Type-safe: loading fails if the architecture doesn't match
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk   ← weights after epoch 1
//     model_epoch_2.mpk   ← weights after epoch 2
//     ...
//     latest_epoch.json   ← contains the number of the latest epoch
//     train_config.json   ← training configuration + model options
//     vocab.<lang>.json   ← written next to these by the VocabStore
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::backend::Backend,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::NmtModel;

/// The on-disk envelope around the training configuration.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedTrainConfig {
    pub version: String,
    pub saved_at: String,
    pub config: TrainConfig,
}

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    /// Path to the directory where checkpoints are stored
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Weight file path for an epoch, without the extension the
    /// recorder appends.
    fn model_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    /// Save model weights for a given epoch and move the
    /// latest-epoch pointer to it.
    pub fn save_model<B: Backend>(&self, model: &NmtModel<B>, epoch: usize) -> Result<()> {
        let path = self.model_path(epoch);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest checkpoint's weights into a freshly built
    /// model of the same architecture.
    pub fn load_model<B: Backend>(
        &self,
        model: NmtModel<B>,
        device: &B::Device,
    ) -> Result<NmtModel<B>> {
        let epoch = self.latest_epoch()?;
        let path = self.model_path(epoch);

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display()
                )
            })?;

        Ok(model.load_record(record))
    }

    /// Save the training configuration to JSON.
    ///
    /// Called once before training starts, so evaluation and
    /// translation can rebuild the exact model architecture.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");

        let envelope = SavedTrainConfig {
            version: env!("CARGO_PKG_VERSION").to_string(),
            saved_at: chrono::Local::now().to_rfc3339(),
            config: cfg.clone(),
        };
        let json = serde_json::to_string_pretty(&envelope)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration back from JSON.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'evaluate' or 'translate'.",
                path.display()
            )
        })?;

        let envelope: SavedTrainConfig = serde_json::from_str(&json)?;
        Ok(envelope.config)
    }

    /// Read latest_epoch.json and return the epoch number.
    /// Returns an error if training hasn't been run yet.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");

        let s = fs::read_to_string(&path)
            .with_context(|| "Cannot find 'latest_epoch.json'. Have you run 'train' first?")?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::{TranslationBatch, TranslationBatcher};
    use crate::data::dataset::TranslationSample;
    use crate::ml::options::ModelOptions;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::data::dataloader::batcher::Batcher;
    use burn::tensor::ElementConversion;

    type TestBackend = burn::backend::NdArray;

    fn tiny_opts() -> ModelOptions {
        ModelOptions {
            emb_dim: 4,
            enc_dim: 3,
            dec_dim: 5,
            ..Default::default()
        }
    }

    fn tiny_batch(device: &NdArrayDevice) -> TranslationBatch<TestBackend> {
        let batcher = TranslationBatcher::<TestBackend>::new(*device);
        batcher.batch(vec![TranslationSample {
            src_ids: vec![4, 5, 6],
            trg_ids: vec![1, 7, 8, 2],
        }])
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let device = NdArrayDevice::default();
        let opts = tiny_opts();

        let model = NmtModel::<TestBackend>::new(&opts, 11, 13, &device);
        let batch = tiny_batch(&device);
        let loss_before: f64 = model.forward_loss(&batch).loss.into_scalar().elem();

        manager.save_model(&model, 1).unwrap();

        let fresh = NmtModel::<TestBackend>::new(&opts, 11, 13, &device);
        let restored = manager.load_model(fresh, &device).unwrap();
        let loss_after: f64 = restored.forward_loss(&batch).loss.into_scalar().elem();

        // CompactRecorder stores weights at half precision.
        assert!((loss_before - loss_after).abs() < 5e-2);
    }

    #[test]
    fn test_latest_epoch_tracks_saves() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        assert!(manager.latest_epoch().is_err());

        let device = NdArrayDevice::default();
        let model = NmtModel::<TestBackend>::new(&tiny_opts(), 11, 13, &device);
        manager.save_model(&model, 1).unwrap();
        manager.save_model(&model, 2).unwrap();
        assert_eq!(manager.latest_epoch().unwrap(), 2);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();

        let mut cfg = TrainConfig::default();
        cfg.epochs = 3;
        cfg.direction = "de->en".to_string();

        manager.save_config(&cfg).unwrap();
        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.epochs, 3);
        assert_eq!(loaded.direction, "de->en");
        assert_eq!(loaded.model.enc_dim, cfg.model.enc_dim);
    }
}
