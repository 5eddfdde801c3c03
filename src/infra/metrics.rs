// ============================================================
// Layer 6 — Metrics
// ============================================================
// Scalar evaluation metrics and their CSV trail.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: per-token cross-entropy on the training set
//   - val_loss:   per-token cross-entropy on the validation set
//   - val_mrr:    mean reciprocal rank of the gold token under
//                 the model's scores, over non-pad positions
//
// Output file: <checkpoint dir>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,val_loss,val_mrr
//   1,5.124500,5.089200,0.123000
//   2,4.890100,4.854300,0.184000
//

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use burn::tensor::{backend::Backend, Int, Tensor};

use crate::infra::vocab_store::PAD_ID;

/// One named evaluation result, e.g. `LOSS = 4.2311`.
///
/// `higher_better` tells callers which direction is an
/// improvement when comparing runs (loss: no, MRR: yes).
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub higher_better: bool,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64, higher_better: bool) -> Self {
        Self {
            name: name.into(),
            value,
            higher_better,
        }
    }

    /// True if `candidate` improves on this metric's value.
    pub fn is_better(&self, candidate: f64) -> bool {
        if self.higher_better {
            candidate > self.value
        } else {
            candidate < self.value
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:.4}", self.name, self.value)
    }
}

/// Accumulates per-batch mean losses into a per-token mean.
///
/// Batch losses are means over the batch's non-pad tokens, so
/// they are re-weighted by token count before averaging.
#[derive(Debug, Default)]
pub struct LossTracker {
    weighted_sum: f64,
    n_items: usize,
}

impl LossTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch: its mean loss and how many tokens that
    /// mean covers.
    pub fn update(&mut self, batch_mean: f64, n_items: usize) {
        self.weighted_sum += batch_mean * n_items as f64;
        self.n_items += n_items;
    }

    /// Mean loss per token across everything recorded so far.
    pub fn value(&self) -> f64 {
        if self.n_items == 0 {
            return 0.0;
        }
        self.weighted_sum / self.n_items as f64
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }
}

/// Mean reciprocal rank of gold tokens under model scores.
///
/// The rank of the gold token is 1 plus the number of tokens
/// scored strictly higher, so ties do not punish the model.
#[derive(Debug, Default)]
pub struct MeanReciprocalRank {
    reciprocal_sum: f64,
    count: usize,
}

impl MeanReciprocalRank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one position given the full score row and the gold
    /// token's index.
    pub fn update(&mut self, scores: &[f32], gold: usize) {
        debug_assert!(gold < scores.len());
        let gold_score = scores[gold];
        let rank = 1 + scores.iter().filter(|&&s| s > gold_score).count();
        self.reciprocal_sum += 1.0 / rank as f64;
        self.count += 1;
    }

    /// Record every non-pad gold position of a batch.
    ///
    /// `logits` is [batch, steps, vocab]; `gold` is the aligned
    /// [batch, steps] target slice. Ranking raw logits gives the
    /// same ranks as log-probabilities, so no softmax is needed.
    pub fn update_from_logits<B: Backend>(
        &mut self,
        logits: &Tensor<B, 3>,
        gold: &Tensor<B, 2, Int>,
    ) -> Result<()> {
        let [batch, steps, vocab] = logits.dims();
        let scores: Vec<f32> = logits
            .to_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| anyhow!("reading logits off the device: {e:?}"))?;
        let targets: Vec<i32> = gold
            .to_data()
            .convert::<i32>()
            .to_vec()
            .map_err(|e| anyhow!("reading targets off the device: {e:?}"))?;
        for b in 0..batch {
            for t in 0..steps {
                let target = targets[b * steps + t];
                if target == PAD_ID as i32 {
                    continue;
                }
                let offset = (b * steps + t) * vocab;
                self.update(&scores[offset..offset + vocab], target as usize);
            }
        }
        Ok(())
    }

    /// Mean of the reciprocal ranks recorded so far, in [0, 1].
    pub fn normalized_mrr(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.reciprocal_sum / self.count as f64
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Per-token cross-entropy over all training batches
    pub train_loss: f64,

    /// Per-token cross-entropy on the validation set
    pub val_loss: f64,

    /// Mean reciprocal rank on the validation set, in [0, 1]
    pub val_mrr: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, val_mrr: f64) -> Self {
        Self {
            epoch,
            train_loss,
            val_loss,
            val_mrr,
        }
    }

    /// Returns true if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");

        // Header only when the file is new, so one log survives
        // across resumed runs
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_loss,val_mrr")?;
            tracing::debug!("created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.val_loss, m.val_mrr,
        )?;

        tracing::debug!(
            "logged epoch {}: train_loss={:.4}, val_loss={:.4}, val_mrr={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
            m.val_mrr,
        );

        Ok(())
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_tracker_weights_by_items() {
        let mut loss = LossTracker::new();
        // 10 tokens at mean 2.0, 30 tokens at mean 4.0
        loss.update(2.0, 10);
        loss.update(4.0, 30);
        assert!((loss.value() - 3.5).abs() < 1e-9);
        assert_eq!(loss.n_items(), 40);
    }

    #[test]
    fn test_loss_tracker_empty_is_zero() {
        assert_eq!(LossTracker::new().value(), 0.0);
    }

    #[test]
    fn test_mrr_rank_one_is_perfect() {
        let mut mrr = MeanReciprocalRank::new();
        mrr.update(&[0.1, 0.9, 0.2], 1);
        assert!((mrr.normalized_mrr() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mrr_counts_better_scores() {
        let mut mrr = MeanReciprocalRank::new();
        // gold is third-best → rank 3
        mrr.update(&[0.5, 0.9, 0.1, 0.0], 2);
        assert!((mrr.normalized_mrr() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_mrr_averages_positions() {
        let mut mrr = MeanReciprocalRank::new();
        mrr.update(&[1.0, 0.0], 0); // rank 1
        mrr.update(&[1.0, 0.0], 1); // rank 2
        assert!((mrr.normalized_mrr() - 0.75).abs() < 1e-9);
        assert_eq!(mrr.count(), 2);
    }

    #[test]
    fn test_metric_display_and_direction() {
        let loss = Metric::new("LOSS", 4.2311, false);
        assert_eq!(loss.to_string(), "LOSS = 4.2311");
        assert!(loss.is_better(4.0));
        assert!(!loss.is_better(5.0));

        let mrr = Metric::new("MRR", 0.5, true);
        assert!(mrr.is_better(0.6));
        assert!(!mrr.is_better(0.4));
    }

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.5, 2.3, 0.4);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn test_logger_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 5.1, 5.0, 0.1)).unwrap();
        logger.log(&EpochMetrics::new(2, 4.2, 4.4, 0.2)).unwrap();

        let text = std::fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "epoch,train_loss,val_loss,val_mrr");
        assert!(lines[1].starts_with("1,5.1"));
        assert!(lines[2].starts_with("2,4.2"));
    }
}
