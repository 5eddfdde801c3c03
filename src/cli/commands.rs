// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `evaluate` and
// `translate`, and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::evaluate_use_case::EvaluateConfig;
use crate::application::train_use_case::TrainConfig;
use crate::application::translate_use_case::TranslateConfig;
use crate::ml::options::ModelOptions;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a translation model on a parallel corpus
    Train(TrainArgs),

    /// Score a trained checkpoint on a held-out corpus
    Evaluate(EvaluateArgs),

    /// Translate text with a trained checkpoint
    Translate(TranslateArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training corpus: one tab-separated source/target pair per line
    #[arg(long, default_value = "data/train.tsv")]
    pub train_file: String,

    /// Validation corpus in the same format
    #[arg(long, default_value = "data/val.tsv")]
    pub val_file: String,

    /// Translation direction as "<src>-><trg>", e.g. "en->de"
    #[arg(long, default_value = "en->de")]
    pub direction: String,

    /// Directory for checkpoints, vocabularies and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Number of sentence pairs per forward pass
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Seed for batch shuffling and length bucketing
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Compute backend: "auto", "wgpu" or "ndarray"
    #[arg(long, default_value = "auto")]
    pub backend: String,

    /// JSON file with model options, overlaid on the defaults.
    /// Unknown keys are warned about and ignored.
    #[arg(long)]
    pub model_config: Option<String>,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_file:     a.train_file,
            val_file:       a.val_file,
            direction:      a.direction,
            checkpoint_dir: a.checkpoint_dir,
            epochs:         a.epochs,
            batch_size:     a.batch_size,
            learning_rate:  a.learning_rate,
            seed:           a.seed,
            backend:        a.backend,
            model_config:   a.model_config,
            model:          ModelOptions::default(),
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Held-out corpus: one tab-separated pair per line
    #[arg(long, default_value = "data/test.tsv")]
    pub data_file: String,

    /// Number of sentence pairs per forward pass
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Compute backend: "auto", "wgpu" or "ndarray"
    #[arg(long, default_value = "auto")]
    pub backend: String,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            checkpoint_dir: a.checkpoint_dir,
            data_file:      a.data_file,
            batch_size:     a.batch_size,
            backend:        a.backend,
        }
    }
}

/// All arguments for the `translate` command
#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// A source sentence to translate
    #[arg(value_name = "SENTENCE")]
    pub text: Option<String>,

    /// A file with one source sentence per line (instead of SENTENCE)
    #[arg(long)]
    pub input: Option<String>,

    /// Beam width; 1 means greedy decoding
    #[arg(long, default_value_t = 1)]
    pub beam: usize,

    /// Maximum number of generated tokens per sentence
    #[arg(long, default_value_t = 80)]
    pub max_len: usize,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Compute backend: "auto", "wgpu" or "ndarray"
    #[arg(long, default_value = "auto")]
    pub backend: String,
}

impl From<TranslateArgs> for TranslateConfig {
    fn from(a: TranslateArgs) -> Self {
        TranslateConfig {
            checkpoint_dir: a.checkpoint_dir,
            text:           a.text,
            input_file:     a.input,
            beam_width:     a.beam,
            max_len:        a.max_len,
            backend:        a.backend,
        }
    }
}
