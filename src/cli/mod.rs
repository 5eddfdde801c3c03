// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`     — trains a model on a parallel corpus
//   2. `evaluate`  — scores a checkpoint on held-out data
//   3. `translate` — decodes text with a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs, TranslateArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "rnn-nmt",
    version = "0.1.0",
    about = "Train a recurrent translation model on parallel text, then translate."
)]
pub struct Cli {
    /// The subcommand to run (train, evaluate or translate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => Self::run_train(args),
            Commands::Evaluate(args) => Self::run_evaluate(args),
            Commands::Translate(args) => Self::run_translate(args),
        }
    }

    /// Handles the `train` subcommand.
    /// Converts CLI args into a TrainConfig and hands off to Layer 2.
    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on '{}'", args.train_file);

        // Convert CLI args → application config (separates presentation from domain)
        let use_case = TrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }

    /// Handles the `evaluate` subcommand.
    /// Prints one metric per line, e.g. `LOSS = 4.2311`.
    fn run_evaluate(args: EvaluateArgs) -> Result<()> {
        use crate::application::evaluate_use_case::EvaluateUseCase;

        let use_case = EvaluateUseCase::new(args.into());
        let metrics = use_case.execute()?;

        for metric in &metrics {
            println!("{metric}");
        }
        Ok(())
    }

    /// Handles the `translate` subcommand.
    /// Prints one translated line per input line, in order.
    fn run_translate(args: TranslateArgs) -> Result<()> {
        use crate::application::translate_use_case::TranslateUseCase;

        let use_case = TranslateUseCase::new(args.into());
        for line in use_case.execute()? {
            println!("{line}");
        }
        Ok(())
    }
}
