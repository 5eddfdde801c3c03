// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting concerns that don't belong in
// any specific business layer:
//
//   checkpoint.rs   — Saving and loading model weights
//                     Uses Burn's CompactRecorder to serialise
//                     model parameters to disk. Also saves/loads
//                     the TrainConfig as JSON so evaluation and
//                     translation can rebuild the model.
//
//   vocab_store.rs  — Vocabulary persistence
//                     Builds a word-level vocabulary per
//                     language from the training corpus if none
//                     exists, or loads a previously saved one.
//                     Ensures the same token ids are used for
//                     training, evaluation and translation.
//
//   metrics.rs      — Training metrics logging
//                     Scalar metrics (loss, mean reciprocal
//                     rank) and an epoch-level CSV trail for
//                     later analysis and plotting.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Evaluation metrics and the CSV logger
pub mod metrics;

/// Vocabulary building, saving, and loading
pub mod vocab_store;
