// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the model itself and everything that
// runs it. Burn also surfaces at two narrow seams outside it
// (the data batcher and the checkpoint store); all network
// architecture lives here.
//
// What's in this layer:
//
//   options.rs   — Every architecture hyperparameter with its
//                  default, parsed from JSON with unknown-key
//                  warnings and cross-field validation
//
//   rnn.rs       — Single-cell GRU/LSTM step plus masked,
//                  reversible sequence unrolling and stacking
//
//   attention.rs — MLP and dot-product attention over the
//                  encoder context, with source masking
//
//   encoder.rs   — Bidirectional recurrent text encoder;
//                  context width is always 2 * enc_dim
//
//   decoder.rs   — Conditional GRU/LSTM decoder: pre-attention
//                  stack, attention, post-attention stack,
//                  output projection (optionally tied to the
//                  target embedding)
//
//   model.rs     — Encoder + decoder assembly, teacher-forced
//                  forward pass and cross-entropy loss
//
//   trainer.rs   — The training loop: forward, backward, Adam
//                  step, validation metrics, checkpoints
//
//   generator.rs — Greedy and beam-search decoding
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Bahdanau et al. (2015) Neural Machine Translation
//              by Jointly Learning to Align and Translate
//            Cho et al. (2014) Learning Phrase Representations
//              using RNN Encoder-Decoder

/// Attention over the encoder context
pub mod attention;

/// Conditional recurrent decoder
pub mod decoder;

/// Bidirectional recurrent encoder
pub mod encoder;

/// Greedy and beam-search generation
pub mod generator;

/// Encoder-decoder assembly and loss
pub mod model;

/// Architecture hyperparameters and validation
pub mod options;

/// GRU/LSTM cells, masked unrolling, stacking
pub mod rnn;

/// Full training loop with validation and checkpointing
pub mod trainer;
