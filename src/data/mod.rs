// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw parallel text files
// all the way to device-ready tensor batches.
//
// The flow:
//   corpus   — tab-separated source/target lines -> SentencePairs
//   dataset  — pairs -> numericised samples, length bucketing
//   batcher  — samples -> padded Int tensors plus a source mask
//

pub mod batcher;
pub mod corpus;
pub mod dataset;
