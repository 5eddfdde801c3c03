// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types for the translation domain: the direction of
// a run ("en->de"), aligned sentence pairs, and the corpus
// abstraction the application layer programs against.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - NO ML-specific code
//

pub mod direction;
pub mod sentence;
pub mod traits;
