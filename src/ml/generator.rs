// ============================================================
// Layer 5 — Generation
// ============================================================
// Turns a trained model into output token ids, one source
// sentence at a time.
//
// Two strategies:
//   greedy — argmax at every step, cheap and deterministic
//   beam   — keeps `width` hypotheses ranked by length-
//            normalised log-probability
//
// Both stop on <eos> or after `max_len` steps, and neither
// includes <bos>/<eos> in what they return.

use anyhow::{anyhow, Result};
use burn::tensor::{activation::log_softmax, backend::Backend, ElementConversion, Int, Tensor};

use crate::infra::vocab_store::{BOS_ID, EOS_ID};
use crate::ml::{decoder::DecoderState, encoder::EncoderOutput, model::NmtModel};

/// Encode a single source sentence as a batch of one.
fn encode_one<B: Backend>(
    model: &NmtModel<B>,
    src_ids: &[u32],
    device: &B::Device,
) -> EncoderOutput<B> {
    let len = src_ids.len();
    let ids: Vec<i32> = src_ids.iter().map(|&id| id as i32).collect();
    let src = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device).reshape([1, len]);
    let mask = Tensor::<B, 2>::ones([1, len], device);
    model.encode(src, mask)
}

/// Greedy decoding: pick the best-scored token at each step.
pub fn greedy<B: Backend>(
    model: &NmtModel<B>,
    src_ids: &[u32],
    max_len: usize,
    device: &B::Device,
) -> Result<Vec<u32>> {
    if src_ids.is_empty() {
        return Ok(Vec::new());
    }

    let enc = encode_one(model, src_ids, device);
    let mut state = model.init_decoder(&enc);
    let mut prev = model.bos_tokens(1, device);
    let mut out = Vec::new();

    for _ in 0..max_len {
        let (logits, _, next_state) = model.decode_step(prev, &state, &enc);
        state = next_state;

        let next_id = logits.argmax(1).into_scalar().elem::<i64>() as u32;
        if next_id == EOS_ID {
            break;
        }
        out.push(next_id);
        prev = Tensor::<B, 1, Int>::from_ints([next_id as i32].as_slice(), device).reshape([1, 1]);
    }

    Ok(out)
}

/// One partial translation tracked during beam search.
#[derive(Clone)]
struct Hypothesis<B: Backend> {
    ids: Vec<u32>,
    logp: f64,
    state: DecoderState<B>,
    alive: bool,
}

impl<B: Backend> Hypothesis<B> {
    /// Log-probability per generated token. Plain sums favour
    /// short outputs, so hypotheses compete on the mean.
    fn normalized(&self) -> f64 {
        self.logp / self.ids.len().max(1) as f64
    }
}

/// Beam search with `width` live hypotheses.
pub fn beam<B: Backend>(
    model: &NmtModel<B>,
    src_ids: &[u32],
    width: usize,
    max_len: usize,
    device: &B::Device,
) -> Result<Vec<u32>> {
    if width <= 1 {
        return greedy(model, src_ids, max_len, device);
    }
    if src_ids.is_empty() {
        return Ok(Vec::new());
    }

    let enc = encode_one(model, src_ids, device);
    let mut hyps = vec![Hypothesis::<B> {
        ids: Vec::new(),
        logp: 0.0,
        state: model.init_decoder(&enc),
        alive: true,
    }];

    for _ in 0..max_len {
        if hyps.iter().all(|h| !h.alive) {
            break;
        }

        let mut candidates: Vec<Hypothesis<B>> = Vec::with_capacity(hyps.len() * width);
        for hyp in &hyps {
            // Finished hypotheses carry over unchanged and keep
            // competing on their final score.
            if !hyp.alive {
                candidates.push(hyp.clone());
                continue;
            }

            let prev_id = hyp.ids.last().copied().unwrap_or(BOS_ID);
            let prev =
                Tensor::<B, 1, Int>::from_ints([prev_id as i32].as_slice(), device).reshape([1, 1]);
            let (logits, _, next_state) = model.decode_step(prev, &hyp.state, &enc);

            let row: Vec<f32> = log_softmax(logits, 1)
                .to_data()
                .convert::<f32>()
                .to_vec()
                .map_err(|e| anyhow!("reading log-probabilities off the device: {e:?}"))?;

            let mut indexed: Vec<(usize, f32)> = row.into_iter().enumerate().collect();
            indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

            for &(token, logp) in indexed.iter().take(width) {
                let mut next = hyp.clone();
                next.state = next_state.clone();
                next.logp += logp as f64;
                if token as u32 == EOS_ID {
                    next.alive = false;
                } else {
                    next.ids.push(token as u32);
                }
                candidates.push(next);
            }
        }

        candidates.sort_by(|a, b| b.normalized().total_cmp(&a.normalized()));
        candidates.truncate(width);
        hyps = candidates;
    }

    Ok(hyps
        .into_iter()
        .max_by(|a, b| a.normalized().total_cmp(&b.normalized()))
        .map(|h| h.ids)
        .unwrap_or_default())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::options::ModelOptions;
    use burn::backend::ndarray::NdArrayDevice;

    type TestBackend = burn::backend::NdArray;

    const N_SRC: usize = 11;
    const N_TRG: usize = 13;

    fn tiny_model() -> (NmtModel<TestBackend>, NdArrayDevice) {
        let device = NdArrayDevice::default();
        let opts = ModelOptions {
            emb_dim: 4,
            enc_dim: 3,
            dec_dim: 5,
            ..Default::default()
        };
        (NmtModel::new(&opts, N_SRC, N_TRG, &device), device)
    }

    #[test]
    fn test_greedy_respects_max_len_and_vocab() {
        let (model, device) = tiny_model();
        let out = greedy(&model, &[4, 5, 6], 7, &device).unwrap();
        assert!(out.len() <= 7);
        assert!(out.iter().all(|&id| (id as usize) < N_TRG));
    }

    #[test]
    fn test_greedy_empty_source_is_empty() {
        let (model, device) = tiny_model();
        assert!(greedy(&model, &[], 10, &device).unwrap().is_empty());
    }

    #[test]
    fn test_beam_width_one_matches_greedy() {
        let (model, device) = tiny_model();
        let src = [4, 5, 6, 7];
        let g = greedy(&model, &src, 6, &device).unwrap();
        let b = beam(&model, &src, 1, 6, &device).unwrap();
        assert_eq!(g, b);
    }

    #[test]
    fn test_beam_respects_max_len_and_vocab() {
        let (model, device) = tiny_model();
        let out = beam(&model, &[4, 5], 3, 5, &device).unwrap();
        assert!(out.len() <= 5);
        assert!(out.iter().all(|&id| (id as usize) < N_TRG));
    }
}
