// ============================================================
// Layer 5 — Translation Model
// ============================================================
// The encoder-decoder assembly. Everything else in the crate
// talks to this type: the trainer calls forward_loss, the
// generator calls encode / init_decoder / decode_step, and the
// use cases print summary().
//
// Teacher forcing feeds the gold target shifted by one:
//   input  = trg[:, ..T-1]      (<bos> w1 w2 ...)
//   gold   = trg[:,  1..]       (w1 w2 ... <eos>)
// The loss ignores <pad> and n_items counts exactly the gold
// positions that are not <pad>.
//

use std::fmt::Write as _;

use burn::{
    module::Module,
    nn::loss::CrossEntropyLoss,
    tensor::{backend::Backend, ElementConversion, Int, Tensor},
};

use crate::data::batcher::TranslationBatch;
use crate::infra::vocab_store::{Vocabulary, BOS_ID, PAD_ID};

use super::decoder::{ConditionalDecoder, DecoderState};
use super::encoder::{EncoderOutput, TextEncoder};
use super::options::{ModelOptions, RnnKind, TiedEmbeddings};

/// Loss of one batch plus the token count behind it.
#[derive(Debug)]
pub struct TrainOutput<B: Backend> {
    /// Mean cross-entropy over the batch's non-pad gold tokens
    pub loss: Tensor<B, 1>,
    /// Teacher-forced logits, [batch, trg_len - 1, n_trg_vocab]
    pub logits: Tensor<B, 3>,
    /// Number of non-pad gold tokens the mean covers
    pub n_items: usize,
}

#[derive(Module, Debug)]
pub struct NmtModel<B: Backend> {
    encoder: TextEncoder<B>,
    decoder: ConditionalDecoder<B>,
}

impl<B: Backend> NmtModel<B> {
    /// Build the model for validated options and vocabulary
    /// sizes. `ModelOptions::validate` runs at the application
    /// boundary before this is called.
    pub fn new(
        opts: &ModelOptions,
        n_src_vocab: usize,
        n_trg_vocab: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            encoder: TextEncoder::new(opts, n_src_vocab, device),
            decoder: ConditionalDecoder::new(opts, n_trg_vocab, device),
        }
    }

    /// A [batch, 1] column of `<bos>` ids to start decoding.
    pub fn bos_tokens(&self, batch: usize, device: &B::Device) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints(vec![BOS_ID as i32; batch].as_slice(), device)
            .reshape([batch, 1])
    }

    /// Encode source tokens into the attention context.
    pub fn encode(&self, src: Tensor<B, 2, Int>, src_mask: Tensor<B, 2>) -> EncoderOutput<B> {
        let embedded = match self.encoder.embed(&src) {
            Some(e) => e,
            // 3way tying: the decoder's table embeds the source too
            None => self.decoder.embed(src),
        };
        self.encoder.forward(embedded, &src_mask)
    }

    /// Initial decoder state for an encoded source.
    pub fn init_decoder(&self, enc: &EncoderOutput<B>) -> DecoderState<B> {
        self.decoder.init_state(enc)
    }

    /// One decoding step; see `ConditionalDecoder::step`.
    pub fn decode_step(
        &self,
        y_prev: Tensor<B, 2, Int>,
        state: &DecoderState<B>,
        enc: &EncoderOutput<B>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>, DecoderState<B>) {
        self.decoder.step(y_prev, state, enc)
    }

    /// Teacher-forced logits for a whole target prefix,
    /// [batch, trg_len, n_trg_vocab].
    pub fn forward(
        &self,
        src: Tensor<B, 2, Int>,
        src_mask: Tensor<B, 2>,
        trg_input: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let enc = self.encode(src, src_mask);
        let mut state = self.decoder.init_state(&enc);
        let [batch, steps] = trg_input.dims();

        let mut logits = Vec::with_capacity(steps);
        for t in 0..steps {
            let y_prev = trg_input.clone().slice([0..batch, t..t + 1]);
            let (step_logits, _, next) = self.decoder.step(y_prev, &state, &enc);
            let [_, vocab] = step_logits.dims();
            logits.push(step_logits.reshape([batch, 1, vocab]));
            state = next;
        }
        Tensor::cat(logits, 1)
    }

    /// Cross-entropy of a batch under teacher forcing.
    pub fn forward_loss(&self, batch: &TranslationBatch<B>) -> TrainOutput<B> {
        let [bsz, trg_len] = batch.trg_tokens.dims();
        let trg_input = batch.trg_tokens.clone().slice([0..bsz, 0..trg_len - 1]);
        let trg_gold = batch.trg_tokens.clone().slice([0..bsz, 1..trg_len]);

        let logits = self.forward(
            batch.src_tokens.clone(),
            batch.src_mask.clone(),
            trg_input,
        );
        let [_, steps, vocab] = logits.dims();
        let flat_logits = logits.clone().reshape([bsz * steps, vocab]);
        let flat_gold = trg_gold.reshape([bsz * steps]);

        let loss = CrossEntropyLoss::new(Some(PAD_ID as usize), &flat_logits.device())
            .forward(flat_logits, flat_gold.clone());
        let n_items = flat_gold
            .equal_elem(PAD_ID as i32)
            .bool_not()
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>() as usize;

        TrainOutput {
            loss,
            logits,
            n_items,
        }
    }

    /// Human-readable architecture summary: layer shape, both
    /// vocabularies and the trainable parameter count.
    pub fn summary(
        &self,
        opts: &ModelOptions,
        src_vocab: &Vocabulary,
        trg_vocab: &Vocabulary,
    ) -> String {
        let cell = |kind: RnnKind| match kind {
            RnnKind::Gru => "GRU",
            RnnKind::Lstm => "LSTM",
        };
        let tying = match opts.tied_emb {
            TiedEmbeddings::Off => "untied",
            TiedEmbeddings::TwoWay => "2way tied",
            TiedEmbeddings::ThreeWay => "3way tied",
        };
        let mut out = String::new();
        let _ = writeln!(
            out,
            "NmtModel ({} -> {}, {} parameters)",
            src_vocab.lang(),
            trg_vocab.lang(),
            self.num_params()
        );
        let _ = writeln!(
            out,
            "  encoder: {}x bidirectional {} (enc_dim {}, ctx {})",
            opts.n_encoders,
            cell(opts.enc_type),
            opts.enc_dim,
            opts.ctx_size()
        );
        let _ = writeln!(
            out,
            "  decoder: {}+{} layer {} (dec_dim {}, {:?} attention, {} embeddings)",
            opts.n_layers_preatt,
            opts.n_layers_postatt,
            cell(opts.dec_type),
            opts.dec_dim,
            opts.att_type,
            tying
        );
        let _ = writeln!(out, "  source: {src_vocab}");
        let _ = write!(out, "  target: {trg_vocab}");
        out
    }
}
