// ============================================================
// Layer 5 — Conditional Decoder
// ============================================================
// Recurrent decoder conditioned on the encoder context through
// attention. One step:
//
//   embed(y_prev) → pre-attention stack → attention →
//   post-attention stack → hid2out → tanh → dropout → vocab
//
// The post-attention stack consumes the attended context,
// optionally concatenated with the pre-attention output
// (concat_outputs). Under 2way/3way tying the vocabulary
// projection is the transposed embedding table instead of a
// free Linear.
//

use burn::{
    module::{Ignored, Module},
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear},
    tensor::{activation, backend::Backend, Int, Tensor},
};

use super::attention::Attention;
use super::encoder::EncoderOutput;
use super::options::{DecoderInit, ModelOptions, Nonlinearity};
use super::rnn::{kaiming_linear, RnnStack, RnnState};

/// Per-layer recurrent states of both decoder stacks.
#[derive(Debug, Clone)]
pub struct DecoderState<B: Backend> {
    pub pre: Vec<RnnState<B>>,
    pub post: Vec<RnnState<B>>,
}

#[derive(Module, Debug)]
pub struct ConditionalDecoder<B: Backend> {
    embedding: Embedding<B>,
    pre_stack: RnnStack<B>,
    attention: Attention<B>,
    post_stack: RnnStack<B>,
    /// mean_ctx init: Linear(ctx_size -> dec_dim); zero init has none
    init_proj: Option<Linear<B>>,
    init_activ: Ignored<Nonlinearity>,
    hid2out: Linear<B>,
    dropout_out: Dropout,
    /// Free vocabulary projection; `None` when tied to the table
    out_proj: Option<Linear<B>>,
    concat_outputs: bool,
}

impl<B: Backend> ConditionalDecoder<B> {
    pub fn new(opts: &ModelOptions, n_trg_vocab: usize, device: &B::Device) -> Self {
        let embedding = EmbeddingConfig::new(n_trg_vocab, opts.emb_dim).init(device);
        let pre_stack = RnnStack::new(
            opts.dec_type,
            opts.emb_dim,
            opts.dec_dim,
            opts.n_layers_preatt,
            opts.dropout_dec,
            device,
        );
        let attention = Attention::new(opts, device);
        let post_stack = RnnStack::new(
            opts.dec_type,
            opts.post_input_size(),
            opts.dec_dim,
            opts.n_layers_postatt,
            opts.dropout_dec,
            device,
        );
        let init_proj = matches!(opts.dec_init, DecoderInit::MeanCtx)
            .then(|| kaiming_linear(opts.ctx_size(), opts.dec_dim, true, device));
        let hid2out = kaiming_linear(opts.dec_dim, opts.emb_dim, true, device);
        let out_proj =
            (!opts.tied()).then(|| kaiming_linear(opts.emb_dim, n_trg_vocab, false, device));

        Self {
            embedding,
            pre_stack,
            attention,
            post_stack,
            init_proj,
            init_activ: Ignored(opts.dec_init_activ),
            hid2out,
            dropout_out: DropoutConfig::new(opts.dropout_out).init(),
            out_proj,
            concat_outputs: opts.concat_outputs,
        }
    }

    /// Embed target-side tokens. Also used by the encoder path
    /// under 3way tying.
    pub fn embed(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.embedding.forward(tokens)
    }

    /// Initial state for decoding against an encoded source:
    /// zeros, or the projected masked mean of the context,
    /// seeded into every layer of both stacks.
    pub fn init_state(&self, enc: &EncoderOutput<B>) -> DecoderState<B> {
        match &self.init_proj {
            Some(proj) => {
                let [batch, steps, ctx_size] = enc.ctx.dims();
                let m = enc.mask.clone().reshape([batch, steps, 1]);
                let summed = (enc.ctx.clone() * m).sum_dim(1).reshape([batch, ctx_size]);
                let counts = enc.mask.clone().sum_dim(1);
                let mean = summed / counts;
                let h0 = self.init_activ.apply(proj.forward(mean));
                DecoderState {
                    pre: self.pre_stack.seeded_state(&h0),
                    post: self.post_stack.seeded_state(&h0),
                }
            }
            None => {
                let [batch, _, _] = enc.ctx.dims();
                let device = enc.ctx.device();
                DecoderState {
                    pre: self.pre_stack.init_state(batch, &device),
                    post: self.post_stack.init_state(batch, &device),
                }
            }
        }
    }

    /// One decoding step from the previous target token.
    ///
    /// `y_prev` is [batch, 1]. Returns vocabulary logits
    /// [batch, n_trg_vocab], attention weights [batch, src_len]
    /// and the advanced state.
    pub fn step(
        &self,
        y_prev: Tensor<B, 2, Int>,
        state: &DecoderState<B>,
        enc: &EncoderOutput<B>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>, DecoderState<B>) {
        let [batch, _] = y_prev.dims();
        let embedded = self.embedding.forward(y_prev);
        let [_, _, emb_dim] = embedded.dims();
        let embedded = embedded.reshape([batch, emb_dim]);

        let (h1, pre) = self.pre_stack.step(embedded, &state.pre);
        let (attn, ctx_vec) = self.attention.forward(h1.clone(), &enc.ctx, &enc.mask);
        let post_in = if self.concat_outputs {
            Tensor::cat(vec![h1, ctx_vec], 1)
        } else {
            ctx_vec
        };
        let (h2, post) = self.post_stack.step(post_in, &state.post);

        let logits = self.project(h2);
        (logits, attn, DecoderState { pre, post })
    }

    /// Output pipeline: hid2out → tanh → dropout → vocabulary.
    fn project(&self, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        let out = activation::tanh(self.hid2out.forward(hidden));
        let out = self.dropout_out.forward(out);
        match &self.out_proj {
            Some(p) => p.forward(out),
            // tied: score against the embedding table
            None => out.matmul(self.embedding.weight.val().transpose()),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::encoder::TextEncoder;
    use crate::ml::options::TiedEmbeddings;
    use burn::backend::ndarray::NdArrayDevice;

    type TestBackend = burn::backend::NdArray;

    fn device() -> NdArrayDevice {
        NdArrayDevice::default()
    }

    fn tiny_opts() -> ModelOptions {
        ModelOptions {
            emb_dim: 4,
            enc_dim: 3,
            dec_dim: 5,
            ..Default::default()
        }
    }

    fn encoded(opts: &ModelOptions) -> EncoderOutput<TestBackend> {
        let enc = TextEncoder::new(opts, 13, &device());
        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([4, 5, 6, 7, 0, 0].as_slice(), &device())
            .reshape([2, 3]);
        let mask = Tensor::<TestBackend, 1>::from_floats([1.0, 1.0, 1.0, 1.0, 0.0, 0.0].as_slice(), &device())
            .reshape([2, 3]);
        let embedded = enc.embed(&tokens).unwrap();
        enc.forward(embedded, &mask)
    }

    #[test]
    fn test_step_shapes() {
        let opts = tiny_opts();
        let dec = ConditionalDecoder::<TestBackend>::new(&opts, 17, &device());
        let enc = encoded(&opts);
        let state = dec.init_state(&enc);
        let y = Tensor::<TestBackend, 1, Int>::from_ints([1, 1].as_slice(), &device()).reshape([2, 1]);
        let (logits, attn, next) = dec.step(y, &state, &enc);
        assert_eq!(logits.dims(), [2, 17]);
        assert_eq!(attn.dims(), [2, 3]);
        assert_eq!(next.pre.len(), 1);
        assert_eq!(next.post.len(), 1);
    }

    #[test]
    fn test_mean_ctx_init_seeds_states() {
        let opts = ModelOptions {
            n_layers_preatt: 2,
            n_layers_postatt: 2,
            ..tiny_opts()
        };
        let dec = ConditionalDecoder::<TestBackend>::new(&opts, 17, &device());
        let enc = encoded(&opts);
        let state = dec.init_state(&enc);
        assert_eq!(state.pre.len(), 2);
        assert_eq!(state.post.len(), 2);
        // mean_ctx produces a non-zero hidden for a non-zero context
        let h: Vec<f32> = state.pre[0]
            .hidden
            .clone()
            .reshape([10])
            .to_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        assert!(h.iter().any(|v| v.abs() > 0.0));
    }

    #[test]
    fn test_zero_init_is_zero() {
        let opts = ModelOptions {
            dec_init: DecoderInit::Zero,
            ..tiny_opts()
        };
        let dec = ConditionalDecoder::<TestBackend>::new(&opts, 17, &device());
        let enc = encoded(&opts);
        let state = dec.init_state(&enc);
        let h: Vec<f32> = state.post[0]
            .hidden
            .clone()
            .reshape([10])
            .to_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        assert_eq!(h, vec![0.0; 10]);
    }

    #[test]
    fn test_tied_projection_uses_embedding_width() {
        let opts = ModelOptions {
            tied_emb: TiedEmbeddings::TwoWay,
            ..tiny_opts()
        };
        let dec = ConditionalDecoder::<TestBackend>::new(&opts, 17, &device());
        let enc = encoded(&opts);
        let state = dec.init_state(&enc);
        let y = Tensor::<TestBackend, 1, Int>::from_ints([1, 1].as_slice(), &device()).reshape([2, 1]);
        let (logits, _, _) = dec.step(y, &state, &enc);
        // logits still cover the full vocabulary
        assert_eq!(logits.dims(), [2, 17]);
    }

    #[test]
    fn test_unconcatenated_context_input() {
        let opts = ModelOptions {
            concat_outputs: false,
            ..tiny_opts()
        };
        let dec = ConditionalDecoder::<TestBackend>::new(&opts, 11, &device());
        let enc = encoded(&opts);
        let state = dec.init_state(&enc);
        let y = Tensor::<TestBackend, 1, Int>::from_ints([1, 1].as_slice(), &device()).reshape([2, 1]);
        let (logits, _, _) = dec.step(y, &state, &enc);
        assert_eq!(logits.dims(), [2, 11]);
    }
}
