// ============================================================
// Layer 5 — Text Encoder
// ============================================================
// Stacked bidirectional recurrent encoder. Each level runs one
// forward and one backward cell over the sequence and
// concatenates their outputs, so the context feature size is
// always 2 * enc_dim regardless of depth.
//
// The embedding table is absent under 3way tying; the model
// then embeds the source through the decoder's table and calls
// `forward` with the result.
//

use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig},
    tensor::{backend::Backend, Int, Tensor},
};

use super::options::{ModelOptions, TiedEmbeddings};
use super::rnn::Rnn;

/// What the decoder attends over.
#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    /// [batch, src_len, 2 * enc_dim]
    pub ctx: Tensor<B, 3>,
    /// [batch, src_len], 1.0 on real tokens
    pub mask: Tensor<B, 2>,
}

#[derive(Module, Debug)]
pub struct TextEncoder<B: Backend> {
    embedding: Option<Embedding<B>>,
    dropout_emb: Dropout,
    forward_layers: Vec<Rnn<B>>,
    backward_layers: Vec<Rnn<B>>,
    /// Between stacked levels (dropout_enc)
    dropout_between: Dropout,
    /// On the final context sequence (dropout_ctx)
    dropout_ctx: Dropout,
}

impl<B: Backend> TextEncoder<B> {
    pub fn new(opts: &ModelOptions, n_src_vocab: usize, device: &B::Device) -> Self {
        let owns_table = !matches!(opts.tied_emb, TiedEmbeddings::ThreeWay);
        let embedding =
            owns_table.then(|| EmbeddingConfig::new(n_src_vocab, opts.emb_dim).init(device));

        let mut forward_layers = Vec::with_capacity(opts.n_encoders);
        let mut backward_layers = Vec::with_capacity(opts.n_encoders);
        for level in 0..opts.n_encoders {
            let in_size = if level == 0 {
                opts.emb_dim
            } else {
                opts.ctx_size()
            };
            forward_layers.push(Rnn::new(opts.enc_type, in_size, opts.enc_dim, device));
            backward_layers.push(Rnn::new(opts.enc_type, in_size, opts.enc_dim, device));
        }

        Self {
            embedding,
            dropout_emb: DropoutConfig::new(opts.dropout_emb).init(),
            forward_layers,
            backward_layers,
            dropout_between: DropoutConfig::new(opts.dropout_enc).init(),
            dropout_ctx: DropoutConfig::new(opts.dropout_ctx).init(),
        }
    }

    /// Embed source tokens through the encoder's own table, or
    /// `None` when the table is shared from the decoder.
    pub fn embed(&self, tokens: &Tensor<B, 2, Int>) -> Option<Tensor<B, 3>> {
        self.embedding.as_ref().map(|e| e.forward(tokens.clone()))
    }

    /// Encode an embedded source sequence.
    pub fn forward(&self, embedded: Tensor<B, 3>, mask: &Tensor<B, 2>) -> EncoderOutput<B> {
        let mut x = self.dropout_emb.forward(embedded);
        let levels = self.forward_layers.len();
        for (level, (fw, bw)) in self
            .forward_layers
            .iter()
            .zip(&self.backward_layers)
            .enumerate()
        {
            let [batch, _, _] = x.dims();
            let device = x.device();
            let (out_f, _) = fw.forward_seq(
                x.clone(),
                Some(mask),
                false,
                fw.init_state(batch, &device),
            );
            let (out_b, _) = bw.forward_seq(x, Some(mask), true, bw.init_state(batch, &device));
            x = Tensor::cat(vec![out_f, out_b], 2);
            if level + 1 < levels {
                x = self.dropout_between.forward(x);
            }
        }
        EncoderOutput {
            ctx: self.dropout_ctx.forward(x),
            mask: mask.clone(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_ctx_is_twice_enc_dim() {
        let opts = tiny_opts();
        let enc = TextEncoder::<TestBackend>::new(&opts, 11, &device());
        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([4, 5, 6, 0, 0, 7].as_slice(), &device())
            .reshape([2, 3]);
        let mask = Tensor::<TestBackend, 1>::from_floats([1.0, 1.0, 1.0, 1.0, 0.0, 0.0].as_slice(), &device())
            .reshape([2, 3]);
        let embedded = enc.embed(&tokens).unwrap();
        let out = enc.forward(embedded, &mask);
        assert_eq!(out.ctx.dims(), [2, 3, 6]);
        assert_eq!(out.mask.dims(), [2, 3]);
    }

    #[test]
    fn test_stacked_levels_keep_ctx_width() {
        let opts = ModelOptions {
            n_encoders: 3,
            ..tiny_opts()
        };
        let enc = TextEncoder::<TestBackend>::new(&opts, 9, &device());
        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([4, 5, 6, 7].as_slice(), &device())
            .reshape([1, 4]);
        let mask = Tensor::ones([1, 4], &device());
        let embedded = enc.embed(&tokens).unwrap();
        let out = enc.forward(embedded, &mask);
        assert_eq!(out.ctx.dims(), [1, 4, 6]);
    }

    #[test]
    fn test_three_way_tying_has_no_own_table() {
        let opts = ModelOptions {
            tied_emb: TiedEmbeddings::ThreeWay,
            ..tiny_opts()
        };
        let enc = TextEncoder::<TestBackend>::new(&opts, 9, &device());
        let tokens =
            Tensor::<TestBackend, 1, Int>::from_ints([4, 5].as_slice(), &device()).reshape([1, 2]);
        assert!(enc.embed(&tokens).is_none());
    }
}
