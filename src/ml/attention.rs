// ============================================================
// Layer 5 — Attention
// ============================================================
// Scores every encoder context position against the decoder's
// current hidden state and returns the softmax-weighted context
// vector. Two score functions, both working in a configurable
// bottleneck dimension:
//
//   mlp:  e = v(activ(P_ctx(ctx) + P_hid(hid)))
//   dot:  e = P_ctx(ctx) · P_hid(hid)
//
// Scores are divided by the temperature and padded positions
// are pushed to -1e9 before the softmax, so they end up with
// (numerically) zero weight.
//

use burn::{
    module::{Ignored, Module},
    nn::Linear,
    tensor::{activation, backend::Backend, Tensor},
};

use super::options::{AttentionKind, ModelOptions, Nonlinearity};
use super::rnn::kaiming_linear;

#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    /// Context projection into the bottleneck; absent when
    /// att_transform_ctx is off (validation then guarantees the
    /// context already has bottleneck width).
    ctx_proj: Option<Linear<B>>,
    /// Decoder-hidden projection into the bottleneck.
    hid_proj: Linear<B>,
    /// MLP score layer; `None` selects dot scoring.
    score: Option<Linear<B>>,
    activ: Ignored<Nonlinearity>,
    temperature: f64,
}

impl<B: Backend> Attention<B> {
    pub fn new(opts: &ModelOptions, device: &B::Device) -> Self {
        let bottleneck = opts.bottleneck_size();
        let ctx_proj = opts
            .att_transform_ctx
            .then(|| kaiming_linear(opts.ctx_size(), bottleneck, false, device));
        let hid_proj = kaiming_linear(opts.dec_dim, bottleneck, false, device);
        let score = matches!(opts.att_type, AttentionKind::Mlp)
            .then(|| kaiming_linear(bottleneck, 1, opts.att_mlp_bias, device));
        Self {
            ctx_proj,
            hid_proj,
            score,
            activ: Ignored(opts.att_activ),
            temperature: opts.att_temp,
        }
    }

    /// Attend over `ctx` given the decoder hidden state.
    ///
    /// `hid` is [batch, dec_dim], `ctx` is [batch, time, ctx_size]
    /// and `mask` is [batch, time] with 1.0 on real tokens.
    /// Returns the attention weights [batch, time] and the
    /// weighted context [batch, ctx_size].
    pub fn forward(
        &self,
        hid: Tensor<B, 2>,
        ctx: &Tensor<B, 3>,
        mask: &Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch, steps, ctx_size] = ctx.dims();

        let projected_ctx = match &self.ctx_proj {
            Some(p) => p.forward(ctx.clone()),
            None => ctx.clone(),
        };
        let hid_p = self.hid_proj.forward(hid);
        let [_, bottleneck] = hid_p.dims();

        let scores = match &self.score {
            Some(v) => {
                let summed = projected_ctx + hid_p.reshape([batch, 1, bottleneck]);
                v.forward(self.activ.apply(summed)).reshape([batch, steps])
            }
            None => projected_ctx
                .matmul(hid_p.reshape([batch, bottleneck, 1]))
                .reshape([batch, steps]),
        };

        let scores = scores / self.temperature;
        let masked = scores
            .clone()
            .mask_where(mask.clone().equal_elem(0.0), scores.ones_like() * (-1e9));
        let weights = activation::softmax(masked, 1);

        // weighted sum over the original, unprojected context
        let weighted = weights
            .clone()
            .reshape([batch, 1, steps])
            .matmul(ctx.clone())
            .reshape([batch, ctx_size]);
        (weights, weighted)
    }
}
