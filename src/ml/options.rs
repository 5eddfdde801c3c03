// ============================================================
// Layer 5 — Model Options
// ============================================================
// Every hyperparameter of the translation model, with the
// defaults the rest of the crate assumes. Options usually come
// in as JSON (train --model-config); keys that are not
// recognised are warned about and dropped rather than rejected,
// so option files can be shared across model variants.
//

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use burn::tensor::{activation, backend::Backend, Tensor};

use crate::domain::direction::Direction;

/// Recurrent cell family for the encoder or decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RnnKind {
    Gru,
    Lstm,
}

/// Attention score function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionKind {
    Mlp,
    Dot,
}

/// How the decoder's initial hidden state is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderInit {
    /// All-zero initial state
    Zero,
    /// Masked mean of the encoder context, projected to dec_dim
    MeanCtx,
}

/// Inner dimension attention scores are computed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionBottleneck {
    /// The context size (2 * enc_dim)
    Ctx,
    /// The decoder hidden size
    Hid,
}

/// Embedding tying scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TiedEmbeddings {
    /// Independent tables and output projection
    #[serde(rename = "off")]
    Off,
    /// Decoder embedding doubles as the output projection
    #[serde(rename = "2way")]
    TwoWay,
    /// As 2way, and the encoder shares the same table
    #[serde(rename = "3way")]
    ThreeWay,
}

/// Element-wise nonlinearity selectable from option files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nonlinearity {
    Tanh,
    Sigmoid,
    Relu,
    /// Identity, for disabling an activation from config
    Linear,
}

impl Nonlinearity {
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Self::Tanh => activation::tanh(x),
            Self::Sigmoid => activation::sigmoid(x),
            Self::Relu => activation::relu(x),
            Self::Linear => x,
        }
    }
}

/// The full hyperparameter set of the translation model.
///
/// Deserializing fills missing keys from `Default`, so a JSON
/// file only needs the values it wants to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Source/target embedding size
    pub emb_dim: usize,
    /// Encoder hidden size, per direction
    pub enc_dim: usize,
    /// Encoder cell kind
    pub enc_type: RnnKind,
    /// Number of stacked bidirectional encoder layers
    pub n_encoders: usize,
    /// Decoder hidden size
    pub dec_dim: usize,
    /// Decoder cell kind
    pub dec_type: RnnKind,
    /// Decoder initial-state scheme
    pub dec_init: DecoderInit,
    /// Nonlinearity on the mean_ctx init projection
    pub dec_init_activ: Nonlinearity,
    /// Attention score function
    pub att_type: AttentionKind,
    /// Attention temperature; scores are divided by it
    pub att_temp: f64,
    /// Nonlinearity inside MLP attention
    pub att_activ: Nonlinearity,
    /// Bias on the MLP attention score layer
    pub att_mlp_bias: bool,
    /// Attention bottleneck dimension selector
    pub att_bottleneck: AttentionBottleneck,
    /// Project context vectors before scoring
    pub att_transform_ctx: bool,
    /// Feed concat(pre-attention output, context) to the
    /// post-attention stack instead of the context alone
    pub concat_outputs: bool,
    /// Decoder layers before attention
    pub n_layers_preatt: usize,
    /// Decoder layers after attention
    pub n_layers_postatt: usize,
    /// Dropout on encoder embeddings
    pub dropout_emb: f64,
    /// Dropout on the encoder context sequence
    pub dropout_ctx: f64,
    /// Dropout before the output projection
    pub dropout_out: f64,
    /// Dropout between stacked encoder layers
    pub dropout_enc: f64,
    /// Dropout between stacked decoder layers
    pub dropout_dec: f64,
    /// Embedding tying scheme
    pub tied_emb: TiedEmbeddings,
    /// Longest training sentence kept, measured on `bucket_by`
    pub max_len: usize,
    /// Language whose length filters and buckets training data
    pub bucket_by: Option<String>,
    /// Catch-all for unrecognised keys; drained with a warning
    #[serde(flatten)]
    pub(crate) unknown: HashMap<String, serde_json::Value>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            emb_dim: 128,
            enc_dim: 256,
            enc_type: RnnKind::Gru,
            n_encoders: 1,
            dec_dim: 256,
            dec_type: RnnKind::Gru,
            dec_init: DecoderInit::MeanCtx,
            dec_init_activ: Nonlinearity::Tanh,
            att_type: AttentionKind::Mlp,
            att_temp: 1.0,
            att_activ: Nonlinearity::Tanh,
            att_mlp_bias: false,
            att_bottleneck: AttentionBottleneck::Ctx,
            att_transform_ctx: true,
            concat_outputs: true,
            n_layers_preatt: 1,
            n_layers_postatt: 1,
            dropout_emb: 0.0,
            dropout_ctx: 0.0,
            dropout_out: 0.0,
            dropout_enc: 0.0,
            dropout_dec: 0.0,
            tied_emb: TiedEmbeddings::Off,
            max_len: 80,
            bucket_by: None,
            unknown: HashMap::new(),
        }
    }
}

impl ModelOptions {
    /// Parse options from a JSON object, warning about (and
    /// dropping) keys this model does not know.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut opts: Self =
            serde_json::from_str(json).map_err(|e| anyhow::anyhow!("parsing model options: {e}"))?;
        opts.warn_unknown();
        Ok(opts)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading model options '{}': {e}", path.display()))?;
        Self::from_json_str(&json)
    }

    fn warn_unknown(&mut self) {
        for key in self.unknown.keys() {
            tracing::warn!("unused model option: {key}");
        }
        self.unknown.clear();
    }

    /// Context feature size: forward and backward encoder states
    /// concatenated.
    pub fn ctx_size(&self) -> usize {
        self.enc_dim * 2
    }

    /// Dimension attention scores are computed in.
    pub fn bottleneck_size(&self) -> usize {
        match self.att_bottleneck {
            AttentionBottleneck::Ctx => self.ctx_size(),
            AttentionBottleneck::Hid => self.dec_dim,
        }
    }

    /// Input width of the post-attention decoder stack.
    pub fn post_input_size(&self) -> usize {
        if self.concat_outputs {
            self.dec_dim + self.ctx_size()
        } else {
            self.ctx_size()
        }
    }

    /// True under any embedding tying scheme.
    pub fn tied(&self) -> bool {
        !matches!(self.tied_emb, TiedEmbeddings::Off)
    }

    /// Check every cross-field constraint against the run's
    /// direction and vocabulary sizes.
    pub fn validate(
        &self,
        direction: &Direction,
        n_src_vocab: usize,
        n_trg_vocab: usize,
    ) -> Result<()> {
        for (name, value) in [
            ("emb_dim", self.emb_dim),
            ("enc_dim", self.enc_dim),
            ("dec_dim", self.dec_dim),
            ("n_encoders", self.n_encoders),
            ("n_layers_preatt", self.n_layers_preatt),
            ("n_layers_postatt", self.n_layers_postatt),
            ("max_len", self.max_len),
        ] {
            ensure!(value >= 1, "{name} must be at least 1, got {value}");
        }
        for (name, value) in [
            ("dropout_emb", self.dropout_emb),
            ("dropout_ctx", self.dropout_ctx),
            ("dropout_out", self.dropout_out),
            ("dropout_enc", self.dropout_enc),
            ("dropout_dec", self.dropout_dec),
        ] {
            ensure!(
                (0.0..1.0).contains(&value),
                "{name} must be in [0, 1), got {value}"
            );
        }
        ensure!(self.att_temp > 0.0, "att_temp must be positive, got {}", self.att_temp);

        if matches!(self.tied_emb, TiedEmbeddings::ThreeWay) && n_src_vocab != n_trg_vocab {
            bail!(
                "the vocabulary sizes do not match for 3way tied embeddings \
                 ({n_src_vocab} source vs {n_trg_vocab} target)"
            );
        }

        if !self.att_transform_ctx && self.bottleneck_size() != self.ctx_size() {
            bail!(
                "att_transform_ctx=false requires the attention bottleneck to equal \
                 the context size {} but att_bottleneck=hid gives {}",
                self.ctx_size(),
                self.bottleneck_size()
            );
        }

        if let Some(lang) = &self.bucket_by {
            ensure!(
                direction.contains(lang),
                "bucket_by language '{lang}' is not part of direction '{direction}'"
            );
        }

        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn direction() -> Direction {
        Direction::new("en", "de")
    }

    #[test]
    fn test_defaults() {
        let opts = ModelOptions::default();
        assert_eq!(opts.emb_dim, 128);
        assert_eq!(opts.enc_dim, 256);
        assert_eq!(opts.enc_type, RnnKind::Gru);
        assert_eq!(opts.dec_init, DecoderInit::MeanCtx);
        assert_eq!(opts.att_type, AttentionKind::Mlp);
        assert_eq!(opts.tied_emb, TiedEmbeddings::Off);
        assert_eq!(opts.max_len, 80);
        assert!(opts.att_transform_ctx);
        assert!(opts.concat_outputs);
    }

    #[test]
    fn test_ctx_size_is_twice_enc_dim() {
        let opts = ModelOptions {
            enc_dim: 100,
            ..Default::default()
        };
        assert_eq!(opts.ctx_size(), 200);
    }

    #[test]
    fn test_overlay_keeps_defaults_for_missing_keys() {
        let opts = ModelOptions::from_json_str(r#"{"emb_dim": 64, "enc_type": "lstm"}"#).unwrap();
        assert_eq!(opts.emb_dim, 64);
        assert_eq!(opts.enc_type, RnnKind::Lstm);
        assert_eq!(opts.dec_dim, 256);
    }

    #[test]
    fn test_unknown_keys_are_dropped() {
        let opts =
            ModelOptions::from_json_str(r#"{"emb_dim": 32, "emb_maxnorm": 5.0}"#).unwrap();
        assert_eq!(opts.emb_dim, 32);
        assert!(opts.unknown.is_empty());
    }

    #[test]
    fn test_wrong_typed_value_is_an_error() {
        assert!(ModelOptions::from_json_str(r#"{"emb_dim": "big"}"#).is_err());
    }

    #[test]
    fn test_tied_emb_wire_forms() {
        let opts = ModelOptions::from_json_str(r#"{"tied_emb": "2way"}"#).unwrap();
        assert_eq!(opts.tied_emb, TiedEmbeddings::TwoWay);
        let opts = ModelOptions::from_json_str(r#"{"tied_emb": "3way"}"#).unwrap();
        assert_eq!(opts.tied_emb, TiedEmbeddings::ThreeWay);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(ModelOptions::default().validate(&direction(), 100, 120).is_ok());
    }

    #[test]
    fn test_three_way_requires_matching_vocabs() {
        let opts = ModelOptions {
            tied_emb: TiedEmbeddings::ThreeWay,
            ..Default::default()
        };
        assert!(opts.validate(&direction(), 100, 120).is_err());
        assert!(opts.validate(&direction(), 100, 100).is_ok());
    }

    #[test]
    fn test_untransformed_ctx_needs_matching_bottleneck() {
        let opts = ModelOptions {
            att_transform_ctx: false,
            att_bottleneck: AttentionBottleneck::Hid,
            enc_dim: 256,
            dec_dim: 256,
            ..Default::default()
        };
        // dec_dim 256 != ctx 512
        assert!(opts.validate(&direction(), 10, 10).is_err());

        let opts = ModelOptions {
            att_transform_ctx: false,
            att_bottleneck: AttentionBottleneck::Ctx,
            ..Default::default()
        };
        assert!(opts.validate(&direction(), 10, 10).is_ok());
    }

    #[test]
    fn test_bucket_by_must_name_a_side() {
        let opts = ModelOptions {
            bucket_by: Some("fr".into()),
            ..Default::default()
        };
        assert!(opts.validate(&direction(), 10, 10).is_err());

        let opts = ModelOptions {
            bucket_by: Some("en".into()),
            ..Default::default()
        };
        assert!(opts.validate(&direction(), 10, 10).is_ok());
    }

    #[test]
    fn test_dropout_range_checked() {
        let opts = ModelOptions {
            dropout_enc: 1.0,
            ..Default::default()
        };
        assert!(opts.validate(&direction(), 10, 10).is_err());
    }
}
