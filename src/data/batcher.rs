// ============================================================
// Layer 4 — Translation Batcher
// ============================================================
// Collates samples into device tensors. Each side pads to ITS
// batch maximum with <pad> (id 0); the source also gets a
// float mask (1 real / 0 pad) that the encoder and attention
// both consume. The target needs no mask: the loss ignores
// <pad> by id.
//

use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Int, Tensor},
};

use crate::data::dataset::TranslationSample;
use crate::infra::vocab_store::PAD_ID;

#[derive(Clone)]
pub struct TranslationBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TranslationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// One collated batch on the device.
#[derive(Debug, Clone)]
pub struct TranslationBatch<B: Backend> {
    /// [batch, src_len]
    pub src_tokens: Tensor<B, 2, Int>,
    /// [batch, src_len], 1.0 on real tokens
    pub src_mask: Tensor<B, 2>,
    /// [batch, trg_len], <bos> ... <eos> <pad>*
    pub trg_tokens: Tensor<B, 2, Int>,
}

impl<B: Backend> Batcher<TranslationSample, TranslationBatch<B>> for TranslationBatcher<B> {
    fn batch(&self, items: Vec<TranslationSample>) -> TranslationBatch<B> {
        let batch_size = items.len();
        let src_len = items.iter().map(|s| s.src_ids.len()).max().unwrap_or(1);
        let trg_len = items.iter().map(|s| s.trg_ids.len()).max().unwrap_or(2);

        let mut src_flat = Vec::with_capacity(batch_size * src_len);
        let mut mask_flat = Vec::with_capacity(batch_size * src_len);
        let mut trg_flat = Vec::with_capacity(batch_size * trg_len);
        for item in &items {
            for t in 0..src_len {
                match item.src_ids.get(t) {
                    Some(&id) => {
                        src_flat.push(id as i32);
                        mask_flat.push(1.0f32);
                    }
                    None => {
                        src_flat.push(PAD_ID as i32);
                        mask_flat.push(0.0);
                    }
                }
            }
            for t in 0..trg_len {
                trg_flat.push(item.trg_ids.get(t).map_or(PAD_ID as i32, |&id| id as i32));
            }
        }

        TranslationBatch {
            src_tokens: Tensor::<B, 1, Int>::from_ints(src_flat.as_slice(), &self.device)
                .reshape([batch_size, src_len]),
            src_mask: Tensor::<B, 1>::from_floats(mask_flat.as_slice(), &self.device)
                .reshape([batch_size, src_len]),
            trg_tokens: Tensor::<B, 1, Int>::from_ints(trg_flat.as_slice(), &self.device)
                .reshape([batch_size, trg_len]),
        }
    }
}
