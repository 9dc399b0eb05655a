// ============================================================
// Layer 5 - Inferencer
// ============================================================
// Rebuilds a fine-tuned classifier from its checkpoint directory
// and scores new texts. Runs on a plain (non-autodiff) backend,
// so dropout is inactive.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use burn::prelude::*;

use crate::data::batcher::MbtiBatcher;
use crate::infra::{
    checkpoint::{CheckpointManager, ClassifierMeta},
    tokenizer_store::TokenizerStore,
};
use crate::ml::model::Gpt2Classifier;

pub struct Inferencer<B: Backend> {
    model:   Gpt2Classifier<B>,
    batcher: MbtiBatcher<B>,
    meta:    ClassifierMeta,
}

impl<B: Backend> Inferencer<B> {
    pub fn from_checkpoint(ckpt: &CheckpointManager, device: &B::Device) -> Result<Self> {
        let model_cfg = ckpt.load_model_config()?;
        let meta      = ckpt.load_meta()?;
        let tokenizer = TokenizerStore::new(ckpt.dir()).load()?;

        let model = ckpt.load_model(model_cfg.init::<B>(device), device)?;
        let batcher = MbtiBatcher::new(
            Arc::new(tokenizer),
            meta.pad_token_id,
            meta.max_seq_len,
            device.clone(),
        );

        tracing::info!("Classifier loaded ({} classes)", meta.label_names.len());
        Ok(Self { model, batcher, meta })
    }

    #[cfg(test)]
    pub fn from_parts(model: Gpt2Classifier<B>, batcher: MbtiBatcher<B>, meta: ClassifierMeta) -> Self {
        Self { model, batcher, meta }
    }

    pub fn label_names(&self) -> &[String] {
        &self.meta.label_names
    }

    /// Most likely class of `text` and its probability.
    pub fn predict(&self, text: &str) -> Result<(usize, f32)> {
        self.predict_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Model returned no prediction"))
    }

    /// (class, probability) for every text, in input order.
    pub fn predict_batch(&self, texts: &[&str]) -> Result<Vec<(usize, f32)>> {
        let encoded = self.batcher.encode_texts(texts)?;
        let probs   = self
            .model
            .probabilities(encoded.input_ids, encoded.attention_mask, encoded.position_ids);
        let [_, num_labels] = probs.dims();

        let values = probs
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read probabilities: {e:?}"))?;

        let best = values
            .chunks(num_labels)
            .map(|row| {
                row.iter()
                    .copied()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best })
            })
            .collect::<Vec<_>>();

        for (text, (label, p)) in texts.iter().zip(&best) {
            tracing::debug!("'{}' → class {} (p={:.4})", text, label, p);
        }
        Ok(best)
    }
}
