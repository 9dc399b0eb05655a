// ============================================================
// Layer 2 - PredictUseCase
// ============================================================
// Loads a fine-tuned checkpoint once and classifies texts with it.

use anyhow::Result;
use burn::prelude::*;

use crate::domain::{labels::label_name, traits::TextClassifier};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::Inferencer;

pub struct PredictUseCase<B: Backend> {
    inferencer: Inferencer<B>,
}

impl<B: Backend> PredictUseCase<B> {
    pub fn new(checkpoint_dir: &str, device: &B::Device) -> Result<Self> {
        let ckpt       = CheckpointManager::open(checkpoint_dir);
        let inferencer = Inferencer::from_checkpoint(&ckpt, device)?;
        Ok(Self { inferencer })
    }
}

impl<B: Backend> TextClassifier for PredictUseCase<B> {
    fn classify(&self, text: &str) -> Result<(String, f32)> {
        let (label, prob) = self.inferencer.predict(text)?;
        Ok((label_name(self.inferencer.label_names(), label), prob))
    }
}
