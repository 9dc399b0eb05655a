// ============================================================
// Layer 6 - Pretrained Model Store
// ============================================================
// Reads a locally downloaded GPT-2 checkpoint in HuggingFace
// layout:
//
//   models/gpt2/
//     config.json          ← architecture hyperparameters
//     tokenizer.json       ← byte-level BPE tokenizer
//     pytorch_model.bin    ← transformer weights
//
// Only the transformer body is imported. The classification
// head always starts from a fresh initialisation.
//
// Weight names are remapped onto Gpt2Model's fields:
//
//   transformer.h.3.attn.c_attn.weight → blocks.3.attn.c_attn.weight
//   h.3.ln_1.weight                    → blocks.3.ln_1.gamma
//
// GPT-2 stores its projections as Conv1D, whose weight is already
// [in, out]. The PyTorch importer transposes every Linear weight
// as if it came from nn.Linear, so those are flipped back after
// loading.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use burn::{
    module::Param,
    nn::Linear,
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use serde::Deserialize;

use crate::ml::model::{Block, Gpt2Config, Gpt2Model, Gpt2ModelRecord};

const CONFIG_FILE:  &str = "config.json";
const WEIGHTS_FILE: &str = "pytorch_model.bin";

/// The subset of HuggingFace's GPT-2 `config.json` the model needs.
/// Missing keys fall back to the published `gpt2` values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PretrainedConfig {
    #[serde(default = "defaults::vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "defaults::n_positions")]
    pub n_positions: usize,
    #[serde(default = "defaults::n_embd")]
    pub n_embd: usize,
    #[serde(default = "defaults::n_layer")]
    pub n_layer: usize,
    #[serde(default = "defaults::n_head")]
    pub n_head: usize,
    #[serde(default = "defaults::layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
    #[serde(default = "defaults::resid_pdrop")]
    pub resid_pdrop: f64,
    #[serde(default = "defaults::eos_token_id")]
    pub eos_token_id: u32,
}

mod defaults {
    pub fn vocab_size() -> usize { 50257 }
    pub fn n_positions() -> usize { 1024 }
    pub fn n_embd() -> usize { 768 }
    pub fn n_layer() -> usize { 12 }
    pub fn n_head() -> usize { 12 }
    pub fn layer_norm_epsilon() -> f64 { 1e-5 }
    pub fn resid_pdrop() -> f64 { 0.1 }
    pub fn eos_token_id() -> u32 { 50256 }
}

impl PretrainedConfig {
    pub fn to_model_config(&self, num_labels: usize) -> Gpt2Config {
        Gpt2Config::new(
            self.vocab_size,
            self.n_positions,
            self.n_embd,
            self.n_layer,
            self.n_head,
            num_labels,
        )
        .with_layer_norm_epsilon(self.layer_norm_epsilon)
        .with_dropout(self.resid_pdrop)
    }
}

pub struct PretrainedStore {
    dir: PathBuf,
}

impl PretrainedStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn load_config(&self) -> Result<PretrainedConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        let cfg: PretrainedConfig = serde_json::from_str(&json)
            .with_context(|| format!("Malformed model config '{}'", path.display()))?;

        if cfg.n_head == 0 || cfg.n_embd % cfg.n_head != 0 {
            anyhow::bail!(
                "n_embd ({}) must be a positive multiple of n_head ({})",
                cfg.n_embd, cfg.n_head
            );
        }
        Ok(cfg)
    }

    /// Build the transformer body described by `cfg` and fill it with
    /// the pretrained weights.
    pub fn load_body<B: Backend>(&self, cfg: &Gpt2Config, device: &B::Device) -> Result<Gpt2Model<B>> {
        let path = self.dir.join(WEIGHTS_FILE);
        if !path.exists() {
            anyhow::bail!("Pretrained weights not found at '{}'", path.display());
        }

        let args = LoadArgs::new(path.clone())
            .with_key_remap(r"^transformer\.(.*)", "$1")
            .with_key_remap(r"^h\.([0-9]+)\.(.*)", "blocks.$1.$2");

        let record: Gpt2ModelRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
            .load(args, device)
            .with_context(|| format!("Cannot import weights from '{}'", path.display()))?;

        let body = cfg.init_body::<B>(device).load_record(record);
        tracing::info!(
            "Imported pretrained GPT-2 body from '{}' ({} layers, {} dims)",
            path.display(), cfg.n_layer, cfg.n_embd
        );
        Ok(restore_conv1d_layout(body))
    }
}

fn restore_conv1d_layout<B: Backend>(mut body: Gpt2Model<B>) -> Gpt2Model<B> {
    body.blocks = body.blocks.into_iter().map(restore_block).collect();
    body
}

fn restore_block<B: Backend>(mut block: Block<B>) -> Block<B> {
    block.attn.c_attn = transpose_weight(block.attn.c_attn);
    block.attn.c_proj = transpose_weight(block.attn.c_proj);
    block.mlp.c_fc    = transpose_weight(block.mlp.c_fc);
    block.mlp.c_proj  = transpose_weight(block.mlp.c_proj);
    block
}

// The loaded weight is already a tracked leaf on autodiff backends,
// so it is detached before the transposed copy becomes a new leaf.
fn transpose_weight<B: Backend>(mut linear: Linear<B>) -> Linear<B> {
    linear.weight = Param::from_tensor(linear.weight.val().detach().transpose());
    linear
}
