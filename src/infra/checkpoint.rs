// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores everything `predict` needs to rebuild a
// trained classifier, all inside one directory:
//
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     model_epoch_2.mpk.gz   ← weights after epoch 2
//     ...
//     latest_epoch.json      ← number of the newest epoch on disk
//     model_config.json      ← Gpt2Config (architecture + num_labels)
//     classifier.json        ← label names, pad id, max sequence length
//     train_config.json      ← the settings the run was started with
//     tokenizer.json         ← written by TokenizerStore
//
// Weights go through Burn's named MessagePack + gzip recorder at
// full precision, so a reload gives back the exact f32 values.
// Loading fails if the record does not match the architecture
// rebuilt from model_config.json.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::{Gpt2Classifier, Gpt2Config};

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const MODEL_CONFIG_FILE: &str = "model_config.json";
const CLASSIFIER_FILE:   &str = "classifier.json";
const TRAIN_CONFIG_FILE: &str = "train_config.json";

/// What inference needs besides weights and tokenizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierMeta {
    /// Index i is the name of class i
    pub label_names:  Vec<String>,
    pub pad_token_id: u32,
    pub max_seq_len:  usize,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating it.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn recorder() -> NamedMpkGzFileRecorder<FullPrecisionSettings> {
        NamedMpkGzFileRecorder::<FullPrecisionSettings>::new()
    }

    /// Write `{dir}/model_epoch_{epoch}.mpk.gz` and point
    /// `latest_epoch.json` at it.
    pub fn save_model<B: Backend>(&self, model: &Gpt2Classifier<B>, epoch: usize) -> Result<()> {
        // The recorder adds the extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        Self::recorder()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        self.write_json(LATEST_EPOCH_FILE, &epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the newest epoch's weights into `model`, whose
    /// architecture must match the one that was saved.
    pub fn load_model<B: Backend>(
        &self,
        model:  Gpt2Classifier<B>,
        device: &B::Device,
    ) -> Result<Gpt2Classifier<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = Self::recorder()
            .load(path.clone(), device)
            .with_context(|| format!(
                "Cannot load checkpoint '{}'. Have you trained the model first?",
                path.display()
            ))?;

        Ok(model.load_record(record))
    }

    pub fn save_model_config(&self, cfg: &Gpt2Config) -> Result<()> {
        self.write_json(MODEL_CONFIG_FILE, cfg)
    }

    pub fn load_model_config(&self) -> Result<Gpt2Config> {
        self.read_json(MODEL_CONFIG_FILE)
    }

    pub fn save_meta(&self, meta: &ClassifierMeta) -> Result<()> {
        self.write_json(CLASSIFIER_FILE, meta)
    }

    pub fn load_meta(&self) -> Result<ClassifierMeta> {
        self.read_json(CLASSIFIER_FILE)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json(TRAIN_CONFIG_FILE, cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        self.read_json(TRAIN_CONFIG_FILE)
    }

    /// Number of the newest epoch saved, from `latest_epoch.json`.
    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_json(LATEST_EPOCH_FILE)
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path)
            .with_context(|| format!(
                "Cannot read '{}'. Make sure you have run 'train' before 'predict'.",
                path.display()
            ))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed JSON in '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> Gpt2Config {
        Gpt2Config::new(12, 16, 8, 1, 2, 3).with_dropout(0.0)
    }

    #[test]
    fn test_model_round_trips_through_disk() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();
        let cfg    = tiny_config();

        let model = cfg.init::<TestBackend>(&device);
        ckpt.save_model(&model, 1).unwrap();
        ckpt.save_model(&model, 2).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        // A second, differently initialised model takes on the saved weights
        let fresh    = cfg.init::<TestBackend>(&device);
        let restored = ckpt.load_model(fresh, &device).unwrap();

        let saved  = model.score.weight.val().into_data().to_vec::<f32>().unwrap();
        let loaded = restored.score.weight.val().into_data().to_vec::<f32>().unwrap();
        // Bit-exact, not just close
        assert_eq!(saved, loaded);

        let saved  = model.transformer.blocks[0].attn.c_attn.weight.val().into_data().to_vec::<f32>().unwrap();
        let loaded = restored.transformer.blocks[0].attn.c_attn.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(saved, loaded);
    }

    #[test]
    fn test_model_config_and_meta_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        ckpt.save_model_config(&tiny_config()).unwrap();
        let cfg = ckpt.load_model_config().unwrap();
        assert_eq!(cfg.num_labels, 3);
        assert_eq!(cfg.n_embd, 8);

        let meta = ClassifierMeta {
            label_names:  vec!["ENFP".into(), "INTJ".into(), "ISTP".into()],
            pad_token_id: 0,
            max_seq_len:  16,
        };
        ckpt.save_meta(&meta).unwrap();
        assert_eq!(ckpt.load_meta().unwrap(), meta);
    }

    #[test]
    fn test_loading_before_training_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::open(dir.path());
        assert!(ckpt.latest_epoch().is_err());
        assert!(ckpt.load_meta().is_err());
    }
}
