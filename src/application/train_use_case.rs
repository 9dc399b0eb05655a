// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates a fine-tuning run in order:
//
//   Step 1: Load the labelled CSV          (Layer 4 - data)
//   Step 2: Split train/validation         (Layer 4 - data)
//   Step 3: Load tokenizer + model config  (Layer 6 - infra)
//   Step 4: Check they fit together        (here)
//   Step 5: Write checkpoint artifacts     (Layer 6 - infra)
//   Step 6: Pick the backend, build the
//           model and run `fit`            (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use std::sync::Arc;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::CollateConfig,
    dataset::MbtiDataset,
    loader::CsvRecordSource,
    splitter::{shuffle_then_split, split_train_val},
};
use crate::domain::{record::MbtiRecord, traits::RecordSource};
use crate::infra::{
    checkpoint::{CheckpointManager, ClassifierMeta},
    metrics::{History, MetricsLogger},
    pretrained::PretrainedStore,
    tokenizer_store::{pad_token_id, TokenizerStore},
};
use crate::ml::{
    model::{Gpt2Classifier, Gpt2Config},
    trainer::{fit, FitSettings},
};

/// Which Burn backend runs the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// GPU through wgpu
    Wgpu,
    /// CPU through ndarray
    NdArray,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Saved next to the checkpoints so a run can
// be inspected or repeated later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub csv_path:       String,
    pub model_dir:      String,
    pub checkpoint_dir: Option<String>,
    pub max_seq_len:    usize,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub lr:             f64,
    pub adam_epsilon:   f64,
    pub weight_decay:   f64,
    pub warmup_steps:   usize,
    pub max_grad_norm:  f64,
    pub train_fraction: f64,
    pub num_labels:     usize,
    pub seed:           u64,
    /// Shuffle rows with `seed` before splitting
    pub shuffle_split:  bool,
    /// Skip the pretrained weights and start from random ones
    pub random_init:    bool,
    pub num_workers:    usize,
    pub backend:        BackendKind,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            csv_path:       "datasets/mbti_processed.csv".to_string(),
            model_dir:      "models/gpt2".to_string(),
            checkpoint_dir: None,
            max_seq_len:    128,
            batch_size:     32,
            epochs:         4,
            lr:             5e-5,
            adam_epsilon:   1e-8,
            weight_decay:   0.0,
            warmup_steps:   0,
            max_grad_norm:  1.0,
            train_fraction: 0.9,
            num_labels:     16,
            seed:           42,
            shuffle_split:  false,
            random_init:    false,
            num_workers:    1,
            backend:        BackendKind::Wgpu,
        }
    }
}

impl TrainConfig {
    fn fit_settings(&self) -> FitSettings {
        FitSettings {
            epochs:        self.epochs,
            batch_size:    self.batch_size,
            learning_rate: self.lr,
            adam_epsilon:  self.adam_epsilon,
            weight_decay:  self.weight_decay,
            warmup_steps:  self.warmup_steps,
            max_grad_norm: self.max_grad_norm,
            seed:          self.seed,
            num_workers:   self.num_workers,
        }
    }
}

/// Everything the backend-specific part of a run needs.
struct PreparedRun {
    train:       Vec<MbtiRecord>,
    valid:       Vec<MbtiRecord>,
    collate:     CollateConfig,
    model_cfg:   Gpt2Config,
    checkpoints: Option<CheckpointManager>,
    metrics:     Option<MetricsLogger>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the whole pipeline and return the per-epoch history.
    pub fn execute(&self) -> Result<History> {
        let run = self.prepare()?;

        match self.config.backend {
            BackendKind::Wgpu => {
                let device = WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                self.train_on::<Autodiff<Wgpu>>(run, device)
            }
            BackendKind::NdArray => {
                let device = NdArrayDevice::default();
                tracing::info!("Using NdArray device: {:?}", device);
                self.train_on::<Autodiff<NdArray>>(run, device)
            }
        }
    }

    fn prepare(&self) -> Result<PreparedRun> {
        let cfg = &self.config;

        // ── Step 1: Load records ──────────────────────────────────────────────
        let corpus = CsvRecordSource::new(&cfg.csv_path, cfg.num_labels).load_all()?;
        let label_names = corpus.label_names.clone();

        // ── Step 2: Split ─────────────────────────────────────────────────────
        let (train, valid) = if cfg.shuffle_split {
            shuffle_then_split(corpus.records, cfg.train_fraction, cfg.seed)
        } else {
            split_train_val(corpus.records, cfg.train_fraction)
        };
        tracing::info!("Split: {} train, {} validation", train.len(), valid.len());

        // ── Step 3: Tokenizer + architecture ──────────────────────────────────
        let tokenizer  = TokenizerStore::new(&cfg.model_dir).load()?;
        let pretrained = PretrainedStore::new(&cfg.model_dir).load_config()?;
        let model_cfg  = pretrained.to_model_config(cfg.num_labels);
        let pad_id     = pad_token_id(&tokenizer, pretrained.eos_token_id);

        // ── Step 4: Consistency checks ────────────────────────────────────────
        let vocab = tokenizer.get_vocab_size(true);
        if vocab > model_cfg.vocab_size {
            bail!(
                "Tokenizer has {} tokens but the model only embeds {}",
                vocab, model_cfg.vocab_size
            );
        }
        if cfg.max_seq_len == 0 || cfg.max_seq_len > model_cfg.n_positions {
            bail!(
                "max_seq_len must be in 1..={} (model positions), got {}",
                model_cfg.n_positions, cfg.max_seq_len
            );
        }

        // ── Step 5: Checkpoint artifacts ──────────────────────────────────────
        let (checkpoints, metrics) = match &cfg.checkpoint_dir {
            Some(dir) => {
                let ckpt = CheckpointManager::new(dir)?;
                ckpt.save_config(cfg)?;
                ckpt.save_model_config(&model_cfg)?;
                ckpt.save_meta(&ClassifierMeta {
                    label_names,
                    pad_token_id: pad_id,
                    max_seq_len:  cfg.max_seq_len,
                })?;
                TokenizerStore::new(dir).save(&tokenizer)?;
                let logger = MetricsLogger::new(dir)?;
                tracing::info!("Epoch metrics go to '{}'", logger.csv_path().display());
                (Some(ckpt), Some(logger))
            }
            None => (None, None),
        };

        let collate = CollateConfig {
            tokenizer:    Arc::new(tokenizer),
            pad_token_id: pad_id,
            max_seq_len:  cfg.max_seq_len,
        };

        Ok(PreparedRun { train, valid, collate, model_cfg, checkpoints, metrics })
    }

    // ── Step 6: Model + training loop ─────────────────────────────────────────
    fn train_on<B: AutodiffBackend>(&self, run: PreparedRun, device: B::Device) -> Result<History> {
        let model: Gpt2Classifier<B> = if self.config.random_init {
            tracing::warn!("Starting from random weights (--random-init)");
            run.model_cfg.init(&device)
        } else {
            let body = PretrainedStore::new(&self.config.model_dir)
                .load_body::<B>(&run.model_cfg, &device)?;
            run.model_cfg.with_body(body, &device)
        };
        tracing::info!(
            "Model ready: {} layers, {} dims, {} labels",
            run.model_cfg.n_layer, run.model_cfg.n_embd, run.model_cfg.num_labels
        );

        let (_, history) = fit(
            model,
            MbtiDataset::new(run.train),
            MbtiDataset::new(run.valid),
            &run.collate,
            &self.config.fit_settings(),
            &device,
            run.checkpoints.as_ref(),
            run.metrics.as_ref(),
        )?;
        Ok(history)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infra::tokenizer_store::word_level_tokenizer;
    use std::{fs, path::Path};

    const WORDS: [&str; 8] = ["i", "love", "plans", "parties", "ideas", "quiet", "people", "facts"];

    /// A tiny model dir (config.json + tokenizer.json) and a CSV of
    /// `rows` posts over four types.
    pub(crate) fn write_fixture(root: &Path, rows: usize) -> TrainConfig {
        let model_dir = root.join("model");
        fs::create_dir_all(&model_dir).unwrap();
        fs::write(
            model_dir.join("config.json"),
            r#"{"vocab_size": 16, "n_positions": 16, "n_embd": 8, "n_layer": 1,
                "n_head": 2, "resid_pdrop": 0.0, "eos_token_id": 0}"#,
        )
        .unwrap();
        TokenizerStore::new(&model_dir)
            .save(&word_level_tokenizer(&WORDS).unwrap())
            .unwrap();

        let types = ["INTJ", "ENFP", "ISTP", "ESFJ"];
        let mut csv = String::from("post,type\n");
        for i in 0..rows {
            csv.push_str(&format!(
                "{} {} {},{}\n",
                WORDS[i % 8], WORDS[(i + 3) % 8], WORDS[(i * 5) % 8], types[i % 4]
            ));
        }
        let csv_path = root.join("mbti.csv");
        fs::write(&csv_path, csv).unwrap();

        TrainConfig {
            csv_path:       csv_path.display().to_string(),
            model_dir:      model_dir.display().to_string(),
            checkpoint_dir: Some(root.join("ckpt").display().to_string()),
            max_seq_len:    16,
            batch_size:     4,
            epochs:         2,
            lr:             1e-3,
            num_labels:     4,
            random_init:    true,
            backend:        BackendKind::NdArray,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_execute_end_to_end_on_cpu() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = write_fixture(dir.path(), 20);

        let history = TrainUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(history.epochs(), 2);

        let ckpt = CheckpointManager::open(dir.path().join("ckpt"));
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);
        let meta = ckpt.load_meta().unwrap();
        assert_eq!(meta.label_names, vec!["ENFP", "ESFJ", "INTJ", "ISTP"]);
        assert_eq!(ckpt.load_config().unwrap().epochs, 2);
        assert!(dir.path().join("ckpt").join("tokenizer.json").exists());
    }

    #[test]
    fn test_sequence_longer_than_model_positions_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { max_seq_len: 128, ..write_fixture(dir.path(), 8) };
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_too_few_rows_for_validation_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // floor(0.9 * 1) = 0 train rows
        let cfg = write_fixture(dir.path(), 1);
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_config_round_trips_as_json() {
        let cfg  = TrainConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"backend\":\"wgpu\""));
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.batch_size, 32);
        assert_eq!(back.backend, BackendKind::Wgpu);
    }
}
