// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `predict`, and all
// their flags. Defaults reproduce the reference fine-tuning run.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use crate::application::train_use_case::{BackendKind, TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune GPT-2 on the MBTI CSV
    Train(TrainArgs),

    /// Classify a text with a fine-tuned checkpoint
    Predict(PredictArgs),
}

/// Burn backend selectable on the command line
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BackendArg {
    Wgpu,
    Ndarray,
}

impl From<BackendArg> for BackendKind {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Wgpu    => BackendKind::Wgpu,
            BackendArg::Ndarray => BackendKind::NdArray,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// CSV with a `post` column and `type` and/or `encoded_type`
    #[arg(long, default_value = "datasets/mbti_processed.csv")]
    pub csv: String,

    /// Directory holding config.json, tokenizer.json and pytorch_model.bin
    #[arg(long, default_value = "models/gpt2")]
    pub model_dir: String,

    /// Where to write weights, configs and metrics.csv (nothing saved if unset)
    #[arg(long)]
    pub checkpoint_dir: Option<String>,

    /// Tokens kept per text; longer texts lose their tail
    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 4)]
    pub epochs: usize,

    /// Peak learning rate
    #[arg(long, default_value_t = 5e-5)]
    pub lr: f64,

    #[arg(long, default_value_t = 1e-8)]
    pub adam_epsilon: f64,

    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f64,

    /// Optimizer steps spent ramping the learning rate up from 0
    #[arg(long, default_value_t = 0)]
    pub warmup_steps: usize,

    /// Gradient norm clip
    #[arg(long, default_value_t = 1.0)]
    pub max_grad_norm: f64,

    /// Leading share of rows used for training; the rest validates
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 16)]
    pub num_labels: usize,

    /// Seed for the training shuffle (and --shuffle-split)
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Shuffle rows before splitting instead of trusting the file order
    #[arg(long)]
    pub shuffle_split: bool,

    /// Start from random weights instead of pytorch_model.bin
    #[arg(long)]
    pub random_init: bool,

    /// Data loader worker threads
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    #[arg(long, value_enum, default_value_t = BackendArg::Wgpu)]
    pub backend: BackendArg,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            csv_path:       a.csv,
            model_dir:      a.model_dir,
            checkpoint_dir: a.checkpoint_dir,
            max_seq_len:    a.max_seq_len,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            adam_epsilon:   a.adam_epsilon,
            weight_decay:   a.weight_decay,
            warmup_steps:   a.warmup_steps,
            max_grad_norm:  a.max_grad_norm,
            train_fraction: a.train_fraction,
            num_labels:     a.num_labels,
            seed:           a.seed,
            shuffle_split:  a.shuffle_split,
            random_init:    a.random_init,
            num_workers:    a.num_workers,
            backend:        a.backend.into(),
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Text to classify
    #[arg(long)]
    pub text: String,

    /// Directory written by `train --checkpoint-dir`
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, value_enum, default_value_t = BackendArg::Ndarray)]
    pub backend: BackendArg,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["mbti-classifier", "train"]).unwrap();
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.epochs, 4);
        assert_eq!(cfg.max_seq_len, 128);
        assert_eq!(cfg.num_labels, 16);
        assert_eq!(cfg.lr, 5e-5);
        assert_eq!(cfg.train_fraction, 0.9);
        assert_eq!(cfg.checkpoint_dir, None);
        assert_eq!(cfg.backend, BackendKind::Wgpu);
        assert!(!cfg.random_init);
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::try_parse_from([
            "mbti-classifier", "train",
            "--epochs", "1",
            "--backend", "ndarray",
            "--checkpoint-dir", "out",
            "--random-init",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.epochs, 1);
        assert_eq!(cfg.backend, BackendKind::NdArray);
        assert_eq!(cfg.checkpoint_dir.as_deref(), Some("out"));
        assert!(cfg.random_init);
    }

    #[test]
    fn test_predict_requires_text() {
        assert!(Cli::try_parse_from(["mbti-classifier", "predict"]).is_err());
        assert!(Cli::try_parse_from(["mbti-classifier", "predict", "--text", "hi"]).is_ok());
    }
}
