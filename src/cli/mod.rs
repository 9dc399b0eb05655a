// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
//
//   1. `train`   - fine-tunes GPT-2 on the MBTI CSV
//   2. `predict` - classifies a text with a trained checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu};
use clap::Parser;
use commands::{BackendArg, Commands, PredictArgs, TrainArgs};

use crate::application::{predict_use_case::PredictUseCase, train_use_case::TrainUseCase};
use crate::domain::traits::TextClassifier;

#[derive(Parser, Debug)]
#[command(
    name = "mbti-classifier",
    version,
    about = "Fine-tune GPT-2 to predict MBTI types from text, then classify new texts."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    tracing::info!("Starting fine-tuning on '{}'", args.csv);

    let history = TrainUseCase::new(args.into()).execute()?;

    if let (Some(loss), Some(acc)) = (history.loss.val_loss.last(), history.accuracy.val_acc.last()) {
        println!(
            "Training complete after {} epochs. Final val_loss: {:.5}, valid_acc: {:.5}",
            history.epochs(), loss, acc
        );
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let (name, prob) = match args.backend {
        BackendArg::Wgpu => PredictUseCase::<Wgpu>::new(&args.checkpoint_dir, &WgpuDevice::default())?
            .classify(&args.text)?,
        BackendArg::Ndarray => PredictUseCase::<NdArray>::new(&args.checkpoint_dir, &NdArrayDevice::default())?
            .classify(&args.text)?,
    };

    println!("{name} ({:.1}%)", prob * 100.0);
    Ok(())
}
