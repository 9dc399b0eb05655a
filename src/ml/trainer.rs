// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Fine-tunes the classifier with AdamW under a linear schedule.
//
// One epoch:
//   train_epoch    - shuffled batches, forward + backward, global
//                    gradient-norm clip, one optimizer step and one
//                    schedule step per batch
//   validate_epoch - shuffled batches on the inner backend
//                    (no autodiff, dropout off)
//
// Each phase reports the mean of its per-batch losses and the
// true/predicted class of every sample it saw. `fit` turns those
// into an EpochMetrics row, prints it and appends it to History.
//
// Backends:
//   training   - B            (Autodiff<Wgpu> or Autodiff<NdArray>)
//   validation - B::InnerBackend, reached through model.valid()
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::{CollateConfig, MbtiBatch},
    dataset::MbtiDataset,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{accuracy, EpochMetrics, History, MetricsLogger},
};
use crate::ml::{grad_clip::clip_global_norm, model::Gpt2Classifier, scheduler::LinearSchedule};

/// What one pass over a loader produced.
#[derive(Debug, Clone, Default)]
pub struct EpochOutcome {
    pub true_labels:      Vec<i64>,
    pub predicted_labels: Vec<i64>,
    /// Mean of the per-batch mean losses
    pub mean_loss:        f64,
    /// Learning rate each optimizer step used (empty for validation)
    pub step_lrs:         Vec<f64>,
}

impl EpochOutcome {
    pub fn accuracy(&self) -> f64 {
        accuracy(&self.true_labels, &self.predicted_labels)
    }

    fn absorb<B: Backend>(&mut self, logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Result<()> {
        let predicted = logits.argmax(1).flatten::<1>(0, 1);
        self.predicted_labels.extend(int_values(predicted)?);
        self.true_labels.extend(int_values(labels)?);
        Ok(())
    }
}

fn int_values<B: Backend>(t: Tensor<B, 1, Int>) -> Result<Vec<i64>> {
    t.into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("Cannot read tensor values: {e:?}"))
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

// ─── Train Epoch ──────────────────────────────────────────────────────────────
/// One optimisation pass over `loader`. Returns the updated model.
pub fn train_epoch<B, O>(
    mut model:     Gpt2Classifier<B>,
    loader:        &dyn DataLoader<MbtiBatch<B>>,
    optim:         &mut O,
    schedule:      &mut LinearSchedule,
    max_grad_norm: f64,
) -> Result<(Gpt2Classifier<B>, EpochOutcome)>
where
    B: AutodiffBackend,
    O: Optimizer<Gpt2Classifier<B>, B>,
{
    let mut outcome  = EpochOutcome::default();
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;

    for batch in loader.iter() {
        let labels = batch.labels.clone();
        let output = model.forward_classification(batch);

        let loss_val: f64 = output.loss.clone().into_scalar().elem::<f64>();
        loss_sum += loss_val;
        batches  += 1;

        outcome.absorb(output.logits.detach(), labels)?;

        let grads     = output.loss.backward();
        let mut grads = GradientsParams::from_grads(grads, &model);
        let grad_norm = clip_global_norm::<B, _>(&model, &mut grads, max_grad_norm);

        let lr = schedule.lr();
        model = optim.step(lr, model, grads);
        schedule.step();
        outcome.step_lrs.push(lr);

        tracing::trace!(
            "step {} loss={:.5} grad_norm={:.4} lr={:.3e}",
            schedule.current_step(), loss_val, grad_norm, lr
        );
    }

    outcome.mean_loss = mean(loss_sum, batches);
    Ok((model, outcome))
}

// ─── Validate Epoch ───────────────────────────────────────────────────────────
/// Forward-only pass over `loader`. The model is left unchanged.
pub fn validate_epoch<B: Backend>(
    model:  &Gpt2Classifier<B>,
    loader: &dyn DataLoader<MbtiBatch<B>>,
) -> Result<EpochOutcome> {
    let mut outcome  = EpochOutcome::default();
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;

    for batch in loader.iter() {
        let labels = batch.labels.clone();
        let output = model.forward_classification(batch);

        loss_sum += output.loss.into_scalar().elem::<f64>();
        batches  += 1;

        outcome.absorb(output.logits, labels)?;
    }

    outcome.mean_loss = mean(loss_sum, batches);
    Ok(outcome)
}

// ─── Fit ──────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct FitSettings {
    pub epochs:        usize,
    pub batch_size:    usize,
    pub learning_rate: f64,
    pub adam_epsilon:  f64,
    pub weight_decay:  f64,
    pub warmup_steps:  usize,
    pub max_grad_norm: f64,
    /// Seed for the loaders' shuffle
    pub seed:          u64,
    pub num_workers:   usize,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            epochs:        4,
            batch_size:    32,
            learning_rate: 5e-5,
            adam_epsilon:  1e-8,
            weight_decay:  0.0,
            warmup_steps:  0,
            max_grad_norm: 1.0,
            seed:          42,
            num_workers:   1,
        }
    }
}

/// Batches of `dataset` in a seeded random order, reshuffled each pass.
pub fn shuffled_loader<B: Backend>(
    collate:  &CollateConfig,
    settings: &FitSettings,
    device:   &B::Device,
    dataset:  MbtiDataset,
) -> Arc<dyn DataLoader<MbtiBatch<B>>> {
    DataLoaderBuilder::new(collate.batcher::<B>(device))
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(settings.num_workers)
        .build(dataset)
}

/// Train for `settings.epochs` epochs, validating after each one.
///
/// Every epoch prints its summary line and is appended to the
/// returned History; with a checkpoint manager the weights are
/// saved after each epoch too.
#[allow(clippy::too_many_arguments)]
pub fn fit<B: AutodiffBackend>(
    mut model:   Gpt2Classifier<B>,
    train:       MbtiDataset,
    valid:       MbtiDataset,
    collate:     &CollateConfig,
    settings:    &FitSettings,
    device:      &B::Device,
    checkpoints: Option<&CheckpointManager>,
    metrics:     Option<&MetricsLogger>,
) -> Result<(Gpt2Classifier<B>, History)> {
    if train.item_count() == 0 {
        bail!("Training split is empty");
    }
    if valid.item_count() == 0 {
        bail!("Validation split is empty");
    }
    if settings.batch_size == 0 {
        bail!("Batch size must be at least 1");
    }

    // ── Schedule + optimiser ──────────────────────────────────────────────────
    let total_steps = train.batch_count(settings.batch_size) * settings.epochs;
    let mut schedule = LinearSchedule::new(
        settings.learning_rate,
        settings.warmup_steps,
        total_steps,
    );
    let mut optim = AdamWConfig::new()
        .with_epsilon(settings.adam_epsilon as f32)
        .with_weight_decay(settings.weight_decay as f32)
        .init();

    tracing::info!(
        "Training on {} samples, validating on {} ({} optimizer steps)",
        train.item_count(), valid.item_count(), total_steps
    );

    // ── Loaders ───────────────────────────────────────────────────────────────
    let train_loader = shuffled_loader::<B>(collate, settings, device, train);
    let valid_loader = shuffled_loader::<B::InnerBackend>(collate, settings, device, valid);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut history = History::default();

    for epoch in 1..=settings.epochs {
        println!("Epoch {}/{}", epoch, settings.epochs);

        let (trained, train_outcome) =
            train_epoch(model, train_loader.as_ref(), &mut optim, &mut schedule, settings.max_grad_norm)?;
        model = trained;

        let valid_outcome = validate_epoch(&model.valid(), valid_loader.as_ref())?;

        let row = EpochMetrics {
            epoch,
            train_loss: train_outcome.mean_loss,
            val_loss:   valid_outcome.mean_loss,
            train_acc:  train_outcome.accuracy(),
            val_acc:    valid_outcome.accuracy(),
        };
        println!("{}", row.summary_line());
        history.record(&row);

        if let Some(logger) = metrics {
            logger.log(&row)?;
        }
        if let Some(ckpt) = checkpoints {
            ckpt.save_model(&model, epoch)?;
            tracing::info!("Checkpoint saved for epoch {}", epoch);
        }
    }

    tracing::info!("Training complete!");
    Ok((model, history))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::MbtiRecord;
    use crate::infra::tokenizer_store::word_level_tokenizer;
    use crate::ml::model::Gpt2Config;
    use burn::backend::{Autodiff, NdArray};
    use std::sync::Arc;

    type TestBackend = Autodiff<NdArray>;

    const WORDS: [&str; 6] = ["i", "think", "feel", "plan", "party", "alone"];

    fn tiny_config() -> Gpt2Config {
        Gpt2Config::new(10, 16, 8, 1, 2, 4).with_dropout(0.0)
    }

    fn collate() -> CollateConfig {
        CollateConfig {
            tokenizer:    Arc::new(word_level_tokenizer(&WORDS).unwrap()),
            pad_token_id: 0,
            max_seq_len:  16,
        }
    }

    fn records(n: usize) -> Vec<MbtiRecord> {
        (0..n)
            .map(|i| {
                let text = format!("{} {}", WORDS[i % WORDS.len()], WORDS[(i * 2) % WORDS.len()]);
                MbtiRecord::new(text, i % 4)
            })
            .collect()
    }

    fn settings(epochs: usize) -> FitSettings {
        FitSettings {
            epochs,
            batch_size:    3,
            learning_rate: 1e-3,
            num_workers:   1,
            ..FitSettings::default()
        }
    }

    #[test]
    fn test_fit_records_one_value_per_epoch() {
        let device = Default::default();
        let model  = tiny_config().init::<TestBackend>(&device);

        let (_, history) = fit(
            model,
            MbtiDataset::new(records(10)),
            MbtiDataset::new(records(4)),
            &collate(),
            &settings(4),
            &device,
            None,
            None,
        )
        .unwrap();

        assert_eq!(history.epochs(), 4);
        assert_eq!(history.loss.train_loss.len(), 4);
        assert_eq!(history.loss.val_loss.len(), 4);
        assert_eq!(history.accuracy.train_acc.len(), 4);
        assert_eq!(history.accuracy.val_acc.len(), 4);

        for loss in history.loss.train_loss.iter().chain(&history.loss.val_loss) {
            assert!(loss.is_finite() && *loss >= 0.0);
        }
        for acc in history.accuracy.train_acc.iter().chain(&history.accuracy.val_acc) {
            assert!((0.0..=1.0).contains(acc));
        }
    }

    #[test]
    fn test_fit_writes_checkpoints_and_metrics() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        let device = Default::default();
        let model  = tiny_config().init::<TestBackend>(&device);

        fit(
            model,
            MbtiDataset::new(records(6)),
            MbtiDataset::new(records(3)),
            &collate(),
            &settings(2),
            &device,
            Some(&ckpt),
            Some(&logger),
        )
        .unwrap();

        assert_eq!(ckpt.latest_epoch().unwrap(), 2);
        let csv = std::fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_fit_rejects_empty_validation_split() {
        let device = Default::default();
        let model  = tiny_config().init::<TestBackend>(&device);
        let result = fit(
            model,
            MbtiDataset::new(records(4)),
            MbtiDataset::new(Vec::new()),
            &collate(),
            &settings(1),
            &device,
            None,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_train_epoch_updates_weights_and_schedule() {
        let device = Default::default();
        let model  = tiny_config().init::<TestBackend>(&device);
        let before = model.score.weight.val().into_data().to_vec::<f32>().unwrap();

        let loader = DataLoaderBuilder::new(collate().batcher::<TestBackend>(&device))
            .batch_size(4)
            .build(MbtiDataset::new(records(8)));
        let mut optim    = AdamWConfig::new().init();
        let mut schedule = LinearSchedule::new(1e-2, 0, 2);

        let (model, outcome) =
            train_epoch(model, loader.as_ref(), &mut optim, &mut schedule, 1.0).unwrap();

        assert_eq!(schedule.current_step(), 2);
        // Each step used the rate from before the schedule advanced
        assert_eq!(outcome.step_lrs.len(), 2);
        assert!((outcome.step_lrs[0] - 1e-2).abs() < 1e-12);
        assert!((outcome.step_lrs[1] - 5e-3).abs() < 1e-12);
        assert_eq!(outcome.true_labels.len(), 8);
        assert_eq!(outcome.predicted_labels.len(), 8);
        assert!(outcome.mean_loss >= 0.0);

        let after = model.score.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_validate_epoch_is_deterministic() {
        let device = Default::default();
        let model  = tiny_config().init::<NdArray>(&device);
        let loader = DataLoaderBuilder::new(collate().batcher::<NdArray>(&device))
            .batch_size(4)
            .build(MbtiDataset::new(records(7)));

        let first  = validate_epoch(&model, loader.as_ref()).unwrap();
        let second = validate_epoch(&model, loader.as_ref()).unwrap();

        // Sequential order: labels come back exactly as stored
        let expected: Vec<i64> = (0..7).map(|i| (i % 4) as i64).collect();
        assert_eq!(first.true_labels, expected);
        assert_eq!(first.predicted_labels, second.predicted_labels);
        assert_eq!(first.mean_loss, second.mean_loss);
        assert!(first.predicted_labels.iter().all(|p| (0..4).contains(p)));
    }

    #[test]
    fn test_validation_loader_is_shuffled() {
        let device  = Default::default();
        let ordered: Vec<MbtiRecord> = (0..24)
            .map(|i| MbtiRecord::new(WORDS[i % WORDS.len()], i))
            .collect();
        let loader = shuffled_loader::<NdArray>(&collate(), &settings(1), &device, MbtiDataset::new(ordered));

        let mut seen = Vec::new();
        for batch in loader.iter() {
            seen.extend(int_values(batch.labels).unwrap());
        }

        // Every record exactly once, not in file order
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(sorted, (0..24).collect::<Vec<i64>>());
        assert_ne!(seen, sorted);
    }

    #[test]
    fn test_outcome_accuracy() {
        let outcome = EpochOutcome {
            true_labels:      vec![0, 1, 2, 3],
            predicted_labels: vec![0, 1, 1, 1],
            mean_loss:        1.0,
            ..Default::default()
        };
        assert_eq!(outcome.accuracy(), 0.5);
    }
}
