// ============================================================
// Layer 6 - Metrics
// ============================================================
// Per-epoch numbers the run reports, in three forms:
//
//   EpochMetrics  - one epoch, printed as a single summary line
//   History       - every epoch of the run, returned by `fit`
//   MetricsLogger - optional CSV copy on disk
//
// Accuracy is exact-match over single-label predictions:
//   correct / total, with an empty set scoring 0.
//
// Example CSV output:
//   epoch,train_loss,val_loss,train_acc,val_acc
//   1,2.512345,2.498765,0.181000,0.176000
//   2,2.233311,2.301002,0.254000,0.231000

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const METRICS_FILE: &str = "metrics.csv";
const CSV_HEADER:   &str = "epoch,train_loss,val_loss,train_acc,val_acc";

/// Fraction of positions where `predicted` equals `truth`.
pub fn accuracy(truth: &[i64], predicted: &[i64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

/// One row of metrics for a single epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch:      usize,
    pub train_loss: f64,
    pub val_loss:   f64,
    pub train_acc:  f64,
    pub val_acc:    f64,
}

impl EpochMetrics {
    /// The line printed after every epoch
    pub fn summary_line(&self) -> String {
        format!(
            "  train_loss: {:.5} - val_loss: {:.5} - train_acc: {:.5} - valid_acc: {:.5}",
            self.train_loss, self.val_loss, self.train_acc, self.val_acc,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    pub train_loss: Vec<f64>,
    pub val_loss:   Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyHistory {
    pub train_acc: Vec<f64>,
    pub val_acc:   Vec<f64>,
}

/// Per-epoch curves for a whole run, in epoch order.
/// Every list holds exactly one value per completed epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub loss:     LossHistory,
    pub accuracy: AccuracyHistory,
}

impl History {
    pub fn record(&mut self, m: &EpochMetrics) {
        self.loss.train_loss.push(m.train_loss);
        self.loss.val_loss.push(m.val_loss);
        self.accuracy.train_acc.push(m.train_acc);
        self.accuracy.val_acc.push(m.val_acc);
    }

    pub fn epochs(&self) -> usize {
        self.loss.train_loss.len()
    }
}

/// Appends epoch metrics to `<dir>/metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header if the file doesn't exist yet, so repeated
    /// runs into the same directory append to one log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join(METRICS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.val_loss, m.train_acc, m.val_acc,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch, m.train_loss, m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
