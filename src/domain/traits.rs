// ============================================================
// Layer 3 - Core Traits
// ============================================================
// The application layer loads data and classifies text through
// these traits, never through a concrete loader or model.

use anyhow::Result;

use crate::domain::record::LabelledCorpus;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Anything that can produce a labelled corpus.
///
/// Implementations:
///   - CsvRecordSource -> reads the processed MBTI CSV
pub trait RecordSource {
    fn load_all(&self) -> Result<LabelledCorpus>;
}

// ─── TextClassifier ───────────────────────────────────────────────────────────
/// Anything that can assign a personality type to a text.
pub trait TextClassifier {
    /// Returns the predicted type name and its probability.
    fn classify(&self, text: &str) -> Result<(String, f32)>;
}
