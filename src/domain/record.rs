// ============================================================
// Layer 3 - Record Domain Types
// ============================================================
// One row of the MBTI dataset, and the corpus of rows after
// every label has been resolved to a class index.
//
// The CSV carries the label twice in most exports:
//   type          the four-letter MBTI string ("INTJ")
//   encoded_type  the integer class id (0..16)
// Either may be missing; the loader decides which one to trust.

use serde::{Deserialize, Serialize};

/// A raw CSV row, exactly as it was deserialised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// The user's concatenated posts
    pub post: String,

    /// Four-letter personality type, e.g. "ENFP"
    #[serde(rename = "type", default)]
    pub mbti_type: Option<String>,

    /// Pre-computed class index
    #[serde(default)]
    pub encoded_type: Option<i64>,
}

/// A text with a resolved class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbtiRecord {
    pub text:  String,
    pub label: usize,
}

impl MbtiRecord {
    pub fn new(text: impl Into<String>, label: usize) -> Self {
        Self { text: text.into(), label }
    }
}

/// Every record of a dataset plus the names of its classes.
/// `label_names[i]` is the type string for class `i` when known.
#[derive(Debug, Clone)]
pub struct LabelledCorpus {
    pub records:     Vec<MbtiRecord>,
    pub label_names: Vec<String>,
}

impl LabelledCorpus {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_len_counts_records() {
        let corpus = LabelledCorpus {
            records:     vec![MbtiRecord::new("hello", 0)],
            label_names: vec!["INTJ".to_string()],
        };
        assert_eq!(corpus.record_count(), 1);
        assert_eq!(corpus.label_names[corpus.records[0].label], "INTJ");
    }
}
