// ============================================================
// Layer 3 - Label Encoder
// ============================================================
// Maps MBTI type strings to dense class indices.
//
// Classes are the sorted unique type strings, so the mapping is
// stable for a given dataset regardless of row order:
//   ["ENFP", "INTJ", "ENFP", "INFP"] -> classes [ENFP, INFP, INTJ]
//                                     -> labels  [0, 2, 0, 1]

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the class list from every observed type string.
    pub fn fit<'a>(types: impl IntoIterator<Item = &'a str>) -> Self {
        let classes: BTreeSet<&str> = types.into_iter().collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Class index of a type string, `None` if it was never seen.
    pub fn encode(&self, mbti_type: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(mbti_type))
            .ok()
    }
}

/// Name of class `label`, or the bare number when `names` has none.
pub fn label_name(names: &[String], label: usize) -> String {
    names
        .get(label)
        .cloned()
        .unwrap_or_else(|| label.to_string())
}
