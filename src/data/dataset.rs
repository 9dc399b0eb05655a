use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::record::MbtiRecord;

/// One (text, label) pair as handed to the batcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MbtiItem {
    pub text:  String,
    pub label: usize,
}

impl From<MbtiRecord> for MbtiItem {
    fn from(r: MbtiRecord) -> Self {
        Self { text: r.text, label: r.label }
    }
}

pub struct MbtiDataset {
    items: Vec<MbtiItem>,
}

impl MbtiDataset {
    pub fn new(records: Vec<MbtiRecord>) -> Self {
        Self { items: records.into_iter().map(MbtiItem::from).collect() }
    }

    pub fn item_count(&self) -> usize { self.items.len() }

    /// Number of batches one pass produces, counting a short final batch.
    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.items.len().div_ceil(batch_size.max(1))
    }
}

impl Dataset<MbtiItem> for MbtiDataset {
    fn get(&self, index: usize) -> Option<MbtiItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> MbtiDataset {
        MbtiDataset::new((0..n).map(|i| MbtiRecord::new(format!("post {i}"), i % 16)).collect())
    }

    #[test]
    fn test_indexed_access() {
        let ds = dataset(3);
        assert_eq!(ds.len(), 3);
        let item = ds.get(2).unwrap();
        assert_eq!(item.text, "post 2");
        assert_eq!(item.label, 2);
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_batch_count_rounds_up() {
        assert_eq!(dataset(64).batch_count(32), 2);
        assert_eq!(dataset(65).batch_count(32), 3);
        assert_eq!(dataset(0).batch_count(32), 0);
    }
}
