// ============================================================
// Layer 4 - MBTI Batcher (collate)
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<MbtiItem> into
// tensors the classifier can consume.
//
// How a batch is built:
//   1. Tokenise every text (no special tokens are added)
//   2. Keep the first `max_seq_len` tokens of each sequence
//   3. Left-pad every sequence to the longest one in the batch
//   4. Flatten row-major and reshape to [batch, width]
//
// Left padding matters for a decoder model: the last position of
// every row is then the last real token, which is where the
// classifier reads its summary from.
//
//   texts:   "a b c"   "d"
//   ids:     [a b c]   [P P d]      (P = pad id = <|endoftext|>)
//   mask:    [1 1 1]   [0 0 1]
//   pos:     [0 1 2]   [0 0 0]
//
// Position ids count real tokens only, so a text gets the same
// positions however much padding sits in front of it.
//
// Reference: Burn Book §4 (Batcher)

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};
use tokenizers::Tokenizer;

use crate::data::dataset::MbtiItem;

// ─── MbtiBatch ────────────────────────────────────────────────────────────────
/// A batch ready for the forward pass.
#[derive(Debug, Clone)]
pub struct MbtiBatch<B: Backend> {
    /// Token ids - shape: [batch_size, width]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding - shape: [batch_size, width]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Position of each token among the real tokens - shape: [batch_size, width]
    pub position_ids: Tensor<B, 2, Int>,

    /// Class index per row - shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

/// Row-major padded token ids and mask, before they become tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedSequences {
    pub ids:       Vec<i32>,
    pub mask:      Vec<i32>,
    pub positions: Vec<i32>,
    pub rows:      usize,
    pub width:     usize,
}

/// Truncate each sequence to `max_len` and left-pad to the batch maximum.
///
/// A batch made only of empty texts still gets one (padding) column so
/// the model always has a final position to read.
pub fn pad_left(sequences: &[Vec<u32>], pad_id: u32, max_len: usize) -> PaddedSequences {
    let rows  = sequences.len();
    let width = sequences
        .iter()
        .map(|s| s.len().min(max_len))
        .max()
        .unwrap_or(0)
        .max(1);

    let mut ids       = Vec::with_capacity(rows * width);
    let mut mask      = Vec::with_capacity(rows * width);
    let mut positions = Vec::with_capacity(rows * width);

    for seq in sequences {
        let kept = &seq[..seq.len().min(max_len)];
        let pad  = width - kept.len();

        ids.extend(std::iter::repeat(pad_id as i32).take(pad));
        mask.extend(std::iter::repeat(0).take(pad));
        positions.extend(std::iter::repeat(0).take(pad));

        ids.extend(kept.iter().map(|&t| t as i32));
        mask.extend(std::iter::repeat(1).take(kept.len()));
        positions.extend(0..kept.len() as i32);
    }

    PaddedSequences { ids, mask, positions, rows, width }
}

/// Model inputs for a list of texts, without labels.
#[derive(Debug, Clone)]
pub struct EncodedTexts<B: Backend> {
    pub input_ids:      Tensor<B, 2, Int>,
    pub attention_mask: Tensor<B, 2, Int>,
    pub position_ids:   Tensor<B, 2, Int>,
}

// ─── CollateConfig ────────────────────────────────────────────────────────────
/// Everything a batcher needs apart from the device, so the training
/// and validation batchers (on different backends) share one source.
#[derive(Clone)]
pub struct CollateConfig {
    pub tokenizer:    Arc<Tokenizer>,
    pub pad_token_id: u32,
    pub max_seq_len:  usize,
}

impl CollateConfig {
    pub fn batcher<B: Backend>(&self, device: &B::Device) -> MbtiBatcher<B> {
        MbtiBatcher::new(
            self.tokenizer.clone(),
            self.pad_token_id,
            self.max_seq_len,
            device.clone(),
        )
    }
}

// ─── MbtiBatcher ──────────────────────────────────────────────────────────────
#[derive(Clone)]
pub struct MbtiBatcher<B: Backend> {
    tokenizer:    Arc<Tokenizer>,
    pad_token_id: u32,
    max_seq_len:  usize,
    device:       B::Device,
}

impl<B: Backend> MbtiBatcher<B> {
    pub fn new(
        tokenizer:    Arc<Tokenizer>,
        pad_token_id: u32,
        max_seq_len:  usize,
        device:       B::Device,
    ) -> Self {
        Self { tokenizer, pad_token_id, max_seq_len, device }
    }

    /// Tokenise and pad a list of texts into model inputs.
    pub fn encode_texts(&self, texts: &[&str]) -> Result<EncodedTexts<B>> {
        if texts.is_empty() {
            bail!("Cannot build a batch from zero texts");
        }

        let mut sequences = Vec::with_capacity(texts.len());
        for text in texts {
            let enc = self
                .tokenizer
                .encode(*text, false)
                .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
            sequences.push(enc.get_ids().to_vec());
        }

        let padded = pad_left(&sequences, self.pad_token_id, self.max_seq_len);
        let shape  = [padded.rows, padded.width];

        let input_ids = Tensor::<B, 2, Int>::from_data(
            TensorData::new(padded.ids, shape), &self.device,
        );
        let attention_mask = Tensor::<B, 2, Int>::from_data(
            TensorData::new(padded.mask, shape), &self.device,
        );
        let position_ids = Tensor::<B, 2, Int>::from_data(
            TensorData::new(padded.positions, shape), &self.device,
        );
        Ok(EncodedTexts { input_ids, attention_mask, position_ids })
    }

    /// Fallible form of [`Batcher::batch`].
    pub fn collate(&self, items: &[MbtiItem]) -> Result<MbtiBatch<B>> {
        let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
        let encoded = self.encode_texts(&texts)?;

        let labels: Vec<i32> = items.iter().map(|i| i.label as i32).collect();
        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [items.len()]), &self.device,
        );

        Ok(MbtiBatch {
            input_ids:      encoded.input_ids,
            attention_mask: encoded.attention_mask,
            position_ids:   encoded.position_ids,
            labels,
        })
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader calls .batch(items) with each mini-batch. The trait
// cannot return an error, so a batch that fails to collate aborts
// the run here.
impl<B: Backend> Batcher<MbtiItem, MbtiBatch<B>> for MbtiBatcher<B> {
    fn batch(&self, items: Vec<MbtiItem>) -> MbtiBatch<B> {
        match self.collate(&items) {
            Ok(batch) => batch,
            Err(err)  => panic!("Cannot collate a batch of {} items: {err:#}", items.len()),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::word_level_tokenizer;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn batcher(max_len: usize) -> MbtiBatcher<TestBackend> {
        let tokenizer = word_level_tokenizer(&["a", "b", "c", "d", "e"]).unwrap();
        MbtiBatcher::new(Arc::new(tokenizer), 0, max_len, Default::default())
    }

    fn item(text: &str, label: usize) -> MbtiItem {
        MbtiItem { text: text.to_string(), label }
    }

    #[test]
    fn test_pad_left_places_padding_first() {
        let padded = pad_left(&[vec![5, 6, 7], vec![9]], 0, 128);
        assert_eq!(padded.width, 3);
        assert_eq!(padded.ids,       vec![5, 6, 7, 0, 0, 9]);
        assert_eq!(padded.mask,      vec![1, 1, 1, 0, 0, 1]);
        assert_eq!(padded.positions, vec![0, 1, 2, 0, 0, 0]);
    }

    #[test]
    fn test_pad_left_truncates_from_the_end() {
        let long: Vec<u32> = (1..=200).collect();
        let padded = pad_left(&[long, vec![3]], 0, 128);
        assert_eq!(padded.width, 128);
        // Head of the sequence is kept
        assert_eq!(padded.ids[0],   1);
        assert_eq!(padded.ids[127], 128);
        // Short row: 127 pads then its single token
        assert_eq!(padded.ids[128 + 127], 3);
        assert_eq!(padded.mask[128..].iter().sum::<i32>(), 1);
    }

    #[test]
    fn test_pad_left_all_empty_keeps_one_column() {
        let padded = pad_left(&[vec![], vec![]], 0, 128);
        assert_eq!(padded.width, 1);
        assert_eq!(padded.mask, vec![0, 0]);
    }

    #[test]
    fn test_batch_shape_is_rows_by_longest_text() {
        let b     = batcher(128);
        let items = vec![item("a b c", 1), item("d", 3), item("e e", 15)];
        let batch = b.collate(&items).unwrap();

        assert_eq!(batch.input_ids.dims(),      [3, 3]);
        assert_eq!(batch.attention_mask.dims(), [3, 3]);
        assert_eq!(batch.position_ids.dims(),   [3, 3]);
        assert_eq!(batch.labels.dims(),         [3]);

        // "d" -> vocab id 5, left-padded with two pad ids
        let ids = batch.input_ids.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(&ids[3..6], &[0, 0, 5]);

        let labels = batch.labels.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![1, 3, 15]);
    }

    #[test]
    fn test_batch_width_is_capped() {
        let b     = batcher(4);
        let items = vec![item("a b c d e a b c", 0), item("a", 0)];
        let batch = b.collate(&items).unwrap();
        assert_eq!(batch.input_ids.dims(), [2, 4]);
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        let b = batcher(128);
        assert!(b.collate(&[]).is_err());
    }

    #[test]
    #[should_panic(expected = "Cannot collate")]
    fn test_batcher_trait_panics_on_empty_batch() {
        let _ = batcher(128).batch(Vec::new());
    }
}
