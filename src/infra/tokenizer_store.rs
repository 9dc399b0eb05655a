// ============================================================
// Layer 6 - Tokenizer Store
// ============================================================
// Loads the pretrained tokenizer that ships with the model
// (tokenizer.json in HuggingFace format) and copies it next to
// checkpoints so `predict` needs nothing but the checkpoint dir.
//
// GPT-2 has no dedicated padding token. Its end-of-text token
// doubles as padding; the attention mask keeps the model from
// reading it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

/// GPT-2's end-of-text token, reused as the pad token
pub const EOS_TOKEN: &str = "<|endoftext|>";

const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Load `tokenizer.json` from the store directory
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join(TOKENIZER_FILE);
        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))?;
        tracing::info!(
            "Tokenizer loaded from '{}' ({} tokens)",
            path.display(),
            tokenizer.get_vocab_size(true)
        );
        Ok(tokenizer)
    }

    /// Write `tokenizer` into the store directory
    pub fn save(&self, tokenizer: &Tokenizer) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.dir.join(TOKENIZER_FILE);
        tokenizer
            .save(&path, false)
            .map_err(|e| anyhow::anyhow!("Cannot write '{}': {}", path.display(), e))?;
        tracing::debug!("Tokenizer saved to '{}'", path.display());
        Ok(())
    }
}

/// The id used for padding: the tokenizer's end-of-text token when it
/// has one, otherwise the model config's `eos_token_id`.
pub fn pad_token_id(tokenizer: &Tokenizer, fallback: u32) -> u32 {
    tokenizer.token_to_id(EOS_TOKEN).unwrap_or(fallback)
}

/// Build a whitespace WordLevel tokenizer over `words`.
/// `<|endoftext|>` gets id 0, `<unk>` id 1, words follow from 2.
#[cfg(test)]
pub fn word_level_tokenizer(words: &[&str]) -> Result<Tokenizer> {
    use std::str::FromStr;

    let mut vocab = serde_json::json!({
        EOS_TOKEN: 0,
        "<unk>":   1,
    });
    let mut next_id = 2usize;
    for word in words {
        if vocab.get(*word).is_none() {
            vocab[*word] = serde_json::json!(next_id);
            next_id += 1;
        }
    }

    let tokenizer_json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": EOS_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "<unk>"
        }
    });

    Tokenizer::from_str(&tokenizer_json.to_string())
        .map_err(|e| anyhow::anyhow!("Cannot build tokenizer: {e}"))
}
