// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// other layers:
//
//   pretrained.rs      - Local GPT-2 checkpoint (config.json,
//                        pytorch_model.bin) imported into the
//                        Burn model.
//
//   tokenizer_store.rs - Loads tokenizer.json and copies it into
//                        the checkpoint directory.
//
//   checkpoint.rs      - Fine-tuned weights via Burn's full
//                        precision recorder, plus the JSON files
//                        `predict` needs to rebuild the model.
//
//   metrics.rs         - Per-epoch summary line, run history,
//                        optional metrics.csv.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Pretrained GPT-2 config and weight import
pub mod pretrained;

/// Tokenizer loading and saving
pub mod tokenizer_store;

/// Epoch metrics, history and CSV logger
pub mod metrics;
