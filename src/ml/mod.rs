// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All model maths lives here:
//
//   model.rs      - GPT-2 transformer body plus a linear score
//                   head read from the last position
//                   • Token + learned position embeddings
//                   • Causal, padding-aware self-attention
//                   • Pre-norm blocks with GELU MLPs
//
//   scheduler.rs  - Linear warmup / decay learning rate
//
//   grad_clip.rs  - Clips the global gradient norm across every
//                   parameter of the model
//
//   trainer.rs    - train_epoch, validate_epoch and the
//                   epoch driver `fit`
//
//   inferencer.rs - Loads a checkpoint and classifies texts
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Radford et al. (2019) Language Models are
//            Unsupervised Multitask Learners

/// GPT-2 sequence classifier
pub mod model;

/// Per-step learning rate schedule
pub mod scheduler;

/// Global-norm gradient clipping
pub mod grad_clip;

/// Training and validation loops
pub mod trainer;

/// Checkpoint-backed prediction
pub mod inferencer;
