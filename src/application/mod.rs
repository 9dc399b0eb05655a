// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each
// (fine-tuning, or classifying a text).
//
// Rules for this layer:
//   - No model maths here (Layer 5)
//   - No argument parsing or printing here (Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The fine-tuning workflow
pub mod train_use_case;

// Classifying new texts with a trained checkpoint
pub mod predict_use_case;
