// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust types that describe what the system works on:
// records, labels, and the traits other layers implement.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums and traits

// One CSV row and the labelled corpus built from it
pub mod record;

// Type string <-> class index mapping
pub mod labels;

// Abstractions implemented by the data and ml layers
pub mod traits;
