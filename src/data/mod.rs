// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything between the CSV on disk and tensor batches:
//
//   mbti_processed.csv
//       │
//       ▼
//   CsvRecordSource   → rows with resolved class labels
//       │
//       ▼
//   split_train_val   → first 90% train, rest validation
//       │
//       ▼
//   MbtiDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   MbtiBatcher       → tokenise, truncate, left-pad into tensors
//       │
//       ▼
//   DataLoader        → shuffled batches for the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the MBTI CSV into labelled records
pub mod loader;

/// Implements Burn's Dataset trait for (text, label) items
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Splits records into train/validation sets
pub mod splitter;
