// ============================================================
// Layer 4 - CSV Record Loader
// ============================================================
// Reads the processed MBTI CSV with the `csv` crate and turns
// every row into an MbtiRecord with a resolved class index.
//
// Expected columns (extra columns are ignored):
//   post          free text, required
//   type          MBTI string, optional
//   encoded_type  integer class, optional
//
// Label resolution:
//   1. encoded_type present on every row -> use it as-is
//   2. otherwise type present on every row -> sorted-unique encoding
//   3. otherwise the first row lacking both is reported
//
// Reference: csv crate documentation (serde deserialisation)
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::domain::labels::LabelEncoder;
use crate::domain::record::{LabelledCorpus, MbtiRecord, RawRecord};
use crate::domain::traits::RecordSource;

/// Loads a labelled corpus from a CSV file.
pub struct CsvRecordSource {
    path:       PathBuf,
    num_labels: usize,
}

impl CsvRecordSource {
    pub fn new(path: impl Into<PathBuf>, num_labels: usize) -> Self {
        Self { path: path.into(), num_labels }
    }
}

impl RecordSource for CsvRecordSource {
    fn load_all(&self) -> Result<LabelledCorpus> {
        let rows   = read_rows(&self.path)?;
        let corpus = resolve_labels(rows, self.num_labels)?;

        tracing::info!(
            "Loaded {} records from '{}'",
            corpus.record_count(),
            self.path.display()
        );
        if !corpus.label_names.is_empty() {
            tracing::info!("Labels: {:?}", corpus.label_names);
        }
        Ok(corpus)
    }
}

/// Deserialise every CSV row. Row numbers in errors are 1-based and
/// count the header line, so they match what an editor shows.
fn read_rows(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Cannot open dataset '{}'", path.display()))?;

    let mut rows = Vec::new();
    for (i, row) in reader.deserialize::<RawRecord>().enumerate() {
        let row = row.with_context(|| {
            format!("Malformed row {} in '{}'", i + 2, path.display())
        })?;
        rows.push(row);
    }

    tracing::debug!("Read {} raw rows", rows.len());
    Ok(rows)
}

/// Turn raw rows into records with class indices in `0..num_labels`.
pub fn resolve_labels(rows: Vec<RawRecord>, num_labels: usize) -> Result<LabelledCorpus> {
    let all_encoded = rows.iter().all(|r| r.encoded_type.is_some());
    let all_typed   = rows.iter().all(|r| r.mbti_type.is_some());

    if !all_encoded && !all_typed {
        if let Some(i) = rows
            .iter()
            .position(|r| r.encoded_type.is_none() && r.mbti_type.is_none())
        {
            bail!("Row {} has neither 'encoded_type' nor 'type'", i + 2);
        }
        bail!("Label columns are only partially filled; need 'encoded_type' or 'type' on every row");
    }

    // Names come from the type strings whenever they are available.
    let encoder = if all_typed {
        Some(LabelEncoder::fit(rows.iter().filter_map(|r| r.mbti_type.as_deref())))
    } else {
        None
    };

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let label = match (row.encoded_type, &encoder, row.mbti_type.as_deref()) {
            (Some(code), _, _) => {
                if code < 0 {
                    bail!("Row {}: negative label {}", i + 2, code);
                }
                code as usize
            }
            (None, Some(enc), Some(t)) => enc
                .encode(t)
                .with_context(|| format!("Row {}: unknown type '{}'", i + 2, t))?,
            _ => bail!("Row {} has no usable label", i + 2),
        };

        if label >= num_labels {
            bail!(
                "Row {}: label {} is outside 0..{}",
                i + 2,
                label,
                num_labels
            );
        }
        records.push(MbtiRecord::new(row.post, label));
    }

    let label_names = encoder
        .map(|enc| enc.classes().to_vec())
        .unwrap_or_default();

    Ok(LabelledCorpus { records, label_names })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn raw(post: &str, t: Option<&str>, enc: Option<i64>) -> RawRecord {
        RawRecord {
            post:         post.to_string(),
            mbti_type:    t.map(str::to_string),
            encoded_type: enc,
        }
    }

    #[test]
    fn test_encoded_type_is_preferred() {
        let rows = vec![
            raw("a", Some("INTJ"), Some(10)),
            raw("b", Some("ENFP"), Some(1)),
        ];
        let corpus = resolve_labels(rows, 16).unwrap();
        assert_eq!(corpus.records[0].label, 10);
        assert_eq!(corpus.records[1].label, 1);
        assert_eq!(corpus.label_names, vec!["ENFP", "INTJ"]);
    }

    #[test]
    fn test_type_column_is_encoded_when_codes_missing() {
        let rows = vec![
            raw("a", Some("INTJ"), None),
            raw("b", Some("ENFP"), None),
            raw("c", Some("INFP"), None),
        ];
        let corpus = resolve_labels(rows, 16).unwrap();
        let labels: Vec<usize> = corpus.records.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![2, 0, 1]);
    }

    #[test]
    fn test_missing_labels_are_rejected() {
        let rows = vec![raw("a", Some("INTJ"), None), raw("b", None, None)];
        let err = resolve_labels(rows, 16).unwrap_err();
        assert!(err.to_string().contains("Row 3"));
    }

    #[test]
    fn test_out_of_range_label_is_rejected() {
        let rows = vec![raw("a", None, Some(16))];
        assert!(resolve_labels(rows, 16).is_err());
        let rows = vec![raw("a", None, Some(-1))];
        assert!(resolve_labels(rows, 16).is_err());
    }

    #[test]
    fn test_loads_csv_file_with_extra_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "idx,type,post,encoded_type").unwrap();
        writeln!(file, "0,INTJ,\"hello, world\",10").unwrap();
        writeln!(file, "1,ENFP,second post,1").unwrap();
        file.flush().unwrap();

        let source = CsvRecordSource::new(file.path(), 16);
        let corpus = source.load_all().unwrap();
        assert_eq!(corpus.record_count(), 2);
        assert_eq!(corpus.records[0].text, "hello, world");
        assert_eq!(corpus.records[0].label, 10);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let source = CsvRecordSource::new("does/not/exist.csv", 16);
        assert!(source.load_all().is_err());
    }
}
