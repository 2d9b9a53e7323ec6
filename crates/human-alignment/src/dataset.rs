//! Evaluation dataset with human preference labels
//!
//! Rows are serialized as JSON Lines with the column names the AutoSxS
//! pipeline parameters refer to (`context`, `questions`, `pred_a`, `pred_b`,
//! `actuals`).

use crate::error::AlignmentError;
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Local file name of the serialized dataset
pub const DATASET_FILE_NAME: &str = "evaluation_dataset_with_human_preference.json";

/// Object path of the dataset relative to the bucket root
pub const DATASET_OBJECT_PATH: &str = "input/evaluation_dataset_with_human_preference.json";

/// One evaluation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub context: String,
    pub questions: String,
    pub pred_a: String,
    pub pred_b: String,
    /// Human preference label, e.g. `"A"` or `"B"`
    pub actuals: String,
}

/// Parallel input columns, one entry per row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationColumns {
    pub context: Vec<String>,
    pub questions: Vec<String>,
    pub predictions_a: Vec<String>,
    pub predictions_b: Vec<String>,
    pub human_preference: Vec<String>,
}

/// Ordered collection of evaluation records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationDataset {
    records: Vec<EvaluationRecord>,
}

impl EvaluationDataset {
    /// Zip the input columns into records, in input order.
    ///
    /// All columns must have the same, non-zero length.
    pub fn from_columns(columns: EvaluationColumns) -> Result<Self> {
        let expected = columns.context.len();
        if expected == 0 {
            return Err(AlignmentError::EmptyDataset);
        }

        let lengths = [
            ("questions", columns.questions.len()),
            ("predictions_a", columns.predictions_a.len()),
            ("predictions_b", columns.predictions_b.len()),
            ("human_preference", columns.human_preference.len()),
        ];
        if let Some((column, actual)) = lengths.into_iter().find(|(_, len)| *len != expected) {
            return Err(AlignmentError::ColumnLengthMismatch {
                column,
                expected,
                actual,
            });
        }

        let records = columns
            .context
            .into_iter()
            .zip(columns.questions)
            .zip(columns.predictions_a)
            .zip(columns.predictions_b)
            .zip(columns.human_preference)
            .map(
                |((((context, questions), pred_a), pred_b), actuals)| EvaluationRecord {
                    context,
                    questions,
                    pred_a,
                    pred_b,
                    actuals,
                },
            )
            .collect();

        Ok(EvaluationDataset { records })
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize as JSON Lines (one object per line, trailing newline).
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Write the dataset to `dir/DATASET_FILE_NAME`.
    pub fn write_to_dir(&self, dir: &Path) -> Result<DatasetFile> {
        let body = self.to_jsonl()?;
        let path = dir.join(DATASET_FILE_NAME);
        std::fs::write(&path, body.as_bytes())?;

        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());

        Ok(DatasetFile {
            path,
            digest: hex::encode(hasher.finalize()),
            record_count: self.records.len(),
        })
    }
}

/// A dataset serialized on local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub path: PathBuf,
    /// SHA256 hex of the file contents
    pub digest: String,
    pub record_count: usize,
}

/// A dataset that has been uploaded to the session bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedDataset {
    pub local_path: PathBuf,
    pub remote_uri: String,
    pub digest: String,
    pub record_count: usize,
}

impl StagedDataset {
    /// Short digest (first 12 characters)
    pub fn short_digest(&self) -> &str {
        &self.digest[..12.min(self.digest.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn columns(n: usize) -> EvaluationColumns {
        EvaluationColumns {
            context: (1..=n).map(|i| format!("Context {i}")).collect(),
            questions: (1..=n).map(|i| format!("Question {i}")).collect(),
            predictions_a: (1..=n).map(|i| format!("Prediction A{i}")).collect(),
            predictions_b: (1..=n).map(|i| format!("Prediction B{i}")).collect(),
            human_preference: (1..=n)
                .map(|i| (if i % 2 == 1 { "A" } else { "B" }).to_string())
                .collect(),
        }
    }

    #[test]
    fn test_from_columns_preserves_order() {
        let dataset = EvaluationDataset::from_columns(columns(3)).unwrap();
        assert_eq!(dataset.len(), 3);

        let second = &dataset.records()[1];
        assert_eq!(second.context, "Context 2");
        assert_eq!(second.questions, "Question 2");
        assert_eq!(second.pred_a, "Prediction A2");
        assert_eq!(second.pred_b, "Prediction B2");
        assert_eq!(second.actuals, "B");
    }

    #[test]
    fn test_mismatched_columns_rejected() {
        let mut cols = columns(2);
        cols.predictions_b.pop();

        let err = EvaluationDataset::from_columns(cols).unwrap_err();
        match err {
            AlignmentError::ColumnLengthMismatch {
                column,
                expected,
                actual,
            } => {
                assert_eq!(column, "predictions_b");
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let err = EvaluationDataset::from_columns(EvaluationColumns::default()).unwrap_err();
        assert!(matches!(err, AlignmentError::EmptyDataset));
    }

    #[test]
    fn test_jsonl_uses_pipeline_column_names() {
        let dataset = EvaluationDataset::from_columns(columns(2)).unwrap();
        let body = dataset.to_jsonl().unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["context"], "Context 1");
        assert_eq!(first["questions"], "Question 1");
        assert_eq!(first["pred_a"], "Prediction A1");
        assert_eq!(first["pred_b"], "Prediction B1");
        assert_eq!(first["actuals"], "A");
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempdir().unwrap();
        let dataset = EvaluationDataset::from_columns(columns(2)).unwrap();

        let file = dataset.write_to_dir(dir.path()).unwrap();
        assert_eq!(file.path, dir.path().join(DATASET_FILE_NAME));
        assert_eq!(file.record_count, 2);
        assert_eq!(file.digest.len(), 64);

        let on_disk = std::fs::read_to_string(&file.path).unwrap();
        assert_eq!(on_disk, dataset.to_jsonl().unwrap());
    }
}
