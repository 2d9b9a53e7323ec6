//! Metric and judgment tables read back from pipeline outputs

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rows of a JSON Lines file, schema left to the producer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsTable {
    rows: Vec<Map<String, Value>>,
}

impl MetricsTable {
    /// Parse JSON Lines; blank lines are skipped, every other line must be an object.
    pub fn from_jsonl(text: &str) -> Result<Self> {
        let rows = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str::<Map<String, Value>>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(MetricsTable { rows })
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in first-seen order
    pub fn columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !names.contains(&key.as_str()) {
                    names.push(key);
                }
            }
        }
        names
    }

    /// Values of `name` for every row (`Null` where absent)
    pub fn column(&self, name: &str) -> Vec<&Value> {
        self.rows
            .iter()
            .map(|row| row.get(name).unwrap_or(&Value::Null))
            .collect()
    }
}
