//! AutoSxS pipeline parameters

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Parameters for a question-answering AutoSxS run with human preference labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSxsParameters {
    pub evaluation_dataset: String,
    pub id_columns: Vec<String>,
    pub context_column: String,
    pub instruction_column: String,
    pub task: String,
    pub response_column_a: String,
    pub response_column_b: String,
    pub human_preference_column: String,
}

impl AutoSxsParameters {
    /// Defaults matching the columns written by [`crate::dataset::EvaluationDataset`]
    pub fn question_answering(evaluation_dataset: &str) -> Self {
        AutoSxsParameters {
            evaluation_dataset: evaluation_dataset.to_string(),
            id_columns: vec!["questions".to_string()],
            context_column: "context".to_string(),
            instruction_column: "questions".to_string(),
            task: "question_answering".to_string(),
            response_column_a: "pred_a".to_string(),
            response_column_b: "pred_b".to_string(),
            human_preference_column: "actuals".to_string(),
        }
    }

    /// Parameter values in the shape the pipeline expects
    pub fn to_parameter_values(&self) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(
            "evaluation_dataset".to_string(),
            json!(self.evaluation_dataset),
        );
        values.insert("id_columns".to_string(), json!(self.id_columns));
        values.insert(
            "autorater_prompt_parameters".to_string(),
            json!({
                "inference_context": {"column": self.context_column},
                "inference_instruction": {"column": self.instruction_column},
            }),
        );
        values.insert("task".to_string(), json!(self.task));
        values.insert(
            "response_column_a".to_string(),
            json!(self.response_column_a),
        );
        values.insert(
            "response_column_b".to_string(),
            json!(self.response_column_b),
        );
        values.insert(
            "human_preference_column".to_string(),
            json!(self.human_preference_column),
        );
        values
    }
}
