//! Pipeline templates
//!
//! A template is a KFP v2 pipeline spec document. It is held as a JSON value
//! because the platform owns the schema; only the handful of fields this
//! crate touches are checked.

use crate::error::AlignmentError;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info};

/// Published AutoSxS template in the Google Cloud KFP registry
pub const AUTOSXS_TEMPLATE_URI: &str =
    "https://us-kfp.pkg.dev/ml-pipeline/google-cloud-registry/autosxs-template/default";

/// Default output path of a compiled template
pub const DEFAULT_TEMPLATE_PATH: &str = "pipeline.yaml";

/// A validated pipeline spec document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineSpec(Value);

impl PipelineSpec {
    /// Wrap a JSON value, checking `pipelineInfo.name`, `root` and `schemaVersion`.
    pub fn from_value(value: Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| AlignmentError::InvalidTemplate("document is not a mapping".into()))?;

        if obj
            .get("pipelineInfo")
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .is_none()
        {
            return Err(AlignmentError::InvalidTemplate(
                "missing pipelineInfo.name".into(),
            ));
        }
        if !obj.get("root").is_some_and(Value::is_object) {
            return Err(AlignmentError::InvalidTemplate("missing root".into()));
        }
        if !obj.get("schemaVersion").is_some_and(Value::is_string) {
            return Err(AlignmentError::InvalidTemplate("missing schemaVersion".into()));
        }

        Ok(PipelineSpec(value))
    }

    /// Parse the first YAML (or JSON) document in `text`.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let first = serde_yaml::Deserializer::from_str(text)
            .next()
            .ok_or_else(|| AlignmentError::InvalidTemplate("empty template".into()))?;
        let value = Value::deserialize(first)?;
        Self::from_value(value)
    }

    /// Load a compiled template from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn name(&self) -> &str {
        self.0["pipelineInfo"]["name"].as_str().unwrap_or_default()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    /// Names of the top-level DAG tasks
    pub fn task_names(&self) -> Vec<String> {
        self.0["root"]["dag"]["tasks"]
            .as_object()
            .map(|tasks| tasks.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Set `cachingOptions.enableCache = false` on every task in the root DAG
    /// and in every component DAG. Returns the number of tasks touched.
    pub fn disable_caching(&mut self) -> usize {
        let mut touched = 0;

        if let Some(tasks) = self
            .0
            .pointer_mut("/root/dag/tasks")
            .and_then(Value::as_object_mut)
        {
            touched += disable_task_caching(tasks);
        }

        if let Some(components) = self
            .0
            .get_mut("components")
            .and_then(Value::as_object_mut)
        {
            for component in components.values_mut() {
                if let Some(tasks) = component
                    .pointer_mut("/dag/tasks")
                    .and_then(Value::as_object_mut)
                {
                    touched += disable_task_caching(tasks);
                }
            }
        }

        debug!("Disabled caching on {} tasks", touched);
        touched
    }
}

fn disable_task_caching(tasks: &mut Map<String, Value>) -> usize {
    let mut touched = 0;
    for task in tasks.values_mut() {
        if let Some(task) = task.as_object_mut() {
            task.insert("cachingOptions".into(), json!({ "enableCache": false }));
            touched += 1;
        }
    }
    touched
}

/// What to compile: a spec in hand, or a published template to fetch first
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineDefinition {
    Inline(PipelineSpec),
    Published(String),
}

impl PipelineDefinition {
    /// The published AutoSxS pipeline
    pub fn autosxs() -> Self {
        PipelineDefinition::Published(AUTOSXS_TEMPLATE_URI.to_string())
    }
}

/// Write `spec` as YAML to `output_path`, creating parent directories.
pub fn write_template(spec: &PipelineSpec, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output_path, spec.to_yaml()?)?;
    info!("Pipeline {} compiled to {:?}", spec.name(), output_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SPEC_YAML: &str = r#"
pipelineInfo:
  name: autosxs-template
schemaVersion: 2.1.0
sdkVersion: kfp-2.7.0
root:
  dag:
    tasks:
      autosxs-judgments:
        componentRef:
          name: comp-autosxs-judgments
      model-evaluation-autosxs-metrics:
        componentRef:
          name: comp-autosxs-metrics
components:
  comp-autosxs-judgments:
    executorLabel: exec-autosxs-judgments
  comp-inner:
    dag:
      tasks:
        arbiter:
          componentRef:
            name: comp-arbiter
"#;

    #[test]
    fn test_parse_and_name() {
        let spec = PipelineSpec::from_yaml_str(SPEC_YAML).unwrap();
        assert_eq!(spec.name(), "autosxs-template");

        let mut tasks = spec.task_names();
        tasks.sort();
        assert_eq!(
            tasks,
            vec!["autosxs-judgments", "model-evaluation-autosxs-metrics"]
        );
    }

    #[test]
    fn test_multi_document_takes_first() {
        let text = format!("{SPEC_YAML}\n---\nplatforms:\n  kubernetes: {{}}\n");
        let spec = PipelineSpec::from_yaml_str(&text).unwrap();
        assert_eq!(spec.name(), "autosxs-template");
    }

    #[test]
    fn test_rejects_incomplete_spec() {
        let err = PipelineSpec::from_yaml_str("pipelineInfo:\n  name: x\n").unwrap_err();
        assert!(matches!(err, AlignmentError::InvalidTemplate(_)));

        let err = PipelineSpec::from_value(json!(["not", "a", "mapping"])).unwrap_err();
        assert!(matches!(err, AlignmentError::InvalidTemplate(_)));
    }

    #[test]
    fn test_disable_caching_covers_nested_dags() {
        let mut spec = PipelineSpec::from_yaml_str(SPEC_YAML).unwrap();
        assert_eq!(spec.disable_caching(), 3);

        let v = spec.as_value();
        for task in ["autosxs-judgments", "model-evaluation-autosxs-metrics"] {
            assert_eq!(
                v["root"]["dag"]["tasks"][task]["cachingOptions"]["enableCache"],
                json!(false)
            );
        }
        assert_eq!(
            v["components"]["comp-inner"]["dag"]["tasks"]["arbiter"]["cachingOptions"]
                ["enableCache"],
            json!(false)
        );
    }

    #[test]
    fn test_write_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join(DEFAULT_TEMPLATE_PATH);

        let spec = PipelineSpec::from_yaml_str(SPEC_YAML).unwrap();
        write_template(&spec, &path).unwrap();

        assert!(path.exists());
        assert_eq!(PipelineSpec::load(&path).unwrap(), spec);
    }
}
