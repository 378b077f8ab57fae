//! Pipeline definitions file
//!
//! Two layouts are accepted, picked by file extension. `.yaml` / `.yml` files
//! map pipeline names to their settings, with jobs as an ordered mapping of
//! job name to command:
//!
//! ```yaml
//! build:
//!   schedule: "0 * * * *"
//!   jobs:
//!     compile: make
//!     test: make test
//! ```
//!
//! Anything else is read as JSON of the form
//! `{"pipelines": [{"name": ..., "jobs": [{"name": ..., "command": ...}]}]}`.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use sluice_core::{JobDefinition, PipelineDefinition};

#[derive(Debug, Deserialize)]
struct DefinitionsFile {
    #[serde(default)]
    pipelines: Vec<PipelineDefinition>,
}

#[derive(Debug, Deserialize)]
struct YamlPipeline {
    #[serde(default)]
    schedule: Option<String>,
    #[serde(default)]
    alert: Option<String>,
    #[serde(default)]
    jobs: Mapping,
}

/// Reads and validates every definition in `path`
pub fn load(path: &Path) -> Result<Vec<PipelineDefinition>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definitions file: {}", path.display()))?;

    let definitions = parse_for(path, &content)
        .with_context(|| format!("Failed to parse definitions file: {}", path.display()))?;

    validate(&definitions)?;
    Ok(definitions)
}

fn parse_for(path: &Path, content: &str) -> Result<Vec<PipelineDefinition>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => parse_yaml(content),
        _ => parse(content),
    }
}

fn parse(content: &str) -> Result<Vec<PipelineDefinition>> {
    let file: DefinitionsFile = serde_json::from_str(content)?;
    Ok(file.pipelines)
}

fn parse_yaml(content: &str) -> Result<Vec<PipelineDefinition>> {
    let root: Option<Mapping> = serde_yaml::from_str(content)?;

    root.unwrap_or_default()
        .into_iter()
        .map(|(key, value)| -> Result<PipelineDefinition> {
            let name = text(&key).context("Pipeline names must be strings")?;
            let pipeline: YamlPipeline = serde_yaml::from_value(value)
                .with_context(|| format!("Invalid pipeline '{}'", name))?;

            let jobs = pipeline
                .jobs
                .iter()
                .map(|(job, command)| -> Result<JobDefinition> {
                    let job = text(job)
                        .with_context(|| format!("Pipeline '{}' has a non-string job name", name))?;
                    let command = text(command).with_context(|| {
                        format!("Job '{}' of pipeline '{}' needs a command string", job, name)
                    })?;
                    Ok(JobDefinition::new(job, command))
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(PipelineDefinition {
                name,
                schedule: pipeline.schedule,
                alert: pipeline.alert,
                jobs,
            })
        })
        .collect()
}

/// Scalar text, so that `check: true` runs the command `true`
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Checks each definition and that pipeline names are unique
pub fn validate(definitions: &[PipelineDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for definition in definitions {
        definition
            .validate()
            .with_context(|| format!("Invalid pipeline '{}'", definition.name))?;

        if !seen.insert(definition.name.as_str()) {
            bail!("Pipeline '{}' is defined more than once", definition.name);
        }
    }
    Ok(())
}

/// Looks a definition up by name
pub fn find<'a>(
    definitions: &'a [PipelineDefinition],
    name: &str,
) -> Result<&'a PipelineDefinition> {
    definitions
        .iter()
        .find(|d| d.name == name)
        .with_context(|| format!("No pipeline named '{}'", name))
}
