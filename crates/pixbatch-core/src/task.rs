use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EditError, TaskId, imaging};

pub const DEFAULT_SMOOTH: f64 = 0.8;
pub const DEFAULT_WHITEN: f64 = 0.6;
pub const DEFAULT_STYLE_PROMPT: &str = "convert to anime style, high detail";

/// The closed set of editing variants a task can ask for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Portrait retouch/enhance, served by the Doubao provider.
    Retouch,
    /// Prompt-driven style transfer, served by the Banana provider.
    Style,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Retouch => "retouch",
            ModelKind::Style => "style",
        }
    }
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retouch" | "doubao" => Ok(ModelKind::Retouch),
            "style" | "banana" => Ok(ModelKind::Style),
            other => Err(EditError::Validation(format!("unknown model type `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetouchKind {
    Retouch,
    Enhance,
}

impl RetouchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetouchKind::Retouch => "retouch",
            RetouchKind::Enhance => "enhance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Raw, unvalidated parameters for one task. Checked against the task's
/// model kind by [`EditParams::validate`] before anything is sent out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EditParams(BTreeMap<String, ParamValue>);

impl EditParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn validate(&self, model: ModelKind) -> Result<EditRequest, EditError> {
        match model {
            ModelKind::Retouch => {
                self.reject_unknown(model, &["edit_type", "smooth", "whiten"])?;

                let edit_type = match self.text("edit_type")? {
                    None | Some("retouch") => RetouchKind::Retouch,
                    Some("enhance") => RetouchKind::Enhance,
                    Some(other) => {
                        return Err(EditError::Validation(format!(
                            "edit_type must be `retouch` or `enhance`, got `{other}`"
                        )));
                    }
                };

                Ok(EditRequest::Retouch {
                    edit_type,
                    smooth: self.unit("smooth")?.unwrap_or(DEFAULT_SMOOTH),
                    whiten: self.unit("whiten")?.unwrap_or(DEFAULT_WHITEN),
                })
            }
            ModelKind::Style => {
                self.reject_unknown(model, &["prompt"])?;

                let prompt = self.text("prompt")?.unwrap_or(DEFAULT_STYLE_PROMPT);
                Ok(EditRequest::Style {
                    prompt: prompt.to_string(),
                })
            }
        }
    }

    fn reject_unknown(&self, model: ModelKind, allowed: &[&str]) -> Result<(), EditError> {
        match self.0.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(EditError::Validation(format!(
                "parameter `{key}` is not accepted by the {model} model"
            ))),
            None => Ok(()),
        }
    }

    /// Numeric parameter constrained to `0.0..=1.0`.
    fn unit(&self, key: &str) -> Result<Option<f64>, EditError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(ParamValue::Number(v)) if v.is_finite() && (0.0..=1.0).contains(v) => Ok(Some(*v)),
            Some(ParamValue::Number(v)) => Err(EditError::Validation(format!(
                "{key} must be between 0.0 and 1.0, got {v}"
            ))),
            Some(ParamValue::Text(_)) => {
                Err(EditError::Validation(format!("{key} must be a number")))
            }
        }
    }

    /// Non-empty string parameter.
    fn text(&self, key: &str) -> Result<Option<&str>, EditError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(ParamValue::Text(s)) if !s.trim().is_empty() => Ok(Some(s.trim())),
            Some(ParamValue::Text(_)) => {
                Err(EditError::Validation(format!("{key} must not be empty")))
            }
            Some(ParamValue::Number(_)) => {
                Err(EditError::Validation(format!("{key} must be a string")))
            }
        }
    }
}

/// Validated, typed parameters handed to an editing client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum EditRequest {
    Retouch {
        edit_type: RetouchKind,
        smooth: f64,
        whiten: f64,
    },
    Style {
        prompt: String,
    },
}

impl EditRequest {
    pub fn model(&self) -> ModelKind {
        match self {
            EditRequest::Retouch { .. } => ModelKind::Retouch,
            EditRequest::Style { .. } => ModelKind::Style,
        }
    }
}

/// Result state of a task. Data lives inside the variant, so a success
/// always carries bytes and a failure always carries an error.
#[derive(Debug)]
pub enum TaskOutcome {
    Pending,
    Success { bytes: Vec<u8> },
    Failure { error: EditError },
}

#[derive(Debug, Error)]
pub enum TaskTransitionError {
    #[error("illegal task transition from {from} to {to}")]
    Illegal {
        from: &'static str,
        to: &'static str,
    },
}

impl Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Pending => write!(f, "Pending"),
            TaskOutcome::Success { bytes } => write!(f, "Success({} bytes)", bytes.len()),
            TaskOutcome::Failure { error } => write!(f, "Failure(error={error})"),
        }
    }
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Pending => "Pending",
            TaskOutcome::Success { .. } => "Success",
            TaskOutcome::Failure { .. } => "Failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskOutcome::Pending)
    }
}

/// One image to edit, plus its result once a worker has run it.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    source: PathBuf,
    output_dir: PathBuf,
    output_path: PathBuf,
    model: ModelKind,
    params: EditParams,
    outcome: TaskOutcome,
}

impl Task {
    pub fn new(
        source: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        model: ModelKind,
        params: EditParams,
    ) -> Self {
        let source = source.into();
        let output_dir = output_dir.into();
        let output_path = imaging::output_path_for(&source, &output_dir);

        Self {
            id: TaskId::new(),
            source,
            output_dir,
            output_path,
            model,
            params,
            outcome: TaskOutcome::Pending,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn params(&self) -> &EditParams {
        &self.params
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<source stem>_processed.png`
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn outcome(&self) -> &TaskOutcome {
        &self.outcome
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success { .. })
    }

    pub fn result_bytes(&self) -> Option<&[u8]> {
        match &self.outcome {
            TaskOutcome::Success { bytes } => Some(bytes),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&EditError> {
        match &self.outcome {
            TaskOutcome::Failure { error } => Some(error),
            _ => None,
        }
    }

    pub fn succeed(&mut self, bytes: Vec<u8>) -> Result<(), TaskTransitionError> {
        match self.outcome {
            TaskOutcome::Pending => {
                self.outcome = TaskOutcome::Success { bytes };
                Ok(())
            }
            ref outcome => Err(TaskTransitionError::Illegal {
                from: outcome.as_str(),
                to: "Success",
            }),
        }
    }

    pub fn fail(&mut self, error: EditError) -> Result<(), TaskTransitionError> {
        match self.outcome {
            TaskOutcome::Pending => {
                self.outcome = TaskOutcome::Failure { error };
                Ok(())
            }
            ref outcome => Err(TaskTransitionError::Illegal {
                from: outcome.as_str(),
                to: "Failure",
            }),
        }
    }
}
