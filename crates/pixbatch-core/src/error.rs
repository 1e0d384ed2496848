use std::{fmt, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::client::ClientError;

/// Where in the task pipeline an I/O failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStage {
    ReadSource,
    EncodeSource,
    WriteOutput,
}

impl fmt::Display for IoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoStage::ReadSource => write!(f, "read source image"),
            IoStage::EncodeSource => write!(f, "encode source image"),
            IoStage::WriteOutput => write!(f, "write output image"),
        }
    }
}

/// Task-scoped failure. Never fatal to the pool: the owning task is marked
/// failed with this error's message and the worker moves on.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("failed to {stage} {}: {source}", .path.display())]
    Io {
        stage: IoStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {}s waiting for the editing service", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("editing service request failed: {0}")]
    Transport(String),

    #[error("editing service returned an unusable response: {0}")]
    Api(String),

    #[error("output path {} is already claimed by another task in this run", .path.display())]
    OutputConflict { path: PathBuf },

    #[error("task aborted unexpectedly: {0}")]
    Internal(String),
}

impl EditError {
    pub fn io(stage: IoStage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EditError::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EditError::Timeout(_))
    }

    /// True when the task failed before any remote call was attempted.
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            EditError::Validation(_)
                | EditError::OutputConflict { .. }
                | EditError::Io {
                    stage: IoStage::ReadSource | IoStage::EncodeSource,
                    ..
                }
        )
    }
}

impl From<ClientError> for EditError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout(after) => EditError::Timeout(after),
            ClientError::Transport(msg) => EditError::Transport(msg),
            ClientError::Status { status, body } => {
                EditError::Transport(format!("status {status}: {body}"))
            }
            ClientError::MalformedResponse(msg) => EditError::Api(msg),
        }
    }
}
