//! The remote editing capability the workers drive.
//!
//! Concrete HTTP providers live in `pixbatch-network`; tests plug in their
//! own implementations.

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::{EditRequest, ModelKind};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Edits one PNG-encoded image and returns the edited bytes.
///
/// Implementations are shared by every worker, so they must be callable
/// concurrently without external locking.
#[async_trait]
pub trait EditingClient: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    async fn edit(
        &self,
        image_png: &[u8],
        request: &EditRequest,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError>;
}

/// Which client serves which model kind for a run.
#[derive(Clone, Default)]
pub struct EditingClients {
    by_model: BTreeMap<ModelKind, Arc<dyn EditingClient>>,
}

impl EditingClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model: ModelKind, client: Arc<dyn EditingClient>) -> Self {
        self.by_model.insert(model, client);
        self
    }

    pub fn get(&self, model: ModelKind) -> Option<&Arc<dyn EditingClient>> {
        self.by_model.get(&model)
    }

    pub fn is_empty(&self) -> bool {
        self.by_model.is_empty()
    }
}

impl fmt::Debug for EditingClients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.by_model.iter().map(|(k, v)| (k, v.name())))
            .finish()
    }
}
