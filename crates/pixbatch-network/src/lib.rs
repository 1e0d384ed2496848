//! HTTP editing providers and their configuration.

mod banana;
mod config;
mod doubao;
mod http;

use std::sync::Arc;

use pixbatch_core::{EditingClients, ModelKind};

pub use banana::BananaClient;
pub use config::{ApiConfig, ConfigError};
pub use doubao::DoubaoClient;

/// Builds the client registry for a run.
///
/// With `only` set, just that provider is built and its configuration must
/// be complete. Without it, every fully configured provider is registered
/// and the rest are skipped.
pub fn clients_from_config(
    config: &ApiConfig,
    only: Option<ModelKind>,
) -> Result<EditingClients, ConfigError> {
    let http = reqwest::Client::new();
    let mut clients = EditingClients::new();

    for model in [ModelKind::Retouch, ModelKind::Style] {
        if only.is_some_and(|m| m != model) {
            continue;
        }
        if only.is_none() && config.require(model).is_err() {
            tracing::debug!(%model, "provider not configured, skipping");
            continue;
        }

        clients = match model {
            ModelKind::Retouch => clients.with(
                model,
                Arc::new(DoubaoClient::from_config(http.clone(), config)?),
            ),
            ModelKind::Style => clients.with(
                model,
                Arc::new(BananaClient::from_config(http.clone(), config)?),
            ),
        };
    }

    Ok(clients)
}
