use std::time::Duration;

use async_trait::async_trait;
use pixbatch_core::{ClientError, EditRequest, EditingClient};
use serde::Serialize;
use tracing::debug;

use crate::{
    ApiConfig, ConfigError,
    http::{encode_image, post_for_image},
};

/// Retouch/enhance provider.
#[derive(Debug, Clone)]
pub struct DoubaoClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct DoubaoRequest<'a> {
    image: String,
    edit_type: &'a str,
    smooth: f64,
    whiten: f64,
}

impl DoubaoClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    /// Reuses an existing [`reqwest::Client`] and its connection pool.
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &ApiConfig) -> Result<Self, ConfigError> {
        config.require(pixbatch_core::ModelKind::Retouch)?;
        Ok(Self::with_client(
            client,
            &config.doubao_api_url,
            &config.doubao_api_key,
        ))
    }
}

#[async_trait]
impl EditingClient for DoubaoClient {
    fn name(&self) -> &str {
        "doubao"
    }

    async fn edit(
        &self,
        image_png: &[u8],
        request: &EditRequest,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        let EditRequest::Retouch {
            edit_type,
            smooth,
            whiten,
        } = request
        else {
            return Err(ClientError::Transport(format!(
                "doubao cannot serve {} requests",
                request.model()
            )));
        };

        let body = DoubaoRequest {
            image: encode_image(image_png),
            edit_type: edit_type.as_str(),
            smooth: *smooth,
            whiten: *whiten,
        };

        debug!(url = %self.api_url, edit_type = edit_type.as_str(), "sending doubao request");
        post_for_image(&self.client, &self.api_url, &self.api_key, &body, timeout).await
    }
}
