use std::time::Duration;

use async_trait::async_trait;
use pixbatch_core::{ClientError, EditRequest, EditingClient};
use serde::Serialize;
use tracing::debug;

use crate::{
    ApiConfig, ConfigError,
    http::{encode_image, post_for_image},
};

/// Prompt-driven style transfer provider.
#[derive(Debug, Clone)]
pub struct BananaClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model_key: String,
}

#[derive(Serialize)]
struct BananaRequest<'a> {
    image: String,
    model_key: &'a str,
    prompt: &'a str,
}

impl BananaClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model_key: impl Into<String>,
    ) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key, model_key)
    }

    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model_key: model_key.into(),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &ApiConfig) -> Result<Self, ConfigError> {
        config.require(pixbatch_core::ModelKind::Style)?;
        Ok(Self::with_client(
            client,
            &config.banana_api_url,
            &config.banana_api_key,
            &config.banana_model_key,
        ))
    }
}

#[async_trait]
impl EditingClient for BananaClient {
    fn name(&self) -> &str {
        "banana"
    }

    async fn edit(
        &self,
        image_png: &[u8],
        request: &EditRequest,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        let EditRequest::Style { prompt } = request else {
            return Err(ClientError::Transport(format!(
                "banana cannot serve {} requests",
                request.model()
            )));
        };

        let body = BananaRequest {
            image: encode_image(image_png),
            model_key: &self.model_key,
            prompt,
        };

        debug!(url = %self.api_url, "sending banana request");
        post_for_image(&self.client, &self.api_url, &self.api_key, &body, timeout).await
    }
}
