//! Provider credentials and endpoints.

use pixbatch_core::ModelKind;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not set")]
    Missing { var: &'static str },
}

/// Credentials and endpoints for every editing provider.
///
/// | Env Var            | Used by             |
/// |--------------------|---------------------|
/// | `DOUBAO_API_URL`   | retouch (Doubao)    |
/// | `DOUBAO_API_KEY`   | retouch (Doubao)    |
/// | `BANANA_API_URL`   | style (Banana)      |
/// | `BANANA_API_KEY`   | style (Banana)      |
/// | `BANANA_MODEL_KEY` | style (Banana)      |
#[derive(Clone, Default)]
pub struct ApiConfig {
    pub doubao_api_url: String,
    pub doubao_api_key: String,
    pub banana_api_url: String,
    pub banana_api_key: String,
    pub banana_model_key: String,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("doubao_api_url", &self.doubao_api_url)
            .field("doubao_api_key", &redact(&self.doubao_api_key))
            .field("banana_api_url", &self.banana_api_url)
            .field("banana_api_key", &redact(&self.banana_api_key))
            .field("banana_model_key", &redact(&self.banana_model_key))
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

impl ApiConfig {
    /// Loads configuration from the environment, reading a `.env` file in
    /// the working directory first when one exists. Unset variables become
    /// empty strings; they only matter for the model kind actually used.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).unwrap_or_default();

        Self {
            doubao_api_url: get("DOUBAO_API_URL"),
            doubao_api_key: get("DOUBAO_API_KEY"),
            banana_api_url: get("BANANA_API_URL"),
            banana_api_key: get("BANANA_API_KEY"),
            banana_model_key: get("BANANA_MODEL_KEY"),
        }
    }

    /// Checks that every value the given model kind needs is present.
    pub fn require(&self, model: ModelKind) -> Result<(), ConfigError> {
        let needed = match model {
            ModelKind::Retouch => vec![
                ("DOUBAO_API_URL", self.doubao_api_url.as_str()),
                ("DOUBAO_API_KEY", self.doubao_api_key.as_str()),
            ],
            ModelKind::Style => vec![
                ("BANANA_API_URL", self.banana_api_url.as_str()),
                ("BANANA_API_KEY", self.banana_api_key.as_str()),
                ("BANANA_MODEL_KEY", self.banana_model_key.as_str()),
            ],
        };

        match needed.into_iter().find(|(_, value)| value.is_empty()) {
            Some((var, _)) => Err(ConfigError::Missing { var }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn missing_values_become_empty() {
        let config = ApiConfig::from_lookup(lookup(&[("DOUBAO_API_URL", " http://doubao ")]));
        assert_eq!(config.doubao_api_url, "http://doubao");
        assert!(config.banana_api_url.is_empty());
    }

    #[test]
    fn require_names_the_first_missing_variable() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("DOUBAO_API_URL", "http://doubao"),
            ("DOUBAO_API_KEY", "k"),
            ("BANANA_API_URL", "http://banana"),
        ]));

        assert!(config.require(ModelKind::Retouch).is_ok());
        match config.require(ModelKind::Style) {
            Err(ConfigError::Missing { var }) => assert_eq!(var, "BANANA_API_KEY"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = ApiConfig {
            doubao_api_key: "very-secret".into(),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
