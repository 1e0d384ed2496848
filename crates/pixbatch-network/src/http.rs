//! Request/response plumbing shared by the providers.
//!
//! Every provider takes a JSON body containing a base64 PNG, authenticates
//! with a bearer token, and answers with `{"image": "<base64>"}`.

use std::time::Duration;

use base64::{Engine, prelude::BASE64_STANDARD};
use pixbatch_core::ClientError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct ImageResponse {
    image: Option<String>,
}

pub(crate) fn encode_image(png: &[u8]) -> String {
    BASE64_STANDARD.encode(png)
}

/// Sends `body` to `url` and returns the decoded `image` field.
pub(crate) async fn post_for_image<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &B,
    timeout: Duration,
) -> Result<Vec<u8>, ClientError> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| map_transport(e, timeout))?;

    let response = ensure_success(response).await?;

    let raw = response
        .bytes()
        .await
        .map_err(|e| map_transport(e, timeout))?;

    decode_image(&raw)
}

fn decode_image(raw: &[u8]) -> Result<Vec<u8>, ClientError> {
    let parsed: ImageResponse = serde_json::from_slice(raw)
        .map_err(|e| ClientError::MalformedResponse(format!("response is not valid JSON: {e}")))?;

    let image = parsed
        .image
        .ok_or_else(|| ClientError::MalformedResponse("API response missing image data".into()))?;

    BASE64_STANDARD
        .decode(image.trim())
        .map_err(|e| ClientError::MalformedResponse(format!("image is not valid base64: {e}")))
}

fn map_transport(err: reqwest::Error, timeout: Duration) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout(timeout)
    } else {
        ClientError::Transport(err.to_string())
    }
}

/// Returns the response unchanged on a 2xx status, otherwise the status
/// and body text as [`ClientError::Status`].
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_image_field() {
        let raw = format!(r#"{{"image":"{}"}}"#, encode_image(b"png!"));
        assert_eq!(decode_image(raw.as_bytes()).unwrap(), b"png!");
    }

    #[test]
    fn missing_image_is_malformed() {
        let err = decode_image(br#"{"status":"ok"}"#).unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(ref m) if m.contains("missing image")));
    }

    #[test]
    fn bad_base64_is_malformed() {
        let err = decode_image(br#"{"image":"***"}"#).unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(_)));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            decode_image(b"<html>"),
            Err(ClientError::MalformedResponse(_))
        ));
    }
}
