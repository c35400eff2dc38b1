use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::{Result, StudioError};
use crate::executor::{split_data_url, to_data_url, BackendRequest};
use crate::ImageBackend;

/// Public Generative Language API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// REST client for Gemini image models (`:generateContent`).
///
/// # Example
/// ```no_run
/// use shotforge::{GeminiClient, ImageBackend, BackendRequest, ImageModel, AspectRatio};
///
/// # async fn example() -> shotforge::Result<()> {
/// let client = GeminiClient::new(shotforge::gemini::DEFAULT_ENDPOINT);
/// let request = BackendRequest {
///     model: ImageModel::Flash,
///     text: "a red mug, studio lighting".into(),
///     aspect_ratio: AspectRatio::Square,
///     seed: 42,
///     image_size: None,
///     reference: None,
///     api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
/// };
/// let image = client.generate(&request).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
            timeout: Duration::from_secs(120),
        }
    }

    /// Build a client from the engine's endpoint and request timeout.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.endpoint.clone()).with_timeout(config.request_timeout)
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// JSON body for a `generateContent` call. The reference image, if any,
    /// precedes the text part.
    pub fn request_body(request: &BackendRequest) -> Value {
        let mut parts = Vec::new();
        if let Some(reference) = &request.reference {
            let (mime, data) = split_data_url(reference);
            parts.push(json!({ "inlineData": { "mimeType": mime, "data": data } }));
        }
        parts.push(json!({ "text": request.text }));

        let mut image_config = json!({ "aspectRatio": request.aspect_ratio.as_str() });
        if let Some(size) = request.image_size {
            image_config["imageSize"] = json!(size);
        }

        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "seed": request.seed,
                "imageConfig": image_config,
            }
        })
    }

    /// Pull the first inline image out of a response as a data URL.
    pub fn parse_image_part(response: &Value) -> Option<String> {
        response
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())?
            .iter()
            .find_map(|part| {
                let inline = part.get("inlineData").or_else(|| part.get("inline_data"))?;
                let data = inline.get("data").and_then(|d| d.as_str())?;
                let mime = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("image/png");
                Some(to_data_url(mime, data))
            })
    }

    /// Extract the API's error message, falling back to the raw body.
    fn error_message(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                let msg = v.pointer("/error/message")?.as_str()?.to_string();
                match v.pointer("/error/status").and_then(|s| s.as_str()) {
                    Some(status) => Some(format!("{} ({})", msg, status)),
                    None => Some(msg),
                }
            })
            .unwrap_or_else(|| body.to_string())
    }
}

impl ImageBackend for GeminiClient {
    async fn generate(&self, request: &BackendRequest) -> Result<Option<String>> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, request.model);
        let body = Self::request_body(request);

        tracing::debug!(model = %request.model, seed = request.seed, has_reference = request.reference.is_some(), "sending generateContent");

        let resp = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .header("x-goog-api-key", &request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StudioError::Network {
                context: format!("Cannot reach image backend at {}", self.endpoint),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(StudioError::Http {
                status,
                body: Self::error_message(&body_text),
            });
        }

        let json: Value = resp.json().await.map_err(|e| StudioError::Network {
            context: "Failed to parse generateContent response".into(),
            source: e,
        })?;

        let image = Self::parse_image_part(&json);
        if image.is_none() {
            tracing::warn!(model = %request.model, "response contained no image part");
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AspectRatio, ImageModel};

    fn request() -> BackendRequest {
        BackendRequest {
            model: ImageModel::Pro,
            text: "a cup".into(),
            aspect_ratio: AspectRatio::Landscape,
            seed: 7,
            image_size: Some("2K"),
            reference: Some("data:image/jpeg;base64,QUJD".into()),
            api_key: "key".into(),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let body = GeminiClient::request_body(&request());
        let parts = body.pointer("/contents/0/parts").unwrap().as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        assert_eq!(parts[1]["text"], "a cup");
        assert_eq!(body["generationConfig"]["seed"], 7);
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "2K");
    }

    #[test]
    fn test_request_body_without_reference() {
        let mut req = request();
        req.reference = None;
        req.image_size = None;
        let body = GeminiClient::request_body(&req);
        let parts = body.pointer("/contents/0/parts").unwrap().as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert!(body["generationConfig"]["imageConfig"].get("imageSize").is_none());
    }

    #[test]
    fn test_parse_image_part() {
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your image" },
                        { "inlineData": { "mimeType": "image/png", "data": "AAAA" } }
                    ]
                }
            }]
        });
        assert_eq!(
            GeminiClient::parse_image_part(&response).as_deref(),
            Some("data:image/png;base64,AAAA")
        );
    }

    #[test]
    fn test_parse_without_image_is_none() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": "refused" }] } }]
        });
        assert!(GeminiClient::parse_image_part(&response).is_none());
        assert!(GeminiClient::parse_image_part(&json!({})).is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"code":403,"message":"The caller does not have permission","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            GeminiClient::error_message(body),
            "The caller does not have permission (PERMISSION_DENIED)"
        );
        assert_eq!(GeminiClient::error_message("plain"), "plain");
    }

    #[test]
    fn test_endpoint_normalized() {
        let client = GeminiClient::new("http://localhost:9000/v1beta/");
        assert_eq!(client.endpoint(), "http://localhost:9000/v1beta");
    }
}
