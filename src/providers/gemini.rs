use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerationClient, ProviderError};
use crate::config::GenerationConfig;

// Gemini API structures
#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part { text: text.to_string() }],
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Embedding,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

impl GenerateContentResponse {
    fn text(self) -> Result<String, ProviderError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            Err(ProviderError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

/// Google Gemini client. Failures are returned as-is; nothing is retried.
pub struct GeminiClient {
    config: GenerationConfig,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GenerationConfig) -> Result<Self, ProviderError> {
        let api_key = config.resolved_api_key().ok_or(ProviderError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;

        Ok(Self { config, api_key, client })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, url: &str, body: &B) -> Result<R, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ProviderError::ApiError {
                status: status.as_u16(),
                message: format!("malformed response: {}", e),
            })
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = self.endpoint(&self.config.model, "generateContent");
        let request = GenerateContentRequest {
            contents: vec![Content::text(prompt)],
        };
        tracing::debug!(model = %self.config.model, chars = prompt.len(), "Requesting generation");
        let response: GenerateContentResponse = self.post(&url, &request).await?;
        response.text()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = self.endpoint(&self.config.embedding_model, "embedContent");
        let request = EmbedContentRequest {
            content: Content::text(text),
        };
        let response: EmbedContentResponse = self.post(&url, &request).await?;
        Ok(response.embedding.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> GenerationConfig {
        GenerationConfig {
            base_url: "https://example.invalid/v1beta/".to_string(),
            api_key: Some("test-key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_joins_model_and_method() {
        let client = GeminiClient::new(config_with_key()).unwrap();
        assert_eq!(
            client.endpoint("gemini-1.5-pro", "generateContent"),
            "https://example.invalid/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content::text("hello")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"contents": [{"parts": [{"text": "hello"}]}]}));
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}}]
        }))
        .unwrap();
        assert_eq!(response.text().unwrap(), "Hello, world");
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), Err(ProviderError::EmptyResponse));
    }
}
