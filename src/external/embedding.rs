use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::external::error::ExternalError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub api_url: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
}

impl EmbeddingConfig {
    /// Get the embeddings URL for the OpenAI-compatible service
    pub fn get_url(&self) -> Result<String> {
        let url = format!("{}/v1/embeddings", self.api_url.trim_end_matches('/'));

        // Validate the URL
        Url::parse(&url).map_err(|e| ExternalError::ConfigError(format!("Invalid URL: {}", e)))?;

        Ok(url)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            api_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
        }
    }
}

/// An embedding backend, kept behind a trait for the same reason as
/// [`crate::external::ChatClient`].
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

/// Embedding client for any OpenAI-compatible embeddings API.
pub struct OpenAiEmbeddings {
    client: Client,
    config: EmbeddingConfig,
}

impl OpenAiEmbeddings {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        config.get_url()?;
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(self.config.get_url()?)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "model": self.config.model,
                "input": input
            }))
            .send()
            .await
            .map_err(|e| ExternalError::ConnectionError(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ExternalError::EmbeddingError(format!("{}: {}", status, body)).into());
        }

        let mut parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| ExternalError::EmbeddingError(format!("malformed response: {}", e)))?;

        // The API does not guarantee input order
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(serde_json::json!(text)).await?;
        vectors
            .pop()
            .ok_or_else(|| ExternalError::EmbeddingError("response contained no data".into()).into())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.request(serde_json::json!(texts)).await?;
        if vectors.len() != texts.len() {
            return Err(ExternalError::EmbeddingError(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ))
            .into());
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_generation() {
        let config = EmbeddingConfig::default();
        assert_eq!(
            config.get_url().unwrap(),
            "https://api.openai.com/v1/embeddings"
        );

        let config = EmbeddingConfig {
            api_url: "http://localhost:8080/".to_string(),
            ..EmbeddingConfig::default()
        };
        assert_eq!(
            config.get_url().unwrap(),
            "http://localhost:8080/v1/embeddings"
        );
    }

    #[test]
    fn test_response_parsing_restores_order() {
        let body = r#"{
            "data": [
                { "index": 1, "embedding": [0.4, 0.5] },
                { "index": 0, "embedding": [0.1, 0.2] }
            ]
        }"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        parsed.data.sort_by_key(|d| d.index);
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
        assert_eq!(parsed.data[1].embedding, vec![0.4, 0.5]);
    }
}
