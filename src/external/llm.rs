use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::external::error::ExternalError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub model: String,
    pub api_url: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub temperature: f32,
}

impl LLMConfig {
    /// Get the chat completions URL for the OpenAI-compatible service
    pub fn get_url(&self) -> Result<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.api_url.trim_end_matches('/')
        );

        // Validate the URL
        Url::parse(&url).map_err(|e| ExternalError::ConfigError(format!("Invalid URL: {}", e)))?;

        Ok(url)
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            temperature: 0.1,
        }
    }
}

/// A chat completion backend. The agent talks to the LLM only through this
/// trait so tests can substitute a mock.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Chat client for any OpenAI-compatible completions API.
pub struct OpenAiChat {
    client: Client,
    config: LLMConfig,
}

impl OpenAiChat {
    pub fn new(config: LLMConfig) -> Result<Self> {
        config.get_url()?;
        Ok(Self {
            client: Client::new(),
            config,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let response = self
            .client
            .post(self.config.get_url()?)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "model": self.config.model,
                "temperature": self.config.temperature,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user }
                ]
            }))
            .send()
            .await
            .map_err(|e| ExternalError::ConnectionError(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ExternalError::ChatError(format!("{}: {}", status, body)).into());
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ExternalError::ChatError(format!("malformed response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ExternalError::ChatError("response contained no choices".into()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_generation() {
        // Default API host
        let config = LLMConfig::default();
        assert_eq!(
            config.get_url().unwrap(),
            "https://api.openai.com/v1/chat/completions"
        );

        // Self-hosted endpoint with trailing slash
        let config = LLMConfig {
            api_url: "http://localhost:8080/".to_string(),
            ..LLMConfig::default()
        };
        assert_eq!(
            config.get_url().unwrap(),
            "http://localhost:8080/v1/chat/completions"
        );

        // Not a URL at all
        let config = LLMConfig {
            api_url: "not a url".to_string(),
            ..LLMConfig::default()
        };
        assert!(config.get_url().is_err());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "choices": [
                { "message": { "role": "assistant", "content": "The summary." } }
            ]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "The summary.");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(empty.choices.is_empty());
    }
}
