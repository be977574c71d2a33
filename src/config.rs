use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

use crate::external::{EmbeddingConfig, LLMConfig, VectorDBConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Required once collection actually runs; analysis-only runs work without it.
    #[serde(skip_serializing, default)]
    pub token: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub repos: Vec<String>,
    pub days: u64,
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub github: GitHubConfig,
    pub llm: LLMConfig,
    pub embedding: EmbeddingConfig,
    pub vector_db: VectorDBConfig,
    pub collection: CollectionConfig,
    pub log_level: String,
}

/// Parse the comma-separated `REPOS` value, dropping entries that are not
/// `owner/repo` slugs.
pub fn parse_repos(value: &str) -> Vec<String> {
    let slug = Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").unwrap();
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| {
            if slug.is_match(s) {
                true
            } else {
                warn!(repo = s, "ignoring invalid repository slug");
                false
            }
        })
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let openai_api_url =
            env::var("OPENAI_API_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key = env::var("OPENAI_API_KEY").unwrap_or_default();

        let github = GitHubConfig {
            token: env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
        };

        let llm = LLMConfig {
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            api_url: openai_api_url.clone(),
            api_key: openai_api_key.clone(),
            temperature: env::var("OPENAI_TEMPERATURE")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse()
                .unwrap_or(0.1),
        };

        let embedding = EmbeddingConfig {
            model: env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            api_url: openai_api_url,
            api_key: openai_api_key,
        };

        let vector_db = VectorDBConfig {
            collection_name: env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| "activity".to_string()),
            host: env::var("QDRANT_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("QDRANT_PORT")
                .unwrap_or_else(|_| "6334".to_string())
                .parse()
                .unwrap_or(6334),
            vector_size: env::var("QDRANT_VECTOR_SIZE")
                .unwrap_or_else(|_| "1536".to_string())
                .parse()
                .unwrap_or(1536),
        };

        let collection = CollectionConfig {
            repos: parse_repos(
                &env::var("REPOS").unwrap_or_else(|_| "ethereum/go-ethereum".to_string()),
            ),
            days: env::var("DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap_or(7),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
        };

        Ok(Self {
            github,
            llm,
            embedding,
            vector_db,
            collection,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
