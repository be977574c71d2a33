use anyhow::Result;
use async_trait::async_trait;
use qdrant_client::{
    config::QdrantConfig,
    qdrant::{
        point_id::PointIdOptions, value::Kind, vectors_config::Config, CreateCollection, Distance,
        PointId, PointStruct, SearchPoints, UpsertPoints, Value, VectorParams, VectorsConfig,
        WithPayloadSelector, WriteOrdering,
    },
    Qdrant,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;

use crate::external::error::ExternalError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDBConfig {
    pub collection_name: String,
    pub host: String,
    pub port: u16,
    pub vector_size: usize,
}

impl VectorDBConfig {
    /// Get the full URL for the Qdrant service
    pub fn get_url(&self) -> Result<String> {
        let url = if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        };

        // Validate the URL
        Url::parse(&url).map_err(|e| ExternalError::ConfigError(format!("Invalid URL: {}", e)))?;

        Ok(url)
    }
}

impl Default for VectorDBConfig {
    fn default() -> Self {
        Self {
            collection_name: "activity".to_string(),
            host: "localhost".to_string(),
            port: 6334,
            vector_size: 1536,
        }
    }
}

/// One activity record ready for indexing.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, String>,
}

/// A similarity search result with its stored metadata.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, String>,
}

/// The vector index seam the agent talks through; mocked in tests.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Drop and recreate the collection. Each run indexes a fresh snapshot.
    async fn reset(&self) -> Result<()>;
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()>;
    async fn search(&self, vector: Vec<f32>, limit: u64) -> Result<Vec<SearchHit>>;
}

/// Wrapper for the Qdrant vector database
pub struct VectorDB {
    client: Qdrant,
    config: VectorDBConfig,
}

impl VectorDB {
    /// Create a new vector database client with the given configuration
    pub fn new(config: VectorDBConfig) -> Result<Self> {
        let url = config.get_url()?;
        let qdrant_config = QdrantConfig::from_url(&url);
        let client = Qdrant::new(qdrant_config)
            .map_err(|e| ExternalError::ConnectionError(e.to_string()))?;

        Ok(Self { client, config })
    }

    async fn collection_exists(&self) -> Result<bool> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| ExternalError::VectorDBError(e.to_string()))?;

        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.config.collection_name))
    }
}

#[async_trait]
impl VectorIndex for VectorDB {
    async fn reset(&self) -> Result<()> {
        if self.collection_exists().await? {
            self.client
                .delete_collection(self.config.collection_name.as_str())
                .await
                .map_err(|e| ExternalError::VectorDBError(e.to_string()))?;
        }

        let vectors_config = VectorsConfig {
            config: Some(Config::Params(VectorParams {
                size: self.config.vector_size as u64,
                distance: Distance::Cosine.into(),
                ..Default::default()
            })),
        };

        let create_collection = CreateCollection {
            collection_name: self.config.collection_name.clone(),
            vectors_config: Some(vectors_config),
            ..Default::default()
        };

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| ExternalError::VectorDBError(e.to_string()))?;

        Ok(())
    }

    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|point| {
                let payload: HashMap<String, Value> = point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect();

                PointStruct {
                    id: Some(PointId {
                        point_id_options: Some(PointIdOptions::Uuid(point.id.to_string())),
                    }),
                    payload,
                    vectors: Some(point.vector.into()),
                }
            })
            .collect();

        let upsert_points = UpsertPoints {
            collection_name: self.config.collection_name.clone(),
            points,
            ordering: Some(WriteOrdering::default()),
            ..Default::default()
        };

        self.client
            .upsert_points(upsert_points)
            .await
            .map_err(|e| ExternalError::VectorDBError(e.to_string()))?;

        Ok(())
    }

    async fn search(&self, vector: Vec<f32>, limit: u64) -> Result<Vec<SearchHit>> {
        let search_request = SearchPoints {
            collection_name: self.config.collection_name.clone(),
            vector,
            limit,
            with_payload: Some(WithPayloadSelector::from(true)),
            ..Default::default()
        };

        let results = self
            .client
            .search_points(search_request)
            .await
            .map_err(|e| ExternalError::VectorDBError(e.to_string()))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .and_then(|id| id.point_id_options)
                    .map(|id| match id {
                        PointIdOptions::Uuid(uuid) => uuid,
                        PointIdOptions::Num(num) => num.to_string(),
                    })
                    .unwrap_or_default();

                let payload = point
                    .payload
                    .into_iter()
                    .filter_map(|(k, v)| match v.kind {
                        Some(Kind::StringValue(s)) => Some((k, s)),
                        _ => None,
                    })
                    .collect();

                SearchHit {
                    id,
                    score: point.score,
                    payload,
                }
            })
            .collect())
    }
}
