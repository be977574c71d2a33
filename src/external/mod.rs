pub mod embedding;
pub mod error;
pub mod llm;
pub mod vectordb;

pub use embedding::{EmbeddingClient, EmbeddingConfig, OpenAiEmbeddings};
pub use error::ExternalError;
pub use llm::{ChatClient, LLMConfig, OpenAiChat};
pub use vectordb::{IndexPoint, SearchHit, VectorDB, VectorDBConfig, VectorIndex};
