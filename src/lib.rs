pub mod agent;
pub mod cache;
pub mod config;
pub mod external;
pub mod github;
pub mod models;
pub mod report;
pub mod stats;

pub use agent::ActivityAgent;
pub use cache::ActivityCache;
pub use config::Config;
pub use external::{ChatClient, EmbeddingClient, ExternalError, VectorDB, VectorIndex};
pub use github::GitHubClient;
pub use models::RepoActivity;
