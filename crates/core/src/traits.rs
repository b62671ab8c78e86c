use crate::error::{RepositoryError, SearchError};
use crate::models::{DocumentMetadata, EngineQuery, EngineSearchResponse, IndexSettings, IndexedDocument};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn test_connection(&self) -> Result<(), RepositoryError>;

    async fn list_all_documents(&self) -> Result<Vec<DocumentMetadata>, RepositoryError>;

    async fn fetch_metadata(&self, id: &str) -> Result<Option<DocumentMetadata>, RepositoryError>;

    async fn fetch_content(&self, id: &str) -> Result<Option<Vec<u8>>, RepositoryError>;
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn ensure_index(&self) -> Result<(), SearchError>;

    async fn update_settings(&self, settings: &IndexSettings) -> Result<(), SearchError>;

    // Upserts by primary key; resubmitting a document replaces it.
    async fn add_documents(&self, documents: &[IndexedDocument]) -> Result<(), SearchError>;

    async fn search(&self, query: &EngineQuery) -> Result<EngineSearchResponse, SearchError>;

    async fn stats(&self) -> Result<Value, SearchError>;

    async fn delete_all_documents(&self) -> Result<(), SearchError>;

    async fn health(&self) -> Result<bool, SearchError>;
}
