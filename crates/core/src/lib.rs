pub mod config;
pub mod error;
pub mod extractor;
pub mod ids;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod schema;
pub mod service;
pub mod stores;
pub mod traits;

#[cfg(test)]
mod fakes;

pub use config::{
    parse_table_list, IndexingOptions, MeilisearchConfig, OcrOptions, SearchOptions, SqlServerConfig,
};
pub use error::{ConfigError, ExtractionError, IdError, PipelineError, RepositoryError, SearchError};
pub use extractor::{Extraction, ExtractorDispatch, TextExtractor};
pub use ids::{DocumentKey, IdCodec};
pub use models::{
    find_page_for_query, DocumentMetadata, DocumentPage, IndexSettings, IndexStats, IndexedDocument,
    PageText, RunStats, SearchParams, SearchResponse,
};
pub use pipeline::{IndexingPipeline, ProgressHook};
pub use repository::SqlServerRepository;
pub use schema::{TableRegistry, TableSchema};
pub use service::SearchService;
pub use stores::MeilisearchStore;
pub use traits::{DocumentSource, SearchIndex};
