use crate::config::{IndexingOptions, SearchOptions};
use crate::error::{PipelineError, RepositoryError, SearchError};
use crate::extractor::ExtractorDispatch;
use crate::models::{
    DocumentMetadata, DocumentPage, EngineQuery, IndexSettings, IndexStats, RunStats, SearchParams,
    SearchResponse,
};
use crate::pipeline::{IndexingPipeline, ProgressHook};
use crate::traits::{DocumentSource, SearchIndex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_LIST_LIMIT: usize = 100;

pub struct SearchService<S, I> {
    source: Arc<S>,
    index: Arc<I>,
    pipeline: IndexingPipeline<S, I>,
    options: SearchOptions,
    settings: IndexSettings,
}

impl<S, I> SearchService<S, I>
where
    S: DocumentSource + 'static,
    I: SearchIndex + 'static,
{
    pub fn new(
        source: Arc<S>,
        index: Arc<I>,
        extractor: Arc<ExtractorDispatch>,
        indexing: IndexingOptions,
        options: SearchOptions,
    ) -> Self {
        let pipeline = IndexingPipeline::new(Arc::clone(&source), Arc::clone(&index), extractor, indexing);
        Self {
            source,
            index,
            pipeline,
            options,
            settings: IndexSettings::default(),
        }
    }

    pub async fn configure_index(&self) -> Result<(), SearchError> {
        self.index.ensure_index().await?;
        self.index.update_settings(&self.settings).await?;
        info!("index settings applied");
        Ok(())
    }

    pub async fn index_documents(
        &self,
        progress: Option<ProgressHook>,
        cancel: CancellationToken,
    ) -> Result<RunStats, PipelineError> {
        self.pipeline.run(progress, cancel).await
    }

    // Engine failures come back as an empty result carrying `error`.
    pub async fn search(&self, params: SearchParams) -> SearchResponse {
        if params.query.trim().is_empty() {
            return SearchResponse::failed(params.query, "query must not be empty");
        }

        let query = EngineQuery {
            limit: params.limit.unwrap_or(self.options.max_results),
            offset: params.offset.unwrap_or(0),
            filter: params.filter,
            crop_length: self.options.crop_length,
            query: params.query,
        };

        match self.index.search(&query).await {
            Ok(response) => SearchResponse {
                hits: response.hits,
                query: query.query,
                processing_time_ms: Some(response.processing_time_ms),
                estimated_total_hits: response.estimated_total_hits,
                error: None,
            },
            Err(error) => {
                warn!(query = %query.query, %error, "search failed");
                SearchResponse::failed(query.query, error.to_string())
            }
        }
    }

    pub async fn get_stats(&self) -> IndexStats {
        match self.index.stats().await {
            Ok(raw) => normalize_stats(&raw, &self.options.storage_type),
            Err(error) => {
                warn!(%error, "could not read index stats");
                IndexStats {
                    storage_type: self.options.storage_type.clone(),
                    error: Some(error.to_string()),
                    ..IndexStats::default()
                }
            }
        }
    }

    pub async fn clear_index(&self) -> Result<(), SearchError> {
        self.index.delete_all_documents().await?;
        info!("index cleared");
        Ok(())
    }

    pub async fn list_documents(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<DocumentPage, RepositoryError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let documents = self.source.list_all_documents().await?;
        let total = documents.len();

        Ok(DocumentPage {
            documents: documents.into_iter().skip(offset).take(limit).collect(),
            total,
            limit,
            offset,
        })
    }

    pub async fn get_document_metadata(
        &self,
        id: &str,
    ) -> Result<Option<DocumentMetadata>, RepositoryError> {
        self.source.fetch_metadata(id).await
    }

    pub async fn download_document_content(&self, id: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        self.source.fetch_content(id).await
    }

    pub async fn test_connection(&self) -> bool {
        match self.source.test_connection().await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "source connection test failed");
                false
            }
        }
    }

    pub async fn engine_healthy(&self) -> bool {
        match self.index.health().await {
            Ok(healthy) => healthy,
            Err(error) => {
                warn!(%error, "search engine health check failed");
                false
            }
        }
    }
}

// Accepts stats at the top level or nested under `stats`, with the field
// distribution as an object or a list of pairs.
pub fn normalize_stats(raw: &Value, storage_type: &str) -> IndexStats {
    let body = raw
        .get("stats")
        .filter(|nested| nested.is_object())
        .unwrap_or(raw);

    IndexStats {
        number_of_documents: body.get("numberOfDocuments").and_then(as_count).unwrap_or(0),
        is_indexing: body.get("isIndexing").and_then(Value::as_bool).unwrap_or(false),
        field_distribution: body
            .get("fieldDistribution")
            .map(field_distribution)
            .unwrap_or_default(),
        storage_type: storage_type.to_string(),
        error: None,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn field_distribution(value: &Value) -> BTreeMap<String, u64> {
    let mut fields = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (field, count) in map {
                fields.insert(field.clone(), as_count(count).unwrap_or(0));
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                let pair = match entry {
                    Value::Array(pair) if pair.len() == 2 => {
                        pair[0].as_str().map(|field| (field, &pair[1]))
                    }
                    Value::Object(map) => map
                        .get("field")
                        .and_then(Value::as_str)
                        .zip(map.get("count")),
                    _ => None,
                };
                if let Some((field, count)) = pair {
                    fields.insert(field.to_string(), as_count(count).unwrap_or(0));
                }
            }
        }
        _ => {}
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcrOptions;
    use crate::fakes::{FakeIndex, FakeSource};
    use serde_json::json;

    fn service(source: FakeSource, index: Arc<FakeIndex>) -> SearchService<FakeSource, FakeIndex> {
        let indexing = IndexingOptions {
            workers: 2,
            ..IndexingOptions::default()
        };
        let extractor = Arc::new(ExtractorDispatch::new(indexing.max_text_length, OcrOptions::default()));
        SearchService::new(Arc::new(source), index, extractor, indexing, SearchOptions::default())
    }

    #[tokio::test]
    async fn engine_failure_returns_empty_hits_with_error() {
        let service = service(FakeSource::default(), Arc::new(FakeIndex::down()));
        let response = service.search(SearchParams::new("ballast")).await;

        assert!(response.hits.is_empty());
        assert_eq!(response.query, "ballast");
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn blank_query_never_reaches_the_engine() {
        let service = service(FakeSource::default(), Arc::new(FakeIndex::down()));
        let response = service.search(SearchParams::new("   ")).await;

        assert_eq!(response.error.as_deref(), Some("query must not be empty"));
        assert!(response.hits.is_empty());
    }

    #[tokio::test]
    async fn indexed_documents_are_searchable() {
        let index = Arc::new(FakeIndex::default());
        let service = service(FakeSource::with_text_documents(12), Arc::clone(&index));

        service.configure_index().await.expect("configure");
        let stats = service
            .index_documents(None, CancellationToken::new())
            .await
            .expect("index run");
        assert_eq!(stats.indexed, 12);

        let response = service
            .search(SearchParams {
                limit: Some(5),
                ..SearchParams::new("document number")
            })
            .await;
        assert_eq!(response.hits.len(), 5);
        assert_eq!(response.processing_time_ms, Some(1));
        assert!(response.error.is_none());

        assert_eq!(service.get_stats().await.number_of_documents, 12);
        service.clear_index().await.expect("clear");
        assert_eq!(index.count(), 0);
        assert_eq!(index.settings.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn configuring_twice_replaces_settings_each_time() {
        let index = Arc::new(FakeIndex::default());
        let service = service(FakeSource::default(), Arc::clone(&index));

        service.configure_index().await.expect("first");
        service.configure_index().await.expect("second");

        let applied = index.settings.lock().expect("lock");
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0], applied[1]);
        assert_eq!(applied[1].ranking_rules[0], "words");
    }

    #[test]
    fn stats_are_read_from_top_level_or_nested_shape() {
        let flat = normalize_stats(
            &json!({
                "numberOfDocuments": 42,
                "isIndexing": true,
                "fieldDistribution": {"name": 42, "content": 40}
            }),
            "mssql",
        );
        let nested = normalize_stats(
            &json!({
                "stats": {
                    "numberOfDocuments": "42",
                    "isIndexing": true,
                    "fieldDistribution": [["name", 42], {"field": "content", "count": 40}, "junk"]
                }
            }),
            "mssql",
        );

        assert_eq!(flat, nested);
        assert_eq!(flat.field_distribution.get("content"), Some(&40));
        assert_eq!(flat.storage_type, "mssql");
    }

    #[test]
    fn malformed_stats_default_to_zero() {
        let stats = normalize_stats(&json!({"numberOfDocuments": "many", "fieldDistribution": 3}), "mssql");
        assert_eq!(stats.number_of_documents, 0);
        assert!(!stats.is_indexing);
        assert!(stats.field_distribution.is_empty());
    }

    #[tokio::test]
    async fn stats_failure_keeps_the_shape() {
        let service = service(FakeSource::default(), Arc::new(FakeIndex::down()));
        let stats = service.get_stats().await;

        assert_eq!(stats.number_of_documents, 0);
        assert_eq!(stats.storage_type, "mssql");
        assert!(stats.error.is_some());
    }

    #[tokio::test]
    async fn document_listing_is_paginated_over_the_full_set() {
        let service = service(FakeSource::with_text_documents(7), Arc::new(FakeIndex::default()));

        let page = service.list_documents(Some(3), 5).await.expect("listing");
        assert_eq!(page.total, 7);
        assert_eq!((page.limit, page.offset), (3, 5));
        let names: Vec<_> = page.documents.iter().map(|document| document.name.as_str()).collect();
        assert_eq!(names, vec!["doc6.txt", "doc7.txt"]);

        let default_page = service.list_documents(None, 0).await.expect("listing");
        assert_eq!(default_page.limit, DEFAULT_LIST_LIMIT);
        assert_eq!(default_page.documents.len(), 7);
    }

    #[tokio::test]
    async fn document_lookups_pass_through_to_the_source() {
        let service = service(FakeSource::with_text_documents(2), Arc::new(FakeIndex::default()));

        let metadata = service
            .get_document_metadata("FORMS_MASTER_2")
            .await
            .expect("lookup");
        assert_eq!(metadata.map(|document| document.name), Some("doc2.txt".to_string()));

        let content = service
            .download_document_content("FORMS_MASTER_1")
            .await
            .expect("download");
        assert_eq!(content.as_deref(), Some(&b"Document number 1"[..]));

        assert_eq!(service.get_document_metadata("PAYROLL_1").await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn connectivity_checks_report_booleans() {
        let healthy = service(FakeSource::default(), Arc::new(FakeIndex::default()));
        assert!(healthy.test_connection().await);
        assert!(healthy.engine_healthy().await);

        let broken = service(
            FakeSource {
                unavailable: true,
                ..FakeSource::default()
            },
            Arc::new(FakeIndex::down()),
        );
        assert!(!broken.test_connection().await);
        assert!(!broken.engine_healthy().await);
    }
}
