use crate::error::{RepositoryError, SearchError};
use crate::models::{
    DocumentMetadata, EngineQuery, EngineSearchResponse, IndexSettings, IndexedDocument, MetadataMap,
};
use crate::traits::{DocumentSource, SearchIndex};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn metadata(position: usize, name: &str) -> DocumentMetadata {
    DocumentMetadata {
        composite_id: format!("FORMS_MASTER_{position}"),
        source_table: "FORMS_MASTER".to_string(),
        original_id: position.to_string(),
        name: name.to_string(),
        title: name.to_string(),
        form_no: None,
        mime_type: "text/plain".to_string(),
        size_bytes: "0".to_string(),
        modified_time: String::new(),
        path: format!("General/{name}"),
        metadata: MetadataMap::new(),
    }
}

pub(crate) enum Content {
    Bytes(Vec<u8>),
    Missing,
    Unavailable,
}

#[derive(Default)]
pub(crate) struct FakeSource {
    pub(crate) documents: Vec<DocumentMetadata>,
    pub(crate) contents: HashMap<String, Content>,
    pub(crate) unavailable: bool,
}

impl FakeSource {
    pub(crate) fn with_text_documents(count: usize) -> Self {
        let mut source = Self::default();
        for position in 1..=count {
            source.push(
                metadata(position, &format!("doc{position}.txt")),
                Content::Bytes(format!("Document number {position}").into_bytes()),
            );
        }
        source
    }

    pub(crate) fn push(&mut self, document: DocumentMetadata, content: Content) {
        self.contents.insert(document.composite_id.clone(), content);
        self.documents.push(document);
    }

    pub(crate) fn replace(&mut self, position: usize, name: &str, content: Content) {
        let document = metadata(position, name);
        self.contents.insert(document.composite_id.clone(), content);
        self.documents[position - 1] = document;
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn test_connection(&self) -> Result<(), RepositoryError> {
        if self.unavailable {
            return Err(RepositoryError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn list_all_documents(&self) -> Result<Vec<DocumentMetadata>, RepositoryError> {
        if self.unavailable {
            return Err(RepositoryError::Unavailable("connection refused".to_string()));
        }
        Ok(self.documents.clone())
    }

    async fn fetch_metadata(&self, id: &str) -> Result<Option<DocumentMetadata>, RepositoryError> {
        Ok(self
            .documents
            .iter()
            .find(|document| document.composite_id == id)
            .cloned())
    }

    async fn fetch_content(&self, id: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        match self.contents.get(id) {
            Some(Content::Bytes(bytes)) => Ok(Some(bytes.clone())),
            Some(Content::Unavailable) => {
                Err(RepositoryError::Unavailable("reconnect failed".to_string()))
            }
            Some(Content::Missing) | None => Ok(None),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeIndex {
    pub(crate) documents: Mutex<BTreeMap<String, IndexedDocument>>,
    pub(crate) batches: Mutex<Vec<usize>>,
    pub(crate) settings: Mutex<Vec<IndexSettings>>,
    pub(crate) failures_left: AtomicUsize,
    pub(crate) unavailable: bool,
    pub(crate) stats: Option<Value>,
}

impl FakeIndex {
    pub(crate) fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    pub(crate) fn down() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.documents.lock().expect("lock").len()
    }

    fn check(&self) -> Result<(), SearchError> {
        if self.unavailable {
            return Err(unreachable_engine("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for FakeIndex {
    async fn ensure_index(&self) -> Result<(), SearchError> {
        self.check()
    }

    async fn update_settings(&self, settings: &IndexSettings) -> Result<(), SearchError> {
        self.check()?;
        self.settings.lock().expect("lock").push(settings.clone());
        Ok(())
    }

    async fn add_documents(&self, documents: &[IndexedDocument]) -> Result<(), SearchError> {
        self.check()?;
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(unreachable_engine("engine busy"));
        }

        self.batches.lock().expect("lock").push(documents.len());
        let mut stored = self.documents.lock().expect("lock");
        for document in documents {
            stored.insert(document.id().to_string(), document.clone());
        }
        Ok(())
    }

    async fn search(&self, query: &EngineQuery) -> Result<EngineSearchResponse, SearchError> {
        self.check()?;
        let needle = query.query.to_lowercase();
        let hits = self
            .documents
            .lock()
            .expect("lock")
            .values()
            .filter(|document| document.content.to_lowercase().contains(&needle))
            .skip(query.offset)
            .take(query.limit)
            .map(|document| json!({"id": document.id(), "name": document.document.name}))
            .collect::<Vec<_>>();
        Ok(EngineSearchResponse {
            estimated_total_hits: Some(hits.len() as u64),
            hits,
            processing_time_ms: 1,
        })
    }

    async fn stats(&self) -> Result<Value, SearchError> {
        self.check()?;
        Ok(self
            .stats
            .clone()
            .unwrap_or_else(|| json!({"numberOfDocuments": self.count(), "isIndexing": false})))
    }

    async fn delete_all_documents(&self) -> Result<(), SearchError> {
        self.check()?;
        self.documents.lock().expect("lock").clear();
        Ok(())
    }

    async fn health(&self) -> Result<bool, SearchError> {
        Ok(!self.unavailable)
    }
}

fn unreachable_engine(details: &str) -> SearchError {
    SearchError::BackendResponse {
        backend: "fake".to_string(),
        details: details.to_string(),
    }
}
