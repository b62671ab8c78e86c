use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type MetadataMap = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "id")]
    pub composite_id: String,
    pub source_table: String,
    pub original_id: String,
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_no: Option<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "size")]
    pub size_bytes: String,
    #[serde(rename = "modifiedTime")]
    pub modified_time: String,
    pub path: String,
    #[serde(default)]
    pub metadata: MetadataMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    #[serde(rename = "page")]
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(flatten)]
    pub document: DocumentMetadata,
    pub content: String,
    pub page_info: Vec<PageText>,
}

impl IndexedDocument {
    pub fn id(&self) -> &str {
        &self.document.composite_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total: usize,
    pub indexed: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub filter: Option<String>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineQuery {
    pub query: String,
    pub limit: usize,
    pub offset: usize,
    pub filter: Option<String>,
    pub crop_length: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSearchResponse {
    #[serde(default)]
    pub hits: Vec<Value>,
    #[serde(default)]
    pub processing_time_ms: u64,
    #[serde(default)]
    pub estimated_total_hits: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub hits: Vec<Value>,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_total_hits: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            query: query.into(),
            processing_time_ms: None,
            estimated_total_hits: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub number_of_documents: u64,
    pub is_indexing: bool,
    pub field_distribution: BTreeMap<String, u64>,
    pub storage_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentPage {
    pub documents: Vec<DocumentMetadata>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    pub searchable_attributes: Vec<String>,
    pub displayed_attributes: Vec<String>,
    pub filterable_attributes: Vec<String>,
    pub sortable_attributes: Vec<String>,
    pub ranking_rules: Vec<String>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            searchable_attributes: owned(&[
                "name",
                "title",
                "form_no",
                "content",
                "path",
                "source_table",
            ]),
            displayed_attributes: owned(&[
                "id",
                "source_table",
                "original_id",
                "name",
                "title",
                "form_no",
                "content",
                "path",
                "mimeType",
                "size",
                "modifiedTime",
                "metadata",
                "page_info",
            ]),
            filterable_attributes: owned(&[
                "mimeType",
                "modifiedTime",
                "source_table",
                "metadata.form_type",
                "metadata.department",
                "metadata.vessel_id",
                "metadata.survey_type",
            ]),
            sortable_attributes: owned(&["modifiedTime", "name", "source_table"]),
            ranking_rules: owned(&[
                "words",
                "typo",
                "proximity",
                "attribute",
                "sort",
                "exactness",
            ]),
        }
    }
}

// First page whose text contains `query` (case-insensitive); page 1 otherwise.
pub fn find_page_for_query(page_info: &[PageText], query: &str) -> u32 {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return 1;
    }

    page_info
        .iter()
        .find(|page| page.text.to_lowercase().contains(&needle))
        .map(|page| page.number)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_metadata() -> DocumentMetadata {
        DocumentMetadata {
            composite_id: "FORMS_MASTER_12".to_string(),
            source_table: "FORMS_MASTER".to_string(),
            original_id: "12".to_string(),
            name: "ballast.pdf".to_string(),
            title: "Ballast water log".to_string(),
            form_no: Some("F-001".to_string()),
            mime_type: "application/pdf".to_string(),
            size_bytes: "2048".to_string(),
            modified_time: "2024-03-01T10:00:00".to_string(),
            path: "Checklist/Deck/ballast.pdf".to_string(),
            metadata: MetadataMap::from([("status".to_string(), None)]),
        }
    }

    #[test]
    fn indexed_document_serializes_flat_with_engine_field_names() {
        let document = IndexedDocument {
            document: sample_metadata(),
            content: "Ballast exchange".to_string(),
            page_info: vec![PageText {
                number: 1,
                text: "Ballast exchange".to_string(),
            }],
        };

        let value = serde_json::to_value(&document).expect("document should serialize");
        assert_eq!(value["id"], json!("FORMS_MASTER_12"));
        assert_eq!(value["mimeType"], json!("application/pdf"));
        assert_eq!(value["size"], json!("2048"));
        assert_eq!(value["modifiedTime"], json!("2024-03-01T10:00:00"));
        assert_eq!(value["page_info"][0]["page"], json!(1));
        assert_eq!(value["metadata"]["status"], Value::Null);
        assert!(value.get("composite_id").is_none());
    }

    #[test]
    fn failed_search_response_keeps_query_and_drops_timings() {
        let response = SearchResponse::failed("pump", "engine down");
        let value = serde_json::to_value(&response).expect("response should serialize");
        assert_eq!(value, json!({"hits": [], "query": "pump", "error": "engine down"}));
    }

    #[test]
    fn page_lookup_is_case_insensitive_and_defaults_to_first_page() {
        let pages = vec![
            PageText {
                number: 1,
                text: "General arrangement".to_string(),
            },
            PageText {
                number: 4,
                text: "Fire PUMP inspection".to_string(),
            },
        ];

        assert_eq!(find_page_for_query(&pages, "fire pump"), 4);
        assert_eq!(find_page_for_query(&pages, "lifeboat"), 1);
        assert_eq!(find_page_for_query(&[], "pump"), 1);
    }
}
