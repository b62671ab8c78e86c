use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("table is not configured: {0}")]
    UnknownTable(String),

    #[error("empty record id for table {0}")]
    EmptyRecordId(String),

    #[error("unresolvable document identifier: {0}")]
    Unresolvable(String),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("sql server error: {0}")]
    Sql(#[from] tiberius::error::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?} while {1}")]
    Timeout(std::time::Duration, &'static str),

    #[error("query against {table} failed: {details}")]
    Query { table: String, details: String },

    #[error(transparent)]
    Identifier(#[from] IdError),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("OCR backend not available: {0}")]
    OcrUnavailable(String),

    #[error("extractor panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("task {uid} ended with status {status}: {details}")]
    Task {
        uid: u64,
        status: String,
        details: String,
    },

    #[error("task {0} did not finish in time")]
    TaskTimeout(u64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid configuration for {field}: {details}")]
    Invalid { field: &'static str, details: String },

    #[error("no configured table has a known schema: {0}")]
    NoKnownTables(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("document enumeration failed: {0}")]
    Enumeration(#[from] RepositoryError),

    #[error("worker task failed: {0}")]
    Worker(String),
}
