use crate::error::ConfigError;
use crate::schema::DEFAULT_TABLES;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct SqlServerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub tables: Vec<String>,
    pub connect_timeout: Duration,
    pub login_timeout: Duration,
    pub trust_cert: bool,
}

impl Default for SqlServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1433,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            tables: DEFAULT_TABLES.iter().map(|table| table.to_string()).collect(),
            connect_timeout: Duration::from_secs(30),
            login_timeout: Duration::from_secs(30),
            trust_cert: true,
        }
    }
}

impl SqlServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing("MSSQL_HOST"));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::Missing("MSSQL_USER"));
        }
        if self.password.is_empty() {
            return Err(ConfigError::Missing("MSSQL_PASSWORD"));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::Missing("MSSQL_DATABASE"));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                field: "MSSQL_PORT",
                details: "port must be non-zero".to_string(),
            });
        }
        if self.tables.iter().all(|table| table.trim().is_empty()) {
            return Err(ConfigError::Missing("DATABASE_TABLES"));
        }
        Ok(())
    }
}

pub fn parse_table_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|table| !table.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct MeilisearchConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub index: String,
    pub request_timeout: Duration,
    pub wait_for_tasks: bool,
    pub task_timeout: Duration,
}

impl Default for MeilisearchConfig {
    fn default() -> Self {
        Self {
            host: "http://127.0.0.1:7700".to_string(),
            api_key: None,
            index: "documents".to_string(),
            request_timeout: Duration::from_secs(30),
            wait_for_tasks: true,
            task_timeout: Duration::from_secs(120),
        }
    }
}

impl MeilisearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing("MEILISEARCH_HOST"));
        }
        Url::parse(&self.host).map_err(|error| ConfigError::Invalid {
            field: "MEILISEARCH_HOST",
            details: error.to_string(),
        })?;
        if self.index.trim().is_empty() {
            return Err(ConfigError::Missing("MEILISEARCH_INDEX"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IndexingOptions {
    pub batch_size: usize,
    pub max_text_length: usize,
    pub workers: usize,
    pub queue_capacity: usize,
    pub submit_attempts: usize,
    pub submit_backoff: Duration,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_text_length: 50_000,
            workers: 4,
            queue_capacity: 32,
            submit_attempts: 3,
            submit_backoff: Duration::from_millis(500),
        }
    }
}

impl IndexingOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("BATCH_SIZE", self.batch_size),
            ("MAX_TEXT_LENGTH", self.max_text_length),
            ("INDEX_WORKERS", self.workers),
            ("queue_capacity", self.queue_capacity),
            ("submit_attempts", self.submit_attempts),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    details: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_results: usize,
    pub crop_length: usize,
    pub storage_type: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 20,
            crop_length: 200,
            storage_type: "mssql".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrOptions {
    pub tesseract_bin: String,
    pub language: String,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            tesseract_bin: "tesseract".to_string(),
            language: "eng".to_string(),
        }
    }
}
