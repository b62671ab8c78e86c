use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use docsearch_core::{
    find_page_for_query, parse_table_list, ConfigError, ExtractorDispatch, IndexingOptions,
    MeilisearchConfig, MeilisearchStore, OcrOptions, PageText, ProgressHook, SearchOptions,
    SearchParams, SearchService, SqlServerConfig, SqlServerRepository, TableRegistry,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Service = SearchService<SqlServerRepository, MeilisearchStore>;

#[derive(Parser)]
#[command(name = "docsearch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQL Server host
    #[arg(long, global = true, env = "MSSQL_HOST", default_value = "localhost")]
    mssql_host: String,

    /// SQL Server port
    #[arg(long, global = true, env = "MSSQL_PORT", default_value_t = 1433)]
    mssql_port: u16,

    #[arg(long, global = true, env = "MSSQL_USER", default_value = "")]
    mssql_user: String,

    #[arg(long, global = true, env = "MSSQL_PASSWORD", default_value = "", hide_env_values = true)]
    mssql_password: String,

    #[arg(long, global = true, env = "MSSQL_DATABASE", default_value = "")]
    mssql_database: String,

    /// Comma-separated tables to scan, in identifier resolution order
    #[arg(
        long,
        global = true,
        env = "DATABASE_TABLES",
        default_value = "FORMS_MASTER,VESSEL_CERTIFICATES,SurveyCertificates"
    )]
    database_tables: String,

    /// Meilisearch base URL
    #[arg(long, global = true, env = "MEILISEARCH_HOST", default_value = "http://127.0.0.1:7700")]
    meilisearch_host: String,

    #[arg(long, global = true, env = "MEILISEARCH_API_KEY", hide_env_values = true)]
    meilisearch_api_key: Option<String>,

    #[arg(long, global = true, env = "MEILISEARCH_INDEX", default_value = "documents")]
    meilisearch_index: String,

    /// Documents per index submission
    #[arg(long, global = true, env = "BATCH_SIZE", default_value_t = 10)]
    batch_size: usize,

    /// Default number of search hits
    #[arg(long, global = true, env = "MAX_SEARCH_RESULTS", default_value_t = 20)]
    max_search_results: usize,

    /// Characters of extracted text kept per document
    #[arg(long, global = true, env = "MAX_TEXT_LENGTH", default_value_t = 50_000)]
    max_text_length: usize,

    /// Concurrent download and extraction workers
    #[arg(long, global = true, env = "INDEX_WORKERS", default_value_t = 4)]
    index_workers: usize,

    #[arg(long, global = true, env = "TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: String,

    #[arg(long, global = true, env = "OCR_LANGUAGE", default_value = "eng")]
    ocr_language: String,
}

#[derive(Subcommand)]
enum Command {
    /// Configure the index and (re)index every active document.
    Index {
        /// Remove all indexed documents before indexing.
        #[arg(long, default_value_t = false)]
        clear: bool,
    },
    /// Full-text search with highlights and the page holding the first match.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
        /// Engine filter expression, e.g. `source_table = FORMS_MASTER`
        #[arg(long)]
        filter: Option<String>,
    },
    /// Index statistics.
    Stats,
    /// Remove every document from the index, keeping its settings.
    Clear,
    /// List source documents.
    Documents {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one document's metadata.
    Show {
        #[arg(long)]
        id: String,
    },
    /// Save one document's binary content.
    Download {
        #[arg(long)]
        id: String,
        /// Target file; defaults to the document's file name.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check the database connection and search engine health.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "docsearch boot"
    );

    let service = build_service(&cli)?;

    match cli.command {
        Command::Index { clear } => {
            service.configure_index().await?;
            if clear {
                service.clear_index().await?;
            }

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, flushing completed documents");
                    interrupt.cancel();
                }
            });

            let bar = progress_bar()?;
            let stats = service
                .index_documents(Some(progress_hook(bar.clone())), cancel)
                .await?;
            bar.finish_and_clear();

            print_json(&stats)?;
        }
        Command::Search {
            query,
            limit,
            offset,
            filter,
        } => {
            let mut response = service
                .search(SearchParams {
                    query,
                    limit,
                    offset,
                    filter,
                })
                .await;
            for hit in &mut response.hits {
                annotate_page(hit, &response.query);
            }
            print_json(&response)?;
        }
        Command::Stats => print_json(&service.get_stats().await)?,
        Command::Clear => {
            service.clear_index().await?;
            println!("index cleared at {}", Utc::now().to_rfc3339());
        }
        Command::Documents { limit, offset } => {
            print_json(&service.list_documents(limit, offset).await?)?;
        }
        Command::Show { id } => match service.get_document_metadata(&id).await? {
            Some(document) => print_json(&document)?,
            None => bail!("document not found: {id}"),
        },
        Command::Download { id, output } => {
            let Some(content) = service.download_document_content(&id).await? else {
                bail!("no content for document: {id}");
            };
            let target = match output {
                Some(path) => path,
                None => default_download_path(&service, &id).await?,
            };
            tokio::fs::write(&target, &content)
                .await
                .with_context(|| format!("writing {}", target.display()))?;
            println!("{} bytes written to {}", content.len(), target.display());
        }
        Command::Check => {
            let database = service.test_connection().await;
            let search_engine = service.engine_healthy().await;
            print_json(&json!({"database": database, "search_engine": search_engine}))?;
            if !(database && search_engine) {
                bail!("connectivity check failed");
            }
        }
    }

    Ok(())
}

fn build_service(cli: &Cli) -> anyhow::Result<Service> {
    let sql = SqlServerConfig {
        host: cli.mssql_host.clone(),
        port: cli.mssql_port,
        user: cli.mssql_user.clone(),
        password: cli.mssql_password.clone(),
        database: cli.mssql_database.clone(),
        tables: parse_table_list(&cli.database_tables),
        ..SqlServerConfig::default()
    };
    let meilisearch = MeilisearchConfig {
        host: cli.meilisearch_host.clone(),
        api_key: cli.meilisearch_api_key.clone(),
        index: cli.meilisearch_index.clone(),
        ..MeilisearchConfig::default()
    };
    let indexing = IndexingOptions {
        batch_size: cli.batch_size,
        max_text_length: cli.max_text_length,
        workers: cli.index_workers,
        ..IndexingOptions::default()
    };
    let search = SearchOptions {
        max_results: cli.max_search_results,
        ..SearchOptions::default()
    };
    let ocr = OcrOptions {
        tesseract_bin: cli.tesseract_bin.clone(),
        language: cli.ocr_language.clone(),
    };

    sql.validate()?;
    meilisearch.validate()?;
    indexing.validate()?;

    let registry = Arc::new(TableRegistry::from_config(&sql.tables));
    if registry.is_empty() {
        return Err(ConfigError::NoKnownTables(sql.tables.join(",")).into());
    }

    let repository = Arc::new(SqlServerRepository::new(sql, registry));
    let store = Arc::new(MeilisearchStore::new(&meilisearch)?);
    let extractor = Arc::new(ExtractorDispatch::new(indexing.max_text_length, ocr));

    Ok(SearchService::new(repository, store, extractor, indexing, search))
}

fn progress_bar() -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")?
            .progress_chars("#>-"),
    );
    Ok(bar)
}

fn progress_hook(bar: ProgressBar) -> ProgressHook {
    Arc::new(move |_position, total, name| {
        bar.set_length(total as u64);
        bar.inc(1);
        bar.set_message(name.to_string());
    })
}

/// Adds `matched_page` to a hit from its `page_info`.
fn annotate_page(hit: &mut Value, query: &str) {
    let pages: Vec<PageText> = hit
        .get("page_info")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();
    let page = find_page_for_query(&pages, query);
    if let Some(object) = hit.as_object_mut() {
        object.insert("matched_page".to_string(), json!(page));
    }
}

async fn default_download_path(service: &Service, id: &str) -> anyhow::Result<PathBuf> {
    let name = service
        .get_document_metadata(id)
        .await?
        .map(|document| document.name)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| id.to_string());

    // Keep only the final component of names that carry a path.
    let file_name = PathBuf::from(&name)
        .file_name()
        .map(|file_name| file_name.to_owned())
        .unwrap_or_else(|| id.into());
    Ok(PathBuf::from(file_name))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
