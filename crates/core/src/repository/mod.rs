pub mod query;

use crate::config::SqlServerConfig;
use crate::error::RepositoryError;
use crate::ids::IdCodec;
use crate::models::{DocumentMetadata, MetadataMap};
use crate::schema::{SourceRow, TableRegistry, TableSchema};
use crate::traits::DocumentSource;
use async_trait::async_trait;
use std::sync::Arc;
use tiberius::{AuthMethod, Client, Config, Row};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

type SqlClient = Client<Compat<TcpStream>>;

#[async_trait]
trait Connection: Send {
    async fn probe(&mut self) -> Result<(), RepositoryError>;

    async fn list_table(
        &mut self,
        schema: &TableSchema,
        codec: &IdCodec,
    ) -> Result<Vec<DocumentMetadata>, RepositoryError>;
}

#[async_trait]
trait Connector: Send + Sync {
    type Connection: Connection;

    async fn open(&self) -> Result<Self::Connection, RepositoryError>;
}

// One exclusively owned connection, probed before every use and reopened
// once when the probe fails.
struct Session<K: Connector> {
    connector: K,
    connection: Mutex<Option<K::Connection>>,
}

impl<K: Connector> Session<K> {
    fn new(connector: K, connection: Option<K::Connection>) -> Self {
        Self {
            connector,
            connection: Mutex::new(connection),
        }
    }

    async fn acquire(&self) -> Result<MutexGuard<'_, Option<K::Connection>>, RepositoryError> {
        let mut guard = self.connection.lock().await;

        let alive = match guard.as_mut() {
            Some(connection) => match connection.probe().await {
                Ok(()) => true,
                Err(error) => {
                    warn!(%error, "connection check failed, reconnecting");
                    false
                }
            },
            None => false,
        };

        if !alive {
            *guard = None;
            let connection = self
                .connector
                .open()
                .await
                .map_err(|error| RepositoryError::Unavailable(error.to_string()))?;
            debug!("sql server connection reopened");
            *guard = Some(connection);
        }

        Ok(guard)
    }
}

async fn list_tables<C: Connection>(connection: &mut C, registry: &TableRegistry) -> Vec<DocumentMetadata> {
    let mut documents = Vec::new();
    for schema in registry.schemas() {
        match connection.list_table(schema, registry.codec()).await {
            Ok(table_documents) => {
                info!(table = schema.table, count = table_documents.len(), "listed documents");
                documents.extend(table_documents);
            }
            Err(error) => {
                warn!(table = schema.table, %error, "listing failed, table contributes no documents");
            }
        }
    }
    documents
}

struct TdsConnector {
    config: SqlServerConfig,
}

#[async_trait]
impl Connector for TdsConnector {
    type Connection = SqlClient;

    async fn open(&self) -> Result<SqlClient, RepositoryError> {
        open(&self.config).await
    }
}

#[async_trait]
impl Connection for SqlClient {
    async fn probe(&mut self) -> Result<(), RepositoryError> {
        self.simple_query(query::LIVENESS_PROBE).await?.into_row().await?;
        Ok(())
    }

    async fn list_table(
        &mut self,
        schema: &TableSchema,
        codec: &IdCodec,
    ) -> Result<Vec<DocumentMetadata>, RepositoryError> {
        let sql = query::list_documents(schema);
        let rows = self.simple_query(sql).await?.into_first_result().await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let source = match source_row(schema, &row) {
                Ok(source) => source,
                Err(error) => {
                    warn!(table = schema.table, %error, "skipping unreadable row");
                    continue;
                }
            };
            match codec.encode(schema.table, &source.id) {
                Ok(composite_id) => documents.push(schema.document_from_row(composite_id, source)),
                Err(error) => warn!(table = schema.table, %error, "skipping row without usable id"),
            }
        }
        Ok(documents)
    }
}

pub struct SqlServerRepository {
    registry: Arc<TableRegistry>,
    session: Session<TdsConnector>,
}

impl SqlServerRepository {
    pub fn new(config: SqlServerConfig, registry: Arc<TableRegistry>) -> Self {
        Self {
            registry,
            session: Session::new(TdsConnector { config }, None),
        }
    }

    pub async fn connect(
        config: SqlServerConfig,
        registry: Arc<TableRegistry>,
    ) -> Result<Self, RepositoryError> {
        let client = open(&config).await?;
        info!(database = %config.database, host = %config.host, "connected to sql server");
        Ok(Self {
            registry,
            session: Session::new(TdsConnector { config }, Some(client)),
        })
    }

    fn resolve(&self, id: &str) -> Option<(&TableSchema, String)> {
        let key = match self.registry.codec().decode(id) {
            Ok(key) => key,
            Err(error) => {
                debug!(id, %error, "identifier does not name a configured table");
                return None;
            }
        };
        let schema = self.registry.get(&key.table)?;
        Some((schema, key.record_id))
    }
}

#[async_trait]
impl DocumentSource for SqlServerRepository {
    async fn test_connection(&self) -> Result<(), RepositoryError> {
        let mut guard = self.session.acquire().await?;
        let client = guard.as_mut().ok_or_else(not_connected)?;

        let row = client.simple_query(query::VERSION_QUERY).await?.into_row().await?;
        let version = row
            .as_ref()
            .and_then(|row| row.try_get::<&str, _>(0).ok().flatten())
            .map(|version| version.lines().next().unwrap_or_default().trim().to_string())
            .unwrap_or_default();
        info!(%version, "sql server reachable");
        Ok(())
    }

    async fn list_all_documents(&self) -> Result<Vec<DocumentMetadata>, RepositoryError> {
        let mut guard = self.session.acquire().await?;
        let client = guard.as_mut().ok_or_else(not_connected)?;
        Ok(list_tables(client, &self.registry).await)
    }

    async fn fetch_metadata(&self, id: &str) -> Result<Option<DocumentMetadata>, RepositoryError> {
        let Some((schema, record_id)) = self.resolve(id) else {
            return Ok(None);
        };

        let mut guard = self.session.acquire().await?;
        let client = guard.as_mut().ok_or_else(not_connected)?;

        let sql = query::document_metadata(schema);
        let row = match fetch_row(client, &sql, &record_id).await {
            Ok(row) => row,
            Err(error) => {
                warn!(id, table = schema.table, %error, "metadata lookup failed");
                return Ok(None);
            }
        };

        let Some(row) = row else {
            return Ok(None);
        };
        match source_row(schema, &row) {
            Ok(source) => Ok(Some(schema.document_from_row(id.to_string(), source))),
            Err(error) => {
                warn!(id, table = schema.table, %error, "metadata row unreadable");
                Ok(None)
            }
        }
    }

    async fn fetch_content(&self, id: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let Some((schema, record_id)) = self.resolve(id) else {
            return Ok(None);
        };

        let mut guard = self.session.acquire().await?;
        let client = guard.as_mut().ok_or_else(not_connected)?;

        let sql = query::document_content(schema);
        let row = match fetch_row(client, &sql, &record_id).await {
            Ok(row) => row,
            Err(error) => {
                warn!(id, table = schema.table, %error, "content download failed");
                return Ok(None);
            }
        };

        let content = row.and_then(|row| match row.try_get::<&[u8], _>(0) {
            Ok(bytes) => bytes.map(<[u8]>::to_vec),
            Err(error) => {
                warn!(id, %error, "content column is not binary");
                None
            }
        });

        if content.is_none() {
            debug!(id, table = schema.table, "no content for document");
        }
        Ok(content)
    }
}

async fn open(config: &SqlServerConfig) -> Result<SqlClient, RepositoryError> {
    let mut tds = Config::new();
    tds.host(&config.host);
    tds.port(config.port);
    tds.database(&config.database);
    tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
    if config.trust_cert {
        tds.trust_cert();
    }

    let tcp = timeout(config.connect_timeout, TcpStream::connect(tds.get_addr()))
        .await
        .map_err(|_| RepositoryError::Timeout(config.connect_timeout, "connecting"))??;
    tcp.set_nodelay(true)?;

    let client = timeout(config.login_timeout, Client::connect(tds, tcp.compat_write()))
        .await
        .map_err(|_| RepositoryError::Timeout(config.login_timeout, "logging in"))??;
    Ok(client)
}

async fn fetch_row(
    client: &mut SqlClient,
    sql: &str,
    record_id: &str,
) -> Result<Option<Row>, RepositoryError> {
    Ok(client.query(sql, &[&record_id]).await?.into_row().await?)
}

fn not_connected() -> RepositoryError {
    RepositoryError::Unavailable("no open connection".to_string())
}

fn text(row: &Row, column: &str) -> Result<Option<String>, tiberius::error::Error> {
    Ok(row.try_get::<&str, _>(column)?.map(str::to_string))
}

fn source_row(schema: &TableSchema, row: &Row) -> Result<SourceRow, RepositoryError> {
    let id = text(row, "id")?.ok_or_else(|| RepositoryError::Query {
        table: schema.table.to_string(),
        details: "row without id".to_string(),
    })?;

    let mut extras = MetadataMap::new();
    for extra in schema.extra_columns {
        extras.insert(extra.key.to_string(), text(row, extra.key)?);
    }

    let form_no = match schema.reference_column {
        Some(_) => text(row, "form_no")?,
        None => None,
    };

    Ok(SourceRow {
        id,
        name: text(row, "name")?.unwrap_or_default(),
        title: text(row, "title")?,
        mime_type: text(row, "mime_type")?,
        modified_time: text(row, "modified_time")?,
        size: row.try_get::<i64, _>("size")?,
        form_no,
        extras,
    })
}
