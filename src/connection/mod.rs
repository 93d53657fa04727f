pub mod config;
mod postgres;
mod sqlite;

pub use config::{StoreConfig, StoreTarget};
pub use postgres::PgBackend;
pub use sqlite::SqliteBackend;

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::core::{DocError, Result, StoredRow};
use crate::dialect::{CompatibleJson, Dialect, JsonColumnType};
use crate::schema::{EntitySchema, Statement, StatementBuilder};
use crate::session::Session;

/// One physical connection to a store.
///
/// Implementations decode rows into [`StoredRow`]s following the schema's
/// column order, which always matches the select list the
/// [`StatementBuilder`] renders.
#[async_trait]
pub trait Backend: Send {
    fn dialect(&self) -> Dialect;

    /// Cheap round trip proving the connection is usable.
    async fn ping(&mut self) -> Result<()>;

    /// Unprepared statement(s) without parameters: transaction control, savepoints.
    async fn batch(&mut self, sql: &str) -> Result<()>;

    /// Returns the number of rows affected.
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;

    async fn fetch(
        &mut self,
        statement: &Statement,
        schema: &'static EntitySchema,
    ) -> Result<Vec<StoredRow>>;

    /// Single integer from the first column of the first row (`RETURNING`).
    async fn fetch_key(&mut self, statement: &Statement) -> Result<i64>;

    async fn close(&mut self) -> Result<()>;
}

/// Database engine: one backend plus the document encoding resolved for it.
///
/// The JSON column type is derived from the backend's dialect when the
/// engine is built and is fixed for its lifetime.
pub struct Engine {
    backend: Box<dyn Backend>,
    dialect: Dialect,
    json_type: JsonColumnType,
    fallback_used: bool,
    /// A session was dropped while its transaction was still open.
    pending_rollback: bool,
}

impl Engine {
    /// Open the configured primary store, falling back to the SQLite file
    /// when a PostgreSQL primary cannot be reached.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        match config.target()? {
            StoreTarget::Postgres(url) => match Self::open_postgres(&url, config).await {
                Ok(engine) => Ok(engine),
                Err(primary) => {
                    warn!(
                        url = %config.redacted_url(),
                        error = %primary,
                        fallback = %config.fallback_path.display(),
                        "PostgreSQL unavailable, using SQLite (JSON instead of JSONB)"
                    );
                    let mut engine = Self::open_sqlite(&config.fallback_path, config.echo)
                        .await
                        .map_err(|fallback| {
                            DocError::Connection(format!(
                                "primary store unreachable ({}) and fallback failed ({})",
                                primary, fallback
                            ))
                        })?;
                    engine.fallback_used = true;
                    Ok(engine)
                }
            },
            StoreTarget::Sqlite(path) => Self::open_sqlite(&path, config.echo).await,
            StoreTarget::SqliteMemory => {
                Self::from_backend(Box::new(SqliteBackend::in_memory(config.echo).await?)).await
            }
        }
    }

    async fn open_postgres(url: &str, config: &StoreConfig) -> Result<Self> {
        let backend = tokio::time::timeout(config.connect_timeout, PgBackend::connect(url, config.echo))
            .await
            .map_err(|_| {
                DocError::Connection(format!(
                    "timed out after {}s",
                    config.connect_timeout.as_secs_f64()
                ))
            })??;
        Self::from_backend(Box::new(backend)).await
    }

    /// Open a SQLite file directly, creating it if needed.
    pub async fn open_sqlite(path: &Path, echo: bool) -> Result<Self> {
        Self::from_backend(Box::new(SqliteBackend::open(path, echo).await?)).await
    }

    /// Wrap an already opened backend after probing it with `SELECT 1`.
    pub async fn from_backend(mut backend: Box<dyn Backend>) -> Result<Self> {
        backend.ping().await?;

        let dialect = backend.dialect();
        let json_type = CompatibleJson::load_dialect_impl(&dialect);
        info!(dialect = %dialect, json_type = %json_type, "connected");

        Ok(Self {
            backend,
            dialect,
            json_type,
            fallback_used: false,
            pending_rollback: false,
        })
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn json_type(&self) -> JsonColumnType {
        self.json_type
    }

    /// Whether the engine runs on the fallback store.
    pub fn is_fallback(&self) -> bool {
        self.fallback_used
    }

    pub fn statements(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(&self.dialect, self.json_type)
    }

    /// Create every table of the built-in record types.
    pub async fn create_all(&mut self) -> Result<()> {
        for schema in crate::models::schemas() {
            self.create_schema(schema).await?;
        }
        info!("tables ready");
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS`; existing tables and rows are left alone.
    pub async fn create_schema(&mut self, schema: &EntitySchema) -> Result<()> {
        schema.validate()?;
        self.clear_abandoned_transaction().await;
        let statement = self.statements().create_table(schema);
        self.backend.execute(&statement).await?;
        debug!(table = schema.table(), json_type = %self.json_type, "table ensured");
        Ok(())
    }

    pub fn session(&mut self) -> Session<'_> {
        Session::new(self)
    }

    pub async fn close(mut self) -> Result<()> {
        self.clear_abandoned_transaction().await;
        self.backend.close().await
    }

    pub(crate) fn backend_mut(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    pub(crate) fn mark_abandoned_transaction(&mut self) {
        self.pending_rollback = true;
    }

    /// Roll back a transaction left open by a dropped session.
    pub(crate) async fn clear_abandoned_transaction(&mut self) {
        if !self.pending_rollback {
            return;
        }
        self.pending_rollback = false;
        if let Err(err) = self.backend.batch("ROLLBACK").await {
            warn!(error = %err, "rollback of abandoned transaction failed");
        } else {
            debug!("rolled back transaction of a dropped session");
        }
    }
}
