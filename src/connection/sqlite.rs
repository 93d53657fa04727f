use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use log::LevelFilter;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row, Sqlite};

use super::Backend;
use crate::core::{Cell, DocError, Result, StoredRow};
use crate::dialect::Dialect;
use crate::document::Document;
use crate::schema::{ColumnKind, EntitySchema, Param, Statement};

/// Embedded SQLite connection; document columns travel as JSON text.
pub struct SqliteBackend {
    conn: Option<SqliteConnection>,
}

impl SqliteBackend {
    /// Open (creating if needed) a database file.
    pub async fn open(path: &Path, echo: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect_with(options, echo).await
    }

    /// Private in-memory database, gone once the connection closes.
    pub async fn in_memory(echo: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect_with(options, echo).await
    }

    async fn connect_with(options: SqliteConnectOptions, echo: bool) -> Result<Self> {
        let options = if echo {
            options.log_statements(LevelFilter::Debug)
        } else {
            options.disable_statement_logging()
        };
        let conn = options
            .connect()
            .await
            .map_err(|e| DocError::Connection(e.to_string()))?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| DocError::Connection("connection already closed".into()))
    }
}

fn bind<'q>(statement: &'q Statement) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = match param {
            Param::Integer(i) => query.bind(*i),
            Param::Text(s) => query.bind(s.as_str()),
            Param::Document(doc) => query.bind(doc.as_ref().map(Document::to_string)),
            Param::TextArray(_) => {
                return Err(DocError::UnsupportedOperation(
                    "array parameters are not supported by SQLite".into(),
                ));
            }
        };
    }
    Ok(query)
}

fn decode_row(row: &SqliteRow, schema: &'static EntitySchema) -> Result<StoredRow> {
    let mut cells = Vec::with_capacity(schema.column_count());
    for (index, column) in schema.columns().iter().enumerate() {
        let cell = match column.kind {
            ColumnKind::AutoKey => row
                .try_get::<Option<i64>, _>(index)?
                .map_or(Cell::Null, Cell::Integer),
            ColumnKind::NaturalKey { .. } | ColumnKind::Text { .. } => row
                .try_get::<Option<String>, _>(index)?
                .map_or(Cell::Null, Cell::Text),
            ColumnKind::Document => match row.try_get::<Option<String>, _>(index)? {
                Some(text) => Cell::Document(text.parse::<Document>().map_err(|e| {
                    DocError::Json(format!("{}.{}: {}", schema.table(), column.name, e))
                })?),
                None => Cell::Null,
            },
        };
        cells.push(cell);
    }
    StoredRow::new(schema, cells)
}

#[async_trait]
impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn ping(&mut self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.conn()?).await?;
        Ok(())
    }

    async fn batch(&mut self, sql: &str) -> Result<()> {
        sqlx::Executor::execute(self.conn()?, sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let done = bind(statement)?.execute(self.conn()?).await?;
        Ok(done.rows_affected())
    }

    async fn fetch(
        &mut self,
        statement: &Statement,
        schema: &'static EntitySchema,
    ) -> Result<Vec<StoredRow>> {
        let rows = bind(statement)?.fetch_all(self.conn()?).await?;
        rows.iter().map(|row| decode_row(row, schema)).collect()
    }

    async fn fetch_key(&mut self, statement: &Statement) -> Result<i64> {
        let row = bind(statement)?.fetch_one(self.conn()?).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }
}
