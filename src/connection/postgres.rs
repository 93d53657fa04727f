use std::str::FromStr;

use async_trait::async_trait;
use log::LevelFilter;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Connection, Postgres, Row};

use super::Backend;
use crate::core::{Cell, DocError, Result, StoredRow};
use crate::dialect::Dialect;
use crate::document::Document;
use crate::schema::{ColumnKind, EntitySchema, Param, Statement};

/// Single PostgreSQL connection; document columns travel as `JSONB`.
pub struct PgBackend {
    conn: Option<PgConnection>,
}

impl PgBackend {
    pub async fn connect(url: &str, echo: bool) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| DocError::Config(format!("invalid PostgreSQL URL: {}", e)))?;
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

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| DocError::Connection("connection already closed".into()))
    }
}

fn bind<'q>(statement: &'q Statement) -> Query<'q, Postgres, PgArguments> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, param| match param {
            Param::Integer(i) => query.bind(*i),
            Param::Text(s) => query.bind(s.as_str()),
            Param::Document(doc) => query.bind(doc.as_ref().map(Document::to_value)),
            Param::TextArray(items) => query.bind(items.clone()),
        })
}

fn decode_row(row: &PgRow, schema: &'static EntitySchema) -> Result<StoredRow> {
    let mut cells = Vec::with_capacity(schema.column_count());
    for (index, column) in schema.columns().iter().enumerate() {
        let cell = match column.kind {
            ColumnKind::AutoKey => row
                .try_get::<Option<i64>, _>(index)?
                .map_or(Cell::Null, Cell::Integer),
            ColumnKind::NaturalKey { .. } | ColumnKind::Text { .. } => row
                .try_get::<Option<String>, _>(index)?
                .map_or(Cell::Null, Cell::Text),
            ColumnKind::Document => row
                .try_get::<Option<JsonValue>, _>(index)?
                .map_or(Cell::Null, |value| Cell::Document(Document::new(value))),
        };
        cells.push(cell);
    }
    StoredRow::new(schema, cells)
}

#[async_trait]
impl Backend for PgBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        let done = bind(statement).execute(self.conn()?).await?;
        Ok(done.rows_affected())
    }

    async fn fetch(
        &mut self,
        statement: &Statement,
        schema: &'static EntitySchema,
    ) -> Result<Vec<StoredRow>> {
        let rows = bind(statement).fetch_all(self.conn()?).await?;
        rows.iter().map(|row| decode_row(row, schema)).collect()
    }

    async fn fetch_key(&mut self, statement: &Statement) -> Result<i64> {
        let row = bind(statement).fetch_one(self.conn()?).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }
}
