//! SQL statement builders.
//!
//! Statements are rendered per dialect (bind markers, key column DDL) and
//! per document encoding (column type, read-back expression). Values always
//! travel as bind parameters.

use super::{ColumnDef, ColumnKind, EntitySchema, quote_ident};
use crate::core::{Cell, DocError, Result, Scalar};
use crate::dialect::{Dialect, JsonColumnType};
use crate::document::{DocPath, Document};

/// Bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Integer(i64),
    Text(String),
    Document(Option<Document>),
    TextArray(Vec<String>),
}

impl From<&Scalar> for Param {
    fn from(value: &Scalar) -> Self {
        match value {
            Scalar::Integer(i) => Param::Integer(*i),
            Scalar::Text(s) => Param::Text(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Statement {
    /// Statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

pub struct StatementBuilder<'a> {
    dialect: &'a Dialect,
    json_type: JsonColumnType,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(dialect: &'a Dialect, json_type: JsonColumnType) -> Self {
        Self { dialect, json_type }
    }

    /// Idempotent table creation.
    pub fn create_table(&self, schema: &EntitySchema) -> Statement {
        let columns: Vec<String> = schema
            .columns()
            .iter()
            .map(|column| self.column_ddl(column))
            .collect();

        Statement::raw(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(schema.table()),
            columns.join(", ")
        ))
    }

    fn column_ddl(&self, column: &ColumnDef) -> String {
        let name = quote_ident(column.name);
        match column.kind {
            ColumnKind::AutoKey => match self.dialect {
                Dialect::Postgres => format!("{} BIGSERIAL PRIMARY KEY", name),
                _ => format!("{} INTEGER PRIMARY KEY", name),
            },
            ColumnKind::NaturalKey { max_len } => {
                format!("{} VARCHAR({}) NOT NULL PRIMARY KEY", name, max_len)
            }
            ColumnKind::Text { max_len } => {
                format!("{} VARCHAR({}){}", name, max_len, not_null(column))
            }
            ColumnKind::Document => {
                format!(
                    "{} {}{}",
                    name,
                    self.json_type.column_ddl(column.name),
                    not_null(column)
                )
            }
        }
    }

    fn select_list(&self, schema: &EntitySchema) -> String {
        schema
            .columns()
            .iter()
            .map(|column| match column.kind {
                ColumnKind::Document => self.json_type.select_expr(column.name),
                _ => quote_ident(column.name),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn select_all(&self, schema: &EntitySchema) -> Statement {
        Statement::raw(format!(
            "SELECT {} FROM {}",
            self.select_list(schema),
            quote_ident(schema.table())
        ))
    }

    /// Equality on a scalar column; `limit` caps the row count.
    pub fn select_where(
        &self,
        schema: &EntitySchema,
        column: &str,
        value: &Scalar,
        limit: Option<usize>,
    ) -> Result<Statement> {
        let column = schema.scalar_column(column)?;
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.select_list(schema),
            quote_ident(schema.table()),
            quote_ident(column.name),
            self.dialect.placeholder(1)
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        Ok(Statement {
            sql,
            params: vec![Param::from(value)],
        })
    }

    /// INSERT of the given cells; generated keys come back through `RETURNING`.
    pub fn insert(&self, schema: &EntitySchema, cells: Vec<(&'static str, Cell)>) -> Result<Statement> {
        let mut columns = Vec::with_capacity(cells.len());
        let mut params = Vec::with_capacity(cells.len());

        for (name, cell) in cells {
            let column = schema
                .get_column(name)
                .ok_or_else(|| DocError::ColumnNotFound(name.to_string(), schema.table().to_string()))?;
            if column.kind == ColumnKind::AutoKey {
                return Err(DocError::TypeMismatch(format!(
                    "Column '{}.{}' is generated by the store",
                    schema.table(),
                    name
                )));
            }
            if cell.is_null() && !column.nullable {
                return Err(DocError::TypeMismatch(format!(
                    "Column '{}.{}' cannot be NULL",
                    schema.table(),
                    name
                )));
            }
            columns.push(quote_ident(name));
            params.push(cell_param(column, cell)?);
        }

        let placeholders: Vec<String> = (1..=params.len())
            .map(|i| self.dialect.placeholder(i))
            .collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(schema.table()),
            columns.join(", "),
            placeholders.join(", ")
        );
        if let Some(key) = schema.primary_key().filter(|key| key.kind == ColumnKind::AutoKey) {
            sql.push_str(&format!(" RETURNING {}", quote_ident(key.name)));
        }

        Ok(Statement { sql, params })
    }

    /// Replaces whole document values on the row identified by `key`.
    pub fn update_documents(
        &self,
        schema: &EntitySchema,
        key: &Scalar,
        documents: Vec<(&'static str, Option<Document>)>,
    ) -> Result<Statement> {
        if documents.is_empty() {
            return Err(DocError::UnsupportedOperation(
                "update without document columns".into(),
            ));
        }
        let key_column = primary_key(schema)?;

        let mut assignments = Vec::with_capacity(documents.len());
        let mut params = Vec::with_capacity(documents.len() + 1);
        for (index, (name, document)) in documents.into_iter().enumerate() {
            let column = schema.document_column(name)?;
            if document.is_none() && !column.nullable {
                return Err(DocError::TypeMismatch(format!(
                    "Column '{}.{}' cannot be NULL",
                    schema.table(),
                    name
                )));
            }
            assignments.push(format!(
                "{} = {}",
                quote_ident(name),
                self.dialect.placeholder(index + 1)
            ));
            params.push(Param::Document(document));
        }
        params.push(Param::from(key));

        Ok(Statement {
            sql: format!(
                "UPDATE {} SET {} WHERE {} = {}",
                quote_ident(schema.table()),
                assignments.join(", "),
                quote_ident(key_column.name),
                self.dialect.placeholder(params.len())
            ),
            params,
        })
    }

    pub fn delete_all(&self, schema: &EntitySchema) -> Statement {
        Statement::raw(format!("DELETE FROM {}", quote_ident(schema.table())))
    }

    pub fn delete_by_key(&self, schema: &EntitySchema, key: &Scalar) -> Result<Statement> {
        let key_column = primary_key(schema)?;
        Ok(Statement {
            sql: format!(
                "DELETE FROM {} WHERE {} = {}",
                quote_ident(schema.table()),
                quote_ident(key_column.name),
                self.dialect.placeholder(1)
            ),
            params: vec![Param::from(key)],
        })
    }

    /// Store-side extraction of `path` from a document column compared as text.
    ///
    /// Only dialects with a native path operator can render this.
    pub fn select_by_path(
        &self,
        schema: &EntitySchema,
        column: &str,
        path: &DocPath,
        literal: &str,
    ) -> Result<Statement> {
        if !self.dialect.supports_native_path() || !self.json_type.is_binary() {
            return Err(DocError::UnsupportedOperation(format!(
                "native path extraction is not available on dialect '{}' ({})",
                self.dialect, self.json_type
            )));
        }
        if path.is_root() {
            return Err(DocError::invalid_path(path.as_str(), "path extraction needs at least one key"));
        }
        let column = schema.document_column(column)?;

        Ok(Statement {
            sql: format!(
                "SELECT {} FROM {} WHERE {} #>> {}::text[] = {}",
                self.select_list(schema),
                quote_ident(schema.table()),
                quote_ident(column.name),
                self.dialect.placeholder(1),
                self.dialect.placeholder(2)
            ),
            params: vec![
                Param::TextArray(path.to_text_array()),
                Param::Text(literal.to_string()),
            ],
        })
    }
}

fn not_null(column: &ColumnDef) -> &'static str {
    if column.nullable { "" } else { " NOT NULL" }
}

fn primary_key(schema: &EntitySchema) -> Result<&ColumnDef> {
    schema.primary_key().ok_or_else(|| {
        DocError::Config(format!("Table '{}' has no key column", schema.table()))
    })
}

fn cell_param(column: &ColumnDef, cell: Cell) -> Result<Param> {
    match (column.kind, cell) {
        (ColumnKind::Document, Cell::Document(doc)) => Ok(Param::Document(Some(doc))),
        (ColumnKind::Document, Cell::Null) => Ok(Param::Document(None)),
        (ColumnKind::NaturalKey { .. } | ColumnKind::Text { .. }, Cell::Text(s)) => Ok(Param::Text(s)),
        (_, cell) => Err(DocError::TypeMismatch(format!(
            "Column '{}' cannot hold {}",
            column.name,
            cell.type_name()
        ))),
    }
}
