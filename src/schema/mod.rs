//! Entity schema declarations.
//!
//! An [`EntitySchema`] names a table, its scalar identity columns and its
//! document columns. It carries no behavior beyond structure; the physical
//! type of document columns is chosen later by the dialect adapter.

mod entity;
pub mod sql;

pub use entity::Entity;
pub use sql::{Param, Statement, StatementBuilder};

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::{DocError, Result};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Store-generated 64-bit integer primary key.
    AutoKey,
    /// Caller-supplied text primary key.
    NaturalKey { max_len: u32 },
    /// Plain text column.
    Text { max_len: u32 },
    /// Opaque JSON document.
    Document,
}

impl ColumnKind {
    pub fn is_key(&self) -> bool {
        matches!(self, ColumnKind::AutoKey | ColumnKind::NaturalKey { .. })
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, ColumnKind::Document)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn auto_key(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::AutoKey,
            nullable: false,
        }
    }

    pub fn natural_key(name: &'static str, max_len: u32) -> Self {
        Self {
            name,
            kind: ColumnKind::NaturalKey { max_len },
            nullable: false,
        }
    }

    pub fn text(name: &'static str, max_len: u32) -> Self {
        Self {
            name,
            kind: ColumnKind::Text { max_len },
            nullable: true,
        }
    }

    pub fn document(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Document,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    table: &'static str,
    columns: Vec<ColumnDef>,
}

impl EntitySchema {
    pub fn new(table: &'static str, columns: Vec<ColumnDef>) -> Self {
        Self { table, columns }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.find_column_index(name).map(|idx| &self.columns[idx])
    }

    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|col| col.kind.is_key())
    }

    pub fn document_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns
            .iter()
            .filter(|col| col.kind == ColumnKind::Document)
    }

    /// Column lookup that must resolve to a scalar column.
    pub fn scalar_column(&self, name: &str) -> Result<&ColumnDef> {
        let column = self.require_column(name)?;
        if !column.kind.is_scalar() {
            return Err(DocError::TypeMismatch(format!(
                "Column '{}.{}' is a document column",
                self.table, name
            )));
        }
        Ok(column)
    }

    /// Column lookup that must resolve to a document column.
    pub fn document_column(&self, name: &str) -> Result<&ColumnDef> {
        let column = self.require_column(name)?;
        if column.kind != ColumnKind::Document {
            return Err(DocError::TypeMismatch(format!(
                "Column '{}.{}' is not a document column",
                self.table, name
            )));
        }
        Ok(column)
    }

    fn require_column(&self, name: &str) -> Result<&ColumnDef> {
        self.get_column(name)
            .ok_or_else(|| DocError::ColumnNotFound(name.to_string(), self.table.to_string()))
    }

    /// Structural checks: identifiers, exactly one primary key, unique names.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(self.table)?;
        for column in &self.columns {
            validate_identifier(column.name)?;
        }

        let keys = self.columns.iter().filter(|col| col.kind.is_key()).count();
        if keys != 1 {
            return Err(DocError::Config(format!(
                "Table '{}' must declare exactly one key column, found {}",
                self.table, keys
            )));
        }

        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|prev| prev.name == column.name) {
                return Err(DocError::Config(format!(
                    "Column '{}' declared twice in '{}'",
                    column.name, self.table
                )));
            }
        }

        Ok(())
    }
}

/// Table and column names must be plain identifiers.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(DocError::InvalidIdentifier(format!(
            "'{}' must start with a letter or underscore, contain only letters, digits and underscores, and be at most 64 characters",
            name
        )))
    }
}

/// Double-quoted SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> EntitySchema {
        EntitySchema::new(
            "users",
            vec![
                ColumnDef::auto_key("id"),
                ColumnDef::text("name", 100).not_null(),
                ColumnDef::document("profile"),
            ],
        )
    }

    #[test]
    fn test_column_lookup() {
        let schema = users();
        assert_eq!(schema.find_column_index("name"), Some(1));
        assert_eq!(schema.primary_key().map(|c| c.name), Some("id"));
        assert_eq!(
            schema.document_columns().map(|c| c.name).collect::<Vec<_>>(),
            vec!["profile"]
        );
        assert!(schema.scalar_column("name").is_ok());
        assert!(schema.scalar_column("profile").is_err());
        assert!(schema.document_column("profile").is_ok());
        assert!(matches!(
            schema.document_column("missing"),
            Err(DocError::ColumnNotFound(_, _))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(users().validate().is_ok());

        let no_key = EntitySchema::new("t", vec![ColumnDef::document("doc")]);
        assert!(no_key.validate().is_err());

        let bad_name = EntitySchema::new("drop table", vec![ColumnDef::auto_key("id")]);
        assert!(matches!(
            bad_name.validate(),
            Err(DocError::InvalidIdentifier(_))
        ));

        let duplicate = EntitySchema::new(
            "t",
            vec![ColumnDef::auto_key("id"), ColumnDef::document("id")],
        );
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn test_identifiers() {
        assert!(validate_identifier("product_info").is_ok());
        assert!(validate_identifier("_hidden").is_ok());
        assert!(validate_identifier("1users").is_err());
        assert!(validate_identifier("users;--").is_err());
        assert!(validate_identifier(&"x".repeat(65)).is_err());
        assert_eq!(quote_ident("name"), "\"name\"");
    }
}
