//! Dialect-adaptive document column type.
//!
//! A document column is declared once in the schema and bound to a physical
//! representation per connection: `JSONB` on PostgreSQL, textual `JSON` on
//! every other backend. The choice is made when the engine is built and never
//! changes afterwards.

use std::fmt;

use tracing::debug;

use crate::schema::quote_ident;

/// Dialect name reported by the PostgreSQL backend.
pub const POSTGRES_DIALECT: &str = "postgresql";

/// Dialect name reported by the embedded SQLite backend.
pub const SQLITE_DIALECT: &str = "sqlite";

/// Identity of the active storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    Sqlite,
    Other(String),
}

impl Dialect {
    pub fn from_name(name: &str) -> Self {
        match name {
            POSTGRES_DIALECT => Self::Postgres,
            SQLITE_DIALECT => Self::Sqlite,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Postgres => POSTGRES_DIALECT,
            Self::Sqlite => SQLITE_DIALECT,
            Self::Other(name) => name,
        }
    }

    /// Whether the backend can evaluate a nested path extraction in SQL.
    pub fn supports_native_path(&self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Positional bind marker, 1-based.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            _ => format!("?{}", index),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical encoding of a document column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonColumnType {
    /// Binary, indexable JSON (PostgreSQL `JSONB`).
    Jsonb,
    /// Plain textual JSON.
    Json,
}

impl JsonColumnType {
    /// Pure mapping from a dialect name to the column type.
    ///
    /// Only `"postgresql"` gets `Jsonb`; every other name, known or not,
    /// falls through to `Json`.
    pub fn for_dialect(name: &str) -> Self {
        if name == POSTGRES_DIALECT {
            Self::Jsonb
        } else {
            Self::Json
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Jsonb => "JSONB",
            Self::Json => "JSON",
        }
    }

    /// Column type as written in `CREATE TABLE`.
    ///
    /// Textual JSON is declared `TEXT` so the store keeps the exact text it
    /// was given; a column declared `JSON` gets NUMERIC affinity in SQLite
    /// and a top-level `1.0` would come back as `1`.
    pub fn column_ddl(&self, column: &str) -> String {
        match self {
            Self::Jsonb => "JSONB".to_string(),
            Self::Json => format!("TEXT CHECK (json_valid({}))", quote_ident(column)),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Jsonb)
    }

    /// Expression used to read the column back.
    ///
    /// Textual JSON is cast back to text so tables created with a `JSON`
    /// declaration still decode.
    pub fn select_expr(&self, column: &str) -> String {
        match self {
            Self::Jsonb => quote_ident(column),
            Self::Json => format!("CAST({} AS TEXT)", quote_ident(column)),
        }
    }
}

impl fmt::Display for JsonColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// Column type adapter for document fields.
pub struct CompatibleJson;

impl CompatibleJson {
    /// Resolve the physical type for the connection's dialect.
    pub fn load_dialect_impl(dialect: &Dialect) -> JsonColumnType {
        let column_type = JsonColumnType::for_dialect(dialect.name());
        if let Dialect::Other(name) = dialect {
            debug!(dialect = %name, column_type = %column_type, "unrecognized dialect, using textual JSON");
        }
        column_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_gets_jsonb() {
        assert_eq!(JsonColumnType::for_dialect("postgresql"), JsonColumnType::Jsonb);
        assert_eq!(
            CompatibleJson::load_dialect_impl(&Dialect::Postgres),
            JsonColumnType::Jsonb
        );
    }

    #[test]
    fn test_every_other_dialect_gets_json() {
        for name in ["sqlite", "mysql", "mssql", "oracle", "", "PostgreSQL", "postgres"] {
            assert_eq!(
                JsonColumnType::for_dialect(name),
                JsonColumnType::Json,
                "dialect {:?}",
                name
            );
        }
        assert_eq!(
            CompatibleJson::load_dialect_impl(&Dialect::from_name("duckdb")),
            JsonColumnType::Json
        );
    }

    #[test]
    fn test_dialect_names_round_trip() {
        for name in ["postgresql", "sqlite", "mysql"] {
            assert_eq!(Dialect::from_name(name).name(), name);
        }
        assert_eq!(Dialect::from_name("sqlite"), Dialect::Sqlite);
    }

    #[test]
    fn test_native_path_capability() {
        assert!(Dialect::Postgres.supports_native_path());
        assert!(!Dialect::Sqlite.supports_native_path());
        assert!(!Dialect::Other("mysql".into()).supports_native_path());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::Sqlite.placeholder(2), "?2");
    }

    #[test]
    fn test_column_ddl() {
        assert_eq!(JsonColumnType::Jsonb.column_ddl("profile"), "JSONB");
        assert_eq!(
            JsonColumnType::Json.column_ddl("profile"),
            "TEXT CHECK (json_valid(\"profile\"))"
        );
    }

    #[test]
    fn test_select_expr() {
        assert_eq!(JsonColumnType::Jsonb.select_expr("profile"), "\"profile\"");
        assert_eq!(
            JsonColumnType::Json.select_expr("profile"),
            "CAST(\"profile\" AS TEXT)"
        );
    }
}
