// ============================================================================
// docmapper Library
// ============================================================================

pub mod core;
pub mod dialect;
pub mod document;
pub mod schema;
pub mod connection;
pub mod session;
pub mod query;
pub mod mutation;
pub mod models;
pub mod ingest;

// Re-export main types for convenience
pub use core::{Cell, DocError, Result, Scalar, StoredRow};
pub use dialect::{CompatibleJson, Dialect, JsonColumnType};
pub use document::{DocField, DocPath, Document, FieldState};
pub use schema::{ColumnDef, ColumnKind, Entity, EntitySchema};
pub use query::Predicate;

// Re-export connection API
pub use connection::{Backend, Engine, StoreConfig, StoreTarget};
pub use session::{Change, CommitSummary, Session, SessionState, UnitOfWork};

pub use models::{Character, Product, User};
pub use ingest::{IngestReport, SkippedFile, ingest_directory};
