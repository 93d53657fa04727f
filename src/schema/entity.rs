use super::EntitySchema;
use crate::core::{Cell, Result, Scalar, StoredRow};
use crate::document::{DocField, Document};

/// A record type mapped to one table.
///
/// Static methods describe the type; the object-safe remainder lets a
/// unit of work flush records of different types together.
pub trait Entity: Send + Sync {
    fn schema() -> &'static EntitySchema
    where
        Self: Sized;

    fn from_row(row: StoredRow) -> Result<Self>
    where
        Self: Sized;

    fn entity_schema(&self) -> &'static EntitySchema;

    /// Primary key value, `None` while a generated key is still unassigned.
    fn primary_key(&self) -> Option<Scalar>;

    fn is_persisted(&self) -> bool;

    /// Column values for an INSERT, generated key columns excluded.
    fn insert_cells(&self) -> Vec<(&'static str, Cell)>;

    fn document_fields(&self) -> Vec<(&'static str, &DocField)>;

    fn document_fields_mut(&mut self) -> Vec<&mut DocField>;

    /// Called once the INSERT has been committed.
    fn mark_persisted(&mut self, generated_key: Option<i64>);

    fn document_field(&self, column: &str) -> Option<&DocField> {
        self.document_fields()
            .into_iter()
            .find(|(name, _)| *name == column)
            .map(|(_, field)| field)
    }

    fn document(&self, column: &str) -> Option<&Document> {
        self.document_field(column).and_then(DocField::value)
    }

    /// Document columns holding a replacement that has not been committed.
    fn pending_documents(&self) -> Vec<(&'static str, Option<Document>)> {
        self.document_fields()
            .into_iter()
            .filter(|(_, field)| field.is_pending())
            .map(|(name, field)| (name, field.value().cloned()))
            .collect()
    }

    fn has_pending(&self) -> bool {
        self.document_fields()
            .iter()
            .any(|(_, field)| field.is_pending())
    }
}
