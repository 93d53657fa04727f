use super::{Cell, DocError, Result};
use crate::document::Document;
use crate::schema::EntitySchema;

/// A fully materialized row, cells in schema column order.
#[derive(Debug, Clone)]
pub struct StoredRow {
    schema: &'static EntitySchema,
    cells: Vec<Cell>,
}

impl StoredRow {
    pub fn new(schema: &'static EntitySchema, cells: Vec<Cell>) -> Result<Self> {
        if cells.len() != schema.column_count() {
            return Err(DocError::Backend(format!(
                "Row for '{}' has {} cells, expected {}",
                schema.table(),
                cells.len(),
                schema.column_count()
            )));
        }
        Ok(Self { schema, cells })
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, column: &str) -> Result<&Cell> {
        let index = self.schema.find_column_index(column).ok_or_else(|| {
            DocError::ColumnNotFound(column.to_string(), self.schema.table().to_string())
        })?;
        Ok(&self.cells[index])
    }

    pub fn integer(&self, column: &str) -> Result<i64> {
        match self.get(column)? {
            Cell::Integer(i) => Ok(*i),
            other => Err(self.mismatch(column, "INTEGER", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        match self.get(column)? {
            Cell::Text(s) => Ok(s.clone()),
            other => Err(self.mismatch(column, "TEXT", other)),
        }
    }

    pub fn document(&self, column: &str) -> Result<Option<Document>> {
        match self.get(column)? {
            Cell::Document(doc) => Ok(Some(doc.clone())),
            Cell::Null => Ok(None),
            other => Err(self.mismatch(column, "DOCUMENT", other)),
        }
    }

    fn mismatch(&self, column: &str, expected: &str, got: &Cell) -> DocError {
        DocError::TypeMismatch(format!(
            "Column '{}.{}' expects {}, got {}",
            self.schema.table(),
            column,
            expected,
            got.type_name()
        ))
    }
}
