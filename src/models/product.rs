use lazy_static::lazy_static;

use crate::core::{Cell, Result, Scalar, StoredRow};
use crate::document::{DocField, Document};
use crate::schema::{ColumnDef, Entity, EntitySchema};

lazy_static! {
    static ref PRODUCTS: EntitySchema = EntitySchema::new(
        "products",
        vec![
            ColumnDef::auto_key("id"),
            ColumnDef::text("name", 100).not_null(),
            ColumnDef::document("product_info"),
        ],
    );
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    id: Option<i64>,
    name: String,
    pub product_info: DocField,
}

impl Product {
    pub fn new(name: impl Into<String>, product_info: Option<Document>) -> Self {
        Self {
            id: None,
            name: name.into(),
            product_info: DocField::unsaved(product_info),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Product {
    fn schema() -> &'static EntitySchema {
        &PRODUCTS
    }

    fn from_row(row: StoredRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.integer("id")?),
            name: row.text("name")?,
            product_info: DocField::loaded(row.document("product_info")?),
        })
    }

    fn entity_schema(&self) -> &'static EntitySchema {
        &PRODUCTS
    }

    fn primary_key(&self) -> Option<Scalar> {
        self.id.map(Scalar::Integer)
    }

    fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    fn insert_cells(&self) -> Vec<(&'static str, Cell)> {
        vec![
            ("name", Cell::Text(self.name.clone())),
            ("product_info", Cell::from(self.product_info.value())),
        ]
    }

    fn document_fields(&self) -> Vec<(&'static str, &DocField)> {
        vec![("product_info", &self.product_info)]
    }

    fn document_fields_mut(&mut self) -> Vec<&mut DocField> {
        vec![&mut self.product_info]
    }

    fn mark_persisted(&mut self, generated_key: Option<i64>) {
        if generated_key.is_some() {
            self.id = generated_key;
        }
    }
}
