use lazy_static::lazy_static;

use crate::core::{Cell, Result, Scalar, StoredRow};
use crate::document::{DocField, Document};
use crate::schema::{ColumnDef, Entity, EntitySchema};

lazy_static! {
    static ref USERS: EntitySchema = EntitySchema::new(
        "users",
        vec![
            ColumnDef::auto_key("id"),
            ColumnDef::text("name", 100).not_null(),
            ColumnDef::document("profile"),
            ColumnDef::document("settings"),
        ],
    );
}

/// A user with a free-form profile and settings document.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: Option<i64>,
    name: String,
    pub profile: DocField,
    pub settings: DocField,
}

impl User {
    pub fn new(name: impl Into<String>, profile: Option<Document>, settings: Option<Document>) -> Self {
        Self {
            id: None,
            name: name.into(),
            profile: DocField::unsaved(profile),
            settings: DocField::unsaved(settings),
        }
    }

    /// Store-generated id, `None` until the first commit.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for User {
    fn schema() -> &'static EntitySchema {
        &USERS
    }

    fn from_row(row: StoredRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.integer("id")?),
            name: row.text("name")?,
            profile: DocField::loaded(row.document("profile")?),
            settings: DocField::loaded(row.document("settings")?),
        })
    }

    fn entity_schema(&self) -> &'static EntitySchema {
        &USERS
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
            ("profile", Cell::from(self.profile.value())),
            ("settings", Cell::from(self.settings.value())),
        ]
    }

    fn document_fields(&self) -> Vec<(&'static str, &DocField)> {
        vec![("profile", &self.profile), ("settings", &self.settings)]
    }

    fn document_fields_mut(&mut self) -> Vec<&mut DocField> {
        vec![&mut self.profile, &mut self.settings]
    }

    fn mark_persisted(&mut self, generated_key: Option<i64>) {
        if generated_key.is_some() {
            self.id = generated_key;
        }
    }
}
