use chrono::Utc;
use lazy_static::lazy_static;
use tracing::{info, warn};

use crate::core::{Cell, Result, Scalar, StoredRow};
use crate::document::{DocField, Document};
use crate::mutation;
use crate::schema::{ColumnDef, Entity, EntitySchema};
use crate::session::Session;

lazy_static! {
    static ref CHARACTERS: EntitySchema = EntitySchema::new(
        "characters",
        vec![
            ColumnDef::natural_key("name", 100),
            ColumnDef::document("data"),
        ],
    );
}

/// A named document; the name is chosen by the caller (the ingested file's stem).
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    name: String,
    persisted: bool,
    pub data: DocField,
}

impl Character {
    pub fn new(name: impl Into<String>, data: Option<Document>) -> Self {
        Self {
            name: name.into(),
            persisted: false,
            data: DocField::unsaved(data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Character {
    fn schema() -> &'static EntitySchema {
        &CHARACTERS
    }

    fn from_row(row: StoredRow) -> Result<Self> {
        Ok(Self {
            name: row.text("name")?,
            persisted: true,
            data: DocField::loaded(row.document("data")?),
        })
    }

    fn entity_schema(&self) -> &'static EntitySchema {
        &CHARACTERS
    }

    fn primary_key(&self) -> Option<Scalar> {
        Some(Scalar::Text(self.name.clone()))
    }

    fn is_persisted(&self) -> bool {
        self.persisted
    }

    fn insert_cells(&self) -> Vec<(&'static str, Cell)> {
        vec![
            ("name", Cell::Text(self.name.clone())),
            ("data", Cell::from(self.data.value())),
        ]
    }

    fn document_fields(&self) -> Vec<(&'static str, &DocField)> {
        vec![("data", &self.data)]
    }

    fn document_fields_mut(&mut self) -> Vec<&mut DocField> {
        vec![&mut self.data]
    }

    fn mark_persisted(&mut self, _generated_key: Option<i64>) {
        self.persisted = true;
    }
}

/// Whether a character document qualifies for promotion: an object whose
/// `level` reaches `threshold` and which is not flagged `vip` yet.
pub fn is_vip_candidate(data: &Document, threshold: i64) -> bool {
    data.as_value().is_object()
        && data.number("level").is_some_and(|level| level >= threshold as f64)
        && !data.boolean("vip").unwrap_or(false)
}

/// Flag every character at or above `threshold` as VIP, stamping `vip_since`.
///
/// Already promoted characters are skipped, so running it again alters 0 records.
pub async fn promote_vips(session: &mut Session<'_>, threshold: i64) -> Result<usize> {
    let since = Utc::now().to_rfc3339();

    let promoted = session
        .update_where::<Character>(|character| {
            let outcome = mutation::replace_if(
                &mut character.data,
                |data| is_vip_candidate(data, threshold),
                |data| {
                    data.with_value("vip", true)?
                        .with_value("vip_since", since.as_str())
                },
            );
            if let Err(err) = outcome {
                warn!(character = %character.name, error = %err, "skipping VIP promotion");
            }
        })
        .await?;

    info!(threshold, promoted, "VIP promotion finished");
    Ok(promoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_natural_key() {
        let character = Character::new("alice", Some(Document::new(json!({"age": 28}))));
        assert_eq!(character.primary_key(), Some(Scalar::from("alice")));
        assert!(!character.is_persisted());
        assert!(Character::schema().validate().is_ok());
    }

    #[test]
    fn test_vip_candidate() {
        let doc = |v| Document::new(v);
        assert!(is_vip_candidate(&doc(json!({"level": 12})), 10));
        assert!(is_vip_candidate(&doc(json!({"level": 10, "vip": false})), 10));
        assert!(!is_vip_candidate(&doc(json!({"level": 9})), 10));
        assert!(!is_vip_candidate(&doc(json!({"level": 50, "vip": true})), 10));
        assert!(!is_vip_candidate(&doc(json!({"age": 30})), 10));
        assert!(!is_vip_candidate(&doc(json!([1, 2])), 0));
    }

    #[test]
    fn test_vip_candidate_with_float_levels() {
        let doc = |v| Document::new(v);
        assert!(is_vip_candidate(&doc(json!({"level": 15.0})), 10));
        assert!(is_vip_candidate(&doc(json!({"level": 12.5})), 10));
        assert!(is_vip_candidate(&doc(json!({"level": 10.0})), 10));
        assert!(!is_vip_candidate(&doc(json!({"level": 9.99})), 10));
        assert!(!is_vip_candidate(&doc(json!({"level": "15"})), 10));
    }
}
