//! Schema-less document values.
//!
//! A [`Document`] is an immutable snapshot of a JSON tree. Reads go through
//! optional-returning path lookups; every change produces a new `Document`
//! built from a deep copy, so a value fetched from the store is never edited
//! behind the back of the [`DocField`] that tracks it.

mod field;
mod path;

pub use field::{DocField, FieldState};
pub use path::{DocPath, Segment};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::core::{DocError, Result};

#[derive(Clone, PartialEq)]
pub struct Document(Arc<JsonValue>);

impl Document {
    pub fn new(value: JsonValue) -> Self {
        Self(Arc::new(value))
    }

    pub fn empty_object() -> Self {
        Self::new(JsonValue::Object(Map::new()))
    }

    pub fn as_value(&self) -> &JsonValue {
        &self.0
    }

    /// Deep copy of the underlying tree.
    pub fn to_value(&self) -> JsonValue {
        self.0.as_ref().clone()
    }

    pub fn into_value(self) -> JsonValue {
        Arc::try_unwrap(self.0).unwrap_or_else(|shared| shared.as_ref().clone())
    }

    /// Value at `path`, or `None` when any step is absent or has the wrong shape.
    ///
    /// Malformed paths also yield `None`.
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let path = DocPath::parse(path).ok()?;
        lookup(&self.0, path.segments())
    }

    pub fn get_path(&self, path: &DocPath) -> Option<&JsonValue> {
        lookup(&self.0, path.segments())
    }

    pub fn get_or<'a>(&'a self, path: &str, default: &'a JsonValue) -> &'a JsonValue {
        self.get(path).unwrap_or(default)
    }

    /// Top-level key presence.
    pub fn has_key(&self, key: &str) -> bool {
        self.0
            .as_object()
            .is_some_and(|object| object.contains_key(key))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Whether the array at `path` holds an element equal to `needle`.
    pub fn contains(&self, path: &str, needle: &JsonValue) -> bool {
        self.array(path)
            .is_some_and(|items| items.iter().any(|item| json_eq(item, needle)))
    }

    pub fn number(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(JsonValue::as_f64)
    }

    pub fn integer(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(JsonValue::as_i64)
    }

    pub fn boolean(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(JsonValue::as_bool)
    }

    pub fn str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(JsonValue::as_str)
    }

    pub fn array(&self, path: &str) -> Option<&Vec<JsonValue>> {
        self.get(path).and_then(JsonValue::as_array)
    }

    pub fn object(&self, path: &str) -> Option<&Map<String, JsonValue>> {
        self.get(path).and_then(JsonValue::as_object)
    }

    /// New document with the leaf at `path` replaced (or created).
    ///
    /// Missing intermediate keys become objects; indices must already exist.
    pub fn with_value(&self, path: &str, value: impl Into<JsonValue>) -> Result<Document> {
        let parsed = DocPath::parse(path)?;
        let value = value.into();
        self.try_edited(|tree| {
            *slot_mut(tree, &parsed)? = value;
            Ok(())
        })
    }

    /// New document with `entries` merged into the object at `path`.
    pub fn merged(&self, path: &str, entries: JsonValue) -> Result<Document> {
        let parsed = DocPath::parse(path)?;
        let entries = match entries {
            JsonValue::Object(map) => map,
            other => {
                return Err(DocError::TypeMismatch(format!(
                    "merge into '{}' expects an object, got {}",
                    path,
                    kind(&other)
                )));
            }
        };
        self.try_edited(|tree| {
            let slot = slot_mut(tree, &parsed)?;
            if slot.is_null() {
                *slot = JsonValue::Object(Map::new());
            }
            match slot {
                JsonValue::Object(target) => {
                    target.extend(entries);
                    Ok(())
                }
                other => Err(DocError::TypeMismatch(format!(
                    "cannot merge into {} at '{}'",
                    kind(other),
                    parsed
                ))),
            }
        })
    }

    /// New document with `value` pushed onto the array at `path`.
    ///
    /// A missing array is created.
    pub fn appended(&self, path: &str, value: impl Into<JsonValue>) -> Result<Document> {
        let parsed = DocPath::parse(path)?;
        let value = value.into();
        self.try_edited(|tree| {
            let slot = slot_mut(tree, &parsed)?;
            if slot.is_null() {
                *slot = JsonValue::Array(Vec::new());
            }
            match slot {
                JsonValue::Array(items) => {
                    items.push(value);
                    Ok(())
                }
                other => Err(DocError::TypeMismatch(format!(
                    "cannot append to {} at '{}'",
                    kind(other),
                    parsed
                ))),
            }
        })
    }

    /// New document without the key or element at `path`. Absent paths are a no-op.
    pub fn without(&self, path: &str) -> Result<Document> {
        let parsed = DocPath::parse(path)?;
        let Some((parent, last)) = parsed.split_last() else {
            return Err(DocError::invalid_path(path, "cannot remove the document root"));
        };
        self.try_edited(|tree| {
            match (lookup_mut(tree, parent), last) {
                (Some(JsonValue::Object(map)), Segment::Key(key)) => {
                    map.remove(key);
                }
                (Some(JsonValue::Array(items)), Segment::Index(index)) if *index < items.len() => {
                    items.remove(*index);
                }
                _ => {}
            }
            Ok(())
        })
    }

    /// Copy-then-modify: `edit` receives a deep copy of the tree.
    pub fn edited(&self, edit: impl FnOnce(&mut JsonValue)) -> Document {
        let mut tree = self.to_value();
        edit(&mut tree);
        Document::new(tree)
    }

    pub fn try_edited(&self, edit: impl FnOnce(&mut JsonValue) -> Result<()>) -> Result<Document> {
        let mut tree = self.to_value();
        edit(&mut tree)?;
        Ok(Document::new(tree))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document({})", self.0)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<JsonValue> for Document {
    fn from(value: JsonValue) -> Self {
        Self::new(value)
    }
}

impl FromStr for Document {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(s)?))
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Self::new)
    }
}

/// JSON equality where numbers compare by value (`25 == 25.0`).
///
/// Two integers compare exactly; floats only come in when either side is one.
pub fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                return x.as_f64() == y.as_f64();
            }
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_u64().is_some() && x.as_u64() == y.as_u64(),
            }
        }
        _ => a == b,
    }
}

pub(crate) fn kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn lookup<'a>(root: &'a JsonValue, segments: &[Segment]) -> Option<&'a JsonValue> {
    segments
        .iter()
        .try_fold(root, |current, segment| match segment {
            Segment::Key(key) => current.as_object()?.get(key),
            Segment::Index(index) => current.as_array()?.get(*index),
        })
}

fn lookup_mut<'a>(root: &'a mut JsonValue, segments: &[Segment]) -> Option<&'a mut JsonValue> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            Segment::Key(key) => current.as_object_mut()?.get_mut(key)?,
            Segment::Index(index) => current.as_array_mut()?.get_mut(*index)?,
        };
    }
    Some(current)
}

/// Walks to `path`, creating missing object keys as `null` along the way.
fn slot_mut<'a>(root: &'a mut JsonValue, path: &DocPath) -> Result<&'a mut JsonValue> {
    let mut current = root;
    for segment in path.segments() {
        current = match segment {
            Segment::Key(key) => {
                if current.is_null() {
                    *current = JsonValue::Object(Map::new());
                }
                match current {
                    JsonValue::Object(map) => map.entry(key.clone()).or_insert(JsonValue::Null),
                    other => {
                        return Err(DocError::TypeMismatch(format!(
                            "cannot descend into {} with key '{}' in '{}'",
                            kind(other),
                            key,
                            path
                        )));
                    }
                }
            }
            Segment::Index(index) => match current {
                JsonValue::Array(items) => {
                    let len = items.len();
                    items.get_mut(*index).ok_or_else(|| {
                        DocError::invalid_path(
                            path.as_str(),
                            format!("index {} out of bounds (len {})", index, len),
                        )
                    })?
                }
                other => {
                    return Err(DocError::TypeMismatch(format!(
                        "cannot index into {} in '{}'",
                        kind(other),
                        path
                    )));
                }
            },
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> Document {
        Document::new(json!({
            "age": 28,
            "email": "kim@example.com",
            "address": {"city": "Seoul", "district": "Gangnam", "zipcode": "06292"},
            "hobbies": ["reading", "movies", "coding"],
            "is_active": true
        }))
    }

    #[test]
    fn test_nested_lookup() {
        let doc = profile();
        assert_eq!(doc.str("address.city"), Some("Seoul"));
        assert_eq!(doc.integer("age"), Some(28));
        assert_eq!(doc.str("hobbies[2]"), Some("coding"));
        assert_eq!(doc.get("address.country"), None);
        assert_eq!(doc.get("age.years"), None);
        assert_eq!(doc.get("hobbies[9]"), None);
        assert_eq!(doc.get("a..b"), None);
    }

    #[test]
    fn test_get_or_default() {
        let doc = profile();
        let fallback = json!("unknown");
        assert_eq!(doc.get_or("address.country", &fallback), &json!("unknown"));
        assert_eq!(doc.get_or("address.city", &fallback), &json!("Seoul"));
    }

    #[test]
    fn test_key_presence_and_membership() {
        let doc = profile();
        assert!(doc.has_key("hobbies"));
        assert!(!doc.has_key("city"));
        assert!(doc.exists("address.city"));
        assert!(doc.contains("hobbies", &json!("coding")));
        assert!(!doc.contains("hobbies", &json!("sports")));
        assert!(!doc.contains("age", &json!(28)));
    }

    #[test]
    fn test_numeric_membership_ignores_representation() {
        let doc = Document::new(json!({"ratings": [5, 4, 5]}));
        assert!(doc.contains("ratings", &json!(5.0)));
        assert!(json_eq(&json!(25), &json!(25.0)));
        assert!(!json_eq(&json!(25), &json!("25")));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        assert!(!json_eq(&json!(9007199254740993_i64), &json!(9007199254740992_i64)));
        assert!(json_eq(&json!(9007199254740993_i64), &json!(9007199254740993_u64)));
        assert!(!json_eq(&json!(u64::MAX), &json!(u64::MAX - 1)));
        assert!(!json_eq(&json!(-1), &json!(u64::MAX)));
        assert!(json_eq(&json!(3), &json!(3.0)));

        let doc = Document::new(json!({"ids": [9007199254740993_i64]}));
        assert!(!doc.contains("ids", &json!(9007199254740992_i64)));
    }

    #[test]
    fn test_with_value_leaves_original_untouched() {
        let original = profile();
        let updated = original.with_value("age", 29).unwrap();

        assert_eq!(original.integer("age"), Some(28));
        assert_eq!(updated.integer("age"), Some(29));
        assert_eq!(updated.get("address"), original.get("address"));
        assert_eq!(updated.get("hobbies"), original.get("hobbies"));
    }

    #[test]
    fn test_with_value_creates_intermediate_objects() {
        let doc = Document::empty_object()
            .with_value("notifications.email", true)
            .unwrap();
        assert_eq!(doc.as_value(), &json!({"notifications": {"email": true}}));
    }

    #[test]
    fn test_with_value_rejects_scalar_parent() {
        let err = profile().with_value("age.years", 1).unwrap_err();
        assert!(matches!(err, DocError::TypeMismatch(_)));

        let err = profile().with_value("hobbies[7]", "x").unwrap_err();
        assert!(matches!(err, DocError::InvalidPath { .. }));
    }

    #[test]
    fn test_merged_nested_object() {
        let settings = Document::new(json!({
            "theme": "light",
            "notifications": {"email": false, "push": true, "sms": false}
        }));
        let updated = settings
            .merged("notifications", json!({"email": true, "push": false}))
            .unwrap();

        assert_eq!(
            updated.get("notifications"),
            Some(&json!({"email": true, "push": false, "sms": false}))
        );
        assert_eq!(settings.boolean("notifications.email"), Some(false));
        assert_eq!(updated.str("theme"), Some("light"));
    }

    #[test]
    fn test_merged_requires_object() {
        assert!(profile().merged("age", json!({"x": 1})).is_err());
        assert!(profile().merged("", json!([1])).is_err());
    }

    #[test]
    fn test_appended_preserves_order() {
        let doc = Document::new(json!({"hobbies": ["reading", "coding"]}));
        let updated = doc.appended("hobbies", "sports").unwrap();
        assert_eq!(
            updated.as_value(),
            &json!({"hobbies": ["reading", "coding", "sports"]})
        );
        assert_eq!(doc.array("hobbies").map(Vec::len), Some(2));
    }

    #[test]
    fn test_appended_creates_missing_array() {
        let updated = Document::empty_object().appended("tags", "new").unwrap();
        assert_eq!(updated.as_value(), &json!({"tags": ["new"]}));
        assert!(profile().appended("age", 1).is_err());
    }

    #[test]
    fn test_without() {
        let doc = profile();
        let trimmed = doc.without("address.zipcode").unwrap();
        assert!(!trimmed.exists("address.zipcode"));
        assert!(doc.exists("address.zipcode"));

        let trimmed = doc.without("hobbies[0]").unwrap();
        assert_eq!(trimmed.str("hobbies[0]"), Some("movies"));

        assert_eq!(doc.without("missing.key").unwrap(), doc);
        assert!(doc.without("").is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let doc = profile();
        let text = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
        assert_eq!("[1,null]".parse::<Document>().unwrap().as_value(), &json!([1, null]));
    }
}
