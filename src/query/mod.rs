//! In-memory document predicates and aggregates.
//!
//! Everything here works on already loaded documents and never touches the
//! store. A record whose document column is NULL is evaluated as a document
//! where every path is missing.

mod aggregate;

pub use aggregate::{array_average, average, collect, count_by, documents};

use std::ops::Not;

use serde_json::Value as JsonValue;

use crate::core::Result;
use crate::document::{DocPath, Document, json_eq};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The path resolves to a value (including JSON `null`).
    Exists(String),
    /// The value at the path equals the given one. Missing is false.
    Eq(String, JsonValue),
    /// Like `Eq`, comparing `default` when the path is missing.
    EqOr {
        path: String,
        default: JsonValue,
        expected: JsonValue,
    },
    /// The array at the path holds the given element.
    Contains(String, JsonValue),
    /// Numeric `>=`; `missing` stands in for an absent or non-numeric value.
    Gte {
        path: String,
        bound: f64,
        missing: Option<f64>,
    },
    /// Numeric `<=`; `missing` stands in for an absent or non-numeric value.
    Lte {
        path: String,
        bound: f64,
        missing: Option<f64>,
    },
    /// The value at the path is boolean `true`.
    IsTrue(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn exists(path: impl Into<String>) -> Self {
        Self::Exists(path.into())
    }

    pub fn eq(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::Eq(path.into(), value.into())
    }

    pub fn eq_or(
        path: impl Into<String>,
        default: impl Into<JsonValue>,
        expected: impl Into<JsonValue>,
    ) -> Self {
        Self::EqOr {
            path: path.into(),
            default: default.into(),
            expected: expected.into(),
        }
    }

    pub fn contains(path: impl Into<String>, element: impl Into<JsonValue>) -> Self {
        Self::Contains(path.into(), element.into())
    }

    pub fn gte(path: impl Into<String>, bound: f64) -> Self {
        Self::Gte {
            path: path.into(),
            bound,
            missing: None,
        }
    }

    pub fn gte_or(path: impl Into<String>, bound: f64, missing: f64) -> Self {
        Self::Gte {
            path: path.into(),
            bound,
            missing: Some(missing),
        }
    }

    pub fn lte(path: impl Into<String>, bound: f64) -> Self {
        Self::Lte {
            path: path.into(),
            bound,
            missing: None,
        }
    }

    pub fn lte_or(path: impl Into<String>, bound: f64, missing: f64) -> Self {
        Self::Lte {
            path: path.into(),
            bound,
            missing: Some(missing),
        }
    }

    pub fn is_true(path: impl Into<String>) -> Self {
        Self::IsTrue(path.into())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Check that every path in the tree parses.
    ///
    /// Evaluation treats a malformed path as missing, so callers validate
    /// first to get [`DocError::InvalidPath`](crate::DocError::InvalidPath).
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Exists(path)
            | Self::Eq(path, _)
            | Self::EqOr { path, .. }
            | Self::Contains(path, _)
            | Self::Gte { path, .. }
            | Self::Lte { path, .. }
            | Self::IsTrue(path) => DocPath::parse(path).map(|_| ()),
            Self::And(all) | Self::Or(all) => all.iter().try_for_each(Predicate::validate),
            Self::Not(inner) => inner.validate(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.evaluate(Some(document))
    }

    /// Evaluate against a possibly NULL document column.
    pub fn evaluate(&self, document: Option<&Document>) -> bool {
        let get = |path: &String| lookup(document, path);

        match self {
            Self::Exists(path) => get(path).is_some(),
            Self::Eq(path, value) => get(path).is_some_and(|found| json_eq(found, value)),
            Self::EqOr {
                path,
                default,
                expected,
            } => json_eq(get(path).unwrap_or(default), expected),
            Self::Contains(path, element) => {
                document.is_some_and(|doc| doc.contains(path, element))
            }
            Self::Gte {
                path,
                bound,
                missing,
            } => numeric(get(path), *missing).is_some_and(|n| n >= *bound),
            Self::Lte {
                path,
                bound,
                missing,
            } => numeric(get(path), *missing).is_some_and(|n| n <= *bound),
            Self::IsTrue(path) => get(path).and_then(JsonValue::as_bool).unwrap_or(false),
            Self::And(all) => all.iter().all(|p| p.evaluate(document)),
            Self::Or(any) => any.iter().any(|p| p.evaluate(document)),
            Self::Not(inner) => !inner.evaluate(document),
        }
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        Predicate::Not(Box::new(self))
    }
}

fn lookup<'a>(document: Option<&'a Document>, path: &str) -> Option<&'a JsonValue> {
    document.and_then(|doc| doc.get(path))
}

fn numeric(value: Option<&JsonValue>, missing: Option<f64>) -> Option<f64> {
    value.and_then(JsonValue::as_f64).or(missing)
}
