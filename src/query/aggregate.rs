use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::document::Document;
use crate::schema::Entity;

/// Document column of every record, NULL columns included as `None`.
pub fn documents<'a, E: Entity>(
    records: &'a [E],
    column: &'a str,
) -> impl Iterator<Item = Option<&'a Document>> + 'a {
    records.iter().map(move |record| record.document(column))
}

/// Mean of the numbers at `path`.
///
/// A NULL document, a missing path or a non-numeric value counts as 0; an
/// empty collection averages to 0.
pub fn average<'a>(docs: impl IntoIterator<Item = Option<&'a Document>>, path: &str) -> f64 {
    let (sum, count) = docs.into_iter().fold((0.0, 0usize), |(sum, count), doc| {
        let value = doc.and_then(|d| d.number(path)).unwrap_or(0.0);
        (sum + value, count + 1)
    });
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Occurrences of each string value at `path`.
///
/// Missing, non-string and empty-string values are not counted.
pub fn count_by<'a>(
    docs: impl IntoIterator<Item = Option<&'a Document>>,
    path: &str,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for value in docs.into_iter().flatten().filter_map(|d| d.str(path)) {
        if value.is_empty() {
            continue;
        }
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Mean of the numeric elements of the array at `path`, `None` when there are none.
pub fn array_average(doc: &Document, path: &str) -> Option<f64> {
    let numbers: Vec<f64> = doc
        .array(path)?
        .iter()
        .filter_map(JsonValue::as_f64)
        .collect();
    if numbers.is_empty() {
        return None;
    }
    Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

/// Owned copies of the values present at `path`.
pub fn collect<'a>(docs: impl IntoIterator<Item = Option<&'a Document>>, path: &str) -> Vec<JsonValue> {
    docs.into_iter()
        .flatten()
        .filter_map(|d| d.get(path).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Vec<Document> {
        vec![
            Document::new(json!({"age": 28, "address": {"city": "Seoul"}})),
            Document::new(json!({"age": 25, "address": {"city": "Busan"}})),
        ]
    }

    #[test]
    fn test_average() {
        let docs = people();
        assert_eq!(average(docs.iter().map(Some), "age"), 26.5);
        assert_eq!(average(Vec::<Option<&Document>>::new(), "age"), 0.0);

        let with_gap = vec![Some(&docs[0]), None];
        assert_eq!(average(with_gap, "age"), 14.0);
    }

    #[test]
    fn test_count_by_skips_missing_and_empty() {
        let mut docs = people();
        docs.push(Document::new(json!({"address": {"city": "Seoul"}})));
        docs.push(Document::new(json!({"address": {"city": ""}})));
        docs.push(Document::new(json!({"age": 40})));

        let counts = count_by(docs.iter().map(Some), "address.city");
        assert_eq!(counts.get("Seoul"), Some(&2));
        assert_eq!(counts.get("Busan"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_array_average() {
        let laptop = Document::new(json!({"ratings": [5, 4, 5, 4, 5]}));
        assert_eq!(array_average(&laptop, "ratings"), Some(4.6));
        assert_eq!(array_average(&laptop, "missing"), None);
        assert_eq!(array_average(&Document::new(json!({"r": []})), "r"), None);
    }

    #[test]
    fn test_collect_returns_copies() {
        let docs = people();
        let mut cities = collect(docs.iter().map(Some), "address.city");
        cities.push(json!("Incheon"));
        assert_eq!(cities, vec![json!("Seoul"), json!("Busan"), json!("Incheon")]);
        assert_eq!(docs[0].str("address.city"), Some("Seoul"));
    }
}
