use std::fmt;

use crate::core::{DocError, Result};

/// One step of a document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Parsed nested path such as `address.city` or `hobbies[0]`.
///
/// The empty string addresses the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPath {
    raw: String,
    segments: Vec<Segment>,
}

impl DocPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut key = String::new();
        let mut chars = raw.chars().peekable();
        // A key is required before '.' and at the end, except right after ']'.
        let mut after_index = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if key.is_empty() && !after_index {
                        return Err(DocError::invalid_path(raw, "empty key"));
                    }
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    after_index = false;
                    if chars.peek().is_none() {
                        return Err(DocError::invalid_path(raw, "trailing '.'"));
                    }
                }
                '[' => {
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(other) => {
                                return Err(DocError::invalid_path(
                                    raw,
                                    format!("unexpected '{}' in index", other),
                                ));
                            }
                            None => return Err(DocError::invalid_path(raw, "unclosed '['")),
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| DocError::invalid_path(raw, "index must be a number"))?;
                    segments.push(Segment::Index(index));
                    after_index = true;
                }
                ']' => return Err(DocError::invalid_path(raw, "unmatched ']'")),
                other => {
                    if after_index {
                        return Err(DocError::invalid_path(raw, "expected '.' or '[' after index"));
                    }
                    key.push(other);
                }
            }
        }

        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn root() -> Self {
        Self {
            raw: String::new(),
            segments: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path as a PostgreSQL `text[]` for the `#>` / `#>>` operators.
    pub fn to_text_array(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Key(key) => key.clone(),
                Segment::Index(index) => index.to_string(),
            })
            .collect()
    }

    /// Splits off the last segment, returning the parent path and that segment.
    pub fn split_last(&self) -> Option<(&[Segment], &Segment)> {
        self.segments
            .split_last()
            .map(|(last, parent)| (parent, last))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
