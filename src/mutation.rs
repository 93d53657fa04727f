//! Read-copy-modify-write helpers for document fields.
//!
//! Both helpers read the field's current snapshot, build a complete new
//! document from it and hand that to [`DocField::replace`]. The snapshot the
//! closures see is never modified.

use crate::core::Result;
use crate::document::{DocField, Document};

/// Replace the document when `guard` holds for the current value.
///
/// A NULL field never matches. Returns whether a replacement was assigned.
pub fn replace_if(
    field: &mut DocField,
    guard: impl FnOnce(&Document) -> bool,
    change: impl FnOnce(&Document) -> Result<Document>,
) -> Result<bool> {
    let Some(current) = field.value() else {
        return Ok(false);
    };
    if !guard(current) {
        return Ok(false);
    }
    let next = change(current)?;
    field.replace(next);
    Ok(true)
}

/// Replace the document unconditionally; a NULL field starts from `{}`.
pub fn replace_with(
    field: &mut DocField,
    change: impl FnOnce(&Document) -> Result<Document>,
) -> Result<()> {
    let next = match field.value() {
        Some(current) => change(current)?,
        None => change(&Document::empty_object())?,
    };
    field.replace(next);
    Ok(())
}
