// ============================================================================
// Document Field Change Tracking
// ============================================================================
//
// Each document column on a loaded record moves through:
//
//   Clean ──replace/clear──> Pending ──commit──> Clean (new baseline)
//                               │
//                               └──rollback──> Clean (old baseline)
//
// The stored value is only reachable through `&Document`, so the only way to
// change a field is to hand it a complete replacement.
//
// ============================================================================

use std::fmt;

use super::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// Holds the last value read from or written to the store.
    Clean,
    /// A replacement has been assigned and not yet committed.
    Pending,
}

impl fmt::Display for FieldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldState::Clean => write!(f, "CLEAN"),
            FieldState::Pending => write!(f, "PENDING"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocField {
    stored: Option<Document>,
    /// `Some(None)` is a pending replacement with SQL NULL.
    pending: Option<Option<Document>>,
}

impl DocField {
    /// Field as read from the store.
    pub fn loaded(stored: Option<Document>) -> Self {
        Self {
            stored,
            pending: None,
        }
    }

    /// Field of a record that has not been written yet.
    pub fn unsaved(value: Option<Document>) -> Self {
        Self {
            stored: None,
            pending: Some(value),
        }
    }

    /// Current value: the pending replacement if any, else the stored one.
    pub fn value(&self) -> Option<&Document> {
        match &self.pending {
            Some(pending) => pending.as_ref(),
            None => self.stored.as_ref(),
        }
    }

    /// Last value known to be in the store.
    pub fn stored(&self) -> Option<&Document> {
        self.stored.as_ref()
    }

    pub fn state(&self) -> FieldState {
        if self.pending.is_some() {
            FieldState::Pending
        } else {
            FieldState::Clean
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Assign a complete replacement value.
    pub fn replace(&mut self, document: Document) {
        self.pending = Some(Some(document));
    }

    /// Replace the value with SQL NULL.
    pub fn clear(&mut self) {
        self.pending = Some(None);
    }

    /// The pending value has been committed and becomes the baseline.
    pub(crate) fn mark_flushed(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.stored = pending;
        }
    }

    /// Drop the pending value and fall back to the baseline.
    pub(crate) fn discard_pending(&mut self) {
        self.pending = None;
    }
}

impl From<Document> for DocField {
    fn from(document: Document) -> Self {
        Self::unsaved(Some(document))
    }
}
