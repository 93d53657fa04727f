use crate::schema::Entity;

/// Records to flush together in one transaction.
///
/// Holds mutable borrows so that a commit can write generated keys and new
/// baselines back into the caller's records, or drop their pending values
/// when it fails.
#[derive(Default)]
pub struct UnitOfWork<'r> {
    records: Vec<&'r mut dyn Entity>,
}

impl<'r> UnitOfWork<'r> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new or modified record.
    pub fn save<E: Entity>(&mut self, record: &'r mut E) -> &mut Self {
        self.records.push(record);
        self
    }

    pub fn save_all<E: Entity + 'r>(&mut self, records: impl IntoIterator<Item = &'r mut E>) -> &mut Self {
        for record in records {
            self.records.push(record);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether committing would issue any statement.
    pub fn has_changes(&self) -> bool {
        self.records
            .iter()
            .any(|record| !record.is_persisted() || record.has_pending())
    }

    /// Abandon the work: persisted records fall back to their stored values.
    pub fn discard(self) {
        for record in self.records {
            discard_record(record);
        }
    }

    pub(crate) fn records(&self) -> &[&'r mut dyn Entity] {
        &self.records
    }

    pub(crate) fn into_records(self) -> Vec<&'r mut dyn Entity> {
        self.records
    }
}

/// Unsaved records keep their values: there is no stored baseline to return to.
pub(crate) fn discard_record(record: &mut dyn Entity) {
    if !record.is_persisted() {
        return;
    }
    for field in record.document_fields_mut() {
        field.discard_pending();
    }
}
