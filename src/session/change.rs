// ============================================================================
// Unit of Work Change Log
// ============================================================================
//
// Every statement a commit issues is recorded as a Change. The log is only
// reported back once COMMIT succeeded; on failure it is dropped together
// with the transaction.
//
// ============================================================================

use std::fmt;

use crate::core::Scalar;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A new record was inserted; `key` is the committed identity.
    Insert { table: &'static str, key: Scalar },

    /// Document columns of an existing record were replaced.
    Update {
        table: &'static str,
        key: Scalar,
        columns: Vec<&'static str>,
    },
}

impl Change {
    pub fn table_name(&self) -> &'static str {
        match self {
            Change::Insert { table, .. } => table,
            Change::Update { table, .. } => table,
        }
    }

    pub fn key(&self) -> &Scalar {
        match self {
            Change::Insert { key, .. } => key,
            Change::Update { key, .. } => key,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Change::Insert { .. })
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Insert { table, key } => write!(f, "INSERT {}[{}]", table, key),
            Change::Update {
                table,
                key,
                columns,
            } => write!(f, "UPDATE {}[{}] ({})", table, key, columns.join(", ")),
        }
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitSummary {
    pub changes: Vec<Change>,
}

impl CommitSummary {
    pub fn inserted(&self) -> usize {
        self.changes.iter().filter(|c| c.is_insert()).count()
    }

    pub fn updated(&self) -> usize {
        self.changes.len() - self.inserted()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let summary = CommitSummary {
            changes: vec![
                Change::Insert {
                    table: "characters",
                    key: Scalar::from("alice"),
                },
                Change::Update {
                    table: "users",
                    key: Scalar::Integer(1),
                    columns: vec!["profile"],
                },
            ],
        };
        assert_eq!(summary.inserted(), 1);
        assert_eq!(summary.updated(), 1);
        assert_eq!(summary.changes[1].table_name(), "users");
        assert_eq!(summary.changes[1].to_string(), "UPDATE users[1] (profile)");
    }
}
