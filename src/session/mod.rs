//! Sessions: reads, document predicates and unit-of-work commits.
//!
//! A [`Session`] borrows its [`Engine`] mutably, so one connection serves
//! exactly one unit of work at a time. A transaction is opened lazily by the
//! first statement and ended by [`Session::commit`] or [`Session::rollback`].
//!
//! ```ignore
//! let mut session = engine.session();
//! let mut user = session.find_first::<User>("name", "kim").await?.unwrap();
//! let profile = user.profile.value().cloned().unwrap_or_else(Document::empty_object);
//! user.profile.replace(profile.with_value("age", 29)?);
//! session.commit_one(&mut user).await?;
//! ```

mod change;
mod unit_of_work;

pub use change::{Change, CommitSummary};
pub use unit_of_work::UnitOfWork;

use std::fmt;

use tracing::{debug, info, warn};

use crate::connection::Engine;
use crate::core::{DocError, Result, Scalar};
use crate::dialect::{Dialect, JsonColumnType};
use crate::document::DocPath;
use crate::query::Predicate;
use crate::schema::{ColumnKind, Entity, EntitySchema, Statement};
use unit_of_work::discard_record;

const NATIVE_PATH_SAVEPOINT: &str = "docmapper_native_path";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transaction open.
    Idle,
    InTransaction,
    /// A commit failed; the session accepts no further statements.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "IDLE"),
            SessionState::InTransaction => write!(f, "IN TRANSACTION"),
            SessionState::Closed => write!(f, "CLOSED"),
        }
    }
}

enum Flushed {
    Inserted(Option<i64>),
    Updated,
    Untouched,
}

pub struct Session<'e> {
    engine: &'e mut Engine,
    state: SessionState,
}

impl<'e> Session<'e> {
    pub(crate) fn new(engine: &'e mut Engine) -> Self {
        Self {
            engine,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn dialect(&self) -> &Dialect {
        self.engine.dialect()
    }

    pub fn json_type(&self) -> JsonColumnType {
        self.engine.json_type()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DocError::SessionClosed);
        }
        Ok(())
    }

    async fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.engine.clear_abandoned_transaction().await;
        if self.state == SessionState::Idle {
            self.engine.backend_mut().batch("BEGIN").await?;
            self.state = SessionState::InTransaction;
        }
        Ok(())
    }

    async fn load<E: Entity>(&mut self, statement: Statement) -> Result<Vec<E>> {
        self.begin().await?;
        let rows = self
            .engine
            .backend_mut()
            .fetch(&statement, E::schema())
            .await?;
        rows.into_iter().map(E::from_row).collect()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Every record of `E`, in no particular order.
    pub async fn all<E: Entity>(&mut self) -> Result<Vec<E>> {
        let statement = self.engine.statements().select_all(E::schema());
        self.load(statement).await
    }

    /// First record whose scalar `column` equals `value`.
    pub async fn find_first<E: Entity>(
        &mut self,
        column: &str,
        value: impl Into<Scalar>,
    ) -> Result<Option<E>> {
        let statement =
            self.engine
                .statements()
                .select_where(E::schema(), column, &value.into(), Some(1))?;
        Ok(self.load(statement).await?.into_iter().next())
    }

    pub async fn find_by_key<E: Entity>(&mut self, key: impl Into<Scalar>) -> Result<Option<E>> {
        let column = key_column(E::schema())?;
        self.find_first::<E>(column, key).await
    }

    /// Like [`find_by_key`](Self::find_by_key), but a missing record is an error.
    pub async fn get<E: Entity>(&mut self, key: impl Into<Scalar>) -> Result<E> {
        let key = key.into();
        self.find_by_key::<E>(key.clone()).await?.ok_or_else(|| {
            DocError::NotFound(format!("{} with key {}", E::schema().table(), key))
        })
    }

    /// Loads every record and keeps those matching `predicate`, in memory.
    pub async fn filter<E: Entity>(
        &mut self,
        mut predicate: impl FnMut(&E) -> bool,
    ) -> Result<Vec<E>> {
        let mut records = self.all::<E>().await?;
        records.retain(|record| predicate(record));
        Ok(records)
    }

    /// In-memory filter on one document column.
    pub async fn filter_documents<E: Entity>(
        &mut self,
        column: &str,
        predicate: &Predicate,
    ) -> Result<Vec<E>> {
        E::schema().document_column(column)?;
        predicate.validate()?;
        self.filter::<E>(|record: &E| predicate.evaluate(record.document(column)))
            .await
    }

    /// Store-side `column #>> path = literal`.
    ///
    /// Only available where [`Dialect::supports_native_path`] holds; other
    /// dialects get [`DocError::UnsupportedOperation`] before anything is
    /// sent. A failing statement is rolled back to a savepoint, so the open
    /// transaction stays usable.
    pub async fn native_path_eq<E: Entity>(
        &mut self,
        column: &str,
        path: &str,
        literal: &str,
    ) -> Result<Vec<E>> {
        self.ensure_open()?;
        let path = DocPath::parse(path)?;
        let statement = self
            .engine
            .statements()
            .select_by_path(E::schema(), column, &path, literal)?;

        self.begin().await?;
        let backend = self.engine.backend_mut();
        backend
            .batch(&format!("SAVEPOINT {}", NATIVE_PATH_SAVEPOINT))
            .await?;

        match backend.fetch(&statement, E::schema()).await {
            Ok(rows) => {
                backend
                    .batch(&format!("RELEASE SAVEPOINT {}", NATIVE_PATH_SAVEPOINT))
                    .await?;
                rows.into_iter().map(E::from_row).collect()
            }
            Err(err) => {
                backend
                    .batch(&format!(
                        "ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}",
                        NATIVE_PATH_SAVEPOINT
                    ))
                    .await?;
                Err(err)
            }
        }
    }

    /// [`native_path_eq`](Self::native_path_eq) that degrades to an empty
    /// result when the dialect or the store cannot evaluate it.
    pub async fn native_path_eq_or_empty<E: Entity>(
        &mut self,
        column: &str,
        path: &str,
        literal: &str,
    ) -> Result<Vec<E>> {
        match self.native_path_eq::<E>(column, path, literal).await {
            Ok(records) => Ok(records),
            Err(err) if matches!(err, DocError::UnsupportedOperation(_)) || err.is_backend() => {
                warn!(
                    dialect = %self.engine.dialect(),
                    table = E::schema().table(),
                    column,
                    path,
                    error = %err,
                    "native path query unavailable, returning no rows"
                );
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Flush every record of `work` and commit.
    ///
    /// On success inserted records receive their keys and every pending
    /// document becomes the new stored baseline. On failure the transaction
    /// is rolled back, persisted records drop their pending documents, the
    /// session is closed and the error is returned.
    pub async fn commit(&mut self, work: UnitOfWork<'_>) -> Result<CommitSummary> {
        self.ensure_open()?;

        match self.flush(&work).await {
            Ok((outcomes, changes)) => {
                for (record, outcome) in work.into_records().into_iter().zip(outcomes) {
                    if matches!(outcome, Flushed::Untouched) {
                        continue;
                    }
                    for field in record.document_fields_mut() {
                        field.mark_flushed();
                    }
                    if let Flushed::Inserted(generated) = outcome {
                        record.mark_persisted(generated);
                    }
                }
                let summary = CommitSummary { changes };
                if !summary.is_empty() {
                    info!(
                        inserted = summary.inserted(),
                        updated = summary.updated(),
                        "committed"
                    );
                }
                Ok(summary)
            }
            Err(err) => {
                if self.state == SessionState::InTransaction {
                    if let Err(rollback) = self.engine.backend_mut().batch("ROLLBACK").await {
                        warn!(error = %rollback, "rollback after failed commit failed");
                    }
                }
                for record in work.into_records() {
                    discard_record(record);
                }
                self.state = SessionState::Closed;
                warn!(error = %err, "commit failed, transaction rolled back and session closed");
                Err(err)
            }
        }
    }

    pub async fn commit_one<E: Entity>(&mut self, record: &mut E) -> Result<CommitSummary> {
        let mut work = UnitOfWork::new();
        work.save(record);
        self.commit(work).await
    }

    async fn flush(&mut self, work: &UnitOfWork<'_>) -> Result<(Vec<Flushed>, Vec<Change>)> {
        self.begin().await?;

        let mut outcomes = Vec::with_capacity(work.len());
        let mut changes = Vec::new();

        for record in work.records() {
            let schema = record.entity_schema();

            if !record.is_persisted() {
                let statement = self
                    .engine
                    .statements()
                    .insert(schema, record.insert_cells())?;
                let generated = if generates_key(schema) {
                    Some(self.engine.backend_mut().fetch_key(&statement).await?)
                } else {
                    self.engine.backend_mut().execute(&statement).await?;
                    None
                };
                let key = generated
                    .map(Scalar::Integer)
                    .or_else(|| record.primary_key())
                    .ok_or_else(|| {
                        DocError::TypeMismatch(format!("{} record has no key", schema.table()))
                    })?;
                debug!(table = schema.table(), key = %key, "inserted");
                changes.push(Change::Insert {
                    table: schema.table(),
                    key,
                });
                outcomes.push(Flushed::Inserted(generated));
            } else if record.has_pending() {
                let key = record.primary_key().ok_or_else(|| {
                    DocError::TypeMismatch(format!("{} record has no key", schema.table()))
                })?;
                let documents = record.pending_documents();
                let columns: Vec<&'static str> = documents.iter().map(|(name, _)| *name).collect();
                let statement = self
                    .engine
                    .statements()
                    .update_documents(schema, &key, documents)?;

                if self.engine.backend_mut().execute(&statement).await? == 0 {
                    return Err(DocError::NotFound(format!(
                        "{} with key {}",
                        schema.table(),
                        key
                    )));
                }
                debug!(table = schema.table(), key = %key, columns = ?columns, "updated");
                changes.push(Change::Update {
                    table: schema.table(),
                    key,
                    columns,
                });
                outcomes.push(Flushed::Updated);
            } else {
                outcomes.push(Flushed::Untouched);
            }
        }

        self.engine.backend_mut().batch("COMMIT").await?;
        self.state = SessionState::Idle;
        Ok((outcomes, changes))
    }

    /// Roll back the open transaction, if any.
    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state == SessionState::InTransaction {
            self.state = SessionState::Idle;
            self.engine.backend_mut().batch("ROLLBACK").await?;
            debug!("rolled back");
        }
        Ok(())
    }

    /// Apply `apply` to every record of `E` and commit the ones it changed
    /// as one unit of work.
    ///
    /// Returns the number of records left with a pending document.
    pub async fn update_where<E: Entity>(&mut self, mut apply: impl FnMut(&mut E)) -> Result<usize> {
        let mut records = self.all::<E>().await?;
        for record in records.iter_mut() {
            apply(record);
        }

        let mut work = UnitOfWork::new();
        work.save_all(records.iter_mut().filter(|record| record.has_pending()));
        let altered = work.len();

        self.commit(work).await?;
        Ok(altered)
    }

    /// Delete every record of `E`. Durable once the session commits.
    pub async fn delete_all<E: Entity>(&mut self) -> Result<u64> {
        let statement = self.engine.statements().delete_all(E::schema());
        self.begin().await?;
        self.engine.backend_mut().execute(&statement).await
    }

    /// Delete one record by key. Durable once the session commits.
    pub async fn delete<E: Entity>(&mut self, key: impl Into<Scalar>) -> Result<bool> {
        let statement = self
            .engine
            .statements()
            .delete_by_key(E::schema(), &key.into())?;
        self.begin().await?;
        Ok(self.engine.backend_mut().execute(&statement).await? > 0)
    }

    /// End the session, rolling back anything not committed.
    pub async fn close(mut self) -> Result<()> {
        let open = self.state == SessionState::InTransaction;
        self.state = SessionState::Closed;
        if open {
            self.engine.backend_mut().batch("ROLLBACK").await?;
        }
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.state == SessionState::InTransaction {
            self.engine.mark_abandoned_transaction();
        }
    }
}

fn key_column(schema: &EntitySchema) -> Result<&'static str> {
    schema
        .primary_key()
        .map(|column| column.name)
        .ok_or_else(|| DocError::Config(format!("Table '{}' has no key column", schema.table())))
}

fn generates_key(schema: &EntitySchema) -> bool {
    schema
        .primary_key()
        .is_some_and(|column| column.kind == ColumnKind::AutoKey)
}
