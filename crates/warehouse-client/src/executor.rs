//! The two narrow seams through which the warehouse talks to its store: a
//! read-only query executor and a transactional write executor.
//!
//! Both are implemented for [`rusqlite::Connection`] and for the transaction
//! handles it hands out. Beginning a transaction on an open
//! [`Transaction`] (or [`Savepoint`]) opens a nested savepoint, so code written
//! against [`TransactionalExecutor`] works the same whether it owns the
//! transaction or runs inside one supplied by its caller.

use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, Connection, DropBehavior, Savepoint, Transaction};
use tracing::debug;
use warehouse_core::{parsers::parse_timestamp, Id};

use crate::{WarehouseError, WarehouseResult};

/// A single bound parameter or result cell.
pub type SqlValue = rusqlite::types::Value;

/// One result row, in select-list order.
pub type SqlRow = Vec<SqlValue>;

/// What a single write statement produced.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// An `INSERT` and the identifier the store generated for the new row.
    Inserted(Id),
    /// Any other statement and the number of rows it touched.
    Affected(usize),
}
impl WriteOutcome {
    /// The generated identifier, if the statement was an insert.
    pub fn generated_id(&self) -> Option<Id> {
        match self {
            Self::Inserted(id) => Some(*id),
            Self::Affected(_) => None,
        }
    }
}

/// Read-only access returning the full result set.
pub trait QueryExecutor {
    /// Runs `sql` with positional `params` and collects every row.
    fn execute_query(&self, sql: &str, params: &[SqlValue]) -> WarehouseResult<Vec<SqlRow>>;
}

/// Single-statement writes.
pub trait WriteExecutor {
    /// Runs one statement, returning the generated id for inserts and the
    /// affected row count otherwise.
    fn execute_write(&self, sql: &str, params: &[SqlValue]) -> WarehouseResult<WriteOutcome>;
}

/// Scoped transaction control.
pub trait TransactionalExecutor {
    /// Open transaction (or savepoint) handle.
    type Handle<'a>: QueryExecutor + WriteExecutor
    where
        Self: 'a;

    /// True when committing a handle only releases a savepoint and the final
    /// commit belongs to an enclosing transaction.
    const NESTED: bool;

    /// Opens a new transaction scope.
    fn begin_transaction(&mut self) -> WarehouseResult<Self::Handle<'_>>;

    /// Makes every statement run through `handle` durable (or, when nested,
    /// folds them into the enclosing transaction).
    fn commit<'a>(handle: Self::Handle<'a>) -> WarehouseResult<()>
    where
        Self: 'a;

    /// Discards every statement run through `handle`.
    fn rollback<'a>(handle: Self::Handle<'a>) -> WarehouseResult<()>
    where
        Self: 'a;
}

fn query_rows(connection: &Connection, sql: &str, params: &[SqlValue]) -> WarehouseResult<Vec<SqlRow>> {
    debug!(sql, params = params.len(), "executing query");
    let mut stmt = connection.prepare_cached(sql)?;
    let n_columns = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(n_columns);
        for index in 0..n_columns {
            values.push(row.get::<_, SqlValue>(index)?);
        }
        out.push(values);
    }
    Ok(out)
}

fn execute_statement(
    connection: &Connection,
    sql: &str,
    params: &[SqlValue],
) -> WarehouseResult<WriteOutcome> {
    debug!(sql, params = params.len(), "executing write");
    let affected = connection
        .prepare_cached(sql)?
        .execute(params_from_iter(params.iter()))?;
    let is_insert = sql
        .trim_start()
        .get(..6)
        .is_some_and(|keyword| keyword.eq_ignore_ascii_case("insert"));
    if is_insert {
        Ok(WriteOutcome::Inserted(connection.last_insert_rowid()))
    } else {
        Ok(WriteOutcome::Affected(affected))
    }
}

impl QueryExecutor for Connection {
    fn execute_query(&self, sql: &str, params: &[SqlValue]) -> WarehouseResult<Vec<SqlRow>> {
        query_rows(self, sql, params)
    }
}
impl WriteExecutor for Connection {
    fn execute_write(&self, sql: &str, params: &[SqlValue]) -> WarehouseResult<WriteOutcome> {
        execute_statement(self, sql, params)
    }
}
impl QueryExecutor for Transaction<'_> {
    fn execute_query(&self, sql: &str, params: &[SqlValue]) -> WarehouseResult<Vec<SqlRow>> {
        query_rows(self, sql, params)
    }
}
impl WriteExecutor for Transaction<'_> {
    fn execute_write(&self, sql: &str, params: &[SqlValue]) -> WarehouseResult<WriteOutcome> {
        execute_statement(self, sql, params)
    }
}
impl QueryExecutor for Savepoint<'_> {
    fn execute_query(&self, sql: &str, params: &[SqlValue]) -> WarehouseResult<Vec<SqlRow>> {
        query_rows(self, sql, params)
    }
}
impl WriteExecutor for Savepoint<'_> {
    fn execute_write(&self, sql: &str, params: &[SqlValue]) -> WarehouseResult<WriteOutcome> {
        execute_statement(self, sql, params)
    }
}

impl TransactionalExecutor for Connection {
    type Handle<'a> = Transaction<'a>;
    const NESTED: bool = false;

    fn begin_transaction(&mut self) -> WarehouseResult<Transaction<'_>> {
        Ok(self.transaction()?)
    }
    fn commit<'a>(handle: Transaction<'a>) -> WarehouseResult<()>
    where
        Self: 'a,
    {
        Ok(handle.commit()?)
    }
    fn rollback<'a>(handle: Transaction<'a>) -> WarehouseResult<()>
    where
        Self: 'a,
    {
        Ok(handle.rollback()?)
    }
}

impl<'c> TransactionalExecutor for Transaction<'c> {
    type Handle<'a>
        = Savepoint<'a>
    where
        Self: 'a;
    const NESTED: bool = true;

    fn begin_transaction(&mut self) -> WarehouseResult<Savepoint<'_>> {
        Ok(self.savepoint()?)
    }
    fn commit<'a>(handle: Savepoint<'a>) -> WarehouseResult<()>
    where
        Self: 'a,
    {
        Ok(handle.commit()?)
    }
    fn rollback<'a>(handle: Savepoint<'a>) -> WarehouseResult<()>
    where
        Self: 'a,
    {
        finish_rolled_back(handle)
    }
}

impl<'c> TransactionalExecutor for Savepoint<'c> {
    type Handle<'a>
        = Savepoint<'a>
    where
        Self: 'a;
    const NESTED: bool = true;

    fn begin_transaction(&mut self) -> WarehouseResult<Savepoint<'_>> {
        Ok(self.savepoint()?)
    }
    fn commit<'a>(handle: Savepoint<'a>) -> WarehouseResult<()>
    where
        Self: 'a,
    {
        Ok(handle.commit()?)
    }
    fn rollback<'a>(handle: Savepoint<'a>) -> WarehouseResult<()>
    where
        Self: 'a,
    {
        finish_rolled_back(handle)
    }
}

// ROLLBACK TO keeps a savepoint open; finishing with the rollback behaviour
// rolls back and releases it.
fn finish_rolled_back(mut handle: Savepoint<'_>) -> WarehouseResult<()> {
    handle.set_drop_behavior(DropBehavior::Rollback);
    Ok(handle.finish()?)
}

/// Bind helper for nullable identifiers.
pub(crate) fn opt_id(value: Option<Id>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::Integer)
}

pub(crate) fn get_id(row: &SqlRow, index: usize, column: &'static str) -> WarehouseResult<Id> {
    match row.get(index) {
        Some(SqlValue::Integer(value)) => Ok(*value),
        _ => Err(WarehouseError::UnexpectedValue { column }),
    }
}

pub(crate) fn get_opt_id(
    row: &SqlRow,
    index: usize,
    column: &'static str,
) -> WarehouseResult<Option<Id>> {
    match row.get(index) {
        Some(SqlValue::Integer(value)) => Ok(Some(*value)),
        Some(SqlValue::Null) => Ok(None),
        _ => Err(WarehouseError::UnexpectedValue { column }),
    }
}

pub(crate) fn get_opt_real(
    row: &SqlRow,
    index: usize,
    column: &'static str,
) -> WarehouseResult<Option<f64>> {
    match row.get(index) {
        Some(SqlValue::Real(value)) => Ok(Some(*value)),
        #[allow(clippy::cast_precision_loss)]
        Some(SqlValue::Integer(value)) => Ok(Some(*value as f64)),
        Some(SqlValue::Null) => Ok(None),
        _ => Err(WarehouseError::UnexpectedValue { column }),
    }
}

pub(crate) fn get_opt_text(
    row: &SqlRow,
    index: usize,
    column: &'static str,
) -> WarehouseResult<Option<String>> {
    match row.get(index) {
        Some(SqlValue::Text(value)) => Ok(Some(value.clone())),
        Some(SqlValue::Null) => Ok(None),
        _ => Err(WarehouseError::UnexpectedValue { column }),
    }
}

pub(crate) fn get_text(row: &SqlRow, index: usize, column: &'static str) -> WarehouseResult<String> {
    get_opt_text(row, index, column)?.ok_or(WarehouseError::UnexpectedValue { column })
}

pub(crate) fn get_time(
    row: &SqlRow,
    index: usize,
    column: &'static str,
) -> WarehouseResult<DateTime<Utc>> {
    Ok(parse_timestamp(&get_text(row, index, column)?)?)
}
