use std::convert::TryFrom;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{types::FromSql, Connection, Row, Transaction, TransactionBehavior};

use crate::error::StoreError;

pub fn column<T: FromSql>(row: &Row<'_>, name: &str) -> Result<T, StoreError> {
    row.get(name)
        .map_err(|err| StoreError::read(format!("column {name}: {err}")))
}

/// Opens a write transaction that takes the write lock up front.
///
/// Both collection workers share one WAL file. A deferred transaction that
/// reads before writing cannot upgrade once the other worker has committed,
/// and fails with SQLITE_BUSY without waiting on `busy_timeout`.
pub fn write_transaction(conn: &mut Connection) -> Result<Transaction<'_>, StoreError> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(StoreError::write)
}

/// SQLite LIMIT takes an i64; anything larger is effectively unbounded.
pub fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

pub fn to_i64(value: u64, field: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| {
        StoreError::InvalidRecord(format!("{field} value {value} exceeds SQLite INTEGER range"))
    })
}

pub fn to_u64(value: i64, field: &str) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::read(format!("{field} contains negative value {value}")))
}

/// Truncates to the precision that survives a round trip through the database.
pub fn capture_time(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so that `ORDER BY timestamp` sorts chronologically.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::read(format!("failed to parse {field} '{value}': {err}")))
}
