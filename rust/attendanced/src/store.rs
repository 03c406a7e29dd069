//! Append-only attendance record store backed by the workspace database.

use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AttendanceError, Result};
use crate::model::{AttendanceEntry, EntryFilter, Period, DATE_FORMAT};
use crate::status::AttendanceStatus;

/// Borrowed view over the entry table. Construct one per request from the
/// connection held in the process state.
pub struct RecordStore<'a> {
    conn: &'a Connection,
}

fn conversion_err(idx: usize, e: AttendanceError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn row_to_entry(r: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceEntry> {
    let date_raw: String = r.get(1)?;
    let date = NaiveDate::parse_from_str(&date_raw, DATE_FORMAT)
        .map_err(|_| conversion_err(1, AttendanceError::BadDate(date_raw.clone())))?;
    let period_raw: i64 = r.get(2)?;
    let period = u8::try_from(period_raw)
        .map_err(|_| AttendanceError::BadPeriod(period_raw.to_string()))
        .and_then(Period::new)
        .map_err(|e| conversion_err(2, e))?;
    let status_raw: String = r.get(6)?;
    let status = AttendanceStatus::parse(&status_raw).map_err(|e| conversion_err(6, e))?;
    Ok(AttendanceEntry {
        class_id: r.get(0)?,
        date,
        period,
        subject: r.get(3)?,
        teacher: r.get(4)?,
        student: r.get(5)?,
        status,
    })
}

impl<'a> RecordStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        RecordStore { conn }
    }

    /// Writes all entries in one transaction. Duplicates are accepted.
    pub fn append(&self, entries: &[AttendanceEntry]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO attendance_entries(id, class_id, date, period, subject, teacher, student, status)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for e in entries {
                stmt.execute((
                    Uuid::new_v4().to_string(),
                    &e.class_id,
                    e.date.format(DATE_FORMAT).to_string(),
                    i64::from(e.period.number()),
                    &e.subject,
                    &e.teacher,
                    &e.student,
                    e.status.key(),
                ))?;
            }
        }
        tx.commit()?;
        debug!(count = entries.len(), "appended attendance entries");
        Ok(entries.len())
    }

    /// Entries matching every given filter, in insertion order.
    pub fn query(&self, filter: &EntryFilter) -> Result<Vec<AttendanceEntry>> {
        if filter.is_inverted() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            "SELECT class_id, date, period, subject, teacher, student, status
             FROM attendance_entries
             WHERE 1 = 1",
        );
        let mut bind: Vec<Value> = Vec::new();
        if let Some(class_id) = &filter.class_id {
            sql.push_str(" AND class_id = ?");
            bind.push(Value::Text(class_id.clone()));
        }
        if let Some(from) = filter.date_from {
            sql.push_str(" AND date >= ?");
            bind.push(Value::Text(from.format(DATE_FORMAT).to_string()));
        }
        if let Some(to) = filter.date_to {
            sql.push_str(" AND date <= ?");
            bind.push(Value::Text(to.format(DATE_FORMAT).to_string()));
        }
        if let Some(student) = &filter.student {
            sql.push_str(" AND student = ?");
            bind.push(Value::Text(student.clone()));
        }
        sql.push_str(" ORDER BY seq");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind), row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Advisory check before a class/date/period is submitted again.
    pub fn exists(&self, class_id: &str, date: NaiveDate, period: Period) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM attendance_entries
                 WHERE class_id = ? AND date = ? AND period = ?
                 LIMIT 1",
                (
                    class_id,
                    date.format(DATE_FORMAT).to_string(),
                    i64::from(period.number()),
                ),
                |r| r.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Removes every entry for the key. Returns 0 when nothing matched.
    pub fn delete(&self, class_id: &str, date: NaiveDate, period: Period) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM attendance_entries
             WHERE class_id = ? AND date = ? AND period = ?",
            (
                class_id,
                date.format(DATE_FORMAT).to_string(),
                i64::from(period.number()),
            ),
        )?;
        debug!(class_id, %date, %period, removed, "deleted attendance entries");
        Ok(removed)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM attendance_entries", [], |r| r.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}
