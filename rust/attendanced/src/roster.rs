use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::error::{AttendanceError, Result};
use crate::model::ClassKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStudent {
    pub seq: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterClass {
    pub class_id: String,
    pub grade: String,
    pub section: String,
    pub student_count: i64,
}

/// Which flat master list a call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterList {
    Subjects,
    Teachers,
}

impl MasterList {
    fn table(self) -> &'static str {
        match self {
            MasterList::Subjects => "roster_subjects",
            MasterList::Teachers => "roster_teachers",
        }
    }
}

/// Read-mostly class and master-data lookups for the workspace.
pub struct Roster<'a> {
    conn: &'a Connection,
}

impl<'a> Roster<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Roster { conn }
    }

    /// Replaces the student list of one class. Sequence numbers and names
    /// must be unique; names must not be blank.
    pub fn set_class(&self, key: &ClassKey, students: &[RosterStudent]) -> Result<String> {
        let mut seen_seq = HashSet::new();
        let mut seen_name = HashSet::new();
        for s in students {
            if s.name.trim().is_empty() {
                return Err(AttendanceError::validation("students", "name must not be empty"));
            }
            if !seen_seq.insert(s.seq) {
                return Err(AttendanceError::validation(
                    "students",
                    format!("duplicate seq {}", s.seq),
                ));
            }
            if !seen_name.insert(s.name.trim()) {
                return Err(AttendanceError::validation(
                    "students",
                    format!("duplicate name {}", s.name.trim()),
                ));
            }
        }

        let class_id = key.class_id();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO roster_classes(class_id, grade, section)
             VALUES(?, ?, ?)
             ON CONFLICT(class_id) DO UPDATE SET
               grade = excluded.grade,
               section = excluded.section",
            (&class_id, &key.grade, &key.section),
        )?;
        tx.execute("DELETE FROM roster_students WHERE class_id = ?", [&class_id])?;
        for s in students {
            tx.execute(
                "INSERT INTO roster_students(class_id, seq, name) VALUES(?, ?, ?)",
                (&class_id, s.seq, s.name.trim()),
            )?;
        }
        tx.commit()?;
        info!(class_id = %class_id, students = students.len(), "roster class replaced");
        Ok(class_id)
    }

    pub fn classes(&self) -> Result<Vec<RosterClass>> {
        let mut stmt = self.conn.prepare(
            "SELECT
               c.class_id,
               c.grade,
               c.section,
               (SELECT COUNT(*) FROM roster_students s WHERE s.class_id = c.class_id)
             FROM roster_classes c
             ORDER BY c.grade, c.section",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(RosterClass {
                    class_id: r.get(0)?,
                    grade: r.get(1)?,
                    section: r.get(2)?,
                    student_count: r.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Students of a class in roster order. Unknown classes yield an empty list.
    pub fn students(&self, class_id: &str) -> Result<Vec<RosterStudent>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, name FROM roster_students
             WHERE class_id = ?
             ORDER BY seq",
        )?;
        let rows = stmt
            .query_map([class_id], |r| {
                Ok(RosterStudent {
                    seq: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn has_class(&self, class_id: &str) -> Result<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM roster_classes WHERE class_id = ?",
            [class_id],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    /// Replaces a master list, dropping blanks and keeping first occurrences.
    pub fn set_list(&self, list: MasterList, names: &[String]) -> Result<usize> {
        let mut seen = HashSet::new();
        let cleaned: Vec<&str> = names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty() && seen.insert(*n))
            .collect();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&format!("DELETE FROM {}", list.table()), [])?;
        for (i, name) in cleaned.iter().enumerate() {
            tx.execute(
                &format!("INSERT INTO {}(sort_order, name) VALUES(?, ?)", list.table()),
                (i as i64, name),
            )?;
        }
        tx.commit()?;
        Ok(cleaned.len())
    }

    pub fn list(&self, list: MasterList) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT name FROM {} ORDER BY sort_order", list.table()))?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
