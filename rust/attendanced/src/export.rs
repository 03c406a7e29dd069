//! Tabular views of aggregates and their CSV rendering.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;

use crate::calc::{date_text, BucketRow, ClassSummary, CountRow};
use crate::error::{AttendanceError, Result};
use crate::model::AttendanceEntry;
use crate::status::ALL_STATUSES;

/// Named columns plus string rows, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }
}

/// One row per roster student: seq, name, day totals, one column per status
/// symbol, rate.
pub fn student_summary_table(summary: &ClassSummary) -> Table {
    let mut columns: Vec<String> = vec![
        "番号".into(),
        "生徒名".into(),
        "記録日数".into(),
        "出席日数".into(),
    ];
    columns.extend(ALL_STATUSES.iter().map(|s| s.symbol().to_string()));
    columns.push("出席率".into());

    let mut table = Table::with_columns(columns);
    for s in &summary.students {
        let mut row = vec![
            s.seq.to_string(),
            s.student.clone(),
            s.total_days.to_string(),
            s.present_days.to_string(),
        ];
        row.extend(
            ALL_STATUSES
                .iter()
                .map(|st| s.counts.get(st).copied().unwrap_or(0).to_string()),
        );
        row.push(format!("{:.1}", s.attendance_rate));
        table.rows.push(row);
    }
    table
}

pub fn count_table(key_column: &str, rows: &[CountRow]) -> Table {
    let mut table = Table::with_columns([key_column, "件数"]);
    for r in rows {
        table.rows.push(vec![r.key.clone(), r.count.to_string()]);
    }
    table
}

pub fn bucket_table(bucket_column: &str, rows: &[BucketRow]) -> Table {
    let mut table = Table::with_columns([bucket_column, "開始日", "出席状況", "件数"]);
    for r in rows {
        table.rows.push(vec![
            r.bucket.clone(),
            date_text(r.bucket_start),
            r.status.symbol().to_string(),
            r.count.to_string(),
        ]);
    }
    table
}

/// Raw register rows in the seven-column storage shape.
pub fn entries_table(entries: &[AttendanceEntry]) -> Table {
    let mut table =
        Table::with_columns(["クラス", "日付", "時限", "教科", "教師", "生徒名", "出席状況"]);
    for e in entries {
        table.rows.push(vec![
            e.class_id.clone(),
            date_text(e.date),
            e.period.to_string(),
            e.subject.clone(),
            e.teacher.clone(),
            e.student.clone(),
            e.status.symbol().to_string(),
        ]);
    }
    table
}

/// UTF-8 CSV with a header row; row order is preserved.
pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| AttendanceError::Io(e.into_error()))
}

pub fn write_csv(table: &Table, out: &Path) -> Result<usize> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let bytes = to_csv_bytes(table)?;
    std::fs::write(out, bytes)?;
    Ok(table.rows.len())
}

/// `{class}_出席簿_{date}.csv`, the register's download name.
pub fn register_file_name(class_id: &str, date: NaiveDate) -> String {
    format!("{}_出席簿_{}.csv", class_id, date_text(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{summarize, SummaryWindow};
    use crate::model::Period;
    use crate::roster::RosterStudent;
    use crate::status::AttendanceStatus;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    fn entry(student: &str, status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            class_id: "1年A組".into(),
            date: d("2024-06-03"),
            period: Period::new(1).expect("period"),
            subject: "国語".into(),
            teacher: "山本, 一郎".into(),
            student: student.into(),
            status,
        }
    }

    #[test]
    fn summary_table_keeps_roster_order() {
        let roster = vec![
            RosterStudent { seq: 2, name: "b".into() },
            RosterStudent { seq: 1, name: "a".into() },
        ];
        let window = SummaryWindow {
            class_id: "1年A組".into(),
            date_from: d("2024-06-01"),
            date_to: d("2024-06-30"),
        };
        let summary = summarize(&window, &roster, &[entry("b", AttendanceStatus::Present)])
            .computed()
            .expect("computed");
        let table = student_summary_table(&summary);
        assert_eq!(table.columns.len(), 4 + ALL_STATUSES.len() + 1);
        assert_eq!(table.rows[0][1], "a");
        assert_eq!(table.rows[1][1], "b");
        assert_eq!(table.rows[1].last().map(String::as_str), Some("100.0"));
        assert_eq!(table.rows[0].last().map(String::as_str), Some("0.0"));
    }

    #[test]
    fn csv_has_header_and_quotes_commas() {
        let table = entries_table(&[entry("田中", AttendanceStatus::Sick)]);
        let text = String::from_utf8(to_csv_bytes(&table).expect("csv")).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("クラス,日付,時限,教科,教師,生徒名,出席状況")
        );
        assert_eq!(
            lines.next(),
            Some("1年A組,2024-06-03,1限,国語,\"山本, 一郎\",田中,病")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn write_csv_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("attendanced-export-{}", uuid::Uuid::new_v4()));
        let out = dir.join("nested").join("out.csv");
        let rows = write_csv(&count_table("教師", &[CountRow { key: "佐藤".into(), count: 3 }]), &out)
            .expect("write");
        assert_eq!(rows, 1);
        let text = std::fs::read_to_string(&out).expect("read");
        assert_eq!(text, "教師,件数\n佐藤,3\n");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn register_file_name_matches_download_convention() {
        assert_eq!(
            register_file_name("2年B組", d("2024-05-01")),
            "2年B組_出席簿_2024-05-01.csv"
        );
    }
}
