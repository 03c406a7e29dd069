use crate::calc::{self, Aggregate, Granularity};
use crate::error::AttendanceError;
use crate::export::{self, Table};
use crate::ipc::helpers::{optional_str, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::EntryFilter;
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use super::summary::{load_class_summary, load_filtered};

fn export_err(e: AttendanceError, path: Option<&str>) -> HandlerErr {
    HandlerErr {
        code: e.code(),
        message: e.to_string(),
        details: path.map(|p| json!({ "path": p })),
    }
}

/// Writes the table to `outPath` when given, otherwise returns the CSV text.
fn deliver(
    params: &serde_json::Value,
    table: &Table,
    suggested_name: Option<String>,
) -> Result<serde_json::Value, HandlerErr> {
    match optional_str(params, "outPath") {
        Some(out_path) => {
            let rows = export::write_csv(table, &PathBuf::from(&out_path))
                .map_err(|e| export_err(e, Some(&out_path)))?;
            info!(path = %out_path, rows, "csv exported");
            Ok(json!({
                "noData": false,
                "rowsExported": rows,
                "path": out_path,
                "suggestedFileName": suggested_name
            }))
        }
        None => {
            let bytes = export::to_csv_bytes(table).map_err(|e| export_err(e, None))?;
            let csv = String::from_utf8(bytes).map_err(|e| HandlerErr {
                code: "export_failed",
                message: e.to_string(),
                details: None,
            })?;
            Ok(json!({
                "noData": false,
                "rowsExported": table.rows.len(),
                "csv": csv,
                "suggestedFileName": suggested_name
            }))
        }
    }
}

fn no_data() -> serde_json::Value {
    json!({ "noData": true, "rowsExported": 0 })
}

fn export_summary_csv(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    match load_class_summary(conn, params)? {
        Aggregate::NoData => Ok(no_data()),
        Aggregate::Computed(summary) => {
            let name = format!(
                "{}_出席集計_{}_{}.csv",
                summary.window.class_id,
                calc::date_text(summary.window.date_from),
                calc::date_text(summary.window.date_to)
            );
            deliver(params, &export::student_summary_table(&summary), Some(name))
        }
    }
}

fn export_entries_csv(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter = EntryFilter::from_params(params)?;
    let entries = load_filtered(conn, params)?;
    if entries.is_empty() {
        return Ok(no_data());
    }
    let name = match (&filter.class_id, filter.date_from.or(filter.date_to)) {
        (Some(class_id), Some(date)) => Some(export::register_file_name(class_id, date)),
        _ => None,
    };
    deliver(params, &export::entries_table(&entries), name)
}

fn export_buckets_csv(
    conn: &Connection,
    params: &serde_json::Value,
    granularity: Granularity,
) -> Result<serde_json::Value, HandlerErr> {
    let entries = load_filtered(conn, params)?;
    let label = match granularity {
        Granularity::Week => "週",
        Granularity::Month => "月",
    };
    match calc::count_by_period(&entries, granularity) {
        Aggregate::NoData => Ok(no_data()),
        Aggregate::Computed(rows) => deliver(params, &export::bucket_table(label, &rows), None),
    }
}

fn export_counts_csv(
    conn: &Connection,
    params: &serde_json::Value,
    by_teacher: bool,
) -> Result<serde_json::Value, HandlerErr> {
    let entries = load_filtered(conn, params)?;
    let (agg, column) = if by_teacher {
        (calc::count_by_teacher(&entries), "教師")
    } else {
        (calc::count_by_subject(&entries), "教科")
    };
    match agg {
        Aggregate::NoData => Ok(no_data()),
        Aggregate::Computed(rows) => deliver(params, &export::count_table(column, &rows), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.summaryCsv" => Some(with_db(state, req, export_summary_csv)),
        "export.entriesCsv" => Some(with_db(state, req, export_entries_csv)),
        "export.weeklyCsv" => Some(with_db(state, req, |c, p| {
            export_buckets_csv(c, p, Granularity::Week)
        })),
        "export.monthlyCsv" => Some(with_db(state, req, |c, p| {
            export_buckets_csv(c, p, Granularity::Month)
        })),
        "export.teacherCsv" => Some(with_db(state, req, |c, p| export_counts_csv(c, p, true))),
        "export.subjectCsv" => Some(with_db(state, req, |c, p| export_counts_csv(c, p, false))),
        _ => None,
    }
}
