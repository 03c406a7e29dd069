use crate::calc::date_text;
use crate::ipc::helpers::{required_date, required_period, required_str, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{entries_from_json, EntryFilter};
use crate::store::RecordStore;
use rusqlite::Connection;
use serde_json::json;

fn attendance_append(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(items) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    let entries = entries_from_json(items)?;
    let appended = RecordStore::new(conn).append(&entries).map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "attendance_entries" })),
    })?;
    Ok(json!({ "appended": appended }))
}

fn attendance_query(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter = EntryFilter::from_params(params)?;
    let entries = RecordStore::new(conn).query(&filter)?;
    Ok(json!({ "count": entries.len(), "entries": entries }))
}

fn attendance_exists(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = required_date(params, "date")?;
    let period = required_period(params)?;
    let exists = RecordStore::new(conn).exists(&class_id, date, period)?;
    Ok(json!({ "exists": exists }))
}

fn attendance_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = required_date(params, "date")?;
    let period = required_period(params)?;
    let removed = RecordStore::new(conn)
        .delete(&class_id, date, period)
        .map_err(|e| HandlerErr {
            code: "db_delete_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "attendance_entries" })),
        })?;
    Ok(json!({
        "removed": removed,
        "classId": class_id,
        "date": date_text(date),
        "period": period.number()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.append" => Some(with_db(state, req, attendance_append)),
        "attendance.query" => Some(with_db(state, req, attendance_query)),
        "attendance.exists" => Some(with_db(state, req, attendance_exists)),
        "attendance.delete" => Some(with_db(state, req, attendance_delete)),
        _ => None,
    }
}
