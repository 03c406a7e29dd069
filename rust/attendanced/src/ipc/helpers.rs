use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use tracing::warn;

use crate::error::AttendanceError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{parse_date, Period};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<AttendanceError> for HandlerErr {
    fn from(e: AttendanceError) -> Self {
        let details = match &e {
            AttendanceError::InvalidEntry { index, .. } => Some(json!({ "index": index })),
            AttendanceError::Validation { field, .. } => Some(json!({ "field": field })),
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

/// For writes that run inside a transaction: database failures report
/// `db_tx_failed`, everything else keeps its usual code.
pub fn tx_err(e: AttendanceError) -> HandlerErr {
    match e {
        AttendanceError::Db(db) => HandlerErr {
            code: "db_tx_failed",
            message: db.to_string(),
            details: None,
        },
        other => other.into(),
    }
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = required_str(params, key)?;
    Ok(parse_date(&raw)?)
}

pub fn required_period(params: &serde_json::Value) -> Result<Period, HandlerErr> {
    match params.get("period") {
        Some(v) if !v.is_null() => Ok(Period::from_json(v)?),
        _ => Err(HandlerErr::bad_params("missing period")),
    }
}

/// Runs `f` against the workspace database and wraps the outcome.
pub fn with_db<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => {
            warn!(method = %req.method, code = error.code, message = %error.message, "request rejected");
            error.response(&req.id)
        }
    }
}
