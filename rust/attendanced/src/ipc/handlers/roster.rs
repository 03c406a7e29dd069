use crate::ipc::helpers::{required_str, tx_err, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::ClassKey;
use crate::roster::{MasterList, Roster, RosterStudent};
use rusqlite::Connection;
use serde_json::json;

fn parse_students(params: &serde_json::Value) -> Result<Vec<RosterStudent>, HandlerErr> {
    let Some(items) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing students"));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let name = v
                .get("name")
                .and_then(|n| n.as_str())
                .map(|n| n.trim().to_string())
                .unwrap_or_default();
            // Without an explicit seq, list position (1-based) is the roster number.
            let seq = match v.get("seq") {
                None | Some(serde_json::Value::Null) => i as i64 + 1,
                Some(raw) => raw.as_i64().ok_or_else(|| HandlerErr {
                    code: "bad_params",
                    message: format!("seq must be an integer, got {}", raw),
                    details: Some(json!({ "index": i })),
                })?,
            };
            Ok(RosterStudent { seq, name })
        })
        .collect()
}

fn parse_names(params: &serde_json::Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    let Some(items) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    Ok(items
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect())
}

fn roster_set_class(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grade = required_str(params, "grade")?;
    let section = required_str(params, "section")?;
    let key = ClassKey::new(&grade, &section)?;
    let students = parse_students(params)?;
    let class_id = Roster::new(conn)
        .set_class(&key, &students)
        .map_err(tx_err)?;
    Ok(json!({ "classId": class_id, "studentCount": students.len() }))
}

fn roster_classes(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classes = Roster::new(conn).classes()?;
    Ok(json!({ "classes": classes }))
}

fn roster_students(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let roster = Roster::new(conn);
    if !roster.has_class(&class_id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "class not found".to_string(),
            details: Some(json!({ "classId": class_id })),
        });
    }
    let students = roster.students(&class_id)?;
    Ok(json!({ "classId": class_id, "students": students }))
}

fn roster_set_list(
    conn: &Connection,
    params: &serde_json::Value,
    list: MasterList,
    key: &str,
) -> Result<serde_json::Value, HandlerErr> {
    let names = parse_names(params, key)?;
    let stored = Roster::new(conn).set_list(list, &names).map_err(tx_err)?;
    Ok(json!({ "count": stored }))
}

fn roster_list(conn: &Connection, list: MasterList, key: &str) -> Result<serde_json::Value, HandlerErr> {
    let names = Roster::new(conn).list(list)?;
    Ok(json!({ key: names }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.setClass" => Some(with_db(state, req, roster_set_class)),
        "roster.classes" => Some(with_db(state, req, roster_classes)),
        "roster.students" => Some(with_db(state, req, roster_students)),
        "roster.setSubjects" => Some(with_db(state, req, |c, p| {
            roster_set_list(c, p, MasterList::Subjects, "subjects")
        })),
        "roster.subjects" => Some(with_db(state, req, |c, _| {
            roster_list(c, MasterList::Subjects, "subjects")
        })),
        "roster.setTeachers" => Some(with_db(state, req, |c, p| {
            roster_set_list(c, p, MasterList::Teachers, "teachers")
        })),
        "roster.teachers" => Some(with_db(state, req, |c, _| {
            roster_list(c, MasterList::Teachers, "teachers")
        })),
        _ => None,
    }
}
