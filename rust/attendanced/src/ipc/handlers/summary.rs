use crate::calc::{self, Aggregate, ClassSummary, Granularity, SummaryWindow};
use crate::ipc::helpers::{optional_str, required_date, required_str, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{parse_date, AttendanceEntry, EntryFilter};
use crate::roster::Roster;
use crate::store::RecordStore;
use rusqlite::Connection;
use serde_json::json;

const NO_DATA: &str = "noData";

fn window_from_params(params: &serde_json::Value) -> Result<SummaryWindow, HandlerErr> {
    Ok(SummaryWindow {
        class_id: required_str(params, "classId")?,
        date_from: required_date(params, "dateFrom")?,
        date_to: required_date(params, "dateTo")?,
    })
}

/// Fresh per-student roll-up for the requested class and range.
pub fn load_class_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<Aggregate<ClassSummary>, HandlerErr> {
    let window = window_from_params(params)?;
    let filter = EntryFilter::for_class(&window.class_id, window.date_from, window.date_to);
    let entries = RecordStore::new(conn).query(&filter)?;
    let roster = Roster::new(conn).students(&window.class_id)?;
    Ok(calc::summarize(&window, &roster, &entries))
}

/// Entries for the entry-level views; every filter is optional.
pub fn load_filtered(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<Vec<AttendanceEntry>, HandlerErr> {
    let filter = EntryFilter::from_params(params)?;
    Ok(RecordStore::new(conn).query(&filter)?)
}

/// `{"noData": true}` or the serialized value with `"noData": false` merged in.
pub fn aggregate_json<T>(
    agg: Aggregate<T>,
    wrap: impl FnOnce(T) -> serde_json::Value,
) -> serde_json::Value {
    match agg {
        Aggregate::NoData => json!({ NO_DATA: true }),
        Aggregate::Computed(v) => {
            let mut out = wrap(v);
            if let Some(obj) = out.as_object_mut() {
                obj.insert(NO_DATA.to_string(), json!(false));
            }
            out
        }
    }
}

fn summary_students(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let agg = load_class_summary(conn, params)?;
    Ok(aggregate_json(agg, |s| json!(s)))
}

fn summary_student_daily(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let student = required_str(params, "student")?;
    let date_from = optional_str(params, "dateFrom")
        .map(|s| parse_date(&s))
        .transpose()?;
    let date_to = optional_str(params, "dateTo")
        .map(|s| parse_date(&s))
        .transpose()?;
    let entries = RecordStore::new(conn).query(&EntryFilter {
        class_id: Some(class_id),
        date_from,
        date_to,
        student: Some(student.clone()),
    })?;
    let agg = calc::student_daily(&entries, &student);
    Ok(aggregate_json(agg, |days| {
        json!({ "student": student, "days": days })
    }))
}

fn summary_by_teacher(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let entries = load_filtered(conn, params)?;
    Ok(aggregate_json(calc::count_by_teacher(&entries), |rows| {
        json!({ "rows": rows })
    }))
}

fn summary_by_subject(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let entries = load_filtered(conn, params)?;
    Ok(aggregate_json(calc::count_by_subject(&entries), |rows| {
        json!({ "rows": rows })
    }))
}

fn summary_buckets(
    conn: &Connection,
    params: &serde_json::Value,
    granularity: Granularity,
) -> Result<serde_json::Value, HandlerErr> {
    let entries = load_filtered(conn, params)?;
    Ok(aggregate_json(
        calc::count_by_period(&entries, granularity),
        |rows| json!({ "rows": rows }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "summary.students" => Some(with_db(state, req, summary_students)),
        "summary.studentDaily" => Some(with_db(state, req, summary_student_daily)),
        "summary.byTeacher" => Some(with_db(state, req, summary_by_teacher)),
        "summary.bySubject" => Some(with_db(state, req, summary_by_subject)),
        "summary.weekly" => Some(with_db(state, req, |c, p| {
            summary_buckets(c, p, Granularity::Week)
        })),
        "summary.monthly" => Some(with_db(state, req, |c, p| {
            summary_buckets(c, p, Granularity::Month)
        })),
        _ => None,
    }
}
