use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn entry(date: &str, period: u32, student: &str, status: &str) -> serde_json::Value {
    json!({
        "classId": "2年B組",
        "date": date,
        "period": period,
        "subject": if period == 1 { "数学" } else { "英語" },
        "teacher": if period == 1 { "佐藤" } else { "鈴木" },
        "student": student,
        "status": status
    })
}

fn open_register(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class = request_ok(
        stdin,
        reader,
        "roster",
        "roster.setClass",
        json!({
            "grade": "2年",
            "section": "B組",
            "students": [
                { "seq": 1, "name": "田中" },
                { "seq": 2, "name": "高橋" }
            ]
        }),
    );
    assert_eq!(class.get("classId").and_then(|v| v.as_str()), Some("2年B組"));
    let _ = request_ok(
        stdin,
        reader,
        "append",
        "attendance.append",
        json!({ "entries": [
            entry("2024-05-01", 1, "田中", "present"),
            entry("2024-05-01", 2, "田中", "late"),
            entry("2024-05-02", 1, "田中", "present"),
            entry("2024-05-02", 1, "高橋", "sick")
        ]}),
    );
}

#[test]
fn two_day_register_summarizes_per_student() {
    let workspace = temp_dir("attendance-summary-scenario");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_register(&mut stdin, &mut reader, &workspace);

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "summary.students",
        json!({ "classId": "2年B組", "dateFrom": "2024-05-01", "dateTo": "2024-05-02" }),
    );
    assert_eq!(summary.get("noData").and_then(|v| v.as_bool()), Some(false));
    let students = summary
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students");
    assert_eq!(students.len(), 2);

    let tanaka = &students[0];
    assert_eq!(tanaka["student"], "田中");
    assert_eq!(tanaka["seq"], 1);
    assert_eq!(tanaka["totalDays"], 2);
    assert_eq!(tanaka["presentDays"], 1);
    assert_eq!(tanaka["counts"]["late"], 1);
    assert_eq!(tanaka["counts"]["present"], 1);
    assert_eq!(tanaka["attendanceRate"].as_f64(), Some(50.0));

    let takahashi = &students[1];
    assert_eq!(takahashi["student"], "高橋");
    assert_eq!(takahashi["totalDays"], 1);
    assert_eq!(takahashi["counts"]["sick"], 1);
    assert_eq!(takahashi["attendanceRate"].as_f64(), Some(0.0));

    assert_eq!(summary["totals"]["studentDays"], 3);
    assert_eq!(summary["totals"]["attendanceRate"].as_f64(), Some(33.3));

    let daily = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "summary.studentDaily",
        json!({ "classId": "2年B組", "student": "田中" }),
    );
    let statuses: Vec<_> = daily["days"]
        .as_array()
        .expect("days")
        .iter()
        .map(|d| d["status"].as_str().unwrap_or("").to_string())
        .collect();
    assert_eq!(statuses, vec!["late", "present"]);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn empty_range_reports_no_data() {
    let workspace = temp_dir("attendance-summary-nodata");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_register(&mut stdin, &mut reader, &workspace);

    for (i, method) in [
        "summary.students",
        "summary.byTeacher",
        "summary.bySubject",
        "summary.weekly",
        "summary.monthly",
    ]
    .iter()
    .enumerate()
    {
        let out = request_ok(
            &mut stdin,
            &mut reader,
            &format!("nd-{}", i),
            method,
            json!({ "classId": "2年B組", "dateFrom": "2024-06-01", "dateTo": "2024-06-30" }),
        );
        assert_eq!(
            out.get("noData").and_then(|v| v.as_bool()),
            Some(true),
            "{} should report noData",
            method
        );
        assert!(out.get("students").is_none());
        assert!(out.get("rows").is_none());
    }

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn roster_students_without_entries_get_zero_rows() {
    let workspace = temp_dir("attendance-summary-roster");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_register(&mut stdin, &mut reader, &workspace);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "roster.setClass",
        json!({
            "grade": "2年",
            "section": "B組",
            "students": [
                { "seq": 5, "name": "渡辺" },
                { "seq": 1, "name": "田中" },
                { "seq": 3, "name": "伊藤" },
                { "seq": 2, "name": "高橋" },
                { "seq": 4, "name": "山本" }
            ]
        }),
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "summary.students",
        json!({ "classId": "2年B組", "dateFrom": "2024-05-01", "dateTo": "2024-05-31" }),
    );
    let rows = summary["students"].as_array().expect("students");
    let names: Vec<_> = rows.iter().map(|r| r["student"].as_str().unwrap_or("")).collect();
    assert_eq!(names, vec!["田中", "高橋", "伊藤", "山本", "渡辺"]);
    for r in &rows[2..] {
        assert_eq!(r["totalDays"], 0);
        assert_eq!(r["attendanceRate"].as_f64(), Some(0.0));
    }

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn secondary_views_count_entries_not_days() {
    let workspace = temp_dir("attendance-summary-secondary");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_register(&mut stdin, &mut reader, &workspace);

    let teachers = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "summary.byTeacher",
        json!({ "classId": "2年B組" }),
    );
    assert_eq!(
        teachers["rows"],
        json!([
            { "key": "佐藤", "count": 3 },
            { "key": "鈴木", "count": 1 }
        ])
    );

    let subjects = request_ok(&mut stdin, &mut reader, "2", "summary.bySubject", json!({}));
    assert_eq!(subjects["rows"][0], json!({ "key": "数学", "count": 3 }));

    let weekly = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "summary.weekly",
        json!({ "classId": "2年B組", "dateFrom": "2024-05-01", "dateTo": "2024-05-02" }),
    );
    assert_eq!(
        weekly["rows"],
        json!([
            { "bucket": "2024-W18", "bucketStart": "2024-04-29", "status": "present", "count": 2 },
            { "bucket": "2024-W18", "bucketStart": "2024-04-29", "status": "sick", "count": 1 },
            { "bucket": "2024-W18", "bucketStart": "2024-04-29", "status": "late", "count": 1 }
        ])
    );

    let monthly = request_ok(&mut stdin, &mut reader, "4", "summary.monthly", json!({}));
    let total: u64 = monthly["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["count"].as_u64().unwrap_or(0))
        .sum();
    assert_eq!(total, 4);
    assert_eq!(monthly["rows"][0]["bucket"], "2024-05");

    let _ = std::fs::remove_dir_all(workspace);
}
