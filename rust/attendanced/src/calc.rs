use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::model::{AttendanceEntry, DATE_FORMAT};
use crate::roster::RosterStudent;
use crate::status::{AttendanceStatus, ALL_STATUSES, DAILY_ABSENCE_PRECEDENCE};

/// 1-decimal rounding used for every displayed rate: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Outcome of an aggregation. `NoData` means the filtered entry set was
/// empty, which callers show differently from a table of zeros.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate<T> {
    NoData,
    Computed(T),
}

impl<T> Aggregate<T> {
    pub fn is_no_data(&self) -> bool {
        matches!(self, Aggregate::NoData)
    }

    pub fn computed(self) -> Option<T> {
        match self {
            Aggregate::NoData => None,
            Aggregate::Computed(v) => Some(v),
        }
    }
}

pub type StatusCounts = BTreeMap<AttendanceStatus, usize>;

fn zero_counts() -> StatusCounts {
    ALL_STATUSES.iter().map(|s| (*s, 0)).collect()
}

fn rate_percent(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_off_1_decimal(100.0 * present as f64 / total as f64)
}

/// Collapses one student's marks for one day into a single status.
///
/// Present needs every period to be present. Otherwise late wins, then the
/// first reason found in [`DAILY_ABSENCE_PRECEDENCE`]. A day matching none of
/// those (only early-leave among present marks, or no marks) is recorded as
/// an unspecified absence.
pub fn reconcile_day(statuses: &[AttendanceStatus]) -> AttendanceStatus {
    if statuses.is_empty() {
        return AttendanceStatus::Absent;
    }
    if statuses.iter().all(|s| *s == AttendanceStatus::Present) {
        return AttendanceStatus::Present;
    }
    if statuses.contains(&AttendanceStatus::Late) {
        return AttendanceStatus::Late;
    }
    for candidate in DAILY_ABSENCE_PRECEDENCE {
        if statuses.contains(&candidate) {
            return candidate;
        }
    }
    AttendanceStatus::Absent
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatus {
    pub student: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marks: usize,
}

/// One resolved status per (student, date), ordered by student then date.
/// Duplicate entries for the same period count as extra marks for the day.
pub fn reconcile(entries: &[AttendanceEntry]) -> Vec<DailyStatus> {
    let mut buckets: BTreeMap<(&str, NaiveDate), Vec<AttendanceStatus>> = BTreeMap::new();
    for e in entries {
        buckets
            .entry((e.student.as_str(), e.date))
            .or_default()
            .push(e.status);
    }
    buckets
        .into_iter()
        .map(|((student, date), statuses)| DailyStatus {
            student: student.to_string(),
            date,
            status: reconcile_day(&statuses),
            marks: statuses.len(),
        })
        .collect()
}

/// Class and inclusive date range an aggregation is computed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryWindow {
    pub class_id: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl SummaryWindow {
    pub fn contains(&self, e: &AttendanceEntry) -> bool {
        e.class_id == self.class_id && e.date >= self.date_from && e.date <= self.date_to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub seq: i64,
    pub student: String,
    pub total_days: usize,
    pub present_days: usize,
    pub counts: StatusCounts,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTotals {
    pub student_days: usize,
    pub counts: StatusCounts,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub window: SummaryWindow,
    pub students: Vec<StudentSummary>,
    pub totals: ClassTotals,
}

/// Per-student daily roll-up over the window, one row per roster student in
/// roster order. Entries outside the window or for students missing from
/// the roster produce no rows.
pub fn summarize(
    window: &SummaryWindow,
    roster: &[RosterStudent],
    entries: &[AttendanceEntry],
) -> Aggregate<ClassSummary> {
    let in_window: Vec<AttendanceEntry> = entries
        .iter()
        .filter(|e| window.contains(e))
        .cloned()
        .collect();
    if in_window.is_empty() {
        return Aggregate::NoData;
    }

    let mut days_by_student: HashMap<String, Vec<AttendanceStatus>> = HashMap::new();
    for day in reconcile(&in_window) {
        days_by_student
            .entry(day.student)
            .or_default()
            .push(day.status);
    }

    let mut ordered: Vec<&RosterStudent> = roster.iter().collect();
    ordered.sort_by_key(|s| s.seq);

    let mut totals = ClassTotals {
        student_days: 0,
        counts: zero_counts(),
        attendance_rate: 0.0,
    };
    let mut students = Vec::with_capacity(ordered.len());
    for rs in ordered {
        let mut counts = zero_counts();
        let days = days_by_student.get(&rs.name).map(Vec::as_slice).unwrap_or(&[]);
        for status in days {
            *counts.entry(*status).or_insert(0) += 1;
            *totals.counts.entry(*status).or_insert(0) += 1;
        }
        let present_days = counts
            .get(&AttendanceStatus::Present)
            .copied()
            .unwrap_or(0);
        totals.student_days += days.len();
        students.push(StudentSummary {
            seq: rs.seq,
            student: rs.name.clone(),
            total_days: days.len(),
            present_days,
            counts,
            attendance_rate: rate_percent(present_days, days.len()),
        });
    }
    let class_present = totals
        .counts
        .get(&AttendanceStatus::Present)
        .copied()
        .unwrap_or(0);
    totals.attendance_rate = rate_percent(class_present, totals.student_days);

    Aggregate::Computed(ClassSummary {
        window: window.clone(),
        students,
        totals,
    })
}

/// Daily statuses of one student, date ascending.
pub fn student_daily(entries: &[AttendanceEntry], student: &str) -> Aggregate<Vec<DailyStatus>> {
    let own: Vec<AttendanceEntry> = entries
        .iter()
        .filter(|e| e.student == student)
        .cloned()
        .collect();
    if own.is_empty() {
        return Aggregate::NoData;
    }
    Aggregate::Computed(reconcile(&own))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountRow {
    pub key: String,
    pub count: usize,
}

fn count_by<F>(entries: &[AttendanceEntry], key: F) -> Aggregate<Vec<CountRow>>
where
    F: Fn(&AttendanceEntry) -> &str,
{
    if entries.is_empty() {
        return Aggregate::NoData;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for e in entries {
        *counts.entry(key(e)).or_insert(0) += 1;
    }
    let mut rows: Vec<CountRow> = counts
        .into_iter()
        .map(|(k, count)| CountRow {
            key: k.to_string(),
            count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    Aggregate::Computed(rows)
}

/// Entry count per teacher; every period counts separately.
pub fn count_by_teacher(entries: &[AttendanceEntry]) -> Aggregate<Vec<CountRow>> {
    count_by(entries, |e| e.teacher.as_str())
}

/// Entry count per subject; every period counts separately.
pub fn count_by_subject(entries: &[AttendanceEntry]) -> Aggregate<Vec<CountRow>> {
    count_by(entries, |e| e.subject.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Week,
    Month,
}

impl Granularity {
    /// Bucket label and first day of the bucket containing `date`.
    /// Weeks are ISO weeks (Monday start), labelled `YYYY-Www`.
    fn bucket(self, date: NaiveDate) -> (String, NaiveDate) {
        match self {
            Granularity::Week => {
                let iso = date.iso_week();
                let start = NaiveDate::from_isoywd_opt(iso.year(), iso.week(), Weekday::Mon)
                    .unwrap_or(date);
                (format!("{}-W{:02}", iso.year(), iso.week()), start)
            }
            Granularity::Month => {
                let start = date.with_day(1).unwrap_or(date);
                (date.format("%Y-%m").to_string(), start)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRow {
    pub bucket: String,
    pub bucket_start: NaiveDate,
    pub status: AttendanceStatus,
    pub count: usize,
}

/// Entry counts per (calendar bucket, status), bucket ascending then status
/// in register order. Works on raw entries, not reconciled days.
pub fn count_by_period(entries: &[AttendanceEntry], granularity: Granularity) -> Aggregate<Vec<BucketRow>> {
    if entries.is_empty() {
        return Aggregate::NoData;
    }
    let mut counts: BTreeMap<(NaiveDate, String, AttendanceStatus), usize> = BTreeMap::new();
    for e in entries {
        let (label, start) = granularity.bucket(e.date);
        *counts.entry((start, label, e.status)).or_insert(0) += 1;
    }
    Aggregate::Computed(
        counts
            .into_iter()
            .map(|((bucket_start, bucket, status), count)| BucketRow {
                bucket,
                bucket_start,
                status,
                count,
            })
            .collect(),
    )
}

/// `YYYY-MM-DD` text for a date, as stored and exported.
pub fn date_text(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}
