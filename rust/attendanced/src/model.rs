use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AttendanceError, Result};
use crate::status::AttendanceStatus;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const PERIOD_COUNT: u8 = 6;

/// Teaching period of the school day, 1 through 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Period(u8);

impl Period {
    pub fn new(n: u8) -> Result<Self> {
        if (1..=PERIOD_COUNT).contains(&n) {
            Ok(Period(n))
        } else {
            Err(AttendanceError::BadPeriod(n.to_string()))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Accepts `3`, `"3"` or `"3限"`.
    pub fn from_json(v: &serde_json::Value) -> Result<Self> {
        if let Some(n) = v.as_u64() {
            return u8::try_from(n)
                .map_err(|_| AttendanceError::BadPeriod(n.to_string()))
                .and_then(Period::new);
        }
        let Some(s) = v.as_str() else {
            return Err(AttendanceError::BadPeriod(v.to_string()));
        };
        let t = s.trim();
        let digits = t.strip_suffix('限').unwrap_or(t).trim();
        digits
            .parse::<u8>()
            .map_err(|_| AttendanceError::BadPeriod(t.to_string()))
            .and_then(Period::new)
    }
}

impl TryFrom<u8> for Period {
    type Error = AttendanceError;

    fn try_from(n: u8) -> Result<Self> {
        Period::new(n)
    }
}

impl From<Period> for u8 {
    fn from(p: Period) -> u8 {
        p.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}限", self.0)
    }
}

/// Grade × section, e.g. "2年" + "B組".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassKey {
    pub grade: String,
    pub section: String,
}

impl ClassKey {
    pub fn new(grade: &str, section: &str) -> Result<Self> {
        let grade = grade.trim();
        let section = section.trim();
        if grade.is_empty() {
            return Err(AttendanceError::validation("grade", "must not be empty"));
        }
        if section.is_empty() {
            return Err(AttendanceError::validation("section", "must not be empty"));
        }
        Ok(ClassKey {
            grade: grade.to_string(),
            section: section.to_string(),
        })
    }

    pub fn class_id(&self) -> String {
        format!("{}{}", self.grade, self.section)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub class_id: String,
    pub date: NaiveDate,
    pub period: Period,
    pub subject: String,
    pub teacher: String,
    pub student: String,
    pub status: AttendanceStatus,
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| AttendanceError::BadDate(raw.trim().to_string()))
}

fn required_text(obj: &serde_json::Value, key: &str, field: &'static str) -> Result<String> {
    let v = obj
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .unwrap_or("");
    if v.is_empty() {
        return Err(AttendanceError::validation(field, format!("missing {}", key)));
    }
    Ok(v.to_string())
}

impl AttendanceEntry {
    /// Builds an entry from one JSON object of an append request.
    pub fn from_json(obj: &serde_json::Value) -> Result<Self> {
        if !obj.is_object() {
            return Err(AttendanceError::validation("entry", "must be an object"));
        }
        let class_id = required_text(obj, "classId", "classId")?;
        let date = parse_date(&required_text(obj, "date", "date")?)?;
        let period = match obj.get("period") {
            Some(v) if !v.is_null() => Period::from_json(v)?,
            _ => return Err(AttendanceError::validation("period", "missing period")),
        };
        let subject = required_text(obj, "subject", "subject")?;
        let teacher = required_text(obj, "teacher", "teacher")?;
        let student = required_text(obj, "student", "student")?;
        let status = AttendanceStatus::parse(&required_text(obj, "status", "status")?)?;
        Ok(AttendanceEntry {
            class_id,
            date,
            period,
            subject,
            teacher,
            student,
            status,
        })
    }
}

/// Validates a whole batch; the first bad entry rejects the batch.
pub fn entries_from_json(items: &[serde_json::Value]) -> Result<Vec<AttendanceEntry>> {
    items
        .iter()
        .enumerate()
        .map(|(index, v)| {
            AttendanceEntry::from_json(v).map_err(|e| AttendanceError::InvalidEntry {
                index,
                source: Box::new(e),
            })
        })
        .collect()
}

/// Optional restrictions for a store query. `None` means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub class_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub student: Option<String>,
}

impl EntryFilter {
    pub fn for_class(class_id: &str, date_from: NaiveDate, date_to: NaiveDate) -> Self {
        EntryFilter {
            class_id: Some(class_id.to_string()),
            date_from: Some(date_from),
            date_to: Some(date_to),
            student: None,
        }
    }

    /// True when the date bounds can never match anything.
    pub fn is_inverted(&self) -> bool {
        matches!((self.date_from, self.date_to), (Some(f), Some(t)) if f > t)
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self> {
        let text = |key: &str| {
            params
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let date_from = text("dateFrom").map(|s| parse_date(&s)).transpose()?;
        let date_to = text("dateTo").map(|s| parse_date(&s)).transpose()?;
        Ok(EntryFilter {
            class_id: text("classId"),
            date_from,
            date_to,
            student: text("student"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn period_accepts_numbers_and_register_labels() {
        assert_eq!(Period::from_json(&json!(3)).unwrap().number(), 3);
        assert_eq!(Period::from_json(&json!("6限")).unwrap().number(), 6);
        assert_eq!(Period::from_json(&json!(" 1 ")).unwrap().number(), 1);
        assert!(Period::from_json(&json!(0)).is_err());
        assert!(Period::from_json(&json!(7)).is_err());
        assert!(Period::from_json(&json!(300)).is_err());
        assert!(Period::from_json(&json!("昼")).is_err());
        assert_eq!(Period::new(2).unwrap().to_string(), "2限");
    }

    #[test]
    fn class_key_joins_grade_and_section() {
        let k = ClassKey::new("2年", " B組").unwrap();
        assert_eq!(k.class_id(), "2年B組");
        assert!(ClassKey::new("", "A組").is_err());
    }

    #[test]
    fn entry_from_json_requires_every_field() {
        let full = json!({
            "classId": "2年B組",
            "date": "2024-05-01",
            "period": "1限",
            "subject": "数学",
            "teacher": "佐藤",
            "student": "田中",
            "status": "○"
        });
        let e = AttendanceEntry::from_json(&full).unwrap();
        assert_eq!(e.status, AttendanceStatus::Present);
        assert_eq!(e.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());

        for key in ["classId", "date", "period", "subject", "teacher", "student", "status"] {
            let mut partial = full.clone();
            partial.as_object_mut().unwrap().remove(key);
            assert!(
                AttendanceEntry::from_json(&partial).is_err(),
                "missing {} should be rejected",
                key
            );
        }

        let mut blank = full.clone();
        blank["teacher"] = json!("   ");
        assert!(AttendanceEntry::from_json(&blank).is_err());

        let mut bad_status = full;
        bad_status["status"] = json!("?");
        assert!(matches!(
            AttendanceEntry::from_json(&bad_status),
            Err(AttendanceError::UnknownStatus(_))
        ));
    }

    #[test]
    fn batch_error_reports_entry_index() {
        let items = vec![
            json!({"classId":"1年A組","date":"2024-05-01","period":1,"subject":"国語","teacher":"山本","student":"a","status":"present"}),
            json!({"classId":"1年A組","date":"2024-13-01","period":1,"subject":"国語","teacher":"山本","student":"b","status":"present"}),
        ];
        match entries_from_json(&items) {
            Err(AttendanceError::InvalidEntry { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(*source, AttendanceError::BadDate(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn filter_detects_inverted_range() {
        let d1 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let d0 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(EntryFilter::for_class("x", d1, d0).is_inverted());
        assert!(!EntryFilter::for_class("x", d0, d1).is_inverted());
        assert!(!EntryFilter::default().is_inverted());
    }
}
