use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AttendanceError;

/// Closed set of attendance marks a teacher can record for one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Official,
    Sick,
    Personal,
    Bereavement,
    Suspension,
    Late,
    EarlyLeave,
    Guardian,
}

/// Every status in register column order.
pub const ALL_STATUSES: [AttendanceStatus; 10] = [
    AttendanceStatus::Present,
    AttendanceStatus::Absent,
    AttendanceStatus::Official,
    AttendanceStatus::Sick,
    AttendanceStatus::Personal,
    AttendanceStatus::Bereavement,
    AttendanceStatus::Suspension,
    AttendanceStatus::Late,
    AttendanceStatus::EarlyLeave,
    AttendanceStatus::Guardian,
];

/// Non-present reasons in the order a mixed day is resolved.
/// The first one recorded on the day wins, regardless of period or count.
pub const DAILY_ABSENCE_PRECEDENCE: [AttendanceStatus; 7] = [
    AttendanceStatus::Sick,
    AttendanceStatus::Bereavement,
    AttendanceStatus::Suspension,
    AttendanceStatus::Personal,
    AttendanceStatus::Guardian,
    AttendanceStatus::Official,
    AttendanceStatus::Absent,
];

impl AttendanceStatus {
    /// Stable storage key.
    pub fn key(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Official => "official",
            AttendanceStatus::Sick => "sick",
            AttendanceStatus::Personal => "personal",
            AttendanceStatus::Bereavement => "bereavement",
            AttendanceStatus::Suspension => "suspension",
            AttendanceStatus::Late => "late",
            AttendanceStatus::EarlyLeave => "early_leave",
            AttendanceStatus::Guardian => "guardian",
        }
    }

    /// One-character mark used on the paper register.
    pub fn symbol(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "○",
            AttendanceStatus::Absent => "／",
            AttendanceStatus::Official => "公",
            AttendanceStatus::Sick => "病",
            AttendanceStatus::Personal => "事",
            AttendanceStatus::Bereavement => "忌",
            AttendanceStatus::Suspension => "停",
            AttendanceStatus::Late => "遅",
            AttendanceStatus::EarlyLeave => "早",
            AttendanceStatus::Guardian => "保",
        }
    }

    /// Accepts the storage key, the register symbol, or the register word
    /// (出席/欠席/遅刻/早退). Anything else is rejected, never coerced.
    pub fn parse(raw: &str) -> Result<Self, AttendanceError> {
        let t = raw.trim();
        for s in ALL_STATUSES {
            if t == s.key() || t == s.symbol() {
                return Ok(s);
            }
        }
        match t {
            "出席" => Ok(AttendanceStatus::Present),
            "欠席" => Ok(AttendanceStatus::Absent),
            "遅刻" => Ok(AttendanceStatus::Late),
            "早退" => Ok(AttendanceStatus::EarlyLeave),
            _ => Err(AttendanceError::UnknownStatus(t.to_string())),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
