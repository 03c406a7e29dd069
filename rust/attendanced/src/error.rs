//! Domain errors for the attendance register.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttendanceError {
    /// A required field is missing or empty, or a value is out of shape.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("unknown attendance status '{0}'")]
    UnknownStatus(String),

    #[error("period must be between 1 and 6, got '{0}'")]
    BadPeriod(String),

    #[error("date must be YYYY-MM-DD, got '{0}'")]
    BadDate(String),

    #[error("entry {index}: {source}")]
    InvalidEntry {
        index: usize,
        #[source]
        source: Box<AttendanceError>,
    },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AttendanceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AttendanceError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Stable code reported to IPC clients.
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::Validation { .. }
            | AttendanceError::UnknownStatus(_)
            | AttendanceError::BadPeriod(_)
            | AttendanceError::BadDate(_)
            | AttendanceError::InvalidEntry { .. } => "validation_failed",
            AttendanceError::Db(_) => "db_query_failed",
            AttendanceError::Csv(_) => "export_failed",
            AttendanceError::Io(_) => "io_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
