//! Domain errors for the attendance assistant.
//!
//! Aggregation and chat classification are total and never return these;
//! they come from building records and loading configuration.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AttendanceError {
    /// Attended classes outside `0..=total_classes`
    #[error("invalid attendance counters for {student_id}: attended {attended} of {total}")]
    InvalidCounters {
        student_id: String,
        attended: i32,
        total: i32,
    },

    /// A record with the same (student, subject, date) already exists
    #[error("attendance already recorded for {student_id} in {subject} on {date}")]
    DuplicateRecord {
        student_id: Uuid,
        subject: String,
        date: NaiveDate,
    },

    #[error("unknown student: {0}")]
    UnknownStudent(Uuid),

    #[error("unknown attendance status: {0}")]
    UnknownStatus(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
