use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AttendanceError;

/// Rounded attendance percentage; zero when no classes were held.
pub fn attendance_percentage(attended_classes: i32, total_classes: i32) -> f64 {
    if total_classes <= 0 {
        return 0.0;
    }
    (attended_classes as f64 / total_classes as f64 * 100.0).round()
}

/// Identity and placement fields of a student, without counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub semester: i32,
    pub section: String,
    pub year: i32,
    pub parent_email: String,
    pub parent_phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub semester: i32,
    pub section: String,
    pub year: i32,
    pub parent_email: String,
    pub parent_phone: String,
    pub total_classes: i32,
    pub attended_classes: i32,
    pub attendance_percentage: f64,
}

impl Student {
    pub fn new(
        id: Uuid,
        profile: StudentProfile,
        total_classes: i32,
        attended_classes: i32,
    ) -> Result<Self, AttendanceError> {
        if attended_classes < 0 || total_classes < 0 || attended_classes > total_classes {
            return Err(AttendanceError::InvalidCounters {
                student_id: profile.student_id,
                attended: attended_classes,
                total: total_classes,
            });
        }

        Ok(Self {
            id,
            student_id: profile.student_id,
            name: profile.name,
            email: profile.email,
            semester: profile.semester,
            section: profile.section,
            year: profile.year,
            parent_email: profile.parent_email,
            parent_phone: profile.parent_phone,
            total_classes,
            attended_classes,
            attendance_percentage: attendance_percentage(attended_classes, total_classes),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = AttendanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            other => Err(AttendanceError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub subject: String,
    pub status: AttendanceStatus,
    pub semester: i32,
    pub section: String,
    pub timestamp: DateTime<Utc>,
}

/// Natural key of an attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub student_id: Uuid,
    pub subject: String,
    pub date: NaiveDate,
}

impl AttendanceRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            student_id: self.student_id,
            subject: self.subject.clone(),
            date: self.date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub code: String,
    pub semester: i32,
    pub credits: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Teacher => f.write_str("teacher"),
            Role::Student => f.write_str("student"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{other}', expected teacher or student")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    List,
}

/// Structured payload a reply can carry alongside its text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "lowercase")]
pub enum AttachedData {
    Students(Vec<Student>),
    Subjects(Vec<Subject>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub data: Option<AttachedData>,
}

impl ChatReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: None,
        }
    }

    pub fn list(text: impl Into<String>, data: AttachedData) -> Self {
        Self {
            text: text.into(),
            data: Some(data),
        }
    }

    pub fn response_type(&self) -> ResponseType {
        if self.data.is_some() {
            ResponseType::List
        } else {
            ResponseType::Text
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AttachedData>,
}

impl ChatMessage {
    pub fn from_user(text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            sender: Sender::User,
            timestamp: Utc::now(),
            response_type: ResponseType::Text,
            data: None,
        }
    }

    pub fn from_bot(reply: ChatReply) -> Self {
        Self {
            id: Uuid::new_v4(),
            response_type: reply.response_type(),
            text: reply.text,
            sender: Sender::Bot,
            timestamp: Utc::now(),
            data: reply.data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SeverityTier {
    Critical,
    High,
    Medium,
    /// At or above the attendance requirement.
    Clear,
}

impl SeverityTier {
    pub fn label(self) -> &'static str {
        match self {
            SeverityTier::Critical => "Critical",
            SeverityTier::High => "High",
            SeverityTier::Medium => "Medium",
            SeverityTier::Clear => "Clear",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub unmarked: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DepartmentStats {
    pub total_students: usize,
    pub average_attendance: f64,
    pub excellent: usize,
    pub needing_attention: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterStats {
    pub semester: i32,
    pub student_count: usize,
    pub average_attendance: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceDistribution {
    pub excellent: usize,
    pub good: usize,
    pub average: usize,
    pub poor: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> StudentProfile {
        StudentProfile {
            student_id: "CS2021001".to_string(),
            name: "Arjun Patel".to_string(),
            email: "arjun.patel@csdept.edu".to_string(),
            semester: 6,
            section: "A".to_string(),
            year: 2024,
            parent_email: "arjun.parent@email.com".to_string(),
            parent_phone: "+91-9876543210".to_string(),
        }
    }

    #[test]
    fn percentage_is_rounded_from_counters() {
        let student = Student::new(Uuid::new_v4(), profile(), 120, 102).unwrap();
        assert_eq!(student.attendance_percentage, 85.0);
        assert_eq!(attendance_percentage(78, 120), 65.0);
        assert_eq!(attendance_percentage(2, 3), 67.0);
    }

    #[test]
    fn zero_classes_means_zero_percent() {
        let student = Student::new(Uuid::new_v4(), profile(), 0, 0).unwrap();
        assert_eq!(student.attendance_percentage, 0.0);
    }

    #[test]
    fn rejects_attended_above_total() {
        let err = Student::new(Uuid::new_v4(), profile(), 10, 11).unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidCounters { attended: 11, total: 10, .. }));
        assert!(Student::new(Uuid::new_v4(), profile(), 10, -1).is_err());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Present".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Present);
        assert_eq!(" late ".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Late);
        assert!("excused".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn reply_type_follows_attached_data() {
        assert_eq!(ChatReply::text("hi").response_type(), ResponseType::Text);
        let reply = ChatReply::list("subjects", AttachedData::Subjects(Vec::new()));
        assert_eq!(reply.response_type(), ResponseType::List);

        let message = ChatMessage::from_bot(reply);
        assert_eq!(message.sender, Sender::Bot);
        assert_eq!(message.response_type, ResponseType::List);
    }
}
