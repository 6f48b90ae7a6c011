use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{AttendanceRecord, AttendanceStatus, Student};

/// Marks taken for one subject on one date, keyed by student id.
#[derive(Debug, Clone)]
pub struct AttendanceSheet {
    pub date: NaiveDate,
    pub subject: String,
    marks: HashMap<Uuid, AttendanceStatus>,
}

impl AttendanceSheet {
    pub fn new(date: NaiveDate, subject: impl Into<String>) -> Self {
        Self {
            date,
            subject: subject.into(),
            marks: HashMap::new(),
        }
    }

    /// Sets or replaces the mark for one student.
    pub fn mark(&mut self, student_id: Uuid, status: AttendanceStatus) {
        self.marks.insert(student_id, status);
    }

    /// Bulk action: every listed student gets the same status.
    pub fn mark_all(&mut self, students: &[Student], status: AttendanceStatus) {
        for student in students {
            self.marks.insert(student.id, status);
        }
    }

    pub fn status_of(&self, student_id: Uuid) -> Option<AttendanceStatus> {
        self.marks.get(&student_id).copied()
    }

    /// Records for the marked students among `students`, in their order.
    pub fn to_records(&self, students: &[Student]) -> Vec<AttendanceRecord> {
        let timestamp = Utc::now();
        students
            .iter()
            .filter_map(|student| {
                self.status_of(student.id).map(|status| AttendanceRecord {
                    id: Uuid::new_v4(),
                    student_id: student.id,
                    date: self.date,
                    subject: self.subject.clone(),
                    status,
                    semester: student.semester,
                    section: student.section.clone(),
                    timestamp,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentProfile;

    fn student(name: &str) -> Student {
        Student::new(
            Uuid::new_v4(),
            StudentProfile {
                student_id: format!("CS-{name}"),
                name: name.to_string(),
                email: format!("{name}@csdept.edu"),
                semester: 6,
                section: "B".to_string(),
                year: 2024,
                parent_email: String::new(),
                parent_phone: String::new(),
            },
            10,
            9,
        )
        .unwrap()
    }

    #[test]
    fn later_mark_replaces_earlier() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let mut sheet = AttendanceSheet::new(date, "Web Development");
        let rahul = student("rahul");
        sheet.mark(rahul.id, AttendanceStatus::Absent);
        sheet.mark(rahul.id, AttendanceStatus::Late);
        assert_eq!(sheet.status_of(rahul.id), Some(AttendanceStatus::Late));
    }

    #[test]
    fn records_cover_only_marked_students() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let mut sheet = AttendanceSheet::new(date, "Machine Learning");
        let students = vec![student("a"), student("b"), student("c")];
        sheet.mark_all(&students[..2], AttendanceStatus::Present);

        let records = sheet.to_records(&students);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.subject == "Machine Learning"));
        assert!(records.iter().all(|r| r.section == "B" && r.semester == 6));
        assert_eq!(records[0].student_id, students[0].id);
    }
}
