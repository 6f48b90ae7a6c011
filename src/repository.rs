use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AttendanceError;
use crate::models::{AttendanceRecord, AttendanceStatus, RecordKey, Student, StudentProfile, Subject};

const SEED_DAYS: i64 = 30;

/// In-memory view of the department's records. Built once per process and
/// handed to the aggregator and the chat engine by reference.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    students: Vec<Student>,
    subjects: Vec<Subject>,
    records: Vec<AttendanceRecord>,
    keys: HashSet<RecordKey>,
}

impl Repository {
    pub fn new(students: Vec<Student>, subjects: Vec<Subject>) -> Self {
        Self {
            students,
            subjects,
            records: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Demo department: six students, five subjects and `SEED_DAYS` days of
    /// records per semester subject ending at `end`. The same seed always yields the same data.
    pub fn seeded(seed: u64, end: NaiveDate) -> Result<Self, AttendanceError> {
        let mut repository = Self::new(seed_students()?, seed_subjects());
        let mut rng = StdRng::seed_from_u64(seed);
        let mut generated = Vec::new();
        for student in &repository.students {
            let subject_names: Vec<&str> = repository
                .subjects
                .iter()
                .filter(|subject| subject.semester == student.semester)
                .map(|subject| subject.name.as_str())
                .collect();

            for offset in 0..SEED_DAYS {
                let date = end - Duration::days(offset);
                for subject in &subject_names {
                    generated.push(AttendanceRecord {
                        id: Uuid::new_v4(),
                        student_id: student.id,
                        date,
                        subject: subject.to_string(),
                        status: seeded_status(&mut rng, student.attendance_percentage),
                        semester: student.semester,
                        section: student.section.clone(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }
        repository.insert_records(generated)?;

        info!(
            seed,
            students = repository.students.len(),
            records = repository.records.len(),
            "seeded in-memory repository"
        );
        Ok(repository)
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    /// Inserts every record or none of them.
    pub fn insert_records(&mut self, records: Vec<AttendanceRecord>) -> Result<usize, AttendanceError> {
        let known: HashSet<Uuid> = self.students.iter().map(|student| student.id).collect();
        let mut batch = HashSet::new();
        for record in &records {
            if !known.contains(&record.student_id) {
                return Err(AttendanceError::UnknownStudent(record.student_id));
            }
            let key = record.key();
            if self.keys.contains(&key) || !batch.insert(key.clone()) {
                return Err(AttendanceError::DuplicateRecord {
                    student_id: key.student_id,
                    subject: key.subject,
                    date: key.date,
                });
            }
        }

        let count = records.len();
        for record in records {
            self.keys.insert(record.key());
            self.records.push(record);
        }
        debug!(count, total = self.records.len(), "inserted attendance records");
        Ok(count)
    }

    /// Adds records whose (student, subject, date) is not stored yet and
    /// leaves the rest untouched, like the Postgres save. Returns how many
    /// were new. Unknown students still fail the whole batch.
    pub fn merge_records(&mut self, records: Vec<AttendanceRecord>) -> Result<usize, AttendanceError> {
        let known: HashSet<Uuid> = self.students.iter().map(|student| student.id).collect();
        if let Some(record) = records.iter().find(|record| !known.contains(&record.student_id)) {
            return Err(AttendanceError::UnknownStudent(record.student_id));
        }

        let submitted = records.len();
        let mut inserted = 0usize;
        for record in records {
            if self.keys.insert(record.key()) {
                self.records.push(record);
                inserted += 1;
            }
        }
        debug!(inserted, submitted, "merged attendance records");
        Ok(inserted)
    }
}

fn seeded_status(rng: &mut StdRng, percentage: f64) -> AttendanceStatus {
    let roll: f64 = rng.gen_range(0.0..100.0);
    if roll < percentage {
        AttendanceStatus::Present
    } else if roll < percentage + (100.0 - percentage) / 3.0 {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Absent
    }
}

fn seed_students() -> Result<Vec<Student>, AttendanceError> {
    let rows = [
        ("CS2021001", "Arjun Patel", "arjun.patel", 6, "A", 120, 102),
        ("CS2021002", "Sneha Reddy", "sneha.reddy", 6, "A", 120, 110),
        ("CS2021003", "Rahul Singh", "rahul.singh", 6, "B", 120, 78),
        ("CS2021004", "Priya Gupta", "priya.gupta", 6, "A", 120, 94),
        ("CS2021005", "Vikram Joshi", "vikram.joshi", 6, "B", 120, 114),
        ("CS2021006", "Ananya Iyer", "ananya.iyer", 4, "A", 100, 88),
    ];

    rows.into_iter()
        .enumerate()
        .map(|(index, (roll, name, handle, semester, section, total, attended))| {
            let first = handle.split('.').next().unwrap_or(handle);
            Student::new(
                Uuid::from_u128(index as u128 + 1),
                StudentProfile {
                    student_id: roll.to_string(),
                    name: name.to_string(),
                    email: format!("{handle}@csdept.edu"),
                    semester,
                    section: section.to_string(),
                    year: 2024,
                    parent_email: format!("{first}.parent@email.com"),
                    parent_phone: format!("+91-98765432{:02}", 10 + index),
                },
                total,
                attended,
            )
        })
        .collect()
}

fn seed_subjects() -> Vec<Subject> {
    [
        ("Data Structures", "CS401", 4, 4),
        ("Database Management", "CS601", 6, 4),
        ("Web Development", "CS602", 6, 3),
        ("Machine Learning", "CS603", 6, 4),
        ("Software Engineering", "CS604", 6, 3),
    ]
    .into_iter()
    .map(|(name, code, semester, credits)| Subject {
        name: name.to_string(),
        code: code.to_string(),
        semester,
        credits,
    })
    .collect()
}

#[derive(serde::Deserialize)]
struct StudentRow {
    student_id: String,
    name: String,
    email: String,
    semester: i32,
    section: String,
    year: i32,
    parent_email: String,
    parent_phone: String,
    total_classes: i32,
    attended_classes: i32,
}

/// Reads a student roster CSV. Rows with impossible counters, or a roll
/// number or email used earlier in the file, fail the whole read with the
/// offending line number.
pub fn read_students_csv(csv_path: &Path) -> anyhow::Result<Vec<Student>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut students = Vec::new();
    let mut rolls = HashSet::new();
    let mut emails = HashSet::new();

    for (index, result) in reader.deserialize::<StudentRow>().enumerate() {
        let row = result.with_context(|| format!("malformed row {}", index + 2))?;
        if !rolls.insert(row.student_id.clone()) {
            anyhow::bail!(
                "row {} repeats roll number {}",
                index + 2,
                row.student_id
            );
        }
        if !emails.insert(row.email.to_ascii_lowercase()) {
            anyhow::bail!("row {} repeats email {}", index + 2, row.email);
        }
        let student = Student::new(
            Uuid::new_v4(),
            StudentProfile {
                student_id: row.student_id,
                name: row.name,
                email: row.email,
                semester: row.semester,
                section: row.section,
                year: row.year,
                parent_email: row.parent_email,
                parent_phone: row.parent_phone,
            },
            row.total_classes,
            row.attended_classes,
        )
        .with_context(|| format!("invalid row {}", index + 2))?;
        students.push(student);
    }

    Ok(students)
}
