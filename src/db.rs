use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::models::{AttendanceRecord, AttendanceStatus, Student, StudentProfile, Subject};
use crate::repository::{read_students_csv, Repository};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts or refreshes a student keyed by roll number and returns the
/// stored id. An email owned by another roll number fails the statement.
async fn upsert_student(conn: &mut PgConnection, student: &Student) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO department_attendance.students
        (id, student_id, full_name, email, semester, section, year,
         parent_email, parent_phone, total_classes, attended_classes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (student_id) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            email = EXCLUDED.email,
            semester = EXCLUDED.semester,
            section = EXCLUDED.section,
            year = EXCLUDED.year,
            parent_email = EXCLUDED.parent_email,
            parent_phone = EXCLUDED.parent_phone,
            total_classes = EXCLUDED.total_classes,
            attended_classes = EXCLUDED.attended_classes,
            updated_at = now()
        RETURNING id
        "#,
    )
    .bind(student.id)
    .bind(&student.student_id)
    .bind(&student.name)
    .bind(&student.email)
    .bind(student.semester)
    .bind(&student.section)
    .bind(student.year)
    .bind(&student.parent_email)
    .bind(&student.parent_phone)
    .bind(student.total_classes)
    .bind(student.attended_classes)
    .fetch_one(conn)
    .await
    .with_context(|| format!("failed to upsert student {}", student.student_id))?
    .get("id");

    Ok(id)
}

/// Loads the demo department into Postgres. Safe to run repeatedly.
pub async fn seed(pool: &PgPool, seed: u64, end: NaiveDate) -> anyhow::Result<usize> {
    let repository = Repository::seeded(seed, end)?;

    let mut tx = pool.begin().await?;
    let mut ids = HashMap::new();
    for student in repository.students() {
        let stored = upsert_student(&mut *tx, student).await?;
        ids.insert(student.id, stored);
    }

    for subject in repository.subjects() {
        sqlx::query(
            r#"
            INSERT INTO department_attendance.subjects (code, name, semester, credits)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, semester = EXCLUDED.semester, credits = EXCLUDED.credits
            "#,
        )
        .bind(&subject.code)
        .bind(&subject.name)
        .bind(subject.semester)
        .bind(subject.credits)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    let records: Vec<AttendanceRecord> = repository
        .records()
        .iter()
        .filter_map(|record| {
            ids.get(&record.student_id).map(|stored| AttendanceRecord {
                student_id: *stored,
                ..record.clone()
            })
        })
        .collect();

    save_records(pool, &records).await
}

/// Upserts the whole roster in one transaction; any failing row leaves the
/// table as it was.
pub async fn import_students_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let students = read_students_csv(csv_path)?;
    let mut tx = pool.begin().await?;
    for student in &students {
        upsert_student(&mut *tx, student).await?;
    }
    tx.commit().await?;
    info!(count = students.len(), path = %csv_path.display(), "imported students");
    Ok(students.len())
}

/// Inserts records in one transaction. Existing (student, subject, date)
/// rows are left untouched; returns how many rows were new.
pub async fn save_records(pool: &PgPool, records: &[AttendanceRecord]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO department_attendance.attendance_records
            (id, student_id, date, subject, status, semester, section, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_id, subject, date) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.student_id)
        .bind(record.date)
        .bind(&record.subject)
        .bind(record.status.as_str())
        .bind(record.semester)
        .bind(&record.section)
        .bind(record.timestamp)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    info!(inserted, submitted = records.len(), "saved attendance records");
    Ok(inserted)
}

pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<Student>> {
    let rows = sqlx::query(
        "SELECT id, student_id, full_name, email, semester, section, year, \
         parent_email, parent_phone, total_classes, attended_classes \
         FROM department_attendance.students \
         ORDER BY full_name",
    )
    .fetch_all(pool)
    .await?;

    let mut students = Vec::with_capacity(rows.len());
    for row in rows {
        students.push(Student::new(
            row.get("id"),
            StudentProfile {
                student_id: row.get("student_id"),
                name: row.get("full_name"),
                email: row.get("email"),
                semester: row.get("semester"),
                section: row.get("section"),
                year: row.get("year"),
                parent_email: row.get("parent_email"),
                parent_phone: row.get("parent_phone"),
            },
            row.get("total_classes"),
            row.get("attended_classes"),
        )?);
    }

    Ok(students)
}

pub async fn fetch_subjects(pool: &PgPool) -> anyhow::Result<Vec<Subject>> {
    let rows = sqlx::query(
        "SELECT code, name, semester, credits FROM department_attendance.subjects \
         ORDER BY semester, code",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Subject {
            name: row.get("name"),
            code: row.get("code"),
            semester: row.get("semester"),
            credits: row.get("credits"),
        })
        .collect())
}

pub async fn fetch_attendance(pool: &PgPool) -> anyhow::Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(
        "SELECT id, student_id, date, subject, status, semester, section, recorded_at \
         FROM department_attendance.attendance_records \
         ORDER BY date, subject",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::new();
    for row in rows {
        let status: String = row.get("status");
        records.push(AttendanceRecord {
            id: row.get("id"),
            student_id: row.get("student_id"),
            date: row.get("date"),
            subject: row.get("subject"),
            status: status.parse::<AttendanceStatus>()?,
            semester: row.get("semester"),
            section: row.get("section"),
            timestamp: row.get("recorded_at"),
        });
    }

    Ok(records)
}

pub async fn load_repository(pool: &PgPool) -> anyhow::Result<Repository> {
    let students = fetch_students(pool).await?;
    let subjects = fetch_subjects(pool).await?;
    let records = fetch_attendance(pool).await?;

    let mut repository = Repository::new(students, subjects);
    repository
        .insert_records(records)
        .context("stored attendance violates the record key")?;

    info!(
        students = repository.students().len(),
        records = repository.records().len(),
        "loaded repository from Postgres"
    );
    Ok(repository)
}
