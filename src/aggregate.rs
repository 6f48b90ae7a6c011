use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{
    AttendanceDistribution, AttendanceRecord, AttendanceStatus, AttendanceSummary,
    DepartmentStats, SemesterStats, SeverityCounts, SeverityTier, StatusTally, Student,
};
use crate::sheet::AttendanceSheet;

/// Half-open tiers: `[..,50)`, `[50,65)`, `[65,75)`, `[75,..]`.
pub fn severity_of(percentage: f64) -> SeverityTier {
    if percentage < 50.0 {
        SeverityTier::Critical
    } else if percentage < 65.0 {
        SeverityTier::High
    } else if percentage < 75.0 {
        SeverityTier::Medium
    } else {
        SeverityTier::Clear
    }
}

/// Students strictly below `threshold`, worst first. Ties keep input order.
pub fn classify_defaulters(students: &[Student], threshold: f64) -> Vec<Student> {
    let mut defaulters: Vec<Student> = students
        .iter()
        .filter(|student| student.attendance_percentage < threshold)
        .cloned()
        .collect();

    // sort_by is stable
    defaulters.sort_by(|a, b| {
        a.attendance_percentage
            .partial_cmp(&b.attendance_percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    debug!(
        threshold,
        candidates = students.len(),
        defaulters = defaulters.len(),
        "classified defaulters"
    );
    defaulters
}

pub fn filter_by_cohort(
    students: &[Student],
    semester: Option<i32>,
    section: Option<&str>,
) -> Vec<Student> {
    students
        .iter()
        .filter(|student| semester.map_or(true, |value| student.semester == value))
        .filter(|student| section.map_or(true, |value| student.section == value))
        .cloned()
        .collect()
}

/// Status counts for `students` on a mark sheet. Marks for students outside
/// the list are ignored, so `unmarked` never underflows.
pub fn summarize(students: &[Student], sheet: &AttendanceSheet) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();

    for student in students {
        match sheet.status_of(student.id) {
            Some(AttendanceStatus::Present) => summary.present += 1,
            Some(AttendanceStatus::Absent) => summary.absent += 1,
            Some(AttendanceStatus::Late) => summary.late += 1,
            None => summary.unmarked += 1,
        }
    }

    summary
}

pub fn average_percentage(students: &[Student]) -> f64 {
    if students.is_empty() {
        return 0.0;
    }
    let total: f64 = students.iter().map(|s| s.attendance_percentage).sum();
    (total / students.len() as f64).round()
}

pub fn department_stats(
    students: &[Student],
    attention_threshold: f64,
    excellent_threshold: f64,
) -> DepartmentStats {
    DepartmentStats {
        total_students: students.len(),
        average_attendance: average_percentage(students),
        excellent: students
            .iter()
            .filter(|s| s.attendance_percentage >= excellent_threshold)
            .count(),
        needing_attention: students
            .iter()
            .filter(|s| s.attendance_percentage < attention_threshold)
            .count(),
    }
}

/// Per-semester head count and rounded average, ascending by semester.
pub fn semester_breakdown(students: &[Student]) -> Vec<SemesterStats> {
    let mut groups: BTreeMap<i32, Vec<Student>> = BTreeMap::new();
    for student in students {
        groups.entry(student.semester).or_default().push(student.clone());
    }

    groups
        .into_iter()
        .map(|(semester, members)| SemesterStats {
            semester,
            student_count: members.len(),
            average_attendance: average_percentage(&members),
        })
        .collect()
}

pub fn attendance_distribution(students: &[Student]) -> AttendanceDistribution {
    let mut distribution = AttendanceDistribution::default();
    for student in students {
        match student.attendance_percentage {
            p if p >= 90.0 => distribution.excellent += 1,
            p if p >= 75.0 => distribution.good += 1,
            p if p >= 60.0 => distribution.average += 1,
            _ => distribution.poor += 1,
        }
    }
    distribution
}

pub fn severity_counts(students: &[Student]) -> SeverityCounts {
    let mut counts = SeverityCounts::default();
    for student in students {
        match severity_of(student.attendance_percentage) {
            SeverityTier::Critical => counts.critical += 1,
            SeverityTier::High => counts.high += 1,
            SeverityTier::Medium => counts.medium += 1,
            SeverityTier::Clear => {}
        }
    }
    counts
}

pub fn tally(records: &[AttendanceRecord]) -> StatusTally {
    let mut tally = StatusTally::default();
    for record in records {
        match record.status {
            AttendanceStatus::Present => tally.present += 1,
            AttendanceStatus::Absent => tally.absent += 1,
            AttendanceStatus::Late => tally.late += 1,
        }
    }
    tally
}

/// Share of present-or-late marks per date, ascending by date.
pub fn daily_rates(records: &[AttendanceRecord]) -> Vec<(NaiveDate, f64)> {
    let mut days: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = days.entry(record.date).or_insert((0, 0));
        entry.1 += 1;
        if record.status != AttendanceStatus::Absent {
            entry.0 += 1;
        }
    }

    days.into_iter()
        .map(|(date, (attended, total))| (date, attended as f64 / total as f64 * 100.0))
        .collect()
}

/// Rounded mean of the most recent `window` daily rates.
pub fn forecast(records: &[AttendanceRecord], window: usize) -> Option<f64> {
    let rates = daily_rates(records);
    if rates.is_empty() {
        return None;
    }

    let window = window.max(1).min(rates.len());
    let recent = &rates[rates.len() - window..];
    let mean = recent.iter().map(|(_, rate)| rate).sum::<f64>() / window as f64;
    Some(mean.round())
}
