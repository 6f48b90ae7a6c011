use std::fmt::Write;

use chrono::NaiveDate;

use crate::aggregate;
use crate::models::Student;

/// Markdown defaulters report for an already cohort-filtered student list.
pub fn build_report(
    cohort: Option<&str>,
    threshold: f64,
    excellent_threshold: f64,
    generated_on: NaiveDate,
    students: &[Student],
) -> String {
    let defaulters = aggregate::classify_defaulters(students, threshold);
    let severity = aggregate::severity_counts(&defaulters);
    let stats = aggregate::department_stats(students, threshold, excellent_threshold);

    let mut output = String::new();
    let cohort_label = cohort.unwrap_or("all cohorts");

    let _ = writeln!(output, "# Computer Science Department - Defaulters Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} (threshold {}%)",
        cohort_label, generated_on, threshold
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Severity Mix");
    let _ = writeln!(output, "- Critical (<50%): {}", severity.critical);
    let _ = writeln!(output, "- High (50-65%): {}", severity.high);
    let _ = writeln!(output, "- Medium (65-75%): {}", severity.medium);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Defaulters");

    if defaulters.is_empty() {
        let _ = writeln!(output, "No students below {}% in this cohort.", threshold);
    } else {
        let _ = writeln!(output, "| Student ID | Name | Semester | Section | Attendance | Severity |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for student in &defaulters {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {}% | {} |",
                student.student_id,
                student.name,
                student.semester,
                student.section,
                student.attendance_percentage,
                aggregate::severity_of(student.attendance_percentage)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Statistics");

    if students.is_empty() {
        let _ = writeln!(output, "No students in this cohort.");
    } else {
        let _ = writeln!(output, "- Students: {}", stats.total_students);
        let _ = writeln!(output, "- Average attendance: {}%", stats.average_attendance);
        let _ = writeln!(
            output,
            "- Excellent ({}%+): {}",
            excellent_threshold, stats.excellent
        );
        let _ = writeln!(output, "- Below threshold: {}", stats.needing_attention);

        let _ = writeln!(output);
        let _ = writeln!(output, "## Semester Breakdown");
        for semester in aggregate::semester_breakdown(students) {
            let _ = writeln!(
                output,
                "- Semester {}: {} students, {}% avg attendance",
                semester.semester, semester.student_count, semester.average_attendance
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn student(roll: &str, name: &str, pct: i32) -> Student {
        Student {
            id: Uuid::new_v4(),
            student_id: roll.to_string(),
            name: name.to_string(),
            email: String::new(),
            semester: 6,
            section: "A".to_string(),
            year: 2024,
            parent_email: String::new(),
            parent_phone: String::new(),
            total_classes: 100,
            attended_classes: pct,
            attendance_percentage: pct as f64,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn report_lists_defaulters_worst_first() {
        let students = vec![
            student("CS1", "Rahul Singh", 65),
            student("CS2", "Sneha Reddy", 92),
            student("CS3", "Kiran Rao", 40),
        ];
        let report = build_report(Some("Semester 6"), 75.0, 85.0, date(), &students);

        assert!(report.contains("Generated for Semester 6 on 2024-05-01 (threshold 75%)"));
        assert!(report.contains("- Critical (<50%): 1"));
        assert!(report.contains("- Medium (65-75%): 1"));
        let kiran = report.find("| CS3 | Kiran Rao | 6 | A | 40% | Critical |").unwrap();
        let rahul = report.find("| CS1 | Rahul Singh | 6 | A | 65% | Medium |").unwrap();
        assert!(kiran < rahul);
        assert!(!report.contains("Sneha Reddy"));
        assert!(report.contains("- Semester 6: 3 students, 66% avg attendance"));
    }

    #[test]
    fn empty_cohort_renders_placeholders() {
        let report = build_report(None, 75.0, 85.0, date(), &[]);
        assert!(report.contains("Generated for all cohorts"));
        assert!(report.contains("No students below 75% in this cohort."));
        assert!(report.contains("No students in this cohort."));
    }
}
