use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

mod aggregate;
mod chat;
mod config;
mod db;
mod error;
mod logging;
mod models;
mod notify;
mod report;
mod repository;
mod sheet;

use crate::chat::{Conversation, ResponseEngine};
use crate::config::Settings;
use crate::models::{AttachedData, AttendanceStatus, ChatMessage, Role};
use crate::notify::Channel;
use crate::repository::Repository;
use crate::sheet::AttendanceSheet;

#[derive(Parser)]
#[command(name = "attendance-assistant")]
#[command(about = "Attendance tracking assistant for the Computer Science Department", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the demo department into the database
    Seed,
    /// Import students from a roster CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Ask the assistant a question, or chat on stdin when no message is given
    Chat {
        #[arg(long, default_value = "teacher")]
        role: Role,
        #[arg(long)]
        message: Option<String>,
        /// Print replies as JSON
        #[arg(long)]
        json: bool,
        /// Seed for reply phrasing
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List students below the attendance threshold, worst first
    Defaulters {
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        semester: Option<i32>,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Department statistics for a cohort
    Stats {
        #[arg(long)]
        semester: Option<i32>,
        #[arg(long)]
        section: Option<String>,
    },
    /// Mark attendance for a cohort in one subject
    Mark {
        #[arg(long)]
        subject: String,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Status applied to the whole cohort
        #[arg(long, default_value = "present")]
        status: AttendanceStatus,
        /// Roll numbers to mark absent instead
        #[arg(long = "absent")]
        absent: Vec<String>,
        /// Roll numbers to mark late instead
        #[arg(long = "late")]
        late: Vec<String>,
        #[arg(long)]
        semester: Option<i32>,
        #[arg(long)]
        section: Option<String>,
        /// Persist the marks
        #[arg(long)]
        save: bool,
    },
    /// Generate a markdown defaulters report
    Report {
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        semester: Option<i32>,
        #[arg(long)]
        section: Option<String>,
        #[arg(long, default_value = "defaulters-report.md")]
        out: PathBuf,
    },
    /// Render low-attendance alerts for parents of defaulters
    Alerts {
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long, default_value = "email")]
        channel: Channel,
    },
}

async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn require_pool(settings: &Settings) -> anyhow::Result<PgPool> {
    let url = settings
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set for this command")?;
    connect(url).await
}

/// Postgres when a URL is configured, otherwise the seeded demo department.
async fn open_repository(settings: &Settings) -> anyhow::Result<(Repository, Option<PgPool>)> {
    match settings.database_url.as_deref() {
        Some(url) => {
            let pool = connect(url).await?;
            let repository = db::load_repository(&pool).await?;
            Ok((repository, Some(pool)))
        }
        None => {
            warn!("no database configured, using seeded demo data");
            let repository = Repository::seeded(settings.seed, Utc::now().date_naive())?;
            Ok((repository, None))
        }
    }
}

fn cohort_label(semester: Option<i32>, section: Option<&str>) -> Option<String> {
    match (semester, section) {
        (Some(semester), Some(section)) => Some(format!("Semester {semester}, Section {section}")),
        (Some(semester), None) => Some(format!("Semester {semester}")),
        (None, Some(section)) => Some(format!("Section {section}")),
        (None, None) => None,
    }
}

fn print_message(message: &ChatMessage, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(message)?);
        return Ok(());
    }

    println!("{}", message.text);
    match &message.data {
        Some(AttachedData::Students(students)) => {
            for student in students {
                println!("  - {} ({}) - {}%", student.name, student.student_id, student.attendance_percentage);
            }
        }
        Some(AttachedData::Subjects(subjects)) => {
            for subject in subjects {
                println!("  - {} ({}), semester {}, {} credits", subject.name, subject.code, subject.semester, subject.credits);
            }
        }
        None => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load settings")?;
    logging::init_logging(&settings.log_level)?;

    match cli.command {
        Commands::InitDb => {
            let pool = require_pool(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = require_pool(&settings).await?;
            let inserted = db::seed(&pool, settings.seed, Utc::now().date_naive()).await?;
            println!("Seed data inserted ({inserted} new attendance records).");
        }
        Commands::Import { csv } => {
            let pool = require_pool(&settings).await?;
            let imported = db::import_students_csv(&pool, &csv).await?;
            println!("Imported {imported} students from {}.", csv.display());
        }
        Commands::Chat {
            role,
            message,
            json,
            seed,
        } => {
            let (repository, _) = open_repository(&settings).await?;
            let engine = ResponseEngine::new(&settings);
            let mut rng = match seed {
                Some(value) => StdRng::seed_from_u64(value),
                None => StdRng::from_entropy(),
            };
            let mut conversation = Conversation::new(role);

            if let Some(text) = message {
                let reply = engine.respond(&text, role, &repository, &mut rng);
                print_message(&ChatMessage::from_bot(reply), json)?;
                return Ok(());
            }

            if let Some(welcome) = conversation.messages().first() {
                print_message(welcome, json)?;
            }
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = line?;
                if let Some(reply) = conversation.send(&line, &engine, &repository, &mut rng) {
                    print_message(reply, json)?;
                }
            }
            info!(
                role = %conversation.role(),
                turns = conversation.messages().len(),
                "chat session ended"
            );
        }
        Commands::Defaulters {
            threshold,
            semester,
            section,
            json,
        } => {
            let (repository, _) = open_repository(&settings).await?;
            let threshold = threshold.unwrap_or(settings.defaulter_threshold);
            let cohort = aggregate::filter_by_cohort(repository.students(), semester, section.as_deref());
            let defaulters = aggregate::classify_defaulters(&cohort, threshold);

            if json {
                println!("{}", serde_json::to_string_pretty(&defaulters)?);
                return Ok(());
            }
            if defaulters.is_empty() {
                println!("No students below {threshold}%.");
                return Ok(());
            }

            println!("Students below {threshold}% (worst first):");
            for student in &defaulters {
                println!(
                    "- {} ({}, semester {} section {}) {}% [{}]",
                    student.name,
                    student.student_id,
                    student.semester,
                    student.section,
                    student.attendance_percentage,
                    aggregate::severity_of(student.attendance_percentage)
                );
            }
            let counts = aggregate::severity_counts(&defaulters);
            println!(
                "Critical: {}, High: {}, Medium: {}",
                counts.critical, counts.high, counts.medium
            );
        }
        Commands::Stats { semester, section } => {
            let (repository, _) = open_repository(&settings).await?;
            let cohort = aggregate::filter_by_cohort(repository.students(), semester, section.as_deref());
            let stats = aggregate::department_stats(
                &cohort,
                settings.defaulter_threshold,
                settings.excellent_threshold,
            );
            let distribution = aggregate::attendance_distribution(&cohort);

            println!(
                "Statistics for {}:",
                cohort_label(semester, section.as_deref()).as_deref().unwrap_or("all cohorts")
            );
            println!("- Students: {}", stats.total_students);
            println!("- Average attendance: {}%", stats.average_attendance);
            println!("- Excellent ({}%+): {}", settings.excellent_threshold, stats.excellent);
            println!("- Below {}%: {}", settings.defaulter_threshold, stats.needing_attention);
            println!(
                "- Distribution: excellent {}, good {}, average {}, poor {}",
                distribution.excellent, distribution.good, distribution.average, distribution.poor
            );
            for semester in aggregate::semester_breakdown(&cohort) {
                println!(
                    "- Semester {}: {} students, {}% avg attendance",
                    semester.semester, semester.student_count, semester.average_attendance
                );
            }

            let ids: std::collections::HashSet<_> = cohort.iter().map(|s| s.id).collect();
            let records: Vec<_> = repository
                .records()
                .iter()
                .filter(|record| ids.contains(&record.student_id))
                .cloned()
                .collect();
            let tally = aggregate::tally(&records);
            println!(
                "- Recorded marks: {} present, {} late, {} absent",
                tally.present, tally.late, tally.absent
            );
        }
        Commands::Mark {
            subject,
            date,
            status,
            absent,
            late,
            semester,
            section,
            save,
        } => {
            let (mut repository, pool) = open_repository(&settings).await?;
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let cohort = aggregate::filter_by_cohort(repository.students(), semester, section.as_deref());

            let mut sheet = AttendanceSheet::new(date, subject);
            sheet.mark_all(&cohort, status);
            for (rolls, override_status) in [(&absent, AttendanceStatus::Absent), (&late, AttendanceStatus::Late)] {
                for roll in rolls {
                    match cohort.iter().find(|student| &student.student_id == roll) {
                        Some(student) => sheet.mark(student.id, override_status),
                        None => warn!(roll = %roll, "roll number not in cohort, skipped"),
                    }
                }
            }

            let summary = aggregate::summarize(&cohort, &sheet);
            println!(
                "{} on {}: {} present, {} absent, {} late, {} unmarked",
                sheet.subject, sheet.date, summary.present, summary.absent, summary.late, summary.unmarked
            );

            if save {
                let records = sheet.to_records(&cohort);
                match pool {
                    Some(pool) => {
                        let inserted = db::save_records(&pool, &records).await?;
                        println!("Saved {inserted} new records ({} already present).", records.len() - inserted);
                    }
                    None => {
                        let submitted = records.len();
                        let inserted = repository.merge_records(records)?;
                        println!(
                            "Recorded {inserted} new marks in memory ({} already present); set DATABASE_URL to persist them.",
                            submitted - inserted
                        );
                    }
                }
            }
        }
        Commands::Report {
            threshold,
            semester,
            section,
            out,
        } => {
            let (repository, _) = open_repository(&settings).await?;
            let threshold = threshold.unwrap_or(settings.defaulter_threshold);
            let cohort = aggregate::filter_by_cohort(repository.students(), semester, section.as_deref());
            let label = cohort_label(semester, section.as_deref());
            let report = report::build_report(
                label.as_deref(),
                threshold,
                settings.excellent_threshold,
                Utc::now().date_naive(),
                &cohort,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Alerts { threshold, channel } => {
            let (repository, _) = open_repository(&settings).await?;
            let threshold = threshold.unwrap_or(settings.defaulter_threshold);
            let defaulters = aggregate::classify_defaulters(repository.students(), threshold);

            if defaulters.is_empty() {
                println!("No students below {threshold}%, no alerts to send.");
                return Ok(());
            }
            for student in &defaulters {
                let alert = notify::low_attendance_alert(student, channel, threshold);
                println!("To: {}", alert.recipient);
                if let Some(subject) = &alert.subject {
                    println!("Subject: {subject}");
                }
                println!("{}\n", alert.body);
            }
            println!("{} alerts rendered.", defaulters.len());
        }
    }

    Ok(())
}
