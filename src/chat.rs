//! Keyword-driven chat assistant.
//!
//! Each role owns an ordered rule table. A message is lower-cased and tested
//! against the rules top to bottom; the first hit produces the reply and the
//! rest are never consulted. Rule order therefore decides ties such as
//! "hi, any defaulters?".
//!
//! Phrasing variety comes from an injected RNG. Figures and attached lists
//! are always recomputed from the repository and never depend on it.

use std::fmt::Write;

use rand::seq::SliceRandom;
use rand::RngCore;
use tracing::debug;

use crate::aggregate;
use crate::config::Settings;
use crate::models::{AttachedData, ChatMessage, ChatReply, Role};
use crate::repository::Repository;

const FORECAST_WINDOW_DAYS: usize = 7;

const TEACHER_GREETINGS: &[&str] = &[
    "Hello! I'm your attendance assistant for the Computer Science Department. How can I help you today?",
    "Hi there! I can help you with attendance queries, forecasts and insights for CS students.",
    "Welcome! I'm here to assist with all your Computer Science Department attendance questions.",
];

const STUDENT_GREETINGS: &[&str] = &[
    "Hello! I can tell you about attendance rules, leave and your department's figures.",
    "Hi! Ask me about the attendance requirement, applying for leave or your subjects.",
    "Welcome back! What would you like to know about attendance this semester?",
];

const DEFAULTER_PHRASES: &[&str] = &[
    "Here are the CS students who need attention regarding their attendance:",
    "I've identified Computer Science students with concerning attendance patterns:",
    "These CS students have attendance below the required threshold:",
];

const FORECAST_PHRASES: &[&str] = &[
    "Based on current trends in the CS department, here's my attendance forecast:",
    "Looking at recent CS attendance records, I expect:",
    "My projection for Computer Science students suggests:",
];

const SUBJECT_PHRASES: &[&str] = &[
    "Here are the subjects being taught in the Computer Science Department:",
    "Current CS curriculum includes these subjects:",
    "Computer Science subjects this semester:",
];

const TEACHER_WELCOME: &str = "Hi! I'm your attendance assistant. I can help you analyze attendance patterns, identify students who need attention, and forecast upcoming attendance. What would you like to know?";

const STUDENT_WELCOME: &str = "Hi! I'm your attendance assistant. Ask me about the attendance requirement, leave, subjects or department statistics.";

/// How a rule's keywords are compared against the normalized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordMatch {
    /// Keyword appears anywhere in the message.
    Substring,
    /// Keyword equals one whole word, split on non-alphanumerics. Stricter
    /// than `Substring`: "hi" no longer fires on "which", and stretched
    /// forms such as "hellooo" or "hiya" no longer match either.
    Word,
}

pub type Handler = fn(&ResponseEngine, &Repository, &mut dyn RngCore) -> ChatReply;

pub struct Rule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub matching: KeywordMatch,
    handler: Handler,
}

impl Rule {
    pub fn matches(&self, normalized: &str) -> bool {
        match self.matching {
            KeywordMatch::Substring => self
                .keywords
                .iter()
                .any(|keyword| normalized.contains(keyword)),
            KeywordMatch::Word => normalized
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| self.keywords.contains(&word)),
        }
    }
}

static TEACHER_RULES: [Rule; 6] = [
    Rule {
        name: "defaulters",
        keywords: &["defaulter", "low attendance", "at risk"],
        matching: KeywordMatch::Substring,
        handler: defaulters,
    },
    Rule {
        name: "greeting",
        keywords: &["hello", "hi"],
        matching: KeywordMatch::Word,
        handler: teacher_greeting,
    },
    Rule {
        name: "forecast",
        keywords: &["predict", "forecast"],
        matching: KeywordMatch::Substring,
        handler: forecast,
    },
    Rule {
        name: "subjects",
        keywords: &["subject", "course"],
        matching: KeywordMatch::Substring,
        handler: subjects,
    },
    Rule {
        name: "statistics",
        keywords: &["attendance", "stats"],
        matching: KeywordMatch::Substring,
        handler: teacher_statistics,
    },
    Rule {
        name: "semesters",
        keywords: &["semester", "year"],
        matching: KeywordMatch::Substring,
        handler: semesters,
    },
];

static STUDENT_RULES: [Rule; 6] = [
    Rule {
        name: "defaulters",
        keywords: &["defaulter", "low attendance", "at risk"],
        matching: KeywordMatch::Substring,
        handler: defaulters,
    },
    Rule {
        name: "greeting",
        keywords: &["hello", "hi"],
        matching: KeywordMatch::Word,
        handler: student_greeting,
    },
    Rule {
        name: "policy",
        keywords: &["policy", "minimum", "required"],
        matching: KeywordMatch::Substring,
        handler: policy,
    },
    Rule {
        name: "leave",
        keywords: &["leave", "absent"],
        matching: KeywordMatch::Substring,
        handler: leave,
    },
    Rule {
        name: "subjects",
        keywords: &["subject", "course"],
        matching: KeywordMatch::Substring,
        handler: subjects,
    },
    Rule {
        name: "statistics",
        keywords: &["attendance", "stats"],
        matching: KeywordMatch::Substring,
        handler: student_statistics,
    },
];

/// Ordered rule table for a role.
pub fn rules_for(role: Role) -> &'static [Rule] {
    match role {
        Role::Teacher => &TEACHER_RULES,
        Role::Student => &STUDENT_RULES,
    }
}

#[derive(Debug, Clone)]
pub struct ResponseEngine {
    pub list_threshold: f64,
    pub attention_threshold: f64,
    pub excellent_threshold: f64,
}

impl Default for ResponseEngine {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl ResponseEngine {
    pub fn new(settings: &Settings) -> Self {
        Self {
            list_threshold: settings.chat_list_threshold,
            attention_threshold: settings.defaulter_threshold,
            excellent_threshold: settings.excellent_threshold,
        }
    }

    /// First rule of the role's table that matches, if any.
    pub fn matched_rule(&self, message: &str, role: Role) -> Option<&'static Rule> {
        let normalized = message.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        rules_for(role).iter().find(|rule| rule.matches(&normalized))
    }

    pub fn respond<R: RngCore>(
        &self,
        message: &str,
        role: Role,
        repository: &Repository,
        rng: &mut R,
    ) -> ChatReply {
        let rng: &mut dyn RngCore = rng;
        match self.matched_rule(message, role) {
            Some(rule) => {
                debug!(%role, rule = rule.name, "chat rule matched");
                (rule.handler)(self, repository, rng)
            }
            None => {
                debug!(%role, "no chat rule matched, using help text");
                fallback(role)
            }
        }
    }
}

fn pick(phrases: &'static [&'static str], rng: &mut dyn RngCore) -> &'static str {
    phrases.choose(rng).copied().unwrap_or_default()
}

fn defaulters(engine: &ResponseEngine, repository: &Repository, rng: &mut dyn RngCore) -> ChatReply {
    let students = aggregate::classify_defaulters(repository.students(), engine.list_threshold);
    let text = if students.is_empty() {
        format!(
            "Good news: no CS students are below {}% attendance right now.",
            engine.list_threshold
        )
    } else {
        pick(DEFAULTER_PHRASES, rng).to_string()
    };
    ChatReply::list(text, AttachedData::Students(students))
}

fn teacher_greeting(_: &ResponseEngine, _: &Repository, rng: &mut dyn RngCore) -> ChatReply {
    ChatReply::text(pick(TEACHER_GREETINGS, rng))
}

fn student_greeting(_: &ResponseEngine, _: &Repository, rng: &mut dyn RngCore) -> ChatReply {
    ChatReply::text(pick(STUDENT_GREETINGS, rng))
}

fn forecast(_: &ResponseEngine, repository: &Repository, rng: &mut dyn RngCore) -> ChatReply {
    let lead = pick(FORECAST_PHRASES, rng);
    match aggregate::forecast(repository.records(), FORECAST_WINDOW_DAYS) {
        Some(projected) => ChatReply::text(format!(
            "{lead} The overall CS department attendance is likely to be {projected}% next week, based on the last {FORECAST_WINDOW_DAYS} days of records."
        )),
        None => ChatReply::text(format!(
            "{lead} There are no daily records yet, so attendance should stay near the current average of {}%.",
            aggregate::average_percentage(repository.students())
        )),
    }
}

fn subjects(_: &ResponseEngine, repository: &Repository, rng: &mut dyn RngCore) -> ChatReply {
    ChatReply::list(
        pick(SUBJECT_PHRASES, rng),
        AttachedData::Subjects(repository.subjects().to_vec()),
    )
}

fn teacher_statistics(engine: &ResponseEngine, repository: &Repository, _: &mut dyn RngCore) -> ChatReply {
    let stats = aggregate::department_stats(
        repository.students(),
        engine.attention_threshold,
        engine.excellent_threshold,
    );
    ChatReply::text(format!(
        "Current Computer Science Department statistics:\n\
         • Average attendance: {}%\n\
         • Students with excellent attendance ({}%+): {}\n\
         • Total CS students: {}\n\
         • Students needing attention: {}",
        stats.average_attendance,
        engine.excellent_threshold,
        stats.excellent,
        stats.total_students,
        stats.needing_attention
    ))
}

fn semesters(_: &ResponseEngine, repository: &Repository, _: &mut dyn RngCore) -> ChatReply {
    let mut text = String::from("Computer Science Department semester-wise statistics:");
    let breakdown = aggregate::semester_breakdown(repository.students());
    if breakdown.is_empty() {
        text.push_str("\nNo students on record.");
    }
    for semester in breakdown {
        let _ = write!(
            text,
            "\nSemester {}: {} students, {}% avg attendance",
            semester.semester, semester.student_count, semester.average_attendance
        );
    }
    ChatReply::text(text)
}

fn policy(engine: &ResponseEngine, _: &Repository, _: &mut dyn RngCore) -> ChatReply {
    ChatReply::text(format!(
        "The department requires at least {}% attendance in every subject.\n\
         • Below 75%: Medium risk, your parents are notified\n\
         • Below 65%: High risk, meet your class advisor\n\
         • Below 50%: Critical, you may be barred from examinations",
        engine.attention_threshold
    ))
}

fn leave(_: &ResponseEngine, _: &Repository, _: &mut dyn RngCore) -> ChatReply {
    ChatReply::text(
        "To apply for leave, open Leave Application, choose the dates and a reason, \
         and attach a medical certificate for sick leave. Approved leave is not \
         counted against your attendance.",
    )
}

fn student_statistics(engine: &ResponseEngine, repository: &Repository, _: &mut dyn RngCore) -> ChatReply {
    let stats = aggregate::department_stats(
        repository.students(),
        engine.attention_threshold,
        engine.excellent_threshold,
    );
    ChatReply::text(format!(
        "The department average attendance is {}% across {} students. The minimum requirement is {}%.",
        stats.average_attendance, stats.total_students, engine.attention_threshold
    ))
}

fn fallback(role: Role) -> ChatReply {
    match role {
        Role::Teacher => ChatReply::text(
            "I can help you with Computer Science Department queries:\n\
             • Check CS student attendance statistics\n\
             • Find students with low attendance\n\
             • Forecast attendance trends\n\
             • Semester-wise analysis\n\
             • Subjects taught this semester\n\n\
             What would you like to know about the CS department?",
        ),
        Role::Student => ChatReply::text(
            "I can help you with:\n\
             • The minimum attendance requirement\n\
             • Applying for leave\n\
             • Your subjects this semester\n\
             • Department attendance statistics\n\n\
             What would you like to know?",
        ),
    }
}

/// One caller's transcript. Messages are only ever appended.
#[derive(Debug, Clone)]
pub struct Conversation {
    role: Role,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(role: Role) -> Self {
        let welcome = match role {
            Role::Teacher => TEACHER_WELCOME,
            Role::Student => STUDENT_WELCOME,
        };
        Self {
            role,
            messages: vec![ChatMessage::from_bot(ChatReply::text(welcome))],
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Appends the user turn and the reply, returning the reply. Blank input
    /// is dropped without touching the transcript.
    pub fn send<R: RngCore>(
        &mut self,
        text: &str,
        engine: &ResponseEngine,
        repository: &Repository,
        rng: &mut R,
    ) -> Option<&ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }

        self.messages.push(ChatMessage::from_user(text));
        let reply = engine.respond(text, self.role, repository, rng);
        self.messages.push(ChatMessage::from_bot(reply));
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResponseType, Sender, Student};
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn repository() -> Repository {
        Repository::seeded(11, NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()).unwrap()
    }

    fn attached_students(reply: &ChatReply) -> Vec<Student> {
        match &reply.data {
            Some(AttachedData::Students(students)) => students.clone(),
            other => panic!("expected a student list, got {other:?}"),
        }
    }

    #[test]
    fn teacher_hello_returns_greeting() {
        let repo = repository();
        let mut rng = StdRng::seed_from_u64(1);
        let reply = ResponseEngine::default().respond("Hello", Role::Teacher, &repo, &mut rng);

        assert!(TEACHER_GREETINGS.contains(&reply.text.as_str()));
        assert!(reply.data.is_none());
        assert_eq!(reply.response_type(), ResponseType::Text);
    }

    #[test]
    fn defaulter_request_is_not_fallback() {
        let repo = repository();
        let engine = ResponseEngine::default();
        let mut rng = StdRng::seed_from_u64(2);

        let rule = engine.matched_rule("show me defaulters please", Role::Teacher);
        assert_eq!(rule.map(|r| r.name), Some("defaulters"));

        let reply = engine.respond("show me defaulters please", Role::Teacher, &repo, &mut rng);
        assert!(DEFAULTER_PHRASES.contains(&reply.text.as_str()));
        let names: Vec<String> = attached_students(&reply).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Rahul Singh", "Priya Gupta"]);
    }

    #[test]
    fn defaulter_keyword_always_lists_below_eighty() {
        let repo = repository();
        let engine = ResponseEngine::default();
        let expected = aggregate::classify_defaulters(repo.students(), 80.0);

        for role in [Role::Teacher, Role::Student] {
            for message in ["defaulter", "Hello, any DEFAULTERS?", "attendance defaulter stats"] {
                let mut rng = StdRng::seed_from_u64(3);
                let reply = engine.respond(message, role, &repo, &mut rng);
                assert_eq!(attached_students(&reply), expected, "{role} / {message}");
            }
        }
    }

    #[test]
    fn empty_defaulter_list_still_attached() {
        let repo = Repository::new(Vec::new(), Vec::new());
        let mut rng = StdRng::seed_from_u64(4);
        let reply = ResponseEngine::default().respond("low attendance", Role::Teacher, &repo, &mut rng);
        assert!(attached_students(&reply).is_empty());
        assert_eq!(reply.response_type(), ResponseType::List);
    }

    #[test]
    fn blank_and_unknown_messages_fall_back() {
        let repo = repository();
        let engine = ResponseEngine::default();
        let mut rng = StdRng::seed_from_u64(5);

        for message in ["", "   ", "xyzzy"] {
            assert!(engine.matched_rule(message, Role::Teacher).is_none());
            let reply = engine.respond(message, Role::Teacher, &repo, &mut rng);
            assert_eq!(reply, fallback(Role::Teacher));
        }
        let reply = engine.respond("\t", Role::Student, &repo, &mut rng);
        assert_eq!(reply, fallback(Role::Student));
    }

    #[test]
    fn earlier_rule_wins_on_overlap() {
        let engine = ResponseEngine::default();
        let rule = engine.matched_rule("forecast attendance for next semester", Role::Teacher);
        assert_eq!(rule.map(|r| r.name), Some("forecast"));

        let rule = engine.matched_rule("attendance by semester", Role::Teacher);
        assert_eq!(rule.map(|r| r.name), Some("statistics"));
    }

    #[test]
    fn greeting_needs_a_whole_word() {
        let engine = ResponseEngine::default();
        let rule = engine.matched_rule("which subjects run this term", Role::Teacher);
        assert_eq!(rule.map(|r| r.name), Some("subjects"));

        let rule = engine.matched_rule("hi!", Role::Student);
        assert_eq!(rule.map(|r| r.name), Some("greeting"));

        assert!(engine.matched_rule("hellooo", Role::Teacher).is_none());
        let rule = engine.matched_rule("hello, there", Role::Teacher);
        assert_eq!(rule.map(|r| r.name), Some("greeting"));
    }

    #[test]
    fn same_seed_same_phrasing() {
        let repo = repository();
        let engine = ResponseEngine::default();
        let first = engine.respond("hello", Role::Teacher, &repo, &mut StdRng::seed_from_u64(9));
        let second = engine.respond("hello", Role::Teacher, &repo, &mut StdRng::seed_from_u64(9));
        assert_eq!(first, second);
    }

    #[test]
    fn forecast_figure_ignores_rng() {
        let repo = repository();
        let engine = ResponseEngine::default();
        let projected = aggregate::forecast(repo.records(), FORECAST_WINDOW_DAYS).unwrap();
        let figure = format!("likely to be {projected}%");

        for seed in 0..10 {
            let reply = engine.respond("predict next week", Role::Teacher, &repo, &mut StdRng::seed_from_u64(seed));
            assert!(reply.text.contains(&figure), "{}", reply.text);
        }
    }

    #[test]
    fn teacher_statistics_match_aggregates() {
        let repo = repository();
        let mut rng = StdRng::seed_from_u64(6);
        let reply = ResponseEngine::default().respond("What's the attendance stats?", Role::Teacher, &repo, &mut rng);

        // 85, 92, 65, 78, 95, 88
        assert!(reply.text.contains("Average attendance: 84%"), "{}", reply.text);
        assert!(reply.text.contains("Total CS students: 6"));
        assert!(reply.text.contains("Students needing attention: 1"));
    }

    #[test]
    fn semester_breakdown_lists_each_semester() {
        let repo = repository();
        let mut rng = StdRng::seed_from_u64(6);
        let reply = ResponseEngine::default().respond("semester wise", Role::Teacher, &repo, &mut rng);
        assert!(reply.text.contains("Semester 4: 1 students, 88% avg attendance"));
        assert!(reply.text.contains("Semester 6: 5 students"));
    }

    #[test]
    fn subjects_are_attached() {
        let repo = repository();
        let mut rng = StdRng::seed_from_u64(7);
        let reply = ResponseEngine::default().respond("which courses?", Role::Student, &repo, &mut rng);
        match reply.data {
            Some(AttachedData::Subjects(subjects)) => assert_eq!(subjects.len(), 5),
            other => panic!("expected subjects, got {other:?}"),
        }
    }

    #[test]
    fn student_rules_cover_policy_and_leave() {
        let engine = ResponseEngine::default();
        let rule = engine.matched_rule("What is the minimum required?", Role::Student);
        assert_eq!(rule.map(|r| r.name), Some("policy"));

        let rule = engine.matched_rule("How do I apply for leave", Role::Student);
        assert_eq!(rule.map(|r| r.name), Some("leave"));

        // teachers have no leave rule
        assert!(engine.matched_rule("apply for leave", Role::Teacher).is_none());
    }

    #[test]
    fn student_statistics_hide_names() {
        let repo = repository();
        let mut rng = StdRng::seed_from_u64(8);
        let reply = ResponseEngine::default().respond("attendance stats", Role::Student, &repo, &mut rng);
        assert!(reply.data.is_none());
        assert!(!reply.text.contains("Rahul"));
        assert!(reply.text.contains("84%"));
    }

    #[test]
    fn conversation_appends_turns() {
        let repo = repository();
        let engine = ResponseEngine::default();
        let mut rng = StdRng::seed_from_u64(10);
        let mut conversation = Conversation::new(Role::Teacher);
        assert_eq!(conversation.messages().len(), 1);

        assert!(conversation.send("   ", &engine, &repo, &mut rng).is_none());
        assert_eq!(conversation.messages().len(), 1);

        let reply = conversation
            .send("Show me defaulters", &engine, &repo, &mut rng)
            .cloned()
            .unwrap();
        assert_eq!(reply.sender, Sender::Bot);
        assert_eq!(reply.response_type, ResponseType::List);

        let messages = conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[1].text, "Show me defaulters");
        assert_ne!(messages[1].id, messages[2].id);
    }
}
