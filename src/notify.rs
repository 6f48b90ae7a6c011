use crate::models::Student;

/// Delivery channel for parent alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Sms,
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            other => Err(format!("unknown channel '{other}', expected email or sms")),
        }
    }
}

pub const LOW_ATTENDANCE_SUBJECT: &str = "Attendance Alert - Computer Science Department";

const LOW_ATTENDANCE_EMAIL: &str = "Dear Parent,

This is to inform you that your ward {studentName} (Student ID: {studentId}) has low attendance in the Computer Science Department.

Current Attendance: {attendance}
Required Minimum: {threshold}

Please ensure regular attendance to avoid academic issues.

Best regards,
Computer Science Department";

const LOW_ATTENDANCE_SMS: &str = "Alert: {studentName} has {attendance} attendance in CS Dept. Minimum required: {threshold}. Please ensure regular attendance.";

/// A rendered alert, ready to hand to a mail or SMS gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentAlert {
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
}

pub fn render(template: &str, student: &Student, threshold: f64) -> String {
    template
        .replace("{studentName}", &student.name)
        .replace("{studentId}", &student.student_id)
        .replace("{attendance}", &format!("{}%", student.attendance_percentage))
        .replace("{threshold}", &format!("{threshold}%"))
}

pub fn low_attendance_alert(student: &Student, channel: Channel, threshold: f64) -> ParentAlert {
    match channel {
        Channel::Email => ParentAlert {
            recipient: student.parent_email.clone(),
            subject: Some(LOW_ATTENDANCE_SUBJECT.to_string()),
            body: render(LOW_ATTENDANCE_EMAIL, student, threshold),
        },
        Channel::Sms => ParentAlert {
            recipient: student.parent_phone.clone(),
            subject: None,
            body: render(LOW_ATTENDANCE_SMS, student, threshold),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn student() -> Student {
        Student {
            id: Uuid::new_v4(),
            student_id: "CS2021003".to_string(),
            name: "Rahul Singh".to_string(),
            email: "rahul.singh@csdept.edu".to_string(),
            semester: 6,
            section: "B".to_string(),
            year: 2024,
            parent_email: "rahul.parent@email.com".to_string(),
            parent_phone: "+91-9876543212".to_string(),
            total_classes: 120,
            attended_classes: 78,
            attendance_percentage: 65.0,
        }
    }

    #[test]
    fn email_alert_fills_every_placeholder() {
        let alert = low_attendance_alert(&student(), Channel::Email, 75.0);
        assert_eq!(alert.recipient, "rahul.parent@email.com");
        assert_eq!(alert.subject.as_deref(), Some(LOW_ATTENDANCE_SUBJECT));
        assert!(alert.body.contains("Rahul Singh (Student ID: CS2021003)"));
        assert!(alert.body.contains("Current Attendance: 65%"));
        assert!(alert.body.contains("Required Minimum: 75%"));
        assert!(!alert.body.contains('{'));
    }

    #[test]
    fn sms_alert_goes_to_phone() {
        let alert = low_attendance_alert(&student(), Channel::Sms, 70.0);
        assert_eq!(alert.recipient, "+91-9876543212");
        assert!(alert.subject.is_none());
        assert_eq!(
            alert.body,
            "Alert: Rahul Singh has 65% attendance in CS Dept. Minimum required: 70%. Please ensure regular attendance."
        );
    }

    #[test]
    fn channel_parses() {
        assert_eq!("SMS".parse::<Channel>().unwrap(), Channel::Sms);
        assert!("fax".parse::<Channel>().is_err());
    }
}
