//! Plain-text recruitment mails.

use crate::OutgoingEmail;

pub fn application_received(company: &str, job_title: &str, name: &str, to: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Thank You for Applying to {job_title} at {company}"),
        text: format!(
            "Hi {name},\n\n\
             Thank you for applying for the {job_title} position at {company}. \
             We've received your application and will review it shortly.\n\n\
             Our recruitment team typically reviews applications within 2-3 business days.\n\n\
             Best regards,\n{company} HR Team"
        ),
    }
}

pub fn selected(
    company: &str,
    job_title: &str,
    name: &str,
    to: &str,
    next_steps: Option<&str>,
) -> OutgoingEmail {
    let next = next_steps.unwrap_or(
        "Our HR team will reach out to you within the next 2-3 business days with details \
         regarding your onboarding process.",
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Congratulations! You've Been Selected for {job_title}"),
        text: format!(
            "Hi {name},\n\n\
             We're thrilled to inform you that you've been selected for the {job_title} \
             position at {company}!\n\n{next}\n\n\
             Warm regards,\n{company} HR Team"
        ),
    }
}

pub fn rejected(
    company: &str,
    job_title: &str,
    name: &str,
    to: &str,
    feedback: Option<&str>,
) -> OutgoingEmail {
    let feedback = feedback.unwrap_or(
        "While we were impressed with your qualifications, we've decided to move forward \
         with other candidates whose experience more closely matches our current needs.",
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Update on Your Application for {job_title}"),
        text: format!(
            "Hi {name},\n\n\
             Thank you for your interest in the {job_title} position at {company}.\n\n\
             {feedback}\n\n\
             We encourage you to apply for future opportunities that match your skills.\n\n\
             Best wishes,\n{company} Recruitment Team"
        ),
    }
}

/// Slot details shared by the interview mails. `when` is preformatted.
pub struct InterviewSlot<'a> {
    pub job_title: &'a str,
    pub when: &'a str,
    pub kind: &'a str,
    pub location: Option<&'a str>,
    pub meeting_link: Option<&'a str>,
}

fn slot_lines(slot: &InterviewSlot<'_>) -> String {
    let mut lines = format!("When: {}\nFormat: {}", slot.when, slot.kind);
    if let Some(location) = slot.location {
        lines.push_str(&format!("\nLocation: {location}"));
    }
    if let Some(link) = slot.meeting_link {
        lines.push_str(&format!("\nMeeting link: {link}"));
    }
    lines
}

pub fn interview_scheduled(company: &str, slot: &InterviewSlot<'_>, name: &str, to: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Interview Scheduled: {} at {company}", slot.job_title),
        text: format!(
            "Hi {name},\n\n\
             Your interview for the {} position at {company} has been scheduled.\n\n{}\n\n\
             Please reply to this email if you need to reschedule.\n\n\
             Best regards,\n{company} Recruitment Team",
            slot.job_title,
            slot_lines(slot)
        ),
    }
}

pub fn interview_rescheduled(company: &str, slot: &InterviewSlot<'_>, name: &str, to: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Interview Rescheduled: {} at {company}", slot.job_title),
        text: format!(
            "Hi {name},\n\n\
             Your interview for the {} position at {company} has moved.\n\n{}\n\n\
             Best regards,\n{company} Recruitment Team",
            slot.job_title,
            slot_lines(slot)
        ),
    }
}

pub fn interview_cancelled(
    company: &str,
    job_title: &str,
    name: &str,
    to: &str,
    reason: Option<&str>,
) -> OutgoingEmail {
    let reason = reason
        .map(|r| format!("Reason: {r}\n\n"))
        .unwrap_or_default();
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Interview Cancelled: {job_title} at {company}"),
        text: format!(
            "Hi {name},\n\n\
             Your interview for the {job_title} position at {company} has been cancelled.\n\n\
             {reason}Our recruitment team will be in touch about next steps.\n\n\
             Best regards,\n{company} Recruitment Team"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_uses_default_feedback() {
        let mail = rejected("Acme", "Engineer", "Ada", "ada@example.test", None);
        assert_eq!(mail.subject, "Update on Your Application for Engineer");
        assert!(mail.text.contains("move forward with other candidates"));
    }

    #[test]
    fn selection_mentions_company() {
        let mail = selected("Acme", "Engineer", "Ada", "ada@example.test", Some("Start Monday."));
        assert!(mail.text.contains("position at Acme"));
        assert!(mail.text.ends_with("Acme HR Team"));
        assert!(mail.text.contains("Start Monday."));
    }

    #[test]
    fn interview_mail_lists_only_known_slot_details() {
        let slot = InterviewSlot {
            job_title: "Engineer",
            when: "2026-11-02 14:00 UTC",
            kind: "VIDEO",
            location: None,
            meeting_link: Some("https://meet.example.test/abc"),
        };
        let mail = interview_scheduled("Acme", &slot, "Ada", "ada@example.test");
        assert_eq!(mail.subject, "Interview Scheduled: Engineer at Acme");
        assert!(mail.text.contains("Meeting link: https://meet.example.test/abc"));
        assert!(!mail.text.contains("Location:"));
    }

    #[test]
    fn cancellation_includes_reason_when_given() {
        let mail = interview_cancelled("Acme", "Engineer", "Ada", "ada@example.test", Some("Role paused"));
        assert!(mail.text.contains("Reason: Role paused"));
        let mail = interview_cancelled("Acme", "Engineer", "Ada", "ada@example.test", None);
        assert!(!mail.text.contains("Reason:"));
    }
}
