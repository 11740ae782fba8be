//! sea-orm entities backing the HRMS schema.
//!
//! Every staff-facing table carries an `org_id`; candidates are the only
//! global accounts.

pub mod attendance;
pub mod audit_logs;
pub mod candidate_applications;
pub mod candidates;
pub mod departments;
pub mod employees;
pub mod interviews;
pub mod job_postings;
pub mod leave_requests;
pub mod onboarding_tasks;
pub mod orgs;
pub mod payroll_records;
pub mod performance_reviews;
pub mod report_history;
pub mod uploads;
pub mod users;

pub mod prelude {
    pub use super::attendance::Entity as Attendance;
    pub use super::audit_logs::Entity as AuditLog;
    pub use super::candidate_applications::Entity as CandidateApplication;
    pub use super::candidates::Entity as Candidate;
    pub use super::departments::Entity as Department;
    pub use super::employees::Entity as Employee;
    pub use super::interviews::Entity as Interview;
    pub use super::job_postings::Entity as JobPosting;
    pub use super::leave_requests::Entity as LeaveRequest;
    pub use super::onboarding_tasks::Entity as OnboardingTask;
    pub use super::orgs::Entity as Org;
    pub use super::payroll_records::Entity as PayrollRecord;
    pub use super::performance_reviews::Entity as PerformanceReview;
    pub use super::report_history::Entity as ReportHistory;
    pub use super::uploads::Entity as Upload;
    pub use super::users::Entity as User;
}
