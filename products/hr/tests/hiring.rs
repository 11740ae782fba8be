mod common;

use chrono::{Duration, Utc};
use common::{ADMIN, EMPLOYEE, HR, HrTestEnv, MANAGER};
use entity::candidate_applications::{self, Status as ApplicationStatus};
use entity::employees::EmploymentType;
use entity::interviews::{InterviewType, Status as InterviewStatus};
use entity::onboarding_tasks::Status as TaskStatus;
use entity::report_history::ReportType;
use platform_api::ApiError;
use platform_authn::{TokenConfig, TokenService};
use platform_notify::MemoryMailer;
use products_hr::candidates::{self, ApplyInput, CandidateRegisterInput};
use products_hr::interviews::{
    self, CancelInput, InterviewQuery, RescheduleInput, ScheduleInput, StatusInput,
};
use products_hr::onboarding::{self, ConvertInput, TaskUpdateInput};
use products_hr::recruitment::{self, JobPostingInput};
use products_hr::reports::{self, HistoryQuery, ReportInput};
use products_hr::uploads::{IncomingFile, UploadStore};
use products_hr::users::{self, UserQuery, UserStatusInput};
use products_hr::load_actor;
use sea_orm::EntityTrait;
use uuid::Uuid;

fn tokens() -> TokenService {
    TokenService::new(TokenConfig {
        access_secret: "access-secret-for-tests".into(),
        refresh_secret: "refresh-secret-for-tests".into(),
        access_ttl_minutes: 15,
        refresh_ttl_days: 7,
        candidate_ttl_days: 7,
    })
}

/// Publishes a posting and files one application for a fresh candidate.
async fn application(env: &HrTestEnv, email: &str) -> candidate_applications::Model {
    let hr = env.actor(HR).await;
    let dir = tempfile::tempdir().unwrap();
    let store = UploadStore::new(dir.path());
    let job = recruitment::create(
        &env.db,
        &hr,
        JobPostingInput {
            title: Some("Platform Engineer".into()),
            description: Some("Keep our clusters healthy and boring.".into()),
            employment_type: Some(EmploymentType::FullTime),
            salary_min_cents: Some(6_000_000),
            salary_max_cents: Some(8_000_000),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    recruitment::publish(&env.db, &hr, job.job.id).await.unwrap();
    let session = candidates::register(
        &env.db,
        &tokens(),
        CandidateRegisterInput {
            email: email.into(),
            password: "Applicant1".into(),
            first_name: "Jordan".into(),
            last_name: "Park".into(),
            phone: None,
        },
    )
    .await
    .unwrap();
    let resume = IncomingFile {
        field: "resume".into(),
        file_name: "cv.pdf".into(),
        content_type: "application/pdf".into(),
        bytes: b"%PDF-1.4 resume".to_vec(),
    };
    candidates::upload_resume(&env.db, &store, session.candidate.id, vec![resume])
        .await
        .unwrap();
    candidates::apply(
        &env.db,
        session.candidate.id,
        job.job.id,
        ApplyInput {
            expected_salary_cents: Some(7_000_000),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

fn slot(application_id: Uuid, days: i64) -> ScheduleInput {
    ScheduleInput {
        application_id,
        scheduled_at: (Utc::now() + Duration::days(days)).fixed_offset(),
        duration_minutes: Some(45),
        interview_type: InterviewType::Video,
        location: None,
        meeting_link: Some("https://meet.example.test/platform".into()),
        interviewers: vec![],
        notes: None,
    }
}

async fn stage(env: &HrTestEnv, id: Uuid) -> ApplicationStatus {
    candidate_applications::Entity::find_by_id(id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn interviews_move_the_application_through_the_pipeline() {
    let env = HrTestEnv::new().await;
    let manager = env.actor(MANAGER).await;
    let hr = env.actor(HR).await;
    let mailer = MemoryMailer::default();
    let app = application(&env, "jordan@example.test").await;

    let booked = interviews::schedule(&env.db, &manager, slot(app.id, 2), &mailer, "Acme")
        .await
        .unwrap();
    assert!(booked.email_sent);
    assert_eq!(booked.interview.job_title.as_deref(), Some("Platform Engineer"));
    assert_eq!(stage(&env, app.id).await, ApplicationStatus::Interview);
    let sent = mailer.sent().await;
    assert_eq!(sent[0].to, "jordan@example.test");
    assert!(sent[0].text.contains("https://meet.example.test/platform"));

    let err = interviews::schedule(&env.db, &hr, slot(app.id, 3), &mailer, "Acme")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Interview is already scheduled for this candidate");

    let employee = env.actor(EMPLOYEE).await;
    let err = interviews::schedule(&env.db, &employee, slot(app.id, 3), &mailer, "Acme")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Denied { .. }));

    let id = booked.interview.interview.id;
    let moved = interviews::reschedule(
        &env.db,
        &hr,
        id,
        RescheduleInput {
            scheduled_at: (Utc::now() + Duration::days(5)).fixed_offset(),
            duration_minutes: Some(600),
            location: None,
            meeting_link: None,
        },
        &mailer,
        "Acme",
    )
    .await
    .unwrap_err();
    assert!(matches!(moved, ApiError::Validation(_)));

    let cancelled = interviews::cancel(
        &env.db,
        &manager,
        id,
        CancelInput {
            reason: Some("Panel unavailable".into()),
        },
        &mailer,
        "Acme",
    )
    .await
    .unwrap();
    assert_eq!(cancelled.interview.interview.status, InterviewStatus::Cancelled);
    assert_eq!(stage(&env, app.id).await, ApplicationStatus::Screening);
    assert!(mailer.sent().await.last().unwrap().text.contains("Panel unavailable"));

    let err = interviews::reschedule(
        &env.db,
        &hr,
        id,
        RescheduleInput {
            scheduled_at: (Utc::now() + Duration::days(5)).fixed_offset(),
            duration_minutes: None,
            location: None,
            meeting_link: None,
        },
        &mailer,
        "Acme",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let again = interviews::schedule(&env.db, &hr, slot(app.id, 4), &mailer, "Acme")
        .await
        .unwrap();
    let err = interviews::update_status(
        &env.db,
        &manager,
        again.interview.interview.id,
        StatusInput {
            status: InterviewStatus::Completed,
            feedback: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let listed = interviews::list(&env.db, &manager, InterviewQuery::default())
        .await
        .unwrap();
    assert_eq!(listed.pagination.total, 1);
    let listed = interviews::list(&env.db, &hr, InterviewQuery::default())
        .await
        .unwrap();
    assert_eq!(listed.pagination.total, 2);
}

#[tokio::test]
async fn converting_a_candidate_seeds_onboarding() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let mailer = MemoryMailer::default();
    let app = application(&env, "sam@example.test").await;

    let booked = interviews::schedule(&env.db, &hr, slot(app.id, 1), &mailer, "Acme")
        .await
        .unwrap();
    interviews::update_status(
        &env.db,
        &hr,
        booked.interview.interview.id,
        StatusInput {
            status: InterviewStatus::Completed,
            feedback: Some("Strong systems background".into()),
        },
    )
    .await
    .unwrap();
    let ready = onboarding::ready(&env.db, &hr).await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].interviews_completed, 1);

    let manager = env.actor(MANAGER).await;
    let err = onboarding::convert(
        &env.db,
        &manager,
        ConvertInput {
            application_id: app.id,
            position: None,
            department_id: None,
            manager_id: None,
            salary_cents: None,
            employment_type: None,
            start_date: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Denied { .. }));

    let input = ConvertInput {
        application_id: app.id,
        position: None,
        department_id: Some(env.engineering()),
        manager_id: Some(env.employee(MANAGER)),
        salary_cents: None,
        employment_type: None,
        start_date: Some(Utc::now().date_naive()),
    };
    let conversion = onboarding::convert(&env.db, &hr, input.clone()).await.unwrap();
    let hire = &conversion.created.employee.employee;
    assert_eq!(hire.position, "Platform Engineer");
    assert_eq!(hire.salary_cents, Some(7_000_000));
    assert!(conversion.created.temporary_password.is_some());
    assert_eq!(conversion.onboarding.len(), 5);
    assert_eq!(conversion.onboarding[0].title, "Manager introduction");
    assert_eq!(stage(&env, app.id).await, ApplicationStatus::Hired);

    let err = onboarding::convert(&env.db, &hr, input).await.unwrap_err();
    assert_eq!(err.to_string(), "Candidate has already been converted to employee");
    assert!(onboarding::ready(&env.db, &hr).await.unwrap().is_empty());

    let newcomer = load_actor(&env.db, hire.user_id).await.unwrap();
    let own = onboarding::status(&env.db, &newcomer, hire.id).await.unwrap();
    assert_eq!((own.total, own.status), (5, TaskStatus::Pending));
    let colleague = env.actor(EMPLOYEE).await;
    let err = onboarding::status(&env.db, &colleague, hire.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Denied { .. }));

    let task = conversion.onboarding[2].id;
    let progress = onboarding::update_task(
        &env.db,
        &hr,
        hire.id,
        task,
        TaskUpdateInput {
            status: TaskStatus::Completed,
            notes: Some("Laptop imaged".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!((progress.completed, progress.percent), (1, 20));
    assert_eq!(progress.status, TaskStatus::InProgress);
    let done = progress.tasks.iter().find(|t| t.id == task).unwrap();
    assert_eq!(done.completed_by, Some(hr.user_id));

    let history = onboarding::history(&env.db, &hr).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].employee_name.as_deref(), Some("Jordan Park"));
    assert_eq!((history[0].tasks_completed, history[0].tasks_total), (1, 5));
}

#[tokio::test]
async fn account_admin_guards_admins_and_mirrors_the_employee() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let admin = env.actor(ADMIN).await;

    let listed = users::list(&env.db, &hr, UserQuery::default()).await.unwrap();
    assert_eq!(listed.pagination.total, 4);
    let employee_row = listed
        .items
        .iter()
        .find(|u| u.user.email == EMPLOYEE)
        .unwrap();
    assert!(employee_row.permissions.contains(&"attendance:clock"));
    assert_eq!(
        employee_row.user.employee.as_ref().unwrap().position,
        "Software Engineer"
    );

    let err = users::set_status(&env.db, &hr, admin.user_id, UserStatusInput { is_active: false })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    let err = users::set_status(&env.db, &hr, hr.user_id, UserStatusInput { is_active: false })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let target = employee_row.user.id;
    let off = users::set_status(&env.db, &hr, target, UserStatusInput { is_active: false })
        .await
        .unwrap();
    assert!(!off.user.is_active);
    let staff = entity::employees::Entity::find_by_id(env.employee(EMPLOYEE))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!staff.is_active);
    assert!(staff.termination_date.is_some());
    assert!(matches!(
        load_actor(&env.db, target).await.unwrap_err(),
        ApiError::Unauthorized(_)
    ));

    users::set_status(&env.db, &hr, target, UserStatusInput { is_active: true })
        .await
        .unwrap();
    let err = users::delete(&env.db, &hr, target).await.unwrap_err();
    assert!(matches!(err, ApiError::Denied { .. }));
    users::delete(&env.db, &admin, target).await.unwrap();
    let err = users::delete(&env.db, &admin, target).await.unwrap_err();
    assert_eq!(err.to_string(), "User is already deactivated");
    let err = users::delete(&env.db, &admin, admin.user_id).await.unwrap_err();
    assert_eq!(err.to_string(), "You cannot delete your own account");
}

#[tokio::test]
async fn generated_reports_are_saved_per_org() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    application(&env, "lee@example.test").await;
    let today = Utc::now().date_naive();

    let staff = reports::generate(
        &env.db,
        &hr,
        ReportInput {
            report_type: ReportType::Employee,
            start_date: today - Duration::days(30),
            end_date: today,
        },
    )
    .await
    .unwrap();
    assert_eq!(staff.summary["headcount"], 4);
    assert_eq!(staff.summary["hires"], 0);

    let hiring = reports::generate(
        &env.db,
        &hr,
        ReportInput {
            report_type: ReportType::Recruitment,
            start_date: today - Duration::days(1),
            end_date: today,
        },
    )
    .await
    .unwrap();
    assert_eq!(hiring.summary["applications"], 1);
    assert_eq!(hiring.summary["byStatus"]["APPLIED"], 1);

    let err = reports::generate(
        &env.db,
        &hr,
        ReportInput {
            report_type: ReportType::Leave,
            start_date: today,
            end_date: today - Duration::days(1),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let employee = env.actor(EMPLOYEE).await;
    assert!(reports::history(&env.db, &employee, HistoryQuery::default()).await.is_err());

    let saved = reports::history(&env.db, &hr, HistoryQuery::default()).await.unwrap();
    assert_eq!(saved.pagination.total, 2);
    assert!(saved.items.iter().any(|r| r.report_type == ReportType::Recruitment));
    let only_staff = reports::history(
        &env.db,
        &hr,
        HistoryQuery {
            report_type: Some(ReportType::Employee),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(only_staff.pagination.total, 1);
}
