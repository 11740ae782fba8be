mod common;

use chrono::{Duration, Utc};
use common::{EMPLOYEE, HR, HrTestEnv};
use entity::candidate_applications::Status as ApplicationStatus;
use entity::employees::EmploymentType;
use entity::job_postings::Status as JobStatus;
use platform_api::ApiError;
use platform_authn::{TokenConfig, TokenKind, TokenService};
use platform_notify::MemoryMailer;
use products_hr::candidates::{
    self, ApplyInput, CandidateLoginInput, CandidateRegisterInput, PageQuery, ProfileInput,
};
use products_hr::recruitment::{
    self, ApplicationStatusInput, JobPostingInput, JobQuery, PublicJobQuery,
};
use products_hr::reports;
use products_hr::uploads::{IncomingFile, UploadStore};

fn tokens() -> TokenService {
    TokenService::new(TokenConfig {
        access_secret: "access-secret-for-tests".into(),
        refresh_secret: "refresh-secret-for-tests".into(),
        access_ttl_minutes: 15,
        refresh_ttl_days: 7,
        candidate_ttl_days: 7,
    })
}

fn resume() -> IncomingFile {
    IncomingFile {
        field: "resume".into(),
        file_name: "cv.pdf".into(),
        content_type: "application/pdf".into(),
        bytes: b"%PDF-1.4 resume".to_vec(),
    }
}

fn job(title: &str) -> JobPostingInput {
    JobPostingInput {
        title: Some(title.into()),
        description: Some("Design and run our data pipelines.".into()),
        employment_type: Some(EmploymentType::FullTime),
        location: Some("Berlin".into()),
        salary_min_cents: Some(5_000_000),
        salary_max_cents: Some(7_000_000),
        deadline: Some((Utc::now() + Duration::days(30)).fixed_offset()),
        ..Default::default()
    }
}

#[tokio::test]
async fn a_candidate_applies_and_is_hired() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let tokens = tokens();
    let dir = tempfile::tempdir().unwrap();
    let store = UploadStore::new(dir.path());

    let draft = recruitment::create(&env.db, &hr, job("Data Engineer")).await.unwrap();
    assert_eq!(draft.job.status, JobStatus::Draft);
    let published = recruitment::publish(&env.db, &hr, draft.job.id).await.unwrap();
    assert!(published.job.posted_at.is_some());

    let public = recruitment::public_list(
        &env.db,
        PublicJobQuery {
            search: Some("data".into()),
            org: Some("acme".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(public.items.len(), 1);

    let session = candidates::register(
        &env.db,
        &tokens,
        CandidateRegisterInput {
            email: "Casey@Example.test".into(),
            password: "Applicant1".into(),
            first_name: "Casey".into(),
            last_name: "Nguyen".into(),
            phone: None,
        },
    )
    .await
    .unwrap();
    let claims = tokens.verify(&session.token, TokenKind::Candidate).unwrap();
    assert_eq!(claims.org, None);
    let candidate_id = session.candidate.id;

    let err = candidates::apply(&env.db, candidate_id, draft.job.id, ApplyInput::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Please upload your resume before applying");

    let with_resume = candidates::upload_resume(&env.db, &store, candidate_id, vec![resume()])
        .await
        .unwrap();
    let resume_path = with_resume.resume_path.unwrap();
    assert!(resume_path.starts_with("resumes/resume-"));
    let (folder, file) = resume_path.split_once('/').unwrap();
    assert!(store.resolve(folder, file).await.is_ok());

    let application = candidates::apply(
        &env.db,
        candidate_id,
        draft.job.id,
        ApplyInput {
            cover_letter: Some("Pipelines are my thing.".into()),
            expected_salary_cents: Some(6_000_000),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(application.org_id, env.org_id);
    assert_eq!(application.status, ApplicationStatus::Applied);

    let err = candidates::apply(&env.db, candidate_id, draft.job.id, ApplyInput::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "You have already applied for this job");

    let listed = recruitment::list(&env.db, &hr, JobQuery::default()).await.unwrap();
    let row = listed
        .items
        .iter()
        .find(|j| j.job.id == draft.job.id)
        .unwrap();
    assert_eq!(row.application_count, 1);

    let mailer = MemoryMailer::default();
    let decision = recruitment::update_application_status(
        &env.db,
        &hr,
        application.id,
        ApplicationStatusInput {
            status: ApplicationStatus::Hired,
            notify: true,
            feedback: None,
        },
        &mailer,
        "Acme",
    )
    .await
    .unwrap();
    assert!(decision.email_sent);
    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "casey@example.test");
    assert!(sent[0].subject.contains("Data Engineer"));

    let mine = candidates::applications(&env.db, candidate_id, PageQuery::default())
        .await
        .unwrap();
    assert_eq!(mine.items[0].application.status, ApplicationStatus::Hired);
    assert_eq!(mine.items[0].job.as_ref().unwrap().title, "Data Engineer");

    let err = recruitment::delete(&env.db, &hr, draft.job.id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let overview = reports::recruitment_overview(&env.db, &hr).await.unwrap();
    assert_eq!(overview.total_applications, 1);
    assert_eq!(overview.hired_this_month, 1);
}

#[tokio::test]
async fn candidate_login_and_profile() {
    let env = HrTestEnv::new().await;
    let tokens = tokens();
    let session = candidates::register(
        &env.db,
        &tokens,
        CandidateRegisterInput {
            email: "robin@example.test".into(),
            password: "Applicant1".into(),
            first_name: "Robin".into(),
            last_name: "Ito".into(),
            phone: None,
        },
    )
    .await
    .unwrap();

    let err = candidates::login(
        &env.db,
        &tokens,
        CandidateLoginInput {
            email: "robin@example.test".into(),
            password: "nope".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password");

    let profile = candidates::update_profile(
        &env.db,
        session.candidate.id,
        ProfileInput {
            skills: Some(vec!["Rust".into(), " ".into(), "SQL".into()]),
            experience_years: Some(4),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(profile.profile_complete);
    assert_eq!(profile.skills, serde_json::json!(["Rust", "SQL"]));
}

#[tokio::test]
async fn staff_without_recruitment_rights_are_refused() {
    let env = HrTestEnv::new().await;
    let employee = env.actor(EMPLOYEE).await;
    let err = recruitment::create(&env.db, &employee, job("Designer"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Denied { .. }));

    let hr = env.actor(HR).await;
    let err = recruitment::create(
        &env.db,
        &hr,
        JobPostingInput {
            salary_min_cents: Some(9_000_000),
            ..job("Designer")
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}
