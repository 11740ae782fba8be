//! Self-service accounts for job applicants.
//!
//! Candidates live outside any org. Their token is a `Candidate` token with no
//! org claim, and an application takes the org of the posting it targets.

use std::collections::HashMap;

use entity::{candidate_applications, candidates, departments, job_postings};
use platform_api::{ApiError, ApiResult};
use platform_authn::{TokenKind, TokenService, hash_password, verify_password};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::token_error;
use crate::recruitment::{JobPostingView, job_views};
use crate::uploads::{IncomingFile, UploadKind, UploadStore};
use crate::validate::{self, Checks};
use crate::{Paged, db_error, like_any, now};

pub const CANDIDATE_ROLE: &str = "CANDIDATE";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CandidateLoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub summary: Option<String>,
    pub skills: Option<Vec<String>>,
    pub experience_years: Option<i32>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyInput {
    pub cover_letter: Option<String>,
    pub expected_salary_cents: Option<i64>,
    pub availability: Option<String>,
    pub additional_notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CandidateJobQuery {
    pub department: Option<String>,
    pub location: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CandidateSession {
    pub candidate: candidates::Model,
    pub token: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobBrief {
    pub title: String,
    pub department_name: Option<String>,
    pub location: Option<String>,
    pub status: job_postings::Status,
}

#[derive(Clone, Debug, Serialize)]
pub struct MyApplication {
    #[serde(flatten)]
    pub application: candidate_applications::Model,
    pub job: Option<JobBrief>,
}

fn issue_token(tokens: &TokenService, candidate: &candidates::Model) -> ApiResult<String> {
    tokens
        .issue(TokenKind::Candidate, candidate.id, None, CANDIDATE_ROLE)
        .map_err(token_error)
}

#[instrument(skip(db, tokens, input), fields(email = %input.email))]
pub async fn register<C: ConnectionTrait>(
    db: &C,
    tokens: &TokenService,
    input: CandidateRegisterInput,
) -> ApiResult<CandidateSession> {
    let mut checks = Checks::new();
    checks
        .email(&input.email, "email")
        .len_range(&input.first_name, 1, 50, "firstName")
        .len_range(&input.last_name, 1, 50, "lastName")
        .phone(input.phone.as_deref(), "phone");
    if let Some(problem) = validate::password_problem(&input.password) {
        checks.fail("password", problem);
    }
    checks.finish()?;

    let email = validate::normalize_email(&input.email);
    let existing = candidates::Entity::find()
        .filter(candidates::Column::Email.eq(email.clone()))
        .count(db)
        .await
        .map_err(db_error)?;
    if existing > 0 {
        return Err(ApiError::Conflict {
            message: "Candidate with this email already exists".into(),
            field: "email".into(),
        });
    }
    let password_hash = hash_password(&input.password).map_err(token_error)?;
    let ts = now();
    let candidate = candidates::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        first_name: Set(input.first_name.trim().to_string()),
        last_name: Set(input.last_name.trim().to_string()),
        phone: Set(validate::clean(input.phone)),
        location: Set(None),
        summary: Set(None),
        skills: Set(json!([])),
        experience_years: Set(None),
        linkedin_url: Set(None),
        portfolio_url: Set(None),
        resume_path: Set(None),
        resume_original_name: Set(None),
        profile_complete: Set(false),
        status: Set(candidates::Status::Active),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(candidate_id = %candidate.id, "candidate registered");
    let token = issue_token(tokens, &candidate)?;
    Ok(CandidateSession { candidate, token })
}

#[instrument(skip(db, tokens, input))]
pub async fn login<C: ConnectionTrait>(
    db: &C,
    tokens: &TokenService,
    input: CandidateLoginInput,
) -> ApiResult<CandidateSession> {
    let email = validate::normalize_email(&input.email);
    let candidate = candidates::Entity::find()
        .filter(candidates::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;
    if !verify_password(&input.password, &candidate.password_hash) {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }
    if candidate.status != candidates::Status::Active {
        return Err(ApiError::unauthorized("Account is not active"));
    }
    let token = issue_token(tokens, &candidate)?;
    Ok(CandidateSession { candidate, token })
}

/// Resolve the account behind a verified candidate token.
pub async fn load_candidate<C: ConnectionTrait>(
    db: &C,
    candidate_id: Uuid,
) -> ApiResult<candidates::Model> {
    let candidate = candidates::Entity::find_by_id(candidate_id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::unauthorized("Candidate not found"))?;
    if candidate.status != candidates::Status::Active {
        return Err(ApiError::unauthorized("Account is not active"));
    }
    Ok(candidate)
}

pub async fn profile<C: ConnectionTrait>(db: &C, candidate_id: Uuid) -> ApiResult<candidates::Model> {
    candidates::Entity::find_by_id(candidate_id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Candidate not found"))
}

fn is_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

pub async fn update_profile<C: ConnectionTrait>(
    db: &C,
    candidate_id: Uuid,
    input: ProfileInput,
) -> ApiResult<candidates::Model> {
    let mut checks = Checks::new();
    if let Some(first) = input.first_name.as_deref() {
        checks.len_range(first, 1, 50, "firstName");
    }
    if let Some(last) = input.last_name.as_deref() {
        checks.len_range(last, 1, 50, "lastName");
    }
    checks
        .phone(input.phone.as_deref(), "phone")
        .max_len(input.location.as_deref(), 100, "location")
        .max_len(input.summary.as_deref(), 2000, "summary")
        .check(
            input.experience_years.is_none_or(|y| (0..=60).contains(&y)),
            "experienceYears",
            "Experience must be between 0 and 60 years",
        )
        .check(
            input.skills.as_ref().is_none_or(|s| s.len() <= 50),
            "skills",
            "At most 50 skills are allowed",
        )
        .check(
            input.linkedin_url.as_deref().is_none_or(|u| u.is_empty() || is_url(u)),
            "linkedinUrl",
            "Please provide a valid URL",
        )
        .check(
            input.portfolio_url.as_deref().is_none_or(|u| u.is_empty() || is_url(u)),
            "portfolioUrl",
            "Please provide a valid URL",
        );
    checks.finish()?;

    let candidate = profile(db, candidate_id).await?;
    let mut active: candidates::ActiveModel = candidate.into();
    if let Some(first) = input.first_name {
        active.first_name = Set(first.trim().to_string());
    }
    if let Some(last) = input.last_name {
        active.last_name = Set(last.trim().to_string());
    }
    if input.phone.is_some() {
        active.phone = Set(validate::clean(input.phone));
    }
    if input.location.is_some() {
        active.location = Set(validate::clean(input.location));
    }
    if input.summary.is_some() {
        active.summary = Set(validate::clean(input.summary));
    }
    if let Some(skills) = input.skills {
        let skills: Vec<String> = skills
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        active.skills = Set(json!(skills));
    }
    if input.experience_years.is_some() {
        active.experience_years = Set(input.experience_years);
    }
    if input.linkedin_url.is_some() {
        active.linkedin_url = Set(validate::clean(input.linkedin_url));
    }
    if input.portfolio_url.is_some() {
        active.portfolio_url = Set(validate::clean(input.portfolio_url));
    }
    active.profile_complete = Set(true);
    active.updated_at = Set(now());
    active.update(db).await.map_err(db_error)
}

/// Store a resume and point the profile at it. The previous file stays on
/// disk; its uploads row keeps the history.
#[instrument(skip(db, store, files), fields(candidate_id = %candidate_id))]
pub async fn upload_resume<C: ConnectionTrait>(
    db: &C,
    store: &UploadStore,
    candidate_id: Uuid,
    files: Vec<IncomingFile>,
) -> ApiResult<candidates::Model> {
    if files.is_empty() {
        return Err(ApiError::bad_request("No resume file uploaded"));
    }
    let candidate = profile(db, candidate_id).await?;
    UploadKind::Resume.policy().check(&files)?;
    let file = &files[0];
    let stored_name = format!(
        "resume-{}-{}{}",
        candidate.id,
        now().timestamp_millis(),
        crate::uploads::extension_of(&file.file_name)
    );
    let upload = store
        .save(db, None, candidate.id, UploadKind::Resume, &stored_name, file)
        .await?;

    let mut active: candidates::ActiveModel = candidate.into();
    active.resume_path = Set(Some(upload.relative_path()));
    active.resume_original_name = Set(Some(upload.original_name));
    active.updated_at = Set(now());
    let candidate = active.update(db).await.map_err(db_error)?;
    info!("resume uploaded");
    Ok(candidate)
}

/// Published postings for a signed-in candidate.
pub async fn jobs<C: ConnectionTrait>(
    db: &C,
    query: CandidateJobQuery,
) -> ApiResult<Paged<JobPostingView>> {
    let page = validate::page(query.page, query.limit, 10)?;
    let mut select =
        job_postings::Entity::find().filter(job_postings::Column::Status.eq(job_postings::Status::Published));
    if let Some(term) = query.department.as_deref().filter(|d| !d.trim().is_empty()) {
        let department_ids: Vec<Uuid> = departments::Entity::find()
            .filter(like_any(term, departments::Entity, &[departments::Column::Name]))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|d| d.id)
            .collect();
        select = select.filter(job_postings::Column::DepartmentId.is_in(department_ids));
    }
    if let Some(location) = query.location.as_deref().filter(|l| !l.trim().is_empty()) {
        select = select.filter(like_any(
            location,
            job_postings::Entity,
            &[job_postings::Column::Location],
        ));
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_desc(job_postings::Column::PostedAt)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(Paged::new(job_views(db, rows).await?, page, total))
}

fn validate_application(input: &ApplyInput) -> ApiResult<()> {
    let mut checks = Checks::new();
    checks
        .max_len(input.cover_letter.as_deref(), 1000, "coverLetter")
        .check(
            input.expected_salary_cents.is_none_or(|s| s > 0),
            "expectedSalaryCents",
            "Expected salary must be positive",
        )
        .max_len(input.availability.as_deref(), 100, "availability")
        .max_len(input.additional_notes.as_deref(), 500, "additionalNotes");
    checks.finish()
}

#[instrument(skip(db, input), fields(candidate_id = %candidate_id, job_id = %job_id))]
pub async fn apply<C: ConnectionTrait>(
    db: &C,
    candidate_id: Uuid,
    job_id: Uuid,
    input: ApplyInput,
) -> ApiResult<candidate_applications::Model> {
    validate_application(&input)?;
    let job = job_postings::Entity::find_by_id(job_id)
        .filter(job_postings::Column::Status.eq(job_postings::Status::Published))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Job posting not found"))?;
    let candidate = profile(db, candidate_id).await?;
    if candidate.resume_path.is_none() {
        return Err(ApiError::bad_request(
            "Please upload your resume before applying",
        ));
    }
    if job.deadline.is_some_and(|d| d < now()) {
        return Err(ApiError::bad_request("Application deadline has passed"));
    }
    let existing = candidate_applications::Entity::find()
        .filter(candidate_applications::Column::JobPostingId.eq(job.id))
        .all(db)
        .await
        .map_err(db_error)?;
    if existing.iter().any(|a| a.candidate_id == candidate.id) {
        return Err(ApiError::bad_request("You have already applied for this job"));
    }
    if let Some(max) = job.max_applications {
        if existing.len() as i64 >= i64::from(max) {
            return Err(ApiError::bad_request(
                "This job posting is no longer accepting applications",
            ));
        }
    }

    let ts = now();
    let application = candidate_applications::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(job.org_id),
        candidate_id: Set(candidate.id),
        job_posting_id: Set(job.id),
        cover_letter: Set(validate::clean(input.cover_letter)),
        expected_salary_cents: Set(input.expected_salary_cents),
        availability: Set(validate::clean(input.availability)),
        additional_notes: Set(validate::clean(input.additional_notes)),
        status: Set(candidate_applications::Status::Applied),
        applied_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(application_id = %application.id, "application submitted");
    Ok(application)
}

pub async fn applications<C: ConnectionTrait>(
    db: &C,
    candidate_id: Uuid,
    query: PageQuery,
) -> ApiResult<Paged<MyApplication>> {
    let page = validate::page(query.page, query.limit, 10)?;
    let select = candidate_applications::Entity::find()
        .filter(candidate_applications::Column::CandidateId.eq(candidate_id));
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_desc(candidate_applications::Column::AppliedAt)
        .offset(page.offset())
        .limit(page.limit)
        .find_also_related(job_postings::Entity)
        .all(db)
        .await
        .map_err(db_error)?;

    let department_ids: Vec<Uuid> = rows
        .iter()
        .filter_map(|(_, job)| job.as_ref().and_then(|j| j.department_id))
        .collect();
    let names: HashMap<Uuid, String> = if department_ids.is_empty() {
        HashMap::new()
    } else {
        departments::Entity::find()
            .filter(departments::Column::Id.is_in(department_ids))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|d| (d.id, d.name))
            .collect()
    };
    let items = rows
        .into_iter()
        .map(|(application, job)| MyApplication {
            application,
            job: job.map(|j| JobBrief {
                department_name: j.department_id.and_then(|id| names.get(&id).cloned()),
                title: j.title,
                location: j.location,
                status: j.status,
            }),
        })
        .collect();
    Ok(Paged::new(items, page, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_limits() {
        let ok = ApplyInput {
            cover_letter: Some("I would love to join.".into()),
            expected_salary_cents: Some(6_000_000),
            ..Default::default()
        };
        assert!(validate_application(&ok).is_ok());

        let bad = ApplyInput {
            cover_letter: Some("x".repeat(1001)),
            expected_salary_cents: Some(0),
            additional_notes: Some("y".repeat(501)),
            ..Default::default()
        };
        let Err(ApiError::Validation(errors)) = validate_application(&bad) else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn profile_urls_need_scheme() {
        assert!(is_url("https://example.test/me"));
        assert!(!is_url("example.test/me"));
    }
}
