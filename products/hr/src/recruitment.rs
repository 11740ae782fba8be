use std::collections::HashMap;

use entity::{
    candidate_applications, candidates, departments, employees::EmploymentType, job_postings,
    orgs,
};
use platform_api::{ApiError, ApiResult};
use platform_authz::Permission;
use platform_notify::{Mailer, templates};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::context::Actor;
use crate::validate::{self, Checks};
use crate::{Paged, db_error, like_any, now};

use job_postings::{Status, Urgency};

/// Create and update share one payload; create insists on the required keys.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPostingInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub department_id: Option<Uuid>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub salary_min_cents: Option<i64>,
    pub salary_max_cents: Option<i64>,
    pub currency: Option<String>,
    pub is_remote: Option<bool>,
    pub urgency: Option<Urgency>,
    pub deadline: Option<DateTimeWithTimeZone>,
    pub max_applications: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicJobQuery {
    pub employment_type: Option<EmploymentType>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub remote: Option<bool>,
    pub org: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    pub status: Option<Status>,
    pub department_id: Option<Uuid>,
    pub urgency: Option<Urgency>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPostingView {
    #[serde(flatten)]
    pub job: job_postings::Model,
    pub department_name: Option<String>,
    pub application_count: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub experience_years: Option<i32>,
    pub resume_path: Option<String>,
    pub resume_original_name: Option<String>,
}

impl From<candidates::Model> for ApplicantSummary {
    fn from(c: candidates::Model) -> Self {
        Self {
            id: c.id,
            email: c.email,
            first_name: c.first_name,
            last_name: c.last_name,
            phone: c.phone,
            location: c.location,
            experience_years: c.experience_years,
            resume_path: c.resume_path,
            resume_original_name: c.resume_original_name,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: candidate_applications::Model,
    pub candidate: Option<ApplicantSummary>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusInput {
    pub status: candidate_applications::Status,
    #[serde(default)]
    pub notify: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDecision {
    pub application: candidate_applications::Model,
    pub email_sent: bool,
}

fn validate_job(input: &JobPostingInput, creating: bool) -> ApiResult<()> {
    let mut checks = Checks::new();
    match input.title.as_deref() {
        Some(title) => {
            checks.len_range(title, 3, 200, "title");
        }
        None if creating => {
            checks.fail("title", "Title is required");
        }
        None => {}
    }
    match input.description.as_deref() {
        Some(description) => {
            checks.check(
                description.trim().chars().count() >= 10,
                "description",
                "Description must be at least 10 characters",
            );
        }
        None if creating => {
            checks.fail("description", "Description is required");
        }
        None => {}
    }
    if creating && input.employment_type.is_none() {
        checks.fail("employmentType", "Employment type is required");
    }
    checks
        .max_len(input.location.as_deref(), 100, "location")
        .check(
            input.salary_min_cents.is_none_or(|v| v >= 0),
            "salaryMinCents",
            "Salary cannot be negative",
        )
        .check(
            input.salary_max_cents.is_none_or(|v| v >= 0),
            "salaryMaxCents",
            "Salary cannot be negative",
        )
        .check(
            input.currency.as_deref().is_none_or(validate::is_currency),
            "currency",
            "Currency must be a 3-letter code",
        )
        .check(
            input.max_applications.is_none_or(|v| v > 0),
            "maxApplications",
            "Maximum applications must be positive",
        )
        .check(
            input.deadline.is_none_or(|d| d > now()),
            "deadline",
            "Deadline must be in the future",
        );
    if let (Some(min), Some(max)) = (input.salary_min_cents, input.salary_max_cents) {
        checks.check(
            min <= max,
            "salaryMaxCents",
            "Maximum salary must be greater than or equal to minimum salary",
        );
    }
    checks.finish()
}

async fn check_department<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    department_id: Option<Uuid>,
) -> ApiResult<()> {
    if let Some(id) = department_id {
        departments::Entity::find_by_id(id)
            .filter(departments::Column::OrgId.eq(org_id))
            .one(db)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ApiError::bad_request("Department not found"))?;
    }
    Ok(())
}

async fn application_counts<C: ConnectionTrait>(
    db: &C,
    job_ids: Vec<Uuid>,
) -> ApiResult<HashMap<Uuid, u64>> {
    if job_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut counts = HashMap::new();
    for application in candidate_applications::Entity::find()
        .filter(candidate_applications::Column::JobPostingId.is_in(job_ids))
        .all(db)
        .await
        .map_err(db_error)?
    {
        *counts.entry(application.job_posting_id).or_insert(0) += 1;
    }
    Ok(counts)
}

pub(crate) async fn job_views<C: ConnectionTrait>(
    db: &C,
    rows: Vec<job_postings::Model>,
) -> ApiResult<Vec<JobPostingView>> {
    let counts = application_counts(db, rows.iter().map(|j| j.id).collect()).await?;
    let department_ids: Vec<Uuid> = rows.iter().filter_map(|j| j.department_id).collect();
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
    Ok(rows
        .into_iter()
        .map(|job| JobPostingView {
            department_name: job.department_id.and_then(|id| names.get(&id).cloned()),
            application_count: counts.get(&job.id).copied().unwrap_or(0),
            job,
        })
        .collect())
}

async fn single<C: ConnectionTrait>(db: &C, job: job_postings::Model) -> ApiResult<JobPostingView> {
    job_views(db, vec![job])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Job posting not found"))
}

/// Published postings visible without signing in.
pub async fn public_list<C: ConnectionTrait>(
    db: &C,
    query: PublicJobQuery,
) -> ApiResult<Paged<JobPostingView>> {
    let page = validate::page(query.page, query.limit, 10)?;
    let mut select =
        job_postings::Entity::find().filter(job_postings::Column::Status.eq(Status::Published));
    if let Some(slug) = query.org.as_deref().filter(|s| !s.trim().is_empty()) {
        let org = orgs::Entity::find()
            .filter(orgs::Column::Slug.eq(slug.trim()))
            .one(db)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ApiError::not_found("Organization not found"))?;
        select = select.filter(job_postings::Column::OrgId.eq(org.id));
    }
    if let Some(kind) = query.employment_type {
        select = select.filter(job_postings::Column::EmploymentType.eq(kind));
    }
    if let Some(location) = query.location.as_deref().filter(|l| !l.trim().is_empty()) {
        select = select.filter(like_any(
            location,
            job_postings::Entity,
            &[job_postings::Column::Location],
        ));
    }
    if let Some(remote) = query.remote {
        select = select.filter(job_postings::Column::IsRemote.eq(remote));
    }
    if let Some(term) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(like_any(
            term,
            job_postings::Entity,
            &[job_postings::Column::Title, job_postings::Column::Description],
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

pub async fn public_get<C: ConnectionTrait>(db: &C, id: Uuid) -> ApiResult<JobPostingView> {
    let job = job_postings::Entity::find_by_id(id)
        .filter(job_postings::Column::Status.eq(Status::Published))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Job posting not found"))?;
    single(db, job).await
}

async fn org_job<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    id: Uuid,
) -> ApiResult<job_postings::Model> {
    job_postings::Entity::find_by_id(id)
        .filter(job_postings::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Job posting not found"))
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: JobQuery,
) -> ApiResult<Paged<JobPostingView>> {
    actor.require(Permission::RecruitmentRead)?;
    let page = validate::page(query.page, query.limit, 10)?;
    let mut select =
        job_postings::Entity::find().filter(job_postings::Column::OrgId.eq(actor.org_id));
    if let Some(status) = query.status {
        select = select.filter(job_postings::Column::Status.eq(status));
    }
    if let Some(department_id) = query.department_id {
        select = select.filter(job_postings::Column::DepartmentId.eq(department_id));
    }
    if let Some(urgency) = query.urgency {
        select = select.filter(job_postings::Column::Urgency.eq(urgency));
    }
    if let Some(term) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(like_any(
            term,
            job_postings::Entity,
            &[job_postings::Column::Title, job_postings::Column::Description],
        ));
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_desc(job_postings::Column::CreatedAt)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(Paged::new(job_views(db, rows).await?, page, total))
}

pub async fn get<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<JobPostingView> {
    actor.require(Permission::RecruitmentRead)?;
    let job = org_job(db, actor.org_id, id).await?;
    single(db, job).await
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn create<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: JobPostingInput,
) -> ApiResult<JobPostingView> {
    actor.require(Permission::RecruitmentWrite)?;
    validate_job(&input, true)?;
    check_department(db, actor.org_id, input.department_id).await?;
    let (Some(title), Some(description), Some(employment_type)) =
        (input.title, input.description, input.employment_type)
    else {
        return Err(ApiError::bad_request("Missing required job posting fields"));
    };
    let ts = now();
    let job = job_postings::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(actor.org_id),
        title: Set(title.trim().to_string()),
        description: Set(description.trim().to_string()),
        requirements: Set(validate::clean(input.requirements)),
        department_id: Set(input.department_id),
        location: Set(validate::clean(input.location)),
        employment_type: Set(employment_type),
        salary_min_cents: Set(input.salary_min_cents),
        salary_max_cents: Set(input.salary_max_cents),
        currency: Set(input
            .currency
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| crate::payroll::DEFAULT_CURRENCY.to_string())),
        is_remote: Set(input.is_remote.unwrap_or(false)),
        urgency: Set(input.urgency.unwrap_or(Urgency::Normal)),
        status: Set(Status::Draft),
        deadline: Set(input.deadline),
        max_applications: Set(input.max_applications),
        posted_at: Set(None),
        closed_at: Set(None),
        created_by: Set(actor.user_id),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(job_id = %job.id, "job posting created");
    single(db, job).await
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn update<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: JobPostingInput,
) -> ApiResult<JobPostingView> {
    actor.require(Permission::RecruitmentWrite)?;
    validate_job(&input, false)?;
    let job = org_job(db, actor.org_id, id).await?;
    check_department(db, actor.org_id, input.department_id).await?;
    let min = input.salary_min_cents.or(job.salary_min_cents);
    let max = input.salary_max_cents.or(job.salary_max_cents);
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(ApiError::field(
                "salaryMaxCents",
                "Maximum salary must be greater than or equal to minimum salary",
            ));
        }
    }

    let mut active: job_postings::ActiveModel = job.into();
    if let Some(title) = input.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = input.description {
        active.description = Set(description.trim().to_string());
    }
    if input.requirements.is_some() {
        active.requirements = Set(validate::clean(input.requirements));
    }
    if input.department_id.is_some() {
        active.department_id = Set(input.department_id);
    }
    if input.location.is_some() {
        active.location = Set(validate::clean(input.location));
    }
    if let Some(kind) = input.employment_type {
        active.employment_type = Set(kind);
    }
    if input.salary_min_cents.is_some() {
        active.salary_min_cents = Set(input.salary_min_cents);
    }
    if input.salary_max_cents.is_some() {
        active.salary_max_cents = Set(input.salary_max_cents);
    }
    if let Some(currency) = input.currency {
        active.currency = Set(currency.to_uppercase());
    }
    if let Some(remote) = input.is_remote {
        active.is_remote = Set(remote);
    }
    if let Some(urgency) = input.urgency {
        active.urgency = Set(urgency);
    }
    if input.deadline.is_some() {
        active.deadline = Set(input.deadline);
    }
    if input.max_applications.is_some() {
        active.max_applications = Set(input.max_applications);
    }
    active.updated_at = Set(now());
    let job = active.update(db).await.map_err(db_error)?;
    single(db, job).await
}

pub async fn publish<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
) -> ApiResult<JobPostingView> {
    actor.require(Permission::RecruitmentWrite)?;
    let job = org_job(db, actor.org_id, id).await?;
    if job.status == Status::Published {
        return Err(ApiError::bad_request("Job posting is already published"));
    }
    if job.deadline.is_some_and(|d| d <= now()) {
        return Err(ApiError::bad_request(
            "Cannot publish a job posting whose deadline has passed",
        ));
    }
    let ts = now();
    let mut active: job_postings::ActiveModel = job.into();
    active.status = Set(Status::Published);
    active.posted_at = Set(Some(ts));
    active.closed_at = Set(None);
    active.updated_at = Set(ts);
    let job = active.update(db).await.map_err(db_error)?;
    info!(job_id = %job.id, "job posting published");
    single(db, job).await
}

pub async fn close<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
) -> ApiResult<JobPostingView> {
    actor.require(Permission::RecruitmentWrite)?;
    let job = org_job(db, actor.org_id, id).await?;
    if job.status == Status::Closed {
        return Err(ApiError::bad_request("Job posting is already closed"));
    }
    let ts = now();
    let mut active: job_postings::ActiveModel = job.into();
    active.status = Set(Status::Closed);
    active.closed_at = Set(Some(ts));
    active.updated_at = Set(ts);
    let job = active.update(db).await.map_err(db_error)?;
    info!(job_id = %job.id, "job posting closed");
    single(db, job).await
}

pub async fn delete<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<()> {
    actor.require(Permission::RecruitmentWrite)?;
    let job = org_job(db, actor.org_id, id).await?;
    let applications = candidate_applications::Entity::find()
        .filter(candidate_applications::Column::JobPostingId.eq(job.id))
        .count(db)
        .await
        .map_err(db_error)?;
    if applications > 0 {
        return Err(ApiError::bad_request(
            "Cannot delete a job posting that has applications. Close it instead.",
        ));
    }
    job_postings::Entity::delete_by_id(job.id)
        .exec(db)
        .await
        .map_err(db_error)?;
    info!(job_id = %id, "job posting deleted");
    Ok(())
}

pub async fn applications_for_job<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    job_id: Uuid,
) -> ApiResult<Vec<ApplicationView>> {
    actor.require(Permission::RecruitmentRead)?;
    let job = org_job(db, actor.org_id, job_id).await?;
    let rows = candidate_applications::Entity::find()
        .filter(candidate_applications::Column::JobPostingId.eq(job.id))
        .order_by_desc(candidate_applications::Column::AppliedAt)
        .find_also_related(candidates::Entity)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(rows
        .into_iter()
        .map(|(application, candidate)| ApplicationView {
            application,
            candidate: candidate.map(ApplicantSummary::from),
        })
        .collect())
}

/// Moves an application along the pipeline. With `notify`, hired and rejected
/// candidates get a decision mail; a failed send is logged and reported back
/// through `email_sent` without undoing the status change.
#[instrument(skip(db, input, mailer), fields(org_id = %actor.org_id))]
pub async fn update_application_status<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    application_id: Uuid,
    input: ApplicationStatusInput,
    mailer: &dyn Mailer,
    company: &str,
) -> ApiResult<ApplicationDecision> {
    actor.require(Permission::RecruitmentWrite)?;
    let mut checks = Checks::new();
    checks.max_len(input.feedback.as_deref(), 1000, "feedback");
    checks.finish()?;

    let application = candidate_applications::Entity::find_by_id(application_id)
        .filter(candidate_applications::Column::OrgId.eq(actor.org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;
    let job = org_job(db, actor.org_id, application.job_posting_id).await?;
    let candidate = candidates::Entity::find_by_id(application.candidate_id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Candidate not found"))?;

    let mut active: candidate_applications::ActiveModel = application.into();
    active.status = Set(input.status);
    active.updated_at = Set(now());
    let application = active.update(db).await.map_err(db_error)?;
    info!(application_id = %application.id, status = ?application.status, "application status updated");

    let name = format!("{} {}", candidate.first_name, candidate.last_name);
    let email = match input.status {
        candidate_applications::Status::Hired if input.notify => Some(templates::selected(
            company,
            &job.title,
            &name,
            &candidate.email,
            input.feedback.as_deref(),
        )),
        candidate_applications::Status::Rejected if input.notify => Some(templates::rejected(
            company,
            &job.title,
            &name,
            &candidate.email,
            input.feedback.as_deref(),
        )),
        _ => None,
    };
    let email_sent = match email {
        Some(email) => match mailer.send(email).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, mailer = mailer.name(), "decision email failed");
                false
            }
        },
        None => false,
    };
    Ok(ApplicationDecision {
        application,
        email_sent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_postings_need_title_description_and_type() {
        let err = validate_job(&JobPostingInput::default(), true).unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["title", "description", "employmentType"]);
    }

    #[test]
    fn salary_range_must_be_ordered() {
        let input = JobPostingInput {
            salary_min_cents: Some(500_000),
            salary_max_cents: Some(400_000),
            ..Default::default()
        };
        assert!(validate_job(&input, false).is_err());
    }

    #[test]
    fn partial_updates_skip_required_fields() {
        let input = JobPostingInput {
            location: Some("Lisbon".into()),
            ..Default::default()
        };
        assert!(validate_job(&input, false).is_ok());
    }
}
