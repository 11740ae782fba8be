//! Candidate to employee conversion and the onboarding checklist it seeds.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, NaiveDate, Utc};
use entity::employees as employees_entity;
use entity::{candidate_applications, candidates, interviews, job_postings, onboarding_tasks};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Permission, Role};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::{Actor, org_employee};
use crate::employees::{self, CreateEmployeeInput, CreatedEmployee};
use crate::recruitment::ApplicantSummary;
use crate::validate::{self, Checks};
use crate::{db_error, now};

use candidate_applications::Status as Stage;
use onboarding_tasks::Status;

/// Default checklist: title and due offset in days from the start date.
pub const CHECKLIST: [(&str, i64); 5] = [
    ("Manager introduction", 1),
    ("Orientation session", 2),
    ("IT account setup", 3),
    ("Equipment assignment", 5),
    ("Complete HR paperwork", 7),
];

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertInput {
    pub application_id: Uuid,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub salary_cents: Option<i64>,
    #[serde(default)]
    pub employment_type: Option<employees_entity::EmploymentType>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateInput {
    pub status: Status,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    #[serde(flatten)]
    pub created: CreatedEmployee,
    pub application_id: Uuid,
    pub onboarding: Vec<onboarding_tasks::Model>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingProgress {
    pub employee_id: Uuid,
    pub tasks: Vec<onboarding_tasks::Model>,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    pub status: Status,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyCandidate {
    pub application_id: Uuid,
    pub job_posting_id: Uuid,
    pub job_title: Option<String>,
    pub status: Stage,
    pub candidate: Option<ApplicantSummary>,
    pub interviews_completed: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedHire {
    pub employee_id: Uuid,
    pub employee_name: Option<String>,
    pub candidate_id: Uuid,
    pub application_id: Uuid,
    pub converted_at: DateTimeWithTimeZone,
    pub tasks_completed: usize,
    pub tasks_total: usize,
}

/// Overall state of a checklist: done when every task is, pending while none
/// has started.
pub fn progress(employee_id: Uuid, tasks: Vec<onboarding_tasks::Model>) -> OnboardingProgress {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.status == Status::Completed).count();
    let started = tasks.iter().any(|t| t.status != Status::Pending);
    let status = if total > 0 && completed == total {
        Status::Completed
    } else if started {
        Status::InProgress
    } else {
        Status::Pending
    };
    let percent = if total == 0 {
        0
    } else {
        (completed * 100 / total) as u8
    };
    OnboardingProgress {
        employee_id,
        tasks,
        completed,
        total,
        percent,
        status,
    }
}

async fn already_converted<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    candidate_id: Uuid,
) -> ApiResult<bool> {
    let seeded = onboarding_tasks::Entity::find()
        .filter(onboarding_tasks::Column::OrgId.eq(org_id))
        .filter(onboarding_tasks::Column::CandidateId.eq(candidate_id))
        .count(db)
        .await
        .map_err(db_error)?;
    Ok(seeded > 0)
}

/// Turns an application into an employee account, marks it hired and seeds
/// the onboarding checklist, all in one transaction.
#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn convert<C>(db: &C, actor: &Actor, input: ConvertInput) -> ApiResult<Conversion>
where
    C: ConnectionTrait + TransactionTrait,
{
    actor.require(Permission::EmployeesWrite)?;
    let mut checks = Checks::new();
    checks.amount(input.salary_cents, "salaryCents");
    if let Some(position) = &input.position {
        checks.len_range(position, 2, 100, "position");
    }
    if let Some(start) = input.start_date {
        checks.check(
            start >= Utc::now().date_naive() - Duration::days(30),
            "startDate",
            "Start date cannot be more than 30 days in the past",
        );
    }
    checks.finish()?;

    let application = candidate_applications::Entity::find_by_id(input.application_id)
        .filter(candidate_applications::Column::OrgId.eq(actor.org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;
    if matches!(application.status, Stage::Rejected | Stage::Withdrawn) {
        return Err(ApiError::bad_request(
            "Cannot convert a rejected or withdrawn application",
        ));
    }
    if already_converted(db, actor.org_id, application.candidate_id).await? {
        return Err(ApiError::bad_request(
            "Candidate has already been converted to employee",
        ));
    }
    let candidate = candidates::Entity::find_by_id(application.candidate_id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Candidate not found"))?;
    let job = job_postings::Entity::find_by_id(application.job_posting_id)
        .filter(job_postings::Column::OrgId.eq(actor.org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Job posting not found"))?;

    let start = input.start_date.unwrap_or_else(|| Utc::now().date_naive());
    let employee_input = CreateEmployeeInput {
        first_name: candidate.first_name.clone(),
        last_name: candidate.last_name.clone(),
        email: candidate.email.clone(),
        position: input.position.unwrap_or_else(|| job.title.clone()),
        department_id: input.department_id.or(job.department_id),
        manager_id: input.manager_id,
        salary_cents: input.salary_cents.or(application.expected_salary_cents),
        hourly_rate_cents: None,
        employment_type: Some(input.employment_type.unwrap_or(job.employment_type)),
        phone: candidate.phone.clone(),
        role: Some(Role::Employee),
        password: None,
        hire_date: Some(start),
    };

    let txn = db.begin().await.map_err(db_error)?;
    let created = employees::create(&txn, actor, employee_input).await?;
    let employee_id = created.employee.employee.id;
    let ts = now();
    let application_id = application.id;
    let candidate_id = application.candidate_id;
    let mut active: candidate_applications::ActiveModel = application.into();
    active.status = Set(Stage::Hired);
    active.updated_at = Set(ts);
    active.update(&txn).await.map_err(db_error)?;

    let mut onboarding = Vec::with_capacity(CHECKLIST.len());
    for (position, (title, offset)) in CHECKLIST.iter().enumerate() {
        let task = onboarding_tasks::ActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(actor.org_id),
            employee_id: Set(employee_id),
            candidate_id: Set(candidate_id),
            application_id: Set(application_id),
            title: Set((*title).to_string()),
            position: Set(position as i32),
            due_date: Set(start + Duration::days(*offset)),
            status: Set(Status::Pending),
            notes: Set(None),
            completed_at: Set(None),
            completed_by: Set(None),
            created_by: Set(actor.user_id),
            created_at: Set(ts),
            updated_at: Set(ts),
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;
        onboarding.push(task);
    }
    txn.commit().await.map_err(db_error)?;

    info!(%employee_id, %candidate_id, "candidate converted to employee");
    Ok(Conversion {
        created,
        application_id,
        onboarding,
    })
}

/// Applications at interview or offer stage with a completed interview that
/// have not been converted yet.
pub async fn ready<C: ConnectionTrait>(db: &C, actor: &Actor) -> ApiResult<Vec<ReadyCandidate>> {
    actor.require(Permission::EmployeesWrite)?;
    let applications = candidate_applications::Entity::find()
        .filter(candidate_applications::Column::OrgId.eq(actor.org_id))
        .filter(candidate_applications::Column::Status.is_in([Stage::Interview, Stage::Offered]))
        .order_by_desc(candidate_applications::Column::UpdatedAt)
        .all(db)
        .await
        .map_err(db_error)?;
    if applications.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = applications.iter().map(|a| a.id).collect();
    let mut completed: HashMap<Uuid, usize> = HashMap::new();
    for interview in interviews::Entity::find()
        .filter(interviews::Column::ApplicationId.is_in(ids))
        .filter(interviews::Column::Status.eq(interviews::Status::Completed))
        .all(db)
        .await
        .map_err(db_error)?
    {
        *completed.entry(interview.application_id).or_default() += 1;
    }
    let converted: HashSet<Uuid> = onboarding_tasks::Entity::find()
        .filter(onboarding_tasks::Column::OrgId.eq(actor.org_id))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|t| t.candidate_id)
        .collect();

    let ready: Vec<candidate_applications::Model> = applications
        .into_iter()
        .filter(|a| completed.contains_key(&a.id) && !converted.contains(&a.candidate_id))
        .collect();
    let people: HashMap<Uuid, candidates::Model> = candidates::Entity::find()
        .filter(candidates::Column::Id.is_in(ready.iter().map(|a| a.candidate_id).collect::<Vec<_>>()))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let titles: HashMap<Uuid, String> = job_postings::Entity::find()
        .filter(job_postings::Column::OrgId.eq(actor.org_id))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|j| (j.id, j.title))
        .collect();
    Ok(ready
        .into_iter()
        .map(|a| ReadyCandidate {
            application_id: a.id,
            job_posting_id: a.job_posting_id,
            job_title: titles.get(&a.job_posting_id).cloned(),
            status: a.status,
            candidate: people.get(&a.candidate_id).cloned().map(ApplicantSummary::from),
            interviews_completed: completed.get(&a.id).copied().unwrap_or(0),
        })
        .collect())
}

/// Every conversion in the org, newest first.
pub async fn history<C: ConnectionTrait>(db: &C, actor: &Actor) -> ApiResult<Vec<ConvertedHire>> {
    actor.require(Permission::EmployeesWrite)?;
    let tasks = onboarding_tasks::Entity::find()
        .filter(onboarding_tasks::Column::OrgId.eq(actor.org_id))
        .all(db)
        .await
        .map_err(db_error)?;
    let mut hires: BTreeMap<Uuid, ConvertedHire> = BTreeMap::new();
    for task in tasks {
        let hire = hires.entry(task.employee_id).or_insert(ConvertedHire {
            employee_id: task.employee_id,
            employee_name: None,
            candidate_id: task.candidate_id,
            application_id: task.application_id,
            converted_at: task.created_at,
            tasks_completed: 0,
            tasks_total: 0,
        });
        hire.tasks_total += 1;
        if task.status == Status::Completed {
            hire.tasks_completed += 1;
        }
        hire.converted_at = hire.converted_at.min(task.created_at);
    }
    if hires.is_empty() {
        return Ok(Vec::new());
    }
    let names = employee_names(db, hires.keys().copied().collect()).await?;
    let mut hires: Vec<ConvertedHire> = hires
        .into_values()
        .map(|mut hire| {
            hire.employee_name = names.get(&hire.employee_id).cloned();
            hire
        })
        .collect();
    hires.sort_by(|a, b| b.converted_at.cmp(&a.converted_at));
    Ok(hires)
}

async fn employee_names<C: ConnectionTrait>(
    db: &C,
    ids: Vec<Uuid>,
) -> ApiResult<HashMap<Uuid, String>> {
    Ok(employees_entity::Entity::find()
        .filter(employees_entity::Column::Id.is_in(ids))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|e| (e.id, format!("{} {}", e.first_name, e.last_name)))
        .collect())
}

/// The checklist for one employee. The employee may read their own.
pub async fn status<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    employee_id: Uuid,
) -> ApiResult<OnboardingProgress> {
    if actor.employee_id != Some(employee_id) {
        actor.require(Permission::EmployeesWrite)?;
    }
    let employee = org_employee(db, actor.org_id, employee_id).await?;
    let tasks = onboarding_tasks::Entity::find()
        .filter(onboarding_tasks::Column::EmployeeId.eq(employee.id))
        .order_by_asc(onboarding_tasks::Column::Position)
        .all(db)
        .await
        .map_err(db_error)?;
    if tasks.is_empty() {
        return Err(ApiError::not_found("Onboarding record not found"));
    }
    Ok(progress(employee.id, tasks))
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn update_task<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    employee_id: Uuid,
    task_id: Uuid,
    input: TaskUpdateInput,
) -> ApiResult<OnboardingProgress> {
    actor.require(Permission::EmployeesWrite)?;
    let mut checks = Checks::new();
    checks.max_len(input.notes.as_deref(), 1000, "notes");
    checks.finish()?;
    let task = onboarding_tasks::Entity::find_by_id(task_id)
        .filter(onboarding_tasks::Column::OrgId.eq(actor.org_id))
        .filter(onboarding_tasks::Column::EmployeeId.eq(employee_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Onboarding task not found"))?;
    let ts = now();
    let mut active: onboarding_tasks::ActiveModel = task.into();
    active.status = Set(input.status);
    if input.status == Status::Completed {
        active.completed_at = Set(Some(ts));
        active.completed_by = Set(Some(actor.user_id));
    } else {
        active.completed_at = Set(None);
        active.completed_by = Set(None);
    }
    if input.notes.is_some() {
        active.notes = Set(validate::clean(input.notes));
    }
    active.updated_at = Set(ts);
    let task = active.update(db).await.map_err(db_error)?;
    info!(task_id = %task.id, status = ?task.status, "onboarding task updated");
    status(db, actor, employee_id).await
}
