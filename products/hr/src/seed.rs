//! Idempotent demo data for local environments.

use chrono::{Duration, Utc};
use entity::{departments, employees, job_postings, users};
use platform_api::ApiResult;
use platform_authn::hash_password;
use platform_authz::Role;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::context::{role_to_entity, token_error};
use crate::employees::next_employee_code;
use crate::{db_error, now};

pub const DEMO_PASSWORD: &str = "Password123";

struct DemoAccount {
    email: &'static str,
    username: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    position: &'static str,
    role: Role,
    salary_cents: i64,
}

const ACCOUNTS: [DemoAccount; 4] = [
    DemoAccount {
        email: "admin@hrms.test",
        username: "admin",
        first_name: "Avery",
        last_name: "Admin",
        position: "System Administrator",
        role: Role::Admin,
        salary_cents: 9_000_000,
    },
    DemoAccount {
        email: "hr@hrms.test",
        username: "hr",
        first_name: "Harper",
        last_name: "Reyes",
        position: "HR Manager",
        role: Role::Hr,
        salary_cents: 7_500_000,
    },
    DemoAccount {
        email: "manager@hrms.test",
        username: "manager",
        first_name: "Morgan",
        last_name: "Lee",
        position: "Engineering Manager",
        role: Role::Manager,
        salary_cents: 8_500_000,
    },
    DemoAccount {
        email: "employee@hrms.test",
        username: "employee",
        first_name: "Emery",
        last_name: "Stone",
        position: "Software Engineer",
        role: Role::Employee,
        salary_cents: 6_500_000,
    },
];

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeededHr {
    /// Employee ids keyed by demo email.
    pub employees: Vec<(String, Uuid)>,
    pub departments: Vec<Uuid>,
    pub job_posting_id: Option<Uuid>,
    pub created: usize,
}

impl SeededHr {
    pub fn employee(&self, email: &str) -> Option<Uuid> {
        self.employees
            .iter()
            .find(|(e, _)| e == email)
            .map(|(_, id)| *id)
    }
}

async fn ensure_account<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    account: &DemoAccount,
    password_hash: &str,
) -> ApiResult<(employees::Model, bool)> {
    if let Some(user) = users::Entity::find()
        .filter(users::Column::Email.eq(account.email))
        .one(db)
        .await
        .map_err(db_error)?
    {
        if let Some(employee) = employees::Entity::find()
            .filter(employees::Column::UserId.eq(user.id))
            .one(db)
            .await
            .map_err(db_error)?
        {
            return Ok((employee, false));
        }
    }

    let ts = now();
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(org_id),
        email: Set(account.email.to_string()),
        username: Set(account.username.to_string()),
        password_hash: Set(password_hash.to_string()),
        role: Set(role_to_entity(account.role)),
        is_active: Set(true),
        last_login_at: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    let employee = employees::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(org_id),
        user_id: Set(user.id),
        employee_code: Set(next_employee_code(db, org_id).await?),
        first_name: Set(account.first_name.to_string()),
        last_name: Set(account.last_name.to_string()),
        email: Set(account.email.to_string()),
        phone: Set(None),
        position: Set(account.position.to_string()),
        department_id: Set(None),
        manager_id: Set(None),
        employment_type: Set(employees::EmploymentType::FullTime),
        salary_cents: Set(Some(account.salary_cents)),
        hourly_rate_cents: Set(None),
        hire_date: Set(Utc::now().date_naive() - Duration::days(365)),
        termination_date: Set(None),
        is_on_probation: Set(false),
        is_active: Set(true),
        avatar_path: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    Ok((employee, true))
}

async fn ensure_department<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    name: &str,
    description: &str,
    manager_id: Uuid,
) -> ApiResult<(departments::Model, bool)> {
    if let Some(existing) = departments::Entity::find()
        .filter(departments::Column::OrgId.eq(org_id))
        .filter(departments::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(db_error)?
    {
        return Ok((existing, false));
    }
    let ts = now();
    let department = departments::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(org_id),
        name: Set(name.to_string()),
        description: Set(Some(description.to_string())),
        cost_center: Set(None),
        budget_cents: Set(None),
        location: Set(None),
        parent_id: Set(None),
        manager_id: Set(Some(manager_id)),
        is_active: Set(true),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    Ok((department, true))
}

async fn place<C: ConnectionTrait>(
    db: &C,
    employee: employees::Model,
    department_id: Uuid,
    manager_id: Option<Uuid>,
) -> ApiResult<employees::Model> {
    if employee.department_id == Some(department_id) && employee.manager_id == manager_id {
        return Ok(employee);
    }
    let mut active: employees::ActiveModel = employee.into();
    active.department_id = Set(Some(department_id));
    active.manager_id = Set(manager_id);
    active.updated_at = Set(now());
    active.update(db).await.map_err(db_error)
}

/// Create the demo staff, two departments and a published posting. Running it
/// again only fills in what is missing.
pub async fn seed_demo<C: ConnectionTrait>(db: &C, org_id: Uuid) -> ApiResult<SeededHr> {
    let password_hash = hash_password(DEMO_PASSWORD).map_err(token_error)?;
    let mut seeded = SeededHr::default();
    let mut staff = Vec::with_capacity(ACCOUNTS.len());
    for account in &ACCOUNTS {
        let (employee, created) = ensure_account(db, org_id, account, &password_hash).await?;
        seeded.created += usize::from(created);
        staff.push(employee);
    }
    let [admin, hr, manager, employee] = <[employees::Model; 4]>::try_from(staff)
        .map_err(|_| platform_api::ApiError::bad_request("Demo accounts are incomplete"))?;

    let (engineering, created) = ensure_department(
        db,
        org_id,
        "Engineering",
        "Product and platform engineering",
        manager.id,
    )
    .await?;
    seeded.created += usize::from(created);
    let (people, created) =
        ensure_department(db, org_id, "People Ops", "Hiring and people operations", hr.id).await?;
    seeded.created += usize::from(created);

    let admin = place(db, admin, people.id, None).await?;
    let hr = place(db, hr, people.id, None).await?;
    let manager = place(db, manager, engineering.id, None).await?;
    let employee = place(db, employee, engineering.id, Some(manager.id)).await?;

    let title = "Backend Engineer";
    let job = match job_postings::Entity::find()
        .filter(job_postings::Column::OrgId.eq(org_id))
        .filter(job_postings::Column::Title.eq(title))
        .one(db)
        .await
        .map_err(db_error)?
    {
        Some(job) => job,
        None => {
            let ts = now();
            seeded.created += 1;
            job_postings::ActiveModel {
                id: Set(Uuid::new_v4()),
                org_id: Set(org_id),
                title: Set(title.to_string()),
                description: Set("Build and operate the services behind our HR platform.".into()),
                requirements: Set(Some("3+ years building web services.".into())),
                department_id: Set(Some(engineering.id)),
                location: Set(Some("Remote".into())),
                employment_type: Set(employees::EmploymentType::FullTime),
                salary_min_cents: Set(Some(6_000_000)),
                salary_max_cents: Set(Some(9_000_000)),
                currency: Set(crate::payroll::DEFAULT_CURRENCY.to_string()),
                is_remote: Set(true),
                urgency: Set(job_postings::Urgency::Normal),
                status: Set(job_postings::Status::Published),
                deadline: Set(None),
                max_applications: Set(None),
                posted_at: Set(Some(ts)),
                closed_at: Set(None),
                created_by: Set(hr.user_id),
                created_at: Set(ts),
                updated_at: Set(ts),
            }
            .insert(db)
            .await
            .map_err(db_error)?
        }
    };

    seeded.employees = [admin, hr, manager, employee]
        .into_iter()
        .map(|e| (e.email, e.id))
        .collect();
    seeded.departments = vec![engineering.id, people.id];
    seeded.job_posting_id = Some(job.id);
    info!(org_id = %org_id, created = seeded.created, "demo data seeded");
    Ok(seeded)
}
