use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate, Utc};
use entity::{departments, employees, performance_reviews, users};
use platform_api::{ApiError, ApiResult};
use platform_authn::hash_password;
use platform_authz::{Permission, Role};
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::{Actor, org_employee, role_to_entity, token_error};
use crate::validate::{self, Checks};
use crate::{Paged, db_error, like_any, now, round2};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub department_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: employees::Model,
    pub department_name: Option<String>,
    pub manager_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub salary_cents: Option<i64>,
    #[serde(default)]
    pub hourly_rate_cents: Option<i64>,
    #[serde(default)]
    pub employment_type: Option<employees::EmploymentType>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEmployee {
    pub employee: EmployeeView,
    pub username: String,
    pub role: Role,
    /// Only present when the caller did not choose a password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployeeInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub salary_cents: Option<i64>,
    pub hourly_rate_cents: Option<i64>,
    pub employment_type: Option<employees::EmploymentType>,
    pub is_on_probation: Option<bool>,
    pub is_active: Option<bool>,
    pub role: Option<Role>,
}

#[derive(Clone, Debug, Serialize, async_graphql::SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentHeadcount {
    pub department_id: Option<Uuid>,
    pub name: String,
    pub count: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmploymentTypeCount {
    pub employment_type: employees::EmploymentType,
    pub count: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub on_probation: u64,
    pub recent_hires: u64,
    pub by_department: Vec<DepartmentHeadcount>,
    pub by_employment_type: Vec<EmploymentTypeCount>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePerformance {
    pub employee_id: Uuid,
    pub reviews: Vec<performance_reviews::Model>,
    pub total_reviews: usize,
    pub average_rating: Option<f64>,
}

/// Self, HR/Admin, or the employee's direct manager.
pub(crate) fn can_view(actor: &Actor, employee: &employees::Model) -> bool {
    actor.is_hr_admin()
        || actor.employee_id == Some(employee.id)
        || (actor.employee_id.is_some() && employee.manager_id == actor.employee_id)
}

/// Next free `EMP-00001` style code within the org.
pub(crate) async fn next_employee_code<C: ConnectionTrait>(db: &C, org_id: Uuid) -> ApiResult<String> {
    let mut n = employees::Entity::find()
        .filter(employees::Column::OrgId.eq(org_id))
        .count(db)
        .await
        .map_err(db_error)?
        + 1;
    loop {
        let code = format!("EMP-{n:05}");
        let taken = employees::Entity::find()
            .filter(employees::Column::OrgId.eq(org_id))
            .filter(employees::Column::EmployeeCode.eq(code.clone()))
            .count(db)
            .await
            .map_err(db_error)?;
        if taken == 0 {
            return Ok(code);
        }
        n += 1;
    }
}

async fn enrich<C: ConnectionTrait>(
    db: &C,
    rows: Vec<employees::Model>,
) -> ApiResult<Vec<EmployeeView>> {
    let department_ids: Vec<Uuid> = rows.iter().filter_map(|e| e.department_id).collect();
    let manager_ids: Vec<Uuid> = rows.iter().filter_map(|e| e.manager_id).collect();
    let departments: HashMap<Uuid, String> = if department_ids.is_empty() {
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
    let managers: HashMap<Uuid, String> = if manager_ids.is_empty() {
        HashMap::new()
    } else {
        employees::Entity::find()
            .filter(employees::Column::Id.is_in(manager_ids))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|m| (m.id, m.full_name()))
            .collect()
    };
    Ok(rows
        .into_iter()
        .map(|employee| EmployeeView {
            department_name: employee
                .department_id
                .and_then(|id| departments.get(&id).cloned()),
            manager_name: employee.manager_id.and_then(|id| managers.get(&id).cloned()),
            employee,
        })
        .collect())
}

async fn view<C: ConnectionTrait>(db: &C, employee: employees::Model) -> ApiResult<EmployeeView> {
    let mut views = enrich(db, vec![employee]).await?;
    views
        .pop()
        .ok_or_else(|| ApiError::not_found("Employee not found"))
}

#[instrument(skip(db, query), fields(org_id = %actor.org_id))]
pub async fn list<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: EmployeeQuery,
) -> ApiResult<Paged<EmployeeView>> {
    actor.require(Permission::EmployeesRead)?;
    let page = validate::page(query.page, query.limit, 10)?;

    let mut select = employees::Entity::find().filter(employees::Column::OrgId.eq(actor.org_id));
    if actor.role == Role::Manager {
        select = select.filter(employees::Column::ManagerId.eq(actor.employee_id()?));
    }
    if let Some(term) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(like_any(
            term,
            employees::Entity,
            &[
                employees::Column::FirstName,
                employees::Column::LastName,
                employees::Column::Email,
                employees::Column::EmployeeCode,
                employees::Column::Position,
            ],
        ));
    }
    if let Some(department_id) = query.department_id {
        select = select.filter(employees::Column::DepartmentId.eq(department_id));
    }
    if let Some(is_active) = query.is_active {
        select = select.filter(employees::Column::IsActive.eq(is_active));
    }

    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_asc(employees::Column::LastName)
        .order_by_asc(employees::Column::FirstName)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(Paged::new(enrich(db, rows).await?, page, total))
}

/// Look up by employee id, falling back to the owning user id.
pub(crate) async fn find_by_employee_or_user<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    id: Uuid,
) -> ApiResult<employees::Model> {
    employees::Entity::find()
        .filter(employees::Column::OrgId.eq(org_id))
        .filter(
            Condition::any()
                .add(employees::Column::Id.eq(id))
                .add(employees::Column::UserId.eq(id)),
        )
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Employee not found"))
}

pub async fn get<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<EmployeeView> {
    let employee = find_by_employee_or_user(db, actor.org_id, id).await?;
    if !can_view(actor, &employee) {
        return Err(ApiError::forbidden("Access denied"));
    }
    view(db, employee).await
}

fn validate_create(input: &CreateEmployeeInput) -> ApiResult<()> {
    let mut checks = Checks::new();
    checks
        .len_range(&input.first_name, 2, 50, "firstName")
        .len_range(&input.last_name, 2, 50, "lastName")
        .email(&input.email, "email")
        .len_range(&input.position, 2, 100, "position")
        .phone(input.phone.as_deref(), "phone")
        .amount(input.salary_cents, "salaryCents")
        .amount(input.hourly_rate_cents, "hourlyRateCents");
    if let Some(problem) = input.password.as_deref().and_then(validate::password_problem) {
        checks.fail("password", problem);
    }
    checks.finish()
}

async fn ensure_department<C: ConnectionTrait>(db: &C, org_id: Uuid, id: Uuid) -> ApiResult<()> {
    departments::Entity::find_by_id(id)
        .filter(departments::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .map(|_| ())
        .ok_or_else(|| ApiError::bad_request("Department not found"))
}

async fn ensure_manager<C: ConnectionTrait>(db: &C, org_id: Uuid, id: Uuid) -> ApiResult<()> {
    employees::Entity::find_by_id(id)
        .filter(employees::Column::OrgId.eq(org_id))
        .filter(employees::Column::IsActive.eq(true))
        .one(db)
        .await
        .map_err(db_error)?
        .map(|_| ())
        .ok_or_else(|| ApiError::bad_request("Manager not found"))
}

fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(24)
        .collect();
    while base.len() < 3 {
        base.push('_');
    }
    base
}

async fn unique_username<C: ConnectionTrait>(db: &C, email: &str) -> ApiResult<String> {
    let base = username_base(email);
    let mut candidate = base.clone();
    let mut suffix = 1;
    loop {
        let taken = users::Entity::find()
            .filter(users::Column::Username.eq(candidate.clone()))
            .count(db)
            .await
            .map_err(db_error)?;
        if taken == 0 {
            return Ok(candidate);
        }
        suffix += 1;
        candidate = format!("{base}{suffix}");
    }
}

fn temporary_password() -> String {
    let body: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{body}Aa1")
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn create<C>(db: &C, actor: &Actor, input: CreateEmployeeInput) -> ApiResult<CreatedEmployee>
where
    C: ConnectionTrait + TransactionTrait,
{
    actor.require(Permission::EmployeesWrite)?;
    validate_create(&input)?;
    let role = input.role.unwrap_or(Role::Employee);
    match role {
        Role::Candidate => {
            return Err(ApiError::field("role", "Staff accounts cannot use the CANDIDATE role"));
        }
        Role::Admin if actor.role != Role::Admin => {
            return Err(ApiError::forbidden("Only administrators can create administrators"));
        }
        _ => {}
    }

    let email = validate::normalize_email(&input.email);
    let email_taken = users::Entity::find()
        .filter(users::Column::Email.eq(email.clone()))
        .count(db)
        .await
        .map_err(db_error)?;
    if email_taken > 0 {
        return Err(ApiError::Conflict {
            message: "Employee with this email already exists".into(),
            field: "email".into(),
        });
    }
    if let Some(id) = input.department_id {
        ensure_department(db, actor.org_id, id).await?;
    }
    if let Some(id) = input.manager_id {
        ensure_manager(db, actor.org_id, id).await?;
    }

    let (password, temporary_password) = match input.password {
        Some(password) => (password, None),
        None => {
            let generated = temporary_password();
            (generated.clone(), Some(generated))
        }
    };
    let password_hash = hash_password(&password).map_err(token_error)?;
    let username = unique_username(db, &email).await?;
    let ts = now();

    let txn = db.begin().await.map_err(db_error)?;
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(actor.org_id),
        email: Set(email.clone()),
        username: Set(username.clone()),
        password_hash: Set(password_hash),
        role: Set(role_to_entity(role)),
        is_active: Set(true),
        last_login_at: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(&txn)
    .await
    .map_err(db_error)?;
    let employee = employees::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(actor.org_id),
        user_id: Set(user.id),
        employee_code: Set(next_employee_code(&txn, actor.org_id).await?),
        first_name: Set(input.first_name.trim().to_string()),
        last_name: Set(input.last_name.trim().to_string()),
        email: Set(email),
        phone: Set(validate::clean(input.phone)),
        position: Set(input.position.trim().to_string()),
        department_id: Set(input.department_id),
        manager_id: Set(input.manager_id),
        employment_type: Set(input
            .employment_type
            .unwrap_or(employees::EmploymentType::FullTime)),
        salary_cents: Set(input.salary_cents),
        hourly_rate_cents: Set(input.hourly_rate_cents),
        hire_date: Set(input.hire_date.unwrap_or_else(|| Utc::now().date_naive())),
        termination_date: Set(None),
        is_on_probation: Set(true),
        is_active: Set(true),
        avatar_path: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(&txn)
    .await
    .map_err(db_error)?;
    txn.commit().await.map_err(db_error)?;

    info!(employee_id = %employee.id, code = %employee.employee_code, "employee created");
    Ok(CreatedEmployee {
        employee: view(db, employee).await?,
        username,
        role,
        temporary_password,
    })
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn update<C>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: UpdateEmployeeInput,
) -> ApiResult<EmployeeView>
where
    C: ConnectionTrait + TransactionTrait,
{
    actor.require(Permission::EmployeesWrite)?;
    let employee = org_employee(db, actor.org_id, id).await?;

    let mut checks = Checks::new();
    if let Some(first) = &input.first_name {
        checks.len_range(first, 2, 50, "firstName");
    }
    if let Some(last) = &input.last_name {
        checks.len_range(last, 2, 50, "lastName");
    }
    if let Some(position) = &input.position {
        checks.len_range(position, 2, 100, "position");
    }
    checks
        .phone(input.phone.as_deref(), "phone")
        .amount(input.salary_cents, "salaryCents")
        .amount(input.hourly_rate_cents, "hourlyRateCents");
    checks.finish()?;

    if input.manager_id == Some(employee.id) {
        return Err(ApiError::bad_request("Employee cannot be their own manager"));
    }
    if let Some(department_id) = input.department_id {
        ensure_department(db, actor.org_id, department_id).await?;
    }
    if let Some(manager_id) = input.manager_id {
        ensure_manager(db, actor.org_id, manager_id).await?;
    }
    if matches!(input.role, Some(Role::Candidate)) {
        return Err(ApiError::field("role", "Staff accounts cannot use the CANDIDATE role"));
    }
    if matches!(input.role, Some(Role::Admin)) && actor.role != Role::Admin {
        return Err(ApiError::forbidden("Only administrators can grant the ADMIN role"));
    }
    let user = users::Entity::find_by_id(employee.user_id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if user.role == users::Role::Admin && actor.role != Role::Admin {
        return Err(ApiError::forbidden("Only administrators can modify an ADMIN account"));
    }

    let ts = now();
    let mut active: employees::ActiveModel = employee.into();
    if let Some(v) = input.first_name {
        active.first_name = Set(v.trim().to_string());
    }
    if let Some(v) = input.last_name {
        active.last_name = Set(v.trim().to_string());
    }
    if let Some(v) = input.phone {
        active.phone = Set(validate::clean(Some(v)));
    }
    if let Some(v) = input.position {
        active.position = Set(v.trim().to_string());
    }
    if let Some(v) = input.department_id {
        active.department_id = Set(Some(v));
    }
    if let Some(v) = input.manager_id {
        active.manager_id = Set(Some(v));
    }
    if let Some(v) = input.salary_cents {
        active.salary_cents = Set(Some(v));
    }
    if let Some(v) = input.hourly_rate_cents {
        active.hourly_rate_cents = Set(Some(v));
    }
    if let Some(v) = input.employment_type {
        active.employment_type = Set(v);
    }
    if let Some(v) = input.is_on_probation {
        active.is_on_probation = Set(v);
    }
    if let Some(v) = input.is_active {
        active.is_active = Set(v);
        if v {
            active.termination_date = Set(None);
        }
    }
    active.updated_at = Set(ts);

    let txn = db.begin().await.map_err(db_error)?;
    let updated = active.update(&txn).await.map_err(db_error)?;
    if input.role.is_some() || input.is_active.is_some() {
        let mut user: users::ActiveModel = user.into();
        if let Some(role) = input.role {
            user.role = Set(role_to_entity(role));
        }
        if let Some(is_active) = input.is_active {
            user.is_active = Set(is_active);
        }
        user.updated_at = Set(ts);
        user.update(&txn).await.map_err(db_error)?;
    }
    txn.commit().await.map_err(db_error)?;
    view(db, updated).await
}

/// Soft delete: the employee is marked inactive with a termination date and
/// their login is disabled.
#[instrument(skip(db), fields(org_id = %actor.org_id))]
pub async fn deactivate<C>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<()>
where
    C: ConnectionTrait + TransactionTrait,
{
    actor.require(Permission::EmployeesDelete)?;
    let employee = org_employee(db, actor.org_id, id).await?;
    if actor.employee_id == Some(employee.id) {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }
    if !employee.is_active {
        return Err(ApiError::bad_request("Employee is already deactivated"));
    }
    let ts = now();
    let user_id = employee.user_id;
    let txn = db.begin().await.map_err(db_error)?;
    let mut active: employees::ActiveModel = employee.into();
    active.is_active = Set(false);
    active.termination_date = Set(Some(Utc::now().date_naive()));
    active.updated_at = Set(ts);
    active.update(&txn).await.map_err(db_error)?;
    users::Entity::update_many()
        .col_expr(users::Column::IsActive, Expr::value(false))
        .col_expr(users::Column::UpdatedAt, Expr::value(ts))
        .filter(users::Column::Id.eq(user_id))
        .exec(&txn)
        .await
        .map_err(db_error)?;
    txn.commit().await.map_err(db_error)?;
    info!(employee_id = %id, "employee deactivated");
    Ok(())
}

/// Active headcount per department, departmentless staff last.
pub async fn department_headcount<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
) -> ApiResult<Vec<DepartmentHeadcount>> {
    let active = employees::Entity::find()
        .filter(employees::Column::OrgId.eq(org_id))
        .filter(employees::Column::IsActive.eq(true))
        .all(db)
        .await
        .map_err(db_error)?;
    let names: HashMap<Uuid, String> = departments::Entity::find()
        .filter(departments::Column::OrgId.eq(org_id))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();
    let mut counts: BTreeMap<Option<Uuid>, u64> = BTreeMap::new();
    for employee in &active {
        *counts.entry(employee.department_id).or_default() += 1;
    }
    let mut rows: Vec<DepartmentHeadcount> = counts
        .into_iter()
        .map(|(department_id, count)| DepartmentHeadcount {
            name: department_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_else(|| "Unassigned".into()),
            department_id,
            count,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.department_id
            .is_none()
            .cmp(&b.department_id.is_none())
            .then(b.count.cmp(&a.count))
            .then(a.name.cmp(&b.name))
    });
    Ok(rows)
}

pub async fn stats<C: ConnectionTrait>(db: &C, actor: &Actor) -> ApiResult<EmployeeStats> {
    actor.require(Permission::ReportsRead)?;
    let all = employees::Entity::find()
        .filter(employees::Column::OrgId.eq(actor.org_id))
        .all(db)
        .await
        .map_err(db_error)?;
    let since = Utc::now().date_naive() - Duration::days(30);
    let active: Vec<&employees::Model> = all.iter().filter(|e| e.is_active).collect();
    let mut by_type: BTreeMap<&'static str, (employees::EmploymentType, u64)> = BTreeMap::new();
    for employee in &active {
        let key = employment_type_key(employee.employment_type);
        by_type.entry(key).or_insert((employee.employment_type, 0)).1 += 1;
    }
    Ok(EmployeeStats {
        total: all.len() as u64,
        active: active.len() as u64,
        inactive: (all.len() - active.len()) as u64,
        on_probation: active.iter().filter(|e| e.is_on_probation).count() as u64,
        recent_hires: active.iter().filter(|e| e.hire_date >= since).count() as u64,
        by_department: department_headcount(db, actor.org_id).await?,
        by_employment_type: by_type
            .into_values()
            .map(|(employment_type, count)| EmploymentTypeCount {
                employment_type,
                count,
            })
            .collect(),
    })
}

fn employment_type_key(value: employees::EmploymentType) -> &'static str {
    match value {
        employees::EmploymentType::FullTime => "FULL_TIME",
        employees::EmploymentType::PartTime => "PART_TIME",
        employees::EmploymentType::Contract => "CONTRACT",
        employees::EmploymentType::Intern => "INTERN",
        employees::EmploymentType::Freelance => "FREELANCE",
    }
}

/// Active direct reports of a manager given by employee or user id.
pub async fn team<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    manager_ref: Uuid,
) -> ApiResult<Vec<EmployeeView>> {
    actor.require(Permission::EmployeesRead)?;
    let manager = find_by_employee_or_user(db, actor.org_id, manager_ref).await?;
    if actor.role == Role::Manager && actor.employee_id != Some(manager.id) {
        return Err(ApiError::forbidden("Managers can only view their own team"));
    }
    let rows = employees::Entity::find()
        .filter(employees::Column::OrgId.eq(actor.org_id))
        .filter(employees::Column::ManagerId.eq(manager.id))
        .filter(employees::Column::IsActive.eq(true))
        .order_by_asc(employees::Column::LastName)
        .all(db)
        .await
        .map_err(db_error)?;
    enrich(db, rows).await
}

pub async fn performance<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
) -> ApiResult<EmployeePerformance> {
    actor.require(Permission::PerformanceRead)?;
    let employee = find_by_employee_or_user(db, actor.org_id, id).await?;
    if !can_view(actor, &employee) {
        return Err(ApiError::forbidden("Access denied"));
    }
    let reviews = performance_reviews::Entity::find()
        .filter(performance_reviews::Column::EmployeeId.eq(employee.id))
        .order_by_desc(performance_reviews::Column::CreatedAt)
        .all(db)
        .await
        .map_err(db_error)?;
    let rated: Vec<f64> = reviews.iter().filter_map(|r| r.overall_rating).collect();
    let average_rating = if rated.is_empty() {
        None
    } else {
        Some(round2(rated.iter().sum::<f64>() / rated.len() as f64))
    };
    Ok(EmployeePerformance {
        employee_id: employee.id,
        total_reviews: reviews.len(),
        reviews,
        average_rating,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_come_from_the_mailbox() {
        assert_eq!(username_base("jane.doe+hr@example.test"), "janedoehr");
        assert_eq!(username_base("a@example.test"), "a__");
    }

    #[test]
    fn temporary_passwords_are_strong() {
        let password = temporary_password();
        assert_eq!(password.len(), 13);
        assert!(validate::password_problem(&password).is_none());
    }
}
