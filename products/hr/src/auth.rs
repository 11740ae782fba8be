use chrono::Utc;
use entity::{departments, employees, users};
use platform_api::{ApiError, ApiResult};
use platform_authn::{TokenKind, TokenPair, TokenService, hash_password, verify_password};
use platform_authz::{PolicyEngine, Role};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::{Actor, role_from_entity, role_to_entity, token_error};
use crate::employees::next_employee_code;
use crate::validate::{self, Checks};
use crate::{db_error, now};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub id: Uuid,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub manager_id: Option<Uuid>,
    pub avatar_path: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<sea_orm::prelude::DateTimeWithTimeZone>,
    pub employee: Option<EmployeeSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthSession {
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Clone, Debug, Serialize)]
pub struct PermissionsView {
    pub role: Role,
    pub permissions: Vec<&'static str>,
}

fn validate_register(input: &RegisterInput) -> ApiResult<()> {
    let mut checks = Checks::new();
    checks
        .email(&input.email, "email")
        .check(
            validate::is_username(&input.username),
            "username",
            "Username must be 3-30 characters and contain only letters, numbers, and underscores",
        )
        .len_range(&input.first_name, 2, 50, "firstName")
        .len_range(&input.last_name, 2, 50, "lastName")
        .phone(input.phone_number.as_deref(), "phoneNumber")
        .max_len(input.position.as_deref(), 100, "position");
    if let Some(problem) = validate::password_problem(&input.password) {
        checks.fail("password", problem);
    }
    checks.finish()
}

/// Self-service staff registration into `org_id`. The first account of an
/// org becomes its ADMIN; later accounts may not claim ADMIN or HR.
#[instrument(skip(db, tokens, input), fields(email = %input.email))]
pub async fn register<C>(
    db: &C,
    tokens: &TokenService,
    org_id: Uuid,
    input: RegisterInput,
) -> ApiResult<AuthSession>
where
    C: ConnectionTrait + TransactionTrait,
{
    validate_register(&input)?;
    let email = validate::normalize_email(&input.email);
    let username = input.username.trim().to_string();

    let existing_users = users::Entity::find()
        .filter(users::Column::OrgId.eq(org_id))
        .count(db)
        .await
        .map_err(db_error)?;
    let role = if existing_users == 0 {
        Role::Admin
    } else {
        match input.role.unwrap_or(Role::Employee) {
            Role::Admin | Role::Hr => {
                return Err(ApiError::forbidden(
                    "Elevated roles are assigned by an administrator",
                ));
            }
            Role::Candidate => {
                return Err(ApiError::bad_request(
                    "Candidates register through the candidate portal",
                ));
            }
            role => role,
        }
    };

    if users::Entity::find()
        .filter(users::Column::Email.eq(email.clone()))
        .one(db)
        .await
        .map_err(db_error)?
        .is_some()
    {
        return Err(ApiError::Conflict {
            message: "User already exists".into(),
            field: "email".into(),
        });
    }
    if users::Entity::find()
        .filter(users::Column::Username.eq(username.clone()))
        .one(db)
        .await
        .map_err(db_error)?
        .is_some()
    {
        return Err(ApiError::Conflict {
            message: "User already exists".into(),
            field: "username".into(),
        });
    }
    if let Some(department_id) = input.department_id {
        departments::Entity::find_by_id(department_id)
            .filter(departments::Column::OrgId.eq(org_id))
            .one(db)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ApiError::bad_request("Department not found"))?;
    }

    let password_hash = hash_password(&input.password).map_err(token_error)?;
    let ts = now();
    let txn = db.begin().await.map_err(db_error)?;
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(org_id),
        email: Set(email.clone()),
        username: Set(username),
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
    let employee_code = next_employee_code(&txn, org_id).await?;
    employees::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(org_id),
        user_id: Set(user.id),
        employee_code: Set(employee_code),
        first_name: Set(input.first_name.trim().to_string()),
        last_name: Set(input.last_name.trim().to_string()),
        email: Set(email),
        phone: Set(validate::clean(input.phone_number)),
        position: Set(validate::clean(input.position).unwrap_or_else(|| "Employee".into())),
        department_id: Set(input.department_id),
        manager_id: Set(None),
        employment_type: Set(employees::EmploymentType::FullTime),
        salary_cents: Set(None),
        hourly_rate_cents: Set(None),
        hire_date: Set(Utc::now().date_naive()),
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

    info!(user_id = %user.id, role = role.as_str(), "user registered");
    let tokens = tokens
        .issue_pair(user.id, org_id, role.as_str())
        .map_err(token_error)?;
    Ok(AuthSession {
        user: user_profile(db, user).await?,
        tokens,
    })
}

#[instrument(skip(db, tokens, input))]
pub async fn login<C: ConnectionTrait>(
    db: &C,
    tokens: &TokenService,
    input: LoginInput,
) -> ApiResult<AuthSession> {
    let mut checks = Checks::new();
    checks
        .email(&input.email, "email")
        .required(&input.password, "password", "Password is required");
    checks.finish()?;

    let user = users::Entity::find()
        .filter(users::Column::Email.eq(validate::normalize_email(&input.email)))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if !verify_password(&input.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }
    if !user.is_active {
        return Err(ApiError::unauthorized("Account is deactivated"));
    }

    let mut active: users::ActiveModel = user.into();
    active.last_login_at = Set(Some(now()));
    let user = active.update(db).await.map_err(db_error)?;

    let role = role_from_entity(user.role);
    let tokens = tokens
        .issue_pair(user.id, user.org_id, role.as_str())
        .map_err(token_error)?;
    info!(user_id = %user.id, "user logged in");
    Ok(AuthSession {
        user: user_profile(db, user).await?,
        tokens,
    })
}

/// Exchange a refresh token for a new pair. The account must still be active.
pub async fn refresh<C: ConnectionTrait>(
    db: &C,
    tokens: &TokenService,
    refresh_token: &str,
) -> ApiResult<TokenPair> {
    let claims = tokens
        .verify(refresh_token, TokenKind::Refresh)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;
    let user = users::Entity::find_by_id(claims.sub)
        .one(db)
        .await
        .map_err(db_error)?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;
    tokens
        .issue_pair(user.id, user.org_id, role_from_entity(user.role).as_str())
        .map_err(token_error)
}

pub async fn profile<C: ConnectionTrait>(db: &C, actor: &Actor) -> ApiResult<UserProfile> {
    let user = users::Entity::find_by_id(actor.user_id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    user_profile(db, user).await
}

#[instrument(skip(db, input), fields(user_id = %actor.user_id))]
pub async fn change_password<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: ChangePasswordInput,
) -> ApiResult<()> {
    let mut checks = Checks::new();
    checks.required(
        &input.current_password,
        "currentPassword",
        "Current password is required",
    );
    if let Some(problem) = validate::password_problem(&input.new_password) {
        checks.fail("newPassword", problem);
    }
    checks.finish()?;

    let user = users::Entity::find_by_id(actor.user_id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if !verify_password(&input.current_password, &user.password_hash) {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }
    let mut active: users::ActiveModel = user.into();
    active.password_hash = Set(hash_password(&input.new_password).map_err(token_error)?);
    active.updated_at = Set(now());
    active.update(db).await.map_err(db_error)?;
    info!("password changed");
    Ok(())
}

pub fn permissions(actor: &Actor) -> PermissionsView {
    PermissionsView {
        role: actor.role,
        permissions: PolicyEngine
            .permissions_for(actor.role)
            .into_iter()
            .map(|permission| permission.as_str())
            .collect(),
    }
}

pub async fn user_profile<C: ConnectionTrait>(db: &C, user: users::Model) -> ApiResult<UserProfile> {
    let employee = employees::Entity::find()
        .filter(employees::Column::UserId.eq(user.id))
        .one(db)
        .await
        .map_err(db_error)?;
    let employee = match employee {
        Some(employee) => Some(employee_summary(db, employee).await?),
        None => None,
    };
    Ok(UserProfile {
        id: user.id,
        org_id: user.org_id,
        email: user.email,
        username: user.username,
        role: role_from_entity(user.role),
        is_active: user.is_active,
        last_login_at: user.last_login_at,
        employee,
    })
}

async fn employee_summary<C: ConnectionTrait>(
    db: &C,
    employee: employees::Model,
) -> ApiResult<EmployeeSummary> {
    let department_name = match employee.department_id {
        Some(id) => departments::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(db_error)?
            .map(|d| d.name),
        None => None,
    };
    Ok(EmployeeSummary {
        id: employee.id,
        employee_code: employee.employee_code,
        first_name: employee.first_name,
        last_name: employee.last_name,
        position: employee.position,
        department_id: employee.department_id,
        department_name,
        manager_id: employee.manager_id,
        avatar_path: employee.avatar_path,
    })
}
