//! Account administration for staff logins.

use chrono::Utc;
use entity::{employees, users};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Permission, PolicyEngine, Role};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{UserProfile, user_profile};
use crate::context::{Actor, role_from_entity, role_to_entity};
use crate::validate;
use crate::{Paged, db_error, like_any, now};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusInput {
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedUser {
    #[serde(flatten)]
    pub user: UserProfile,
    pub permissions: Vec<&'static str>,
}

fn managed(user: UserProfile) -> ManagedUser {
    let permissions = PolicyEngine
        .permissions_for(user.role)
        .into_iter()
        .map(|permission| permission.as_str())
        .collect();
    ManagedUser { user, permissions }
}

async fn org_user<C: ConnectionTrait>(db: &C, org_id: Uuid, id: Uuid) -> ApiResult<users::Model> {
    users::Entity::find_by_id(id)
        .filter(users::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// HR may manage everyone except administrators; nobody manages themself here.
fn guard_target(actor: &Actor, user: &users::Model) -> ApiResult<()> {
    if user.id == actor.user_id {
        return Err(ApiError::bad_request(
            "You cannot change the status of your own account",
        ));
    }
    if user.role == users::Role::Admin && actor.role != Role::Admin {
        return Err(ApiError::forbidden(
            "Only administrators can modify an ADMIN account",
        ));
    }
    Ok(())
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: UserQuery,
) -> ApiResult<Paged<ManagedUser>> {
    actor.require(Permission::UsersRead)?;
    let page = validate::page(query.page, query.limit, 20)?;
    let mut select = users::Entity::find().filter(users::Column::OrgId.eq(actor.org_id));
    if let Some(role) = query.role {
        select = select.filter(users::Column::Role.eq(role_to_entity(role)));
    }
    if let Some(is_active) = query.is_active {
        select = select.filter(users::Column::IsActive.eq(is_active));
    }
    if let Some(term) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(like_any(
            term,
            users::Entity,
            &[users::Column::Email, users::Column::Username],
        ));
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_desc(users::Column::CreatedAt)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    let mut items = Vec::with_capacity(rows.len());
    for user in rows {
        items.push(managed(user_profile(db, user).await?));
    }
    Ok(Paged::new(items, page, total))
}

/// Enable or disable a login. The linked employee record follows.
#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn set_status<C>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: UserStatusInput,
) -> ApiResult<ManagedUser>
where
    C: ConnectionTrait + TransactionTrait,
{
    actor.require(Permission::UsersWrite)?;
    let user = org_user(db, actor.org_id, id).await?;
    guard_target(actor, &user)?;
    let ts = now();
    let txn = db.begin().await.map_err(db_error)?;
    let mut active: users::ActiveModel = user.into();
    active.is_active = Set(input.is_active);
    active.updated_at = Set(ts);
    let user = active.update(&txn).await.map_err(db_error)?;
    let termination = (!input.is_active).then(|| Utc::now().date_naive());
    employees::Entity::update_many()
        .col_expr(employees::Column::IsActive, Expr::value(input.is_active))
        .col_expr(employees::Column::TerminationDate, Expr::value(termination))
        .col_expr(employees::Column::UpdatedAt, Expr::value(ts))
        .filter(employees::Column::UserId.eq(user.id))
        .exec(&txn)
        .await
        .map_err(db_error)?;
    txn.commit().await.map_err(db_error)?;
    info!(user_id = %user.id, is_active = user.is_active, role = ?role_from_entity(user.role), "user status changed");
    Ok(managed(user_profile(db, user).await?))
}

/// Soft delete: the login and its employee record are deactivated.
#[instrument(skip(db), fields(org_id = %actor.org_id))]
pub async fn delete<C>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<()>
where
    C: ConnectionTrait + TransactionTrait,
{
    actor.require(Permission::UsersDelete)?;
    let user = org_user(db, actor.org_id, id).await?;
    if user.id == actor.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }
    if !user.is_active {
        return Err(ApiError::bad_request("User is already deactivated"));
    }
    set_status(db, actor, id, UserStatusInput { is_active: false }).await?;
    info!(user_id = %id, "user deleted");
    Ok(())
}
