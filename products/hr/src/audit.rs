//! Append-only trail of mutating staff requests.

use entity::audit_logs;
use platform_api::ApiResult;
use platform_authz::Role;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::context::Actor;
use crate::validate;
use crate::{Paged, db_error, now};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub method: String,
    pub path: String,
}

impl AuditEntry {
    /// `None` for methods that do not change anything.
    pub fn action(&self) -> Option<&'static str> {
        action_for(&self.method)
    }
}

pub fn action_for(method: &str) -> Option<&'static str> {
    match method.to_ascii_uppercase().as_str() {
        "POST" => Some("CREATE"),
        "PUT" | "PATCH" => Some("UPDATE"),
        "DELETE" => Some("DELETE"),
        _ => None,
    }
}

/// `/api/employees/<id>/...` → (`employees`, Some(`<id>`)).
pub fn entity_from_path(path: &str) -> (String, Option<String>) {
    let mut segments = path
        .split('?')
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.is_empty())
        .skip_while(|s| *s == "api");
    let entity = segments.next().unwrap_or("unknown").to_string();
    let entity_id = segments
        .next()
        .filter(|s| Uuid::parse_str(s).is_ok())
        .map(str::to_string);
    (entity, entity_id)
}

pub async fn record<C: ConnectionTrait>(
    db: &C,
    entry: AuditEntry,
) -> ApiResult<Option<audit_logs::Model>> {
    let Some(action) = entry.action() else {
        return Ok(None);
    };
    let (entity, entity_id) = entity_from_path(&entry.path);
    let row = audit_logs::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(entry.org_id),
        user_id: Set(entry.user_id),
        action: Set(action.to_string()),
        entity: Set(entity),
        entity_id: Set(entity_id),
        method: Set(entry.method.to_ascii_uppercase()),
        path: Set(entry.path),
        created_at: Set(now()),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    Ok(Some(row))
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub entity: Option<String>,
    pub user_id: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub async fn recent<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: AuditQuery,
) -> ApiResult<Paged<audit_logs::Model>> {
    actor.require_role(&[Role::Admin])?;
    let page = validate::page(query.page, query.limit, 20)?;
    let mut select =
        audit_logs::Entity::find().filter(audit_logs::Column::OrgId.eq(actor.org_id));
    if let Some(entity) = query.entity {
        select = select.filter(audit_logs::Column::Entity.eq(entity));
    }
    if let Some(user_id) = query.user_id {
        select = select.filter(audit_logs::Column::UserId.eq(user_id));
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_desc(audit_logs::Column::CreatedAt)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(Paged::new(rows, page, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_mutations_are_recorded() {
        assert_eq!(action_for("post"), Some("CREATE"));
        assert_eq!(action_for("PATCH"), Some("UPDATE"));
        assert_eq!(action_for("DELETE"), Some("DELETE"));
        assert_eq!(action_for("GET"), None);
    }

    #[test]
    fn entity_and_id_come_from_the_path() {
        let id = Uuid::new_v4();
        assert_eq!(
            entity_from_path(&format!("/api/employees/{id}?x=1")),
            ("employees".to_string(), Some(id.to_string()))
        );
        assert_eq!(
            entity_from_path("/api/attendance/clock-in"),
            ("attendance".to_string(), None)
        );
        assert_eq!(entity_from_path("/"), ("unknown".to_string(), None));
    }
}
