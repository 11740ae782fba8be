use std::collections::{HashMap, HashSet};

use entity::{departments, employees};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Permission, Role};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::Actor;
use crate::validate::{self, Checks};
use crate::{Paged, db_error, like_any, now};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentView {
    #[serde(flatten)]
    pub department: departments::Model,
    pub employee_count: u64,
    pub sub_department_count: u64,
    pub manager_name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentMember {
    pub id: Uuid,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentDetail {
    #[serde(flatten)]
    pub view: DepartmentView,
    pub employees: Vec<DepartmentMember>,
    pub sub_departments: Vec<departments::Model>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentNode {
    pub id: Uuid,
    pub name: String,
    pub manager_id: Option<Uuid>,
    pub employee_count: u64,
    pub children: Vec<DepartmentNode>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentTree {
    pub departments: Vec<DepartmentNode>,
    pub flat_view: Vec<DepartmentView>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cost_center: Option<String>,
    pub budget_cents: Option<i64>,
    pub location: Option<String>,
    pub parent_department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// Arrange departments into a forest. Rows whose parent is missing become
/// roots; children are ordered by name.
pub fn build_tree(rows: &[(departments::Model, u64)]) -> Vec<DepartmentNode> {
    let ids: HashSet<Uuid> = rows.iter().map(|(d, _)| d.id).collect();
    let mut children: HashMap<Option<Uuid>, Vec<&(departments::Model, u64)>> = HashMap::new();
    for row in rows {
        let parent = row.0.parent_id.filter(|p| ids.contains(p) && *p != row.0.id);
        children.entry(parent).or_default().push(row);
    }
    for list in children.values_mut() {
        list.sort_by(|a, b| a.0.name.cmp(&b.0.name));
    }
    let mut seen = HashSet::new();
    assemble(None, &children, &mut seen)
}

fn assemble(
    parent: Option<Uuid>,
    children: &HashMap<Option<Uuid>, Vec<&(departments::Model, u64)>>,
    seen: &mut HashSet<Uuid>,
) -> Vec<DepartmentNode> {
    let Some(rows) = children.get(&parent) else {
        return Vec::new();
    };
    let mut nodes = Vec::with_capacity(rows.len());
    for (d, count) in rows.iter().copied() {
        if !seen.insert(d.id) {
            continue;
        }
        nodes.push(DepartmentNode {
            id: d.id,
            name: d.name.clone(),
            manager_id: d.manager_id,
            employee_count: *count,
            children: assemble(Some(d.id), children, seen),
        });
    }
    nodes
}

/// True when making `new_parent` the parent of `id` would close a loop.
pub fn would_create_cycle(
    id: Uuid,
    new_parent: Uuid,
    parent_of: &HashMap<Uuid, Option<Uuid>>,
) -> bool {
    let mut current = Some(new_parent);
    let mut visited = HashSet::new();
    while let Some(node) = current {
        if node == id || !visited.insert(node) {
            return true;
        }
        current = parent_of.get(&node).copied().flatten();
    }
    false
}

async fn counts<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
) -> ApiResult<(HashMap<Uuid, u64>, HashMap<Uuid, u64>, HashMap<Uuid, String>)> {
    let staff = employees::Entity::find()
        .filter(employees::Column::OrgId.eq(org_id))
        .filter(employees::Column::IsActive.eq(true))
        .all(db)
        .await
        .map_err(db_error)?;
    let mut employee_counts: HashMap<Uuid, u64> = HashMap::new();
    for employee in &staff {
        if let Some(department_id) = employee.department_id {
            *employee_counts.entry(department_id).or_default() += 1;
        }
    }
    let names = staff.iter().map(|e| (e.id, e.full_name())).collect();
    let mut child_counts: HashMap<Uuid, u64> = HashMap::new();
    for department in departments::Entity::find()
        .filter(departments::Column::OrgId.eq(org_id))
        .all(db)
        .await
        .map_err(db_error)?
    {
        if let Some(parent) = department.parent_id {
            *child_counts.entry(parent).or_default() += 1;
        }
    }
    Ok((employee_counts, child_counts, names))
}

async fn views<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    rows: Vec<departments::Model>,
) -> ApiResult<Vec<DepartmentView>> {
    let (employee_counts, child_counts, names) = counts(db, org_id).await?;
    Ok(rows
        .into_iter()
        .map(|department| DepartmentView {
            employee_count: employee_counts.get(&department.id).copied().unwrap_or(0),
            sub_department_count: child_counts.get(&department.id).copied().unwrap_or(0),
            manager_name: department.manager_id.and_then(|id| names.get(&id).cloned()),
            department,
        })
        .collect())
}

async fn org_department<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    id: Uuid,
) -> ApiResult<departments::Model> {
    departments::Entity::find_by_id(id)
        .filter(departments::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Department not found"))
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: DepartmentQuery,
) -> ApiResult<Paged<DepartmentView>> {
    actor.require(Permission::DepartmentsRead)?;
    let page = validate::page(query.page, query.limit, 10)?;
    let column = match query.sort_by.as_deref().unwrap_or("name") {
        "name" => departments::Column::Name,
        "createdAt" => departments::Column::CreatedAt,
        "budget" => departments::Column::BudgetCents,
        _ => return Err(ApiError::field("sortBy", "Invalid sort field")),
    };
    let order = match query.sort_order.as_deref().unwrap_or("asc") {
        "asc" => Order::Asc,
        "desc" => Order::Desc,
        _ => return Err(ApiError::field("sortOrder", "Sort order must be asc or desc")),
    };

    let mut select =
        departments::Entity::find().filter(departments::Column::OrgId.eq(actor.org_id));
    if let Some(term) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(like_any(
            term,
            departments::Entity,
            &[
                departments::Column::Name,
                departments::Column::Description,
                departments::Column::Location,
            ],
        ));
    }
    if let Some(is_active) = query.is_active {
        select = select.filter(departments::Column::IsActive.eq(is_active));
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by(column, order)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(Paged::new(views(db, actor.org_id, rows).await?, page, total))
}

pub async fn get<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<DepartmentDetail> {
    actor.require(Permission::DepartmentsRead)?;
    let department = org_department(db, actor.org_id, id).await?;
    let members = employees::Entity::find()
        .filter(employees::Column::DepartmentId.eq(department.id))
        .filter(employees::Column::IsActive.eq(true))
        .order_by_asc(employees::Column::LastName)
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|e| DepartmentMember {
            id: e.id,
            employee_code: e.employee_code,
            first_name: e.first_name,
            last_name: e.last_name,
            position: e.position,
        })
        .collect();
    let sub_departments = departments::Entity::find()
        .filter(departments::Column::ParentId.eq(department.id))
        .order_by_asc(departments::Column::Name)
        .all(db)
        .await
        .map_err(db_error)?;
    let view = views(db, actor.org_id, vec![department])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Department not found"))?;
    Ok(DepartmentDetail {
        view,
        employees: members,
        sub_departments,
    })
}

fn validate_input(input: &DepartmentInput, creating: bool) -> ApiResult<()> {
    let mut checks = Checks::new();
    match input.name.as_deref() {
        Some(name) => {
            checks.len_range(name, 2, 100, "name");
        }
        None if creating => {
            checks.fail("name", "Department name is required");
        }
        None => {}
    }
    checks
        .max_len(input.description.as_deref(), 500, "description")
        .max_len(input.cost_center.as_deref(), 20, "costCenter")
        .max_len(input.location.as_deref(), 100, "location")
        .check(
            input.budget_cents.is_none_or(|b| b > 0),
            "budgetCents",
            "Budget must be a positive number",
        );
    checks.finish()
}

async fn ensure_unique_name<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    name: &str,
    except: Option<Uuid>,
) -> ApiResult<()> {
    let mut select = departments::Entity::find()
        .filter(departments::Column::OrgId.eq(org_id))
        .filter(departments::Column::Name.eq(name));
    if let Some(id) = except {
        select = select.filter(departments::Column::Id.ne(id));
    }
    if select.count(db).await.map_err(db_error)? > 0 {
        return Err(ApiError::Conflict {
            message: "Department with this name already exists".into(),
            field: "name".into(),
        });
    }
    Ok(())
}

async fn ensure_references<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    input: &DepartmentInput,
) -> ApiResult<()> {
    if let Some(parent) = input.parent_department_id {
        org_department(db, org_id, parent)
            .await
            .map_err(|_| ApiError::bad_request("Parent department not found"))?;
    }
    if let Some(manager) = input.manager_id {
        employees::Entity::find_by_id(manager)
            .filter(employees::Column::OrgId.eq(org_id))
            .one(db)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ApiError::bad_request("Manager not found"))?;
    }
    Ok(())
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn create<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: DepartmentInput,
) -> ApiResult<DepartmentView> {
    actor.require(Permission::DepartmentsWrite)?;
    validate_input(&input, true)?;
    let name = input.name.clone().unwrap_or_default().trim().to_string();
    ensure_unique_name(db, actor.org_id, &name, None).await?;
    ensure_references(db, actor.org_id, &input).await?;

    let ts = now();
    let department = departments::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(actor.org_id),
        name: Set(name),
        description: Set(validate::clean(input.description)),
        cost_center: Set(validate::clean(input.cost_center)),
        budget_cents: Set(input.budget_cents),
        location: Set(validate::clean(input.location)),
        parent_id: Set(input.parent_department_id),
        manager_id: Set(input.manager_id),
        is_active: Set(input.is_active.unwrap_or(true)),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(department_id = %department.id, "department created");
    views(db, actor.org_id, vec![department])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Department not found"))
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn update<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: DepartmentInput,
) -> ApiResult<DepartmentView> {
    actor.require(Permission::DepartmentsWrite)?;
    validate_input(&input, false)?;
    let department = org_department(db, actor.org_id, id).await?;
    if let Some(name) = input.name.as_deref() {
        ensure_unique_name(db, actor.org_id, name.trim(), Some(id)).await?;
    }
    ensure_references(db, actor.org_id, &input).await?;
    if let Some(parent) = input.parent_department_id {
        if parent == id {
            return Err(ApiError::bad_request("Department cannot be its own parent"));
        }
        let parent_of: HashMap<Uuid, Option<Uuid>> = departments::Entity::find()
            .filter(departments::Column::OrgId.eq(actor.org_id))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|d| (d.id, d.parent_id))
            .collect();
        if would_create_cycle(id, parent, &parent_of) {
            return Err(ApiError::bad_request(
                "Cannot set a sub-department as the parent department",
            ));
        }
    }

    let mut active: departments::ActiveModel = department.into();
    if let Some(v) = input.name {
        active.name = Set(v.trim().to_string());
    }
    if let Some(v) = input.description {
        active.description = Set(validate::clean(Some(v)));
    }
    if let Some(v) = input.cost_center {
        active.cost_center = Set(validate::clean(Some(v)));
    }
    if let Some(v) = input.budget_cents {
        active.budget_cents = Set(Some(v));
    }
    if let Some(v) = input.location {
        active.location = Set(validate::clean(Some(v)));
    }
    if let Some(v) = input.parent_department_id {
        active.parent_id = Set(Some(v));
    }
    if let Some(v) = input.manager_id {
        active.manager_id = Set(Some(v));
    }
    if let Some(v) = input.is_active {
        active.is_active = Set(v);
    }
    active.updated_at = Set(now());
    let department = active.update(db).await.map_err(db_error)?;
    views(db, actor.org_id, vec![department])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Department not found"))
}

#[instrument(skip(db), fields(org_id = %actor.org_id))]
pub async fn delete<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<()> {
    actor.require_role(&[Role::Admin])?;
    let department = org_department(db, actor.org_id, id).await?;
    let staff = employees::Entity::find()
        .filter(employees::Column::DepartmentId.eq(department.id))
        .count(db)
        .await
        .map_err(db_error)?;
    if staff > 0 {
        return Err(ApiError::bad_request(
            "Cannot delete department with employees. Please reassign employees first.",
        ));
    }
    let children = departments::Entity::find()
        .filter(departments::Column::ParentId.eq(department.id))
        .count(db)
        .await
        .map_err(db_error)?;
    if children > 0 {
        return Err(ApiError::bad_request(
            "Cannot delete department with sub-departments",
        ));
    }
    departments::Entity::delete_by_id(department.id)
        .exec(db)
        .await
        .map_err(db_error)?;
    info!(department_id = %id, "department deleted");
    Ok(())
}

pub async fn tree<C: ConnectionTrait>(db: &C, actor: &Actor) -> ApiResult<DepartmentTree> {
    actor.require(Permission::DepartmentsRead)?;
    let rows = departments::Entity::find()
        .filter(departments::Column::OrgId.eq(actor.org_id))
        .filter(departments::Column::IsActive.eq(true))
        .order_by_asc(departments::Column::Name)
        .all(db)
        .await
        .map_err(db_error)?;
    let flat_view = views(db, actor.org_id, rows).await?;
    let counted: Vec<(departments::Model, u64)> = flat_view
        .iter()
        .map(|v| (v.department.clone(), v.employee_count))
        .collect();
    Ok(DepartmentTree {
        departments: build_tree(&counted),
        flat_view,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn department(name: &str, parent: Option<Uuid>) -> departments::Model {
        let ts = Utc::now().fixed_offset();
        departments::Model {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            name: name.into(),
            description: None,
            cost_center: None,
            budget_cents: None,
            location: None,
            parent_id: parent,
            manager_id: None,
            is_active: true,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let root = department("Engineering", None);
        let platform = department("Platform", Some(root.id));
        let apps = department("Apps", Some(root.id));
        let orphan = department("Orphan", Some(Uuid::new_v4()));
        let tree = build_tree(&[
            (platform.clone(), 3),
            (root.clone(), 1),
            (apps.clone(), 2),
            (orphan.clone(), 0),
        ]);
        let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Engineering", "Orphan"]);
        let children: Vec<_> = tree[0].children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(children, ["Apps", "Platform"]);
        assert_eq!(tree[0].children[1].employee_count, 3);
    }

    #[test]
    fn cycles_are_detected_through_ancestry() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let parent_of = HashMap::from([(a, None), (b, Some(a)), (c, Some(b))]);
        assert!(would_create_cycle(a, c, &parent_of));
        assert!(would_create_cycle(a, a, &parent_of));
        assert!(!would_create_cycle(c, a, &parent_of));
    }
}
