use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Utc};
use entity::{departments, employees, leave_requests};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Permission, Role};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::{Actor, org_employee};
use crate::validate::{self, Checks};
use crate::{Paged, db_error, now};

pub const MAX_LEAVE_DAYS: i64 = 365;

/// Yearly allowance per leave type; other types are not capped.
pub const VACATION_DAYS: i64 = 20;
pub const SICK_DAYS: i64 = 10;
pub const PERSONAL_DAYS: i64 = 5;

/// Whole days from `start` to `end`. The end must fall after the start.
pub fn leave_days(start: NaiveDate, end: NaiveDate) -> Result<i64, &'static str> {
    if end <= start {
        return Err("End date must be after start date");
    }
    let days = (end - start).num_days();
    if days > MAX_LEAVE_DAYS {
        return Err("Leave request cannot exceed 365 days");
    }
    Ok(days)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LeaveBalance {
    pub vacation: i64,
    pub sick: i64,
    pub personal: i64,
}

/// Remaining allowance after subtracting approved requests.
pub fn balance(requests: &[leave_requests::Model]) -> LeaveBalance {
    let mut balance = LeaveBalance {
        vacation: VACATION_DAYS,
        sick: SICK_DAYS,
        personal: PERSONAL_DAYS,
    };
    for request in requests
        .iter()
        .filter(|r| r.status == leave_requests::Status::Approved)
    {
        let days = i64::from(request.days_requested);
        match request.leave_type {
            leave_requests::LeaveType::Vacation => balance.vacation -= days,
            leave_requests::LeaveType::Sick => balance.sick -= days,
            leave_requests::LeaveType::Personal => balance.personal -= days,
            _ => {}
        }
    }
    balance
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveInput {
    pub leave_type: leave_requests::LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub work_coverage: Option<String>,
    #[serde(default)]
    pub is_emergency: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionInput {
    pub action: leave_requests::Status,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyLeavesQuery {
    pub year: Option<i32>,
    pub status: Option<leave_requests::Status>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveQuery {
    pub status: Option<leave_requests::Status>,
    pub leave_type: Option<leave_requests::LeaveType>,
    pub employee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveView {
    #[serde(flatten)]
    pub request: leave_requests::Model,
    pub employee_name: Option<String>,
    pub approver_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveSummary {
    pub total_requests: u64,
    pub pending_requests: u64,
    pub approved_requests: u64,
    pub rejected_requests: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyLeaves {
    #[serde(flatten)]
    pub requests: Paged<leave_requests::Model>,
    pub leave_balance: LeaveBalance,
    pub summary: LeaveSummary,
}

async fn with_names<C: ConnectionTrait>(
    db: &C,
    rows: Vec<leave_requests::Model>,
) -> ApiResult<Vec<LeaveView>> {
    let mut ids: Vec<Uuid> = rows.iter().map(|r| r.employee_id).collect();
    ids.extend(rows.iter().filter_map(|r| r.approver_id));
    let names: HashMap<Uuid, String> = if ids.is_empty() {
        HashMap::new()
    } else {
        employees::Entity::find()
            .filter(employees::Column::Id.is_in(ids))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|e| (e.id, e.full_name()))
            .collect()
    };
    Ok(rows
        .into_iter()
        .map(|request| LeaveView {
            employee_name: names.get(&request.employee_id).cloned(),
            approver_name: request.approver_id.and_then(|id| names.get(&id).cloned()),
            request,
        })
        .collect())
}

pub async fn create<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: LeaveInput,
) -> ApiResult<leave_requests::Model> {
    create_at(db, actor, input, now()).await
}

/// Submit a request on `at`'s date. Emergencies skip the approval queue.
#[instrument(skip(db, input), fields(user_id = %actor.user_id))]
pub async fn create_at<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: LeaveInput,
    at: DateTimeWithTimeZone,
) -> ApiResult<leave_requests::Model> {
    actor.require(Permission::LeavesWrite)?;
    let employee = org_employee(db, actor.org_id, actor.employee_id()?).await?;

    let mut checks = Checks::new();
    checks
        .check(
            input.start_date >= at.date_naive(),
            "startDate",
            "Start date cannot be in the past",
        )
        .max_len(input.reason.as_deref(), 500, "reason")
        .max_len(input.work_coverage.as_deref(), 200, "workCoverage");
    checks.finish()?;
    let days = leave_days(input.start_date, input.end_date).map_err(ApiError::bad_request)?;

    let conflicts = leave_requests::Entity::find()
        .filter(leave_requests::Column::EmployeeId.eq(employee.id))
        .filter(
            leave_requests::Column::Status
                .is_in([leave_requests::Status::Pending, leave_requests::Status::Approved]),
        )
        .filter(leave_requests::Column::StartDate.lte(input.end_date))
        .filter(leave_requests::Column::EndDate.gte(input.start_date))
        .count(db)
        .await
        .map_err(db_error)?;
    if conflicts > 0 {
        return Err(ApiError::bad_request(
            "You have a conflicting leave request for this period",
        ));
    }

    let approver_id = if input.is_emergency {
        None
    } else {
        match employee.manager_id {
            Some(manager) => Some(manager),
            None => match employee.department_id {
                Some(department_id) => departments::Entity::find_by_id(department_id)
                    .one(db)
                    .await
                    .map_err(db_error)?
                    .and_then(|d| d.manager_id)
                    .filter(|manager| *manager != employee.id),
                None => None,
            },
        }
    };
    let status = if input.is_emergency {
        leave_requests::Status::Approved
    } else {
        leave_requests::Status::Pending
    };

    let request = leave_requests::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(actor.org_id),
        employee_id: Set(employee.id),
        leave_type: Set(input.leave_type),
        start_date: Set(input.start_date),
        end_date: Set(input.end_date),
        days_requested: Set(days as i32),
        reason: Set(validate::clean(input.reason)),
        status: Set(status),
        approver_id: Set(approver_id),
        is_emergency: Set(input.is_emergency),
        work_coverage: Set(validate::clean(input.work_coverage)),
        approved_at: Set(input.is_emergency.then_some(at)),
        rejected_at: Set(None),
        rejection_reason: Set(None),
        cancelled_at: Set(None),
        created_at: Set(at),
        updated_at: Set(at),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(leave_id = %request.id, days, emergency = input.is_emergency, "leave requested");
    Ok(request)
}

pub async fn my_leaves<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: MyLeavesQuery,
) -> ApiResult<MyLeaves> {
    actor.require(Permission::LeavesRead)?;
    let employee_id = actor.employee_id()?;
    let page = validate::page(query.page, query.limit, 10)?;

    let mut select =
        leave_requests::Entity::find().filter(leave_requests::Column::EmployeeId.eq(employee_id));
    if let Some(year) = query.year {
        let (start, end) = year_bounds(year)?;
        select = select
            .filter(leave_requests::Column::StartDate.gte(start))
            .filter(leave_requests::Column::StartDate.lte(end));
    }
    if let Some(status) = query.status {
        select = select.filter(leave_requests::Column::Status.eq(status));
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .clone()
        .order_by_desc(leave_requests::Column::CreatedAt)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;

    let (year_start, year_end) = year_bounds(Utc::now().year())?;
    let this_year = leave_requests::Entity::find()
        .filter(leave_requests::Column::EmployeeId.eq(employee_id))
        .filter(leave_requests::Column::StartDate.gte(year_start))
        .filter(leave_requests::Column::StartDate.lte(year_end))
        .all(db)
        .await
        .map_err(db_error)?;

    let mut by_status = [0u64; 3];
    let statuses = [
        leave_requests::Status::Pending,
        leave_requests::Status::Approved,
        leave_requests::Status::Rejected,
    ];
    for (slot, status) in by_status.iter_mut().zip(statuses) {
        *slot = select
            .clone()
            .filter(leave_requests::Column::Status.eq(status))
            .count(db)
            .await
            .map_err(db_error)?;
    }
    let [pending, approved, rejected] = by_status;
    let summary = LeaveSummary {
        total_requests: total,
        pending_requests: pending,
        approved_requests: approved,
        rejected_requests: rejected,
    };
    Ok(MyLeaves {
        leave_balance: balance(&this_year),
        summary,
        requests: Paged::new(rows, page, total),
    })
}

fn year_bounds(year: i32) -> ApiResult<(NaiveDate, NaiveDate)> {
    match (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(ApiError::field("year", "Invalid year")),
    }
}

async fn org_request<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    id: Uuid,
) -> ApiResult<leave_requests::Model> {
    leave_requests::Entity::find_by_id(id)
        .filter(leave_requests::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))
}

/// Approve or reject a pending request.
#[instrument(skip(db, input), fields(user_id = %actor.user_id))]
pub async fn decide<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: DecisionInput,
) -> ApiResult<LeaveView> {
    actor.require(Permission::LeavesApprove)?;
    let mut checks = Checks::new();
    checks
        .check(
            matches!(
                input.action,
                leave_requests::Status::Approved | leave_requests::Status::Rejected
            ),
            "action",
            "Action must be APPROVED or REJECTED",
        )
        .max_len(input.rejection_reason.as_deref(), 200, "rejectionReason");
    checks.finish()?;

    let request = org_request(db, actor.org_id, id).await?;
    if request.status != leave_requests::Status::Pending {
        return Err(ApiError::bad_request(
            "Leave request has already been processed",
        ));
    }
    let is_approver = actor.employee_id.is_some() && request.approver_id == actor.employee_id;
    if !(actor.is_hr_admin() || is_approver) {
        return Err(ApiError::forbidden(
            "You do not have permission to approve this leave request",
        ));
    }

    let ts = now();
    let mut active: leave_requests::ActiveModel = request.into();
    active.status = Set(input.action);
    if input.action == leave_requests::Status::Approved {
        active.approved_at = Set(Some(ts));
    } else {
        active.rejected_at = Set(Some(ts));
        active.rejection_reason = Set(validate::clean(input.rejection_reason));
    }
    if let Some(employee_id) = actor.employee_id {
        active.approver_id = Set(Some(employee_id));
    }
    active.updated_at = Set(ts);
    let updated = active.update(db).await.map_err(db_error)?;
    info!(leave_id = %updated.id, status = ?updated.status, "leave decided");
    with_names(db, vec![updated])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Leave request not found"))
}

/// Withdraw one of the caller's own pending requests.
pub async fn cancel<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
) -> ApiResult<leave_requests::Model> {
    actor.require(Permission::LeavesWrite)?;
    let employee_id = actor.employee_id()?;
    let request = leave_requests::Entity::find_by_id(id)
        .filter(leave_requests::Column::EmployeeId.eq(employee_id))
        .filter(leave_requests::Column::Status.eq(leave_requests::Status::Pending))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Leave request not found or cannot be cancelled"))?;
    let ts = now();
    let mut active: leave_requests::ActiveModel = request.into();
    active.status = Set(leave_requests::Status::Cancelled);
    active.cancelled_at = Set(Some(ts));
    active.updated_at = Set(ts);
    active.update(db).await.map_err(db_error)
}

pub async fn pending<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    department_id: Option<Uuid>,
    page: Option<u64>,
    limit: Option<u64>,
) -> ApiResult<Paged<LeaveView>> {
    actor.require(Permission::LeavesApprove)?;
    let page = validate::page(page, limit, 10)?;
    let mut select = leave_requests::Entity::find()
        .filter(leave_requests::Column::OrgId.eq(actor.org_id))
        .filter(leave_requests::Column::Status.eq(leave_requests::Status::Pending));
    if actor.role == Role::Manager {
        select = select.filter(leave_requests::Column::ApproverId.eq(actor.employee_id()?));
    } else if let Some(department_id) = department_id {
        select = select.filter(
            leave_requests::Column::EmployeeId
                .is_in(department_members(db, actor.org_id, department_id).await?),
        );
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_asc(leave_requests::Column::StartDate)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(Paged::new(with_names(db, rows).await?, page, total))
}

async fn department_members<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    department_id: Uuid,
) -> ApiResult<Vec<Uuid>> {
    Ok(employees::Entity::find()
        .filter(employees::Column::OrgId.eq(org_id))
        .filter(employees::Column::DepartmentId.eq(department_id))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|e| e.id)
        .collect())
}

/// Org-wide listing for HR and Admin; managers see their team and the
/// requests routed to them.
pub async fn list<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: LeaveQuery,
) -> ApiResult<Paged<LeaveView>> {
    actor.require_role(&[Role::Admin, Role::Hr, Role::Manager])?;
    let page = validate::page(query.page, query.limit, 10)?;
    let mut select =
        leave_requests::Entity::find().filter(leave_requests::Column::OrgId.eq(actor.org_id));
    if actor.role == Role::Manager {
        let me = actor.employee_id()?;
        let team: Vec<Uuid> = employees::Entity::find()
            .filter(employees::Column::ManagerId.eq(me))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|e| e.id)
            .collect();
        select = select.filter(
            Condition::any()
                .add(leave_requests::Column::ApproverId.eq(me))
                .add(leave_requests::Column::EmployeeId.is_in(team)),
        );
    }
    if let Some(status) = query.status {
        select = select.filter(leave_requests::Column::Status.eq(status));
    }
    if let Some(leave_type) = query.leave_type {
        select = select.filter(leave_requests::Column::LeaveType.eq(leave_type));
    }
    if let Some(employee_id) = query.employee_id {
        select = select.filter(leave_requests::Column::EmployeeId.eq(employee_id));
    }
    if let Some(department_id) = query.department_id {
        select = select.filter(
            leave_requests::Column::EmployeeId
                .is_in(department_members(db, actor.org_id, department_id).await?),
        );
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_desc(leave_requests::Column::CreatedAt)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(Paged::new(with_names(db, rows).await?, page, total))
}

/// Visible to the requester, the assigned approver, and HR/Admin.
pub async fn get<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<LeaveView> {
    actor.require(Permission::LeavesRead)?;
    let request = org_request(db, actor.org_id, id).await?;
    let allowed = actor.is_hr_admin()
        || actor.employee_id == Some(request.employee_id)
        || (actor.employee_id.is_some() && request.approver_id == actor.employee_id);
    if !allowed {
        return Err(ApiError::forbidden(
            "You do not have access to view this leave request",
        ));
    }
    with_names(db, vec![request])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Leave request not found"))
}

pub async fn delete<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<()> {
    actor.require_role(&[Role::Admin])?;
    let request = org_request(db, actor.org_id, id).await?;
    leave_requests::Entity::delete_by_id(request.id)
        .exec(db)
        .await
        .map_err(db_error)?;
    info!(leave_id = %id, "leave request deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(
        leave_type: leave_requests::LeaveType,
        status: leave_requests::Status,
        days: i32,
    ) -> leave_requests::Model {
        let ts = Utc::now().fixed_offset();
        leave_requests::Model {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            employee_id: Uuid::nil(),
            leave_type,
            start_date: date(2025, 1, 1),
            end_date: date(2025, 1, 1),
            days_requested: days,
            reason: None,
            status,
            approver_id: None,
            is_emergency: false,
            work_coverage: None,
            approved_at: None,
            rejected_at: None,
            rejection_reason: None,
            cancelled_at: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn days_count_whole_days_between_dates() {
        assert_eq!(leave_days(date(2025, 3, 10), date(2025, 3, 14)), Ok(4));
        assert!(leave_days(date(2025, 3, 10), date(2025, 3, 10)).is_err());
        assert_eq!(
            leave_days(date(2025, 1, 1), date(2026, 6, 1)),
            Err("Leave request cannot exceed 365 days")
        );
    }

    #[test]
    fn balance_only_counts_approved_capped_types() {
        use leave_requests::{LeaveType, Status};
        let requests = [
            request(LeaveType::Vacation, Status::Approved, 5),
            request(LeaveType::Vacation, Status::Pending, 3),
            request(LeaveType::Sick, Status::Approved, 2),
            request(LeaveType::Study, Status::Approved, 4),
        ];
        assert_eq!(
            balance(&requests),
            LeaveBalance {
                vacation: 15,
                sick: 8,
                personal: 5
            }
        );
    }
}
