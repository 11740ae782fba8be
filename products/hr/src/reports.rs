//! Dashboard aggregates served over GraphQL, plus saved period reports.

use std::collections::{BTreeMap, HashSet};

use async_graphql::SimpleObject;
use chrono::{Datelike, NaiveDate, Utc};
use entity::report_history::{self, ReportType};
use entity::{
    attendance, candidate_applications, departments, employees, job_postings, leave_requests,
    payroll_records, performance_reviews,
};
use platform_api::ApiResult;
use platform_authz::Permission;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::Actor;
use crate::employees::{DepartmentHeadcount, department_headcount};
use crate::validate::{self, Checks};
use crate::{Paged, db_error, now, round2};

/// Longest period a single report may cover.
pub const MAX_REPORT_DAYS: i64 = 366;

#[derive(Clone, Debug, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct HrOverview {
    pub headcount: u64,
    pub active_employees: u64,
    pub on_probation: u64,
    pub departments: u64,
    pub employees_by_department: Vec<DepartmentHeadcount>,
    pub pending_leaves: u64,
    pub present_today: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, SimpleObject)]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

#[derive(Clone, Debug, Serialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct RecruitmentOverview {
    pub open_positions: u64,
    pub total_applications: u64,
    pub applications_by_status: Vec<StatusCount>,
    pub hired_this_month: u64,
}

#[instrument(skip(db), fields(org_id = %actor.org_id))]
pub async fn hr_overview<C: ConnectionTrait>(db: &C, actor: &Actor) -> ApiResult<HrOverview> {
    actor.require(Permission::ReportsRead)?;
    let org = actor.org_id;
    let staff = employees::Entity::find().filter(employees::Column::OrgId.eq(org));
    let headcount = staff.clone().count(db).await.map_err(db_error)?;
    let active_employees = staff
        .clone()
        .filter(employees::Column::IsActive.eq(true))
        .count(db)
        .await
        .map_err(db_error)?;
    let on_probation = staff
        .filter(employees::Column::IsActive.eq(true))
        .filter(employees::Column::IsOnProbation.eq(true))
        .count(db)
        .await
        .map_err(db_error)?;
    let departments = departments::Entity::find()
        .filter(departments::Column::OrgId.eq(org))
        .filter(departments::Column::IsActive.eq(true))
        .count(db)
        .await
        .map_err(db_error)?;
    let pending_leaves = leave_requests::Entity::find()
        .filter(leave_requests::Column::OrgId.eq(org))
        .filter(leave_requests::Column::Status.eq(leave_requests::Status::Pending))
        .count(db)
        .await
        .map_err(db_error)?;
    let present_today = attendance::Entity::find()
        .filter(attendance::Column::OrgId.eq(org))
        .filter(attendance::Column::Date.eq(Utc::now().date_naive()))
        .filter(attendance::Column::ClockIn.is_not_null())
        .count(db)
        .await
        .map_err(db_error)?;
    Ok(HrOverview {
        headcount,
        active_employees,
        on_probation,
        departments,
        employees_by_department: department_headcount(db, org).await?,
        pending_leaves,
        present_today,
    })
}

/// Occurrences of each serialized enum value, keyed by its wire name.
pub fn tally<T: Serialize>(values: impl IntoIterator<Item = T>) -> BTreeMap<String, u64> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for value in values {
        let key = serde_json::to_value(value)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        *counts.entry(key).or_default() += 1;
    }
    counts
}

/// Applications grouped by status name.
pub fn count_by_status(rows: &[candidate_applications::Model]) -> Vec<StatusCount> {
    tally(rows.iter().map(|row| row.status))
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect()
}

#[instrument(skip(db), fields(org_id = %actor.org_id))]
pub async fn recruitment_overview<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
) -> ApiResult<RecruitmentOverview> {
    actor.require(Permission::ReportsRead)?;
    let org = actor.org_id;
    let open_positions = job_postings::Entity::find()
        .filter(job_postings::Column::OrgId.eq(org))
        .filter(job_postings::Column::Status.eq(job_postings::Status::Published))
        .count(db)
        .await
        .map_err(db_error)?;
    let applications = candidate_applications::Entity::find()
        .filter(candidate_applications::Column::OrgId.eq(org))
        .all(db)
        .await
        .map_err(db_error)?;
    let today = Utc::now().date_naive();
    let month_start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let hired_this_month = applications
        .iter()
        .filter(|a| a.status == candidate_applications::Status::Hired)
        .filter(|a| a.updated_at.date_naive() >= month_start)
        .count() as u64;
    Ok(RecruitmentOverview {
        open_positions,
        total_applications: applications.len() as u64,
        applications_by_status: count_by_status(&applications),
        hired_this_month,
    })
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    pub report_type: ReportType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub report_type: Option<ReportType>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

fn check_period(input: &ReportInput) -> ApiResult<()> {
    let mut checks = Checks::new();
    checks.check(
        input.start_date <= input.end_date,
        "endDate",
        "End date must be on or after start date",
    );
    checks.check(
        (input.end_date - input.start_date).num_days() < MAX_REPORT_DAYS,
        "endDate",
        "Report period cannot exceed one year",
    );
    checks.finish()
}

/// `year * 12 + month`, for comparing payroll periods against dates.
fn month_index(year: i32, month: u32) -> i32 {
    year * 12 + month as i32
}

async fn attendance_summary<C: ConnectionTrait>(
    db: &C,
    org: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> ApiResult<Value> {
    let rows = attendance::Entity::find()
        .filter(attendance::Column::OrgId.eq(org))
        .filter(attendance::Column::Date.between(start, end))
        .all(db)
        .await
        .map_err(db_error)?;
    let hours: f64 = rows.iter().map(|r| r.hours_worked).sum();
    let overtime: f64 = rows.iter().map(|r| r.overtime_hours).sum();
    let tracked: HashSet<Uuid> = rows.iter().map(|r| r.employee_id).collect();
    let average = if rows.is_empty() {
        0.0
    } else {
        round2(hours / rows.len() as f64)
    };
    Ok(json!({
        "totalRecords": rows.len(),
        "employeesTracked": tracked.len(),
        "byStatus": tally(rows.iter().map(|r| r.status)),
        "workFromHomeDays": rows.iter().filter(|r| r.work_from_home).count(),
        "totalHours": round2(hours),
        "overtimeHours": round2(overtime),
        "averageHoursPerRecord": average,
    }))
}

async fn payroll_summary<C: ConnectionTrait>(
    db: &C,
    org: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> ApiResult<Value> {
    let (from, to) = (
        month_index(start.year(), start.month()),
        month_index(end.year(), end.month()),
    );
    let rows: Vec<payroll_records::Model> = payroll_records::Entity::find()
        .filter(payroll_records::Column::OrgId.eq(org))
        .filter(payroll_records::Column::PeriodYear.between(start.year(), end.year()))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .filter(|r| (from..=to).contains(&month_index(r.period_year, r.period_month as u32)))
        .collect();
    let sum = |pick: fn(&payroll_records::Model) -> i64| {
        rows.iter().map(pick).fold(0i64, i64::saturating_add)
    };
    Ok(json!({
        "payslips": rows.len(),
        "byStatus": tally(rows.iter().map(|r| r.status)),
        "grossCents": sum(|r| r.gross_cents),
        "deductionsCents": sum(|r| r.total_deductions_cents),
        "taxCents": sum(|r| r.tax_cents),
        "netCents": sum(|r| r.net_cents),
    }))
}

async fn leave_summary<C: ConnectionTrait>(
    db: &C,
    org: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> ApiResult<Value> {
    let rows = leave_requests::Entity::find()
        .filter(leave_requests::Column::OrgId.eq(org))
        .filter(leave_requests::Column::StartDate.lte(end))
        .filter(leave_requests::Column::EndDate.gte(start))
        .all(db)
        .await
        .map_err(db_error)?;
    let approved_days: i64 = rows
        .iter()
        .filter(|r| r.status == leave_requests::Status::Approved)
        .map(|r| i64::from(r.days_requested))
        .sum();
    Ok(json!({
        "totalRequests": rows.len(),
        "byStatus": tally(rows.iter().map(|r| r.status)),
        "byType": tally(rows.iter().map(|r| r.leave_type)),
        "approvedDays": approved_days,
        "emergencyRequests": rows.iter().filter(|r| r.is_emergency).count(),
    }))
}

async fn performance_summary<C: ConnectionTrait>(
    db: &C,
    org: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> ApiResult<Value> {
    let rows: Vec<performance_reviews::Model> = performance_reviews::Entity::find()
        .filter(performance_reviews::Column::OrgId.eq(org))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .filter(|r| (start..=end).contains(&r.created_at.date_naive()))
        .collect();
    let ratings: Vec<f64> = rows.iter().filter_map(|r| r.overall_rating).collect();
    let average = if ratings.is_empty() {
        None
    } else {
        Some(round2(ratings.iter().sum::<f64>() / ratings.len() as f64))
    };
    Ok(json!({
        "totalReviews": rows.len(),
        "byStatus": tally(rows.iter().map(|r| r.status)),
        "byType": tally(rows.iter().map(|r| r.review_type)),
        "averageRating": average,
    }))
}

async fn recruitment_summary<C: ConnectionTrait>(
    db: &C,
    org: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> ApiResult<Value> {
    let rows: Vec<candidate_applications::Model> = candidate_applications::Entity::find()
        .filter(candidate_applications::Column::OrgId.eq(org))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .filter(|a| (start..=end).contains(&a.applied_at.date_naive()))
        .collect();
    let postings: Vec<job_postings::Model> = job_postings::Entity::find()
        .filter(job_postings::Column::OrgId.eq(org))
        .all(db)
        .await
        .map_err(db_error)?;
    let opened = postings
        .iter()
        .filter(|p| p.posted_at.is_some_and(|at| (start..=end).contains(&at.date_naive())))
        .count();
    Ok(json!({
        "applications": rows.len(),
        "byStatus": tally(rows.iter().map(|a| a.status)),
        "hired": rows.iter().filter(|a| a.status == candidate_applications::Status::Hired).count(),
        "postingsOpened": opened,
    }))
}

async fn employee_summary<C: ConnectionTrait>(
    db: &C,
    org: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> ApiResult<Value> {
    let staff = employees::Entity::find()
        .filter(employees::Column::OrgId.eq(org))
        .all(db)
        .await
        .map_err(db_error)?;
    let hires = staff
        .iter()
        .filter(|e| (start..=end).contains(&e.hire_date))
        .count();
    let departures = staff
        .iter()
        .filter(|e| e.termination_date.is_some_and(|d| (start..=end).contains(&d)))
        .count();
    Ok(json!({
        "headcount": staff.len(),
        "active": staff.iter().filter(|e| e.is_active).count(),
        "hires": hires,
        "terminations": departures,
        "byEmploymentType": tally(staff.iter().map(|e| e.employment_type)),
        "byDepartment": department_headcount(db, org).await?,
    }))
}

/// Builds the summary for the period and saves it to the report history.
#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn generate<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: ReportInput,
) -> ApiResult<report_history::Model> {
    actor.require(Permission::ReportsRead)?;
    check_period(&input)?;
    let (org, start, end) = (actor.org_id, input.start_date, input.end_date);
    let summary = match input.report_type {
        ReportType::Attendance => attendance_summary(db, org, start, end).await?,
        ReportType::Payroll => payroll_summary(db, org, start, end).await?,
        ReportType::Leave => leave_summary(db, org, start, end).await?,
        ReportType::Performance => performance_summary(db, org, start, end).await?,
        ReportType::Recruitment => recruitment_summary(db, org, start, end).await?,
        ReportType::Employee => employee_summary(db, org, start, end).await?,
    };
    let report = report_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(org),
        report_type: Set(input.report_type),
        start_date: Set(start),
        end_date: Set(end),
        summary: Set(summary),
        generated_by: Set(actor.user_id),
        generated_at: Set(now()),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(report_id = %report.id, report_type = ?report.report_type, "report generated");
    Ok(report)
}

pub async fn history<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: HistoryQuery,
) -> ApiResult<Paged<report_history::Model>> {
    actor.require(Permission::ReportsRead)?;
    let page = validate::page(query.page, query.limit, 20)?;
    let mut select =
        report_history::Entity::find().filter(report_history::Column::OrgId.eq(actor.org_id));
    if let Some(kind) = query.report_type {
        select = select.filter(report_history::Column::ReportType.eq(kind));
    }
    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_desc(report_history::Column::GeneratedAt)
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

    fn period(start: NaiveDate, end: NaiveDate) -> ReportInput {
        ReportInput {
            report_type: ReportType::Leave,
            start_date: start,
            end_date: end,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn periods_are_ordered_and_at_most_a_year() {
        assert!(check_period(&period(day(2026, 1, 1), day(2026, 12, 31))).is_ok());
        assert!(check_period(&period(day(2026, 3, 1), day(2026, 2, 1))).is_err());
        assert!(check_period(&period(day(2025, 1, 1), day(2026, 6, 1))).is_err());
    }

    #[test]
    fn tally_keys_use_wire_names() {
        let counts = tally([
            leave_requests::Status::Pending,
            leave_requests::Status::Pending,
            leave_requests::Status::Approved,
        ]);
        assert_eq!(counts.get("PENDING"), Some(&2));
        assert_eq!(counts.get("APPROVED"), Some(&1));
    }

    #[test]
    fn payroll_months_compare_across_years() {
        assert!(month_index(2025, 12) < month_index(2026, 1));
    }
}
