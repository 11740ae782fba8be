use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use entity::{attendance, employees};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Permission, Role};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::{Actor, org_employee};
use crate::validate::{self, Checks};
use crate::{Paged, db_error, now, round2};

pub const STANDARD_DAY_HOURS: f64 = 8.0;

/// Hours between clock-in and clock-out minus the break, never negative,
/// together with the overtime beyond a standard day.
pub fn worked_hours(
    clock_in: DateTimeWithTimeZone,
    clock_out: DateTimeWithTimeZone,
    break_minutes: i32,
) -> (f64, f64) {
    let minutes = (clock_out - clock_in).num_seconds() as f64 / 60.0 - f64::from(break_minutes);
    let hours = (minutes / 60.0).max(0.0);
    (round2(hours), round2((hours - STANDARD_DAY_HOURS).max(0.0)))
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockInput {
    pub notes: Option<String>,
    pub work_from_home: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyAttendanceQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<attendance::Status>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub employee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<attendance::Status>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAttendanceInput {
    pub employee_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub clock_in: Option<DateTimeWithTimeZone>,
    #[serde(default)]
    pub clock_out: Option<DateTimeWithTimeZone>,
    #[serde(default)]
    pub break_minutes: Option<i32>,
    #[serde(default)]
    pub hours_worked: Option<f64>,
    #[serde(default)]
    pub overtime_hours: Option<f64>,
    #[serde(default)]
    pub status: Option<attendance::Status>,
    #[serde(default)]
    pub work_from_home: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendanceInput {
    pub clock_in: Option<DateTimeWithTimeZone>,
    pub clock_out: Option<DateTimeWithTimeZone>,
    pub break_minutes: Option<i32>,
    pub hours_worked: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub status: Option<attendance::Status>,
    pub work_from_home: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
    #[serde(flatten)]
    pub record: attendance::Model,
    pub employee_name: Option<String>,
    pub employee_code: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_days: u64,
    pub total_hours: f64,
    pub total_overtime: f64,
    pub status_breakdown: HashMap<attendance::Status, u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MyAttendance {
    #[serde(flatten)]
    pub records: Paged<attendance::Model>,
    pub summary: AttendanceSummary,
}

pub fn summarize(records: &[attendance::Model]) -> AttendanceSummary {
    let mut summary = AttendanceSummary {
        total_days: records.len() as u64,
        ..Default::default()
    };
    for record in records {
        summary.total_hours += record.hours_worked;
        summary.total_overtime += record.overtime_hours;
        *summary.status_breakdown.entry(record.status).or_default() += 1;
    }
    summary.total_hours = round2(summary.total_hours);
    summary.total_overtime = round2(summary.total_overtime);
    summary
}

fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap_or(today);
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    let end = next.map(|n| n - Duration::days(1)).unwrap_or(today);
    (start, end)
}

fn in_range(
    select: Select<attendance::Entity>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Select<attendance::Entity> {
    let mut select = select;
    if let Some(start) = start {
        select = select.filter(attendance::Column::Date.gte(start));
    }
    if let Some(end) = end {
        select = select.filter(attendance::Column::Date.lte(end));
    }
    select
}

pub async fn clock_in<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: ClockInput,
) -> ApiResult<attendance::Model> {
    clock_in_at(db, actor, input, now()).await
}

/// Start today's record at `at`. A record that already exists for the day
/// without a clock-in (e.g. entered manually) is completed instead.
#[instrument(skip(db, input), fields(user_id = %actor.user_id))]
pub async fn clock_in_at<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: ClockInput,
    at: DateTimeWithTimeZone,
) -> ApiResult<attendance::Model> {
    actor.require(Permission::AttendanceClock)?;
    let employee_id = actor.employee_id()?;
    let mut checks = Checks::new();
    checks.max_len(input.notes.as_deref(), 200, "notes");
    checks.finish()?;

    let today = at.date_naive();
    let existing = attendance::Entity::find()
        .filter(attendance::Column::EmployeeId.eq(employee_id))
        .filter(attendance::Column::Date.eq(today))
        .one(db)
        .await
        .map_err(db_error)?;
    let work_from_home = input.work_from_home.unwrap_or(false);
    let notes = validate::clean(input.notes);
    let record = match existing {
        Some(record) if record.clock_in.is_some() => {
            return Err(ApiError::bad_request("Already clocked in for today"));
        }
        Some(record) => {
            let mut active: attendance::ActiveModel = record.into();
            active.clock_in = Set(Some(at));
            active.notes = Set(notes);
            active.work_from_home = Set(work_from_home);
            active.status = Set(attendance::Status::Present);
            active.updated_at = Set(at);
            active.update(db).await.map_err(db_error)?
        }
        None => attendance::ActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(actor.org_id),
            employee_id: Set(employee_id),
            date: Set(today),
            clock_in: Set(Some(at)),
            clock_out: Set(None),
            break_minutes: Set(0),
            hours_worked: Set(0.0),
            overtime_hours: Set(0.0),
            status: Set(attendance::Status::Present),
            work_from_home: Set(work_from_home),
            notes: Set(notes),
            created_at: Set(at),
            updated_at: Set(at),
        }
        .insert(db)
        .await
        .map_err(db_error)?,
    };
    info!(attendance_id = %record.id, "clocked in");
    Ok(record)
}

pub async fn clock_out<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: ClockInput,
) -> ApiResult<attendance::Model> {
    clock_out_at(db, actor, input, now()).await
}

#[instrument(skip(db, input), fields(user_id = %actor.user_id))]
pub async fn clock_out_at<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: ClockInput,
    at: DateTimeWithTimeZone,
) -> ApiResult<attendance::Model> {
    actor.require(Permission::AttendanceClock)?;
    let employee_id = actor.employee_id()?;
    let mut checks = Checks::new();
    checks.max_len(input.notes.as_deref(), 200, "notes");
    checks.finish()?;

    let record = attendance::Entity::find()
        .filter(attendance::Column::EmployeeId.eq(employee_id))
        .filter(attendance::Column::Date.eq(at.date_naive()))
        .filter(attendance::Column::ClockIn.is_not_null())
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::bad_request("No clock-in record found for today"))?;
    if record.clock_out.is_some() {
        return Err(ApiError::bad_request("Already clocked out for today"));
    }
    let Some(clock_in) = record.clock_in else {
        return Err(ApiError::bad_request("No clock-in record found for today"));
    };
    let (hours, overtime) = worked_hours(clock_in, at, record.break_minutes);
    let previous_notes = record.notes.clone();
    let mut active: attendance::ActiveModel = record.into();
    active.clock_out = Set(Some(at));
    active.hours_worked = Set(hours);
    active.overtime_hours = Set(overtime);
    active.notes = Set(validate::clean(input.notes).or(previous_notes));
    active.updated_at = Set(at);
    let record = active.update(db).await.map_err(db_error)?;
    info!(attendance_id = %record.id, hours, "clocked out");
    Ok(record)
}

pub async fn my_attendance<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: MyAttendanceQuery,
) -> ApiResult<MyAttendance> {
    actor.require(Permission::AttendanceRead)?;
    let employee_id = actor.employee_id()?;
    let page = validate::page(query.page, query.limit, 31)?;
    let (month_start, month_end) = month_bounds(Utc::now().date_naive());
    let start = query.start_date.unwrap_or(month_start);
    let end = query.end_date.unwrap_or(month_end);

    let mut select = in_range(
        attendance::Entity::find().filter(attendance::Column::EmployeeId.eq(employee_id)),
        Some(start),
        Some(end),
    );
    if let Some(status) = query.status {
        select = select.filter(attendance::Column::Status.eq(status));
    }
    let everything = select
        .order_by_desc(attendance::Column::Date)
        .all(db)
        .await
        .map_err(db_error)?;
    let summary = summarize(&everything);
    let total = everything.len() as u64;
    let items = everything
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Ok(MyAttendance {
        records: Paged::new(items, page, total),
        summary,
    })
}

async fn team_ids<C: ConnectionTrait>(db: &C, actor: &Actor) -> ApiResult<Vec<Uuid>> {
    let manager = actor.employee_id()?;
    let mut ids: Vec<Uuid> = employees::Entity::find()
        .filter(employees::Column::OrgId.eq(actor.org_id))
        .filter(employees::Column::ManagerId.eq(manager))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|e| e.id)
        .collect();
    ids.push(manager);
    Ok(ids)
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: AttendanceQuery,
) -> ApiResult<Paged<AttendanceView>> {
    actor.require_role(&[Role::Admin, Role::Hr, Role::Manager])?;
    let page = validate::page(query.page, query.limit, 10)?;

    let mut select = in_range(
        attendance::Entity::find().filter(attendance::Column::OrgId.eq(actor.org_id)),
        query.start_date,
        query.end_date,
    );
    if actor.role == Role::Manager {
        select = select.filter(attendance::Column::EmployeeId.is_in(team_ids(db, actor).await?));
    }
    if let Some(employee_id) = query.employee_id {
        select = select.filter(attendance::Column::EmployeeId.eq(employee_id));
    }
    if let Some(department_id) = query.department_id {
        let members: Vec<Uuid> = employees::Entity::find()
            .filter(employees::Column::OrgId.eq(actor.org_id))
            .filter(employees::Column::DepartmentId.eq(department_id))
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|e| e.id)
            .collect();
        select = select.filter(attendance::Column::EmployeeId.is_in(members));
    }
    if let Some(status) = query.status {
        select = select.filter(attendance::Column::Status.eq(status));
    }

    let total = select.clone().count(db).await.map_err(db_error)?;
    let rows = select
        .order_by_desc(attendance::Column::Date)
        .offset(page.offset())
        .limit(page.limit)
        .all(db)
        .await
        .map_err(db_error)?;
    let ids: Vec<Uuid> = rows.iter().map(|r| r.employee_id).collect();
    let people: HashMap<Uuid, employees::Model> = employees::Entity::find()
        .filter(employees::Column::Id.is_in(ids))
        .all(db)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();
    let items = rows
        .into_iter()
        .map(|record| {
            let person = people.get(&record.employee_id);
            AttendanceView {
                employee_name: person.map(|p| p.full_name()),
                employee_code: person.map(|p| p.employee_code.clone()),
                record,
            }
        })
        .collect();
    Ok(Paged::new(items, page, total))
}

fn validate_hours(
    checks: &mut Checks,
    hours_worked: Option<f64>,
    overtime: Option<f64>,
    break_minutes: Option<i32>,
) {
    checks
        .check(
            hours_worked.is_none_or(|h| (0.0..=24.0).contains(&h)),
            "hoursWorked",
            "Hours worked must be between 0 and 24",
        )
        .check(
            overtime.is_none_or(|h| h >= 0.0),
            "overtimeHours",
            "Overtime hours must be positive",
        )
        .check(
            break_minutes.is_none_or(|m| m >= 0),
            "breakMinutes",
            "Break time must be positive",
        );
}

fn derive_hours(
    clock_in: Option<DateTimeWithTimeZone>,
    clock_out: Option<DateTimeWithTimeZone>,
    break_minutes: i32,
) -> Option<(f64, f64)> {
    match (clock_in, clock_out) {
        (Some(start), Some(end)) => Some(worked_hours(start, end, break_minutes)),
        _ => None,
    }
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn create<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: ManualAttendanceInput,
) -> ApiResult<attendance::Model> {
    actor.require_role(&[Role::Admin, Role::Hr])?;
    let today = Utc::now().date_naive();
    let mut checks = Checks::new();
    let earliest = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(today);
    checks.check(
        input.date >= earliest && input.date <= today + Duration::days(30),
        "date",
        "Date must be between 2020 and 30 days from now",
    );
    validate_hours(
        &mut checks,
        input.hours_worked,
        input.overtime_hours,
        input.break_minutes,
    );
    checks.max_len(input.notes.as_deref(), 500, "notes");
    checks.finish()?;

    let employee = org_employee(db, actor.org_id, input.employee_id).await?;
    let duplicate = attendance::Entity::find()
        .filter(attendance::Column::EmployeeId.eq(employee.id))
        .filter(attendance::Column::Date.eq(input.date))
        .count(db)
        .await
        .map_err(db_error)?;
    if duplicate > 0 {
        return Err(ApiError::bad_request(
            "Attendance record already exists for this date",
        ));
    }

    let break_minutes = input.break_minutes.unwrap_or(0);
    let derived = derive_hours(input.clock_in, input.clock_out, break_minutes);
    let hours = input
        .hours_worked
        .or(derived.map(|(h, _)| h))
        .unwrap_or(0.0);
    let overtime = input
        .overtime_hours
        .or(derived.map(|(_, o)| o))
        .unwrap_or(0.0);
    let ts = now();
    let record = attendance::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(actor.org_id),
        employee_id: Set(employee.id),
        date: Set(input.date),
        clock_in: Set(input.clock_in),
        clock_out: Set(input.clock_out),
        break_minutes: Set(break_minutes),
        hours_worked: Set(hours),
        overtime_hours: Set(overtime),
        status: Set(input.status.unwrap_or(attendance::Status::Present)),
        work_from_home: Set(input.work_from_home.unwrap_or(false)),
        notes: Set(validate::clean(input.notes)),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(attendance_id = %record.id, "attendance recorded");
    Ok(record)
}

async fn org_record<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    id: Uuid,
) -> ApiResult<attendance::Model> {
    attendance::Entity::find_by_id(id)
        .filter(attendance::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn update<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: UpdateAttendanceInput,
) -> ApiResult<attendance::Model> {
    actor.require_role(&[Role::Admin, Role::Hr])?;
    let mut checks = Checks::new();
    validate_hours(
        &mut checks,
        input.hours_worked,
        input.overtime_hours,
        input.break_minutes,
    );
    checks.max_len(input.notes.as_deref(), 500, "notes");
    checks.finish()?;

    let record = org_record(db, actor.org_id, id).await?;
    let clock_in = input.clock_in.or(record.clock_in);
    let clock_out = input.clock_out.or(record.clock_out);
    let break_minutes = input.break_minutes.unwrap_or(record.break_minutes);
    let times_changed =
        input.clock_in.is_some() || input.clock_out.is_some() || input.break_minutes.is_some();
    let derived = if times_changed {
        derive_hours(clock_in, clock_out, break_minutes)
    } else {
        None
    };

    let mut active: attendance::ActiveModel = record.into();
    active.clock_in = Set(clock_in);
    active.clock_out = Set(clock_out);
    active.break_minutes = Set(break_minutes);
    if let Some(hours) = input.hours_worked.or(derived.map(|(h, _)| h)) {
        active.hours_worked = Set(hours);
    }
    if let Some(overtime) = input.overtime_hours.or(derived.map(|(_, o)| o)) {
        active.overtime_hours = Set(overtime);
    }
    if let Some(status) = input.status {
        active.status = Set(status);
    }
    if let Some(wfh) = input.work_from_home {
        active.work_from_home = Set(wfh);
    }
    if let Some(notes) = input.notes {
        active.notes = Set(validate::clean(Some(notes)));
    }
    active.updated_at = Set(now());
    active.update(db).await.map_err(db_error)
}

pub async fn delete<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<()> {
    actor.require_role(&[Role::Admin])?;
    let record = org_record(db, actor.org_id, id).await?;
    attendance::Entity::delete_by_id(record.id)
        .exec(db)
        .await
        .map_err(db_error)?;
    info!(attendance_id = %id, "attendance deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTimeWithTimeZone {
        FixedOffset::east_opt(0)
            .and_then(|tz| tz.with_ymd_and_hms(2025, 3, 3, hour, minute, 0).single())
            .expect("valid timestamp")
    }

    #[test]
    fn hours_subtract_break_and_split_overtime() {
        assert_eq!(worked_hours(at(9, 0), at(17, 30), 30), (8.0, 0.0));
        assert_eq!(worked_hours(at(8, 0), at(19, 0), 60), (10.0, 2.0));
        assert_eq!(worked_hours(at(9, 0), at(9, 20), 30), (0.0, 0.0));
    }

    #[test]
    fn month_bounds_cover_december() {
        let (start, end) = month_bounds(NaiveDate::from_ymd_opt(2024, 12, 15).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }
}
