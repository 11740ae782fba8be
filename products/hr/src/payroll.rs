use std::collections::{BTreeMap, HashMap};

use entity::{employees, payroll_records, users};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Permission, Role};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::context::{Actor, org_employee};
use crate::validate::{self, Checks, sum_cents};
use crate::{Paged, db_error, now};

/// Monthly hours assumed when paying an hourly rate.
pub const HOURS_PER_MONTH: i64 = 160;
pub const DEFAULT_CURRENCY: &str = "USD";

/// `rate` percent of `amount`, rounded half up. Never overflows for rates up to 100.
fn percent(amount: i64, rate: i64) -> i64 {
    ((i128::from(amount) * i128::from(rate) + 50).div_euclid(100)) as i64
}

/// Progressive monthly tax in cents: 5% up to 10,000.00, 10% on the part up
/// to 50,000.00 and 15% above that.
pub fn income_tax(gross_cents: i64) -> i64 {
    const FIRST: i64 = 1_000_000;
    const SECOND: i64 = 5_000_000;
    if gross_cents <= 0 {
        0
    } else if gross_cents <= FIRST {
        percent(gross_cents, 5)
    } else if gross_cents <= SECOND {
        percent(FIRST, 5) + percent(gross_cents - FIRST, 10)
    } else {
        percent(FIRST, 5) + percent(SECOND - FIRST, 10) + percent(gross_cents - SECOND, 15)
    }
}

pub type Amounts = BTreeMap<String, i64>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payslip {
    pub basic_cents: i64,
    pub gross_cents: i64,
    pub allowances: Amounts,
    pub deductions: Amounts,
    pub total_deductions_cents: i64,
    pub tax_cents: i64,
    pub net_cents: i64,
}

/// Monthly slip for a batch run: salaried staff are paid their salary,
/// hourly staff a full month of hours.
pub fn compute_payslip(
    salary_cents: Option<i64>,
    hourly_rate_cents: Option<i64>,
    custom_allowances: &Amounts,
    custom_deductions: &Amounts,
) -> ApiResult<Payslip> {
    let too_large = || ApiError::field("grossCents", "Gross pay is too large");
    let gross = match salary_cents.filter(|s| *s > 0) {
        Some(salary) => salary,
        None => match hourly_rate_cents {
            Some(rate) => rate.checked_mul(HOURS_PER_MONTH).ok_or_else(too_large)?,
            None => 0,
        },
    };
    let mut allowances = custom_allowances.clone();
    if let Some(salary) = salary_cents {
        allowances.insert("basic".into(), salary);
    }
    let mut deductions = custom_deductions.clone();
    deductions.insert("incomeTax".into(), percent(gross, 10));
    deductions.insert("socialSecurity".into(), percent(gross, 6));
    let total_deductions = sum_cents(deductions.values().copied(), "deductions")?;
    let tax = income_tax(gross);
    let net = gross
        .checked_sub(total_deductions)
        .and_then(|n| n.checked_sub(tax))
        .ok_or_else(too_large)?;
    Ok(Payslip {
        basic_cents: salary_cents.unwrap_or(gross),
        gross_cents: gross,
        allowances,
        deductions,
        total_deductions_cents: total_deductions,
        tax_cents: tax,
        net_cents: net,
    })
}

/// Allowed lifecycle moves. Any record can be disputed.
pub fn can_transition(from: payroll_records::Status, to: payroll_records::Status) -> bool {
    use payroll_records::Status::*;
    matches!(
        (from, to),
        (Processing, Approved) | (Approved, Paid) | (Processing | Approved | Paid, Disputed)
    )
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayrollInput {
    pub employee_id: Uuid,
    pub period_month: i32,
    pub period_year: i32,
    pub basic_salary_cents: i64,
    #[serde(default)]
    pub gross_cents: Option<i64>,
    #[serde(default)]
    pub allowances: Amounts,
    #[serde(default)]
    pub deductions: Amounts,
    #[serde(default)]
    pub overtime_cents: i64,
    #[serde(default)]
    pub bonus_cents: i64,
    #[serde(default)]
    pub tax_cents: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInput {
    pub month: i32,
    pub year: i32,
    #[serde(default)]
    pub custom_allowances: Amounts,
    #[serde(default)]
    pub custom_deductions: Amounts,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEmployee {
    pub employee_id: Uuid,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub message: String,
    pub processed_count: usize,
    pub payroll_period: String,
    pub total_records: usize,
    pub skipped: Vec<SkippedEmployee>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInput {
    pub status: payroll_records::Status,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyPayrollQuery {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollQuery {
    pub employee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub status: Option<payroll_records::Status>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollTotals {
    pub records: u64,
    pub total_gross_cents: i64,
    pub total_deductions_cents: i64,
    pub total_tax_cents: i64,
    pub total_net_cents: i64,
    pub average_net_cents: i64,
}

pub fn totals(records: &[payroll_records::Model]) -> PayrollTotals {
    let mut totals = PayrollTotals {
        records: records.len() as u64,
        ..Default::default()
    };
    for record in records {
        totals.total_gross_cents = totals.total_gross_cents.saturating_add(record.gross_cents);
        totals.total_deductions_cents = totals
            .total_deductions_cents
            .saturating_add(record.total_deductions_cents);
        totals.total_tax_cents = totals.total_tax_cents.saturating_add(record.tax_cents);
        totals.total_net_cents = totals.total_net_cents.saturating_add(record.net_cents);
    }
    if !records.is_empty() {
        totals.average_net_cents = totals.total_net_cents / records.len() as i64;
    }
    totals
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollView {
    #[serde(flatten)]
    pub record: payroll_records::Model,
    pub employee_name: Option<String>,
    pub employee_code: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyPayroll {
    #[serde(flatten)]
    pub records: Paged<payroll_records::Model>,
    pub yearly_summary: PayrollTotals,
}

#[derive(Clone, Debug, Serialize)]
pub struct PayrollListing {
    #[serde(flatten)]
    pub records: Paged<PayrollView>,
    pub summary: PayrollTotals,
}

fn check_period(checks: &mut Checks, month: i32, year: i32) {
    checks
        .check((1..=12).contains(&month), "month", "Month must be between 1 and 12")
        .check(
            (2020..=2030).contains(&year),
            "year",
            "Year must be between 2020 and 2030",
        );
}

fn amounts_json(amounts: &Amounts) -> serde_json::Value {
    json!(amounts)
}

async fn period_exists<C: ConnectionTrait>(
    db: &C,
    employee_id: Uuid,
    month: i32,
    year: i32,
) -> ApiResult<bool> {
    Ok(payroll_records::Entity::find()
        .filter(payroll_records::Column::EmployeeId.eq(employee_id))
        .filter(payroll_records::Column::PeriodMonth.eq(month))
        .filter(payroll_records::Column::PeriodYear.eq(year))
        .count(db)
        .await
        .map_err(db_error)?
        > 0)
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn create<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    input: CreatePayrollInput,
) -> ApiResult<payroll_records::Model> {
    actor.require(Permission::PayrollWrite)?;
    let currency = input
        .currency
        .as_deref()
        .map(|c| c.trim().to_uppercase())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    let mut checks = Checks::new();
    check_period(&mut checks, input.period_month, input.period_year);
    checks
        .amount(Some(input.basic_salary_cents), "basicSalaryCents")
        .amount(input.gross_cents, "grossCents")
        .amount(Some(input.overtime_cents), "overtimeCents")
        .amount(Some(input.bonus_cents), "bonusCents")
        .amount(input.tax_cents, "taxCents")
        .check(
            validate::is_currency(&currency),
            "currency",
            "Currency must be a 3-letter code",
        )
        .max_len(input.notes.as_deref(), 500, "notes");
    for value in input.allowances.values() {
        checks.amount(Some(*value), "allowances");
    }
    for value in input.deductions.values() {
        checks.amount(Some(*value), "deductions");
    }
    checks.finish()?;

    let employee = org_employee(db, actor.org_id, input.employee_id).await?;
    if period_exists(db, employee.id, input.period_month, input.period_year).await? {
        return Err(ApiError::bad_request(
            "Payroll record already exists for this period",
        ));
    }

    let gross = match input.gross_cents {
        Some(gross) => gross,
        None => sum_cents(
            std::iter::once(input.basic_salary_cents).chain(input.allowances.values().copied()),
            "grossCents",
        )?,
    };
    let total_deductions = sum_cents(input.deductions.values().copied(), "deductions")?;
    let tax = input.tax_cents.unwrap_or_else(|| income_tax(gross));
    let net = sum_cents([gross, input.overtime_cents, input.bonus_cents], "netCents")?
        .checked_sub(total_deductions)
        .and_then(|n| n.checked_sub(tax))
        .ok_or_else(|| ApiError::field("netCents", "netCents is too large"))?;
    let ts = now();
    let record = payroll_records::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(actor.org_id),
        employee_id: Set(employee.id),
        period_month: Set(input.period_month),
        period_year: Set(input.period_year),
        basic_salary_cents: Set(input.basic_salary_cents),
        gross_cents: Set(gross),
        allowances: Set(amounts_json(&input.allowances)),
        deductions: Set(amounts_json(&input.deductions)),
        total_deductions_cents: Set(total_deductions),
        overtime_cents: Set(input.overtime_cents),
        bonus_cents: Set(input.bonus_cents),
        tax_cents: Set(tax),
        net_cents: Set(net),
        currency: Set(currency),
        status: Set(payroll_records::Status::Processing),
        paid_at: Set(None),
        notes: Set(validate::clean(input.notes)),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(payroll_id = %record.id, "payroll record created");
    Ok(record)
}

/// Batch run for every active employee with an active login. Employees that
/// already have a slip for the period are left untouched and reported.
#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn process<C>(db: &C, actor: &Actor, input: ProcessInput) -> ApiResult<ProcessOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    actor.require_role(&[Role::Admin])?;
    let mut checks = Checks::new();
    check_period(&mut checks, input.month, input.year);
    for value in input.custom_allowances.values() {
        checks.amount(Some(*value), "customAllowances");
    }
    for value in input.custom_deductions.values() {
        checks.amount(Some(*value), "customDeductions");
    }
    checks.finish()?;

    let txn = db.begin().await.map_err(db_error)?;
    let active_users: Vec<Uuid> = users::Entity::find()
        .filter(users::Column::OrgId.eq(actor.org_id))
        .filter(users::Column::IsActive.eq(true))
        .all(&txn)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|u| u.id)
        .collect();
    let staff = employees::Entity::find()
        .filter(employees::Column::OrgId.eq(actor.org_id))
        .filter(employees::Column::IsActive.eq(true))
        .filter(employees::Column::UserId.is_in(active_users))
        .order_by_asc(employees::Column::EmployeeCode)
        .all(&txn)
        .await
        .map_err(db_error)?;

    let ts = now();
    let mut processed = 0;
    let mut skipped = Vec::new();
    for employee in &staff {
        if period_exists(&txn, employee.id, input.month, input.year).await? {
            skipped.push(SkippedEmployee {
                employee_id: employee.id,
                name: employee.full_name(),
            });
            continue;
        }
        let slip = compute_payslip(
            employee.salary_cents,
            employee.hourly_rate_cents,
            &input.custom_allowances,
            &input.custom_deductions,
        )?;
        if slip.gross_cents == 0 {
            warn!(employee_id = %employee.id, "no salary or hourly rate on file");
        }
        payroll_records::ActiveModel {
            id: Set(Uuid::new_v4()),
            org_id: Set(actor.org_id),
            employee_id: Set(employee.id),
            period_month: Set(input.month),
            period_year: Set(input.year),
            basic_salary_cents: Set(slip.basic_cents),
            gross_cents: Set(slip.gross_cents),
            allowances: Set(amounts_json(&slip.allowances)),
            deductions: Set(amounts_json(&slip.deductions)),
            total_deductions_cents: Set(slip.total_deductions_cents),
            overtime_cents: Set(0),
            bonus_cents: Set(0),
            tax_cents: Set(slip.tax_cents),
            net_cents: Set(slip.net_cents),
            currency: Set(DEFAULT_CURRENCY.to_string()),
            status: Set(payroll_records::Status::Processing),
            paid_at: Set(None),
            notes: Set(None),
            created_at: Set(ts),
            updated_at: Set(ts),
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;
        processed += 1;
    }
    txn.commit().await.map_err(db_error)?;

    info!(processed, skipped = skipped.len(), "payroll processed");
    Ok(ProcessOutcome {
        message: format!("Payroll processed for {processed} employees"),
        processed_count: processed,
        payroll_period: format!("{}/{}", input.month, input.year),
        total_records: processed,
        skipped,
    })
}

async fn org_record<C: ConnectionTrait>(
    db: &C,
    org_id: Uuid,
    id: Uuid,
) -> ApiResult<payroll_records::Model> {
    payroll_records::Entity::find_by_id(id)
        .filter(payroll_records::Column::OrgId.eq(org_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Payroll record not found"))
}

#[instrument(skip(db, input), fields(org_id = %actor.org_id))]
pub async fn update_status<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: Uuid,
    input: StatusInput,
) -> ApiResult<payroll_records::Model> {
    actor.require(Permission::PayrollRelease)?;
    let record = org_record(db, actor.org_id, id).await?;
    if !can_transition(record.status, input.status) {
        return Err(ApiError::bad_request(format!(
            "Cannot change payroll status from {:?} to {:?}",
            record.status, input.status
        )));
    }
    let ts = now();
    let mut active: payroll_records::ActiveModel = record.into();
    active.status = Set(input.status);
    if input.status == payroll_records::Status::Paid {
        active.paid_at = Set(Some(ts));
    }
    if let Some(notes) = input.notes {
        active.notes = Set(validate::clean(Some(notes)));
    }
    active.updated_at = Set(ts);
    let record = active.update(db).await.map_err(db_error)?;
    info!(payroll_id = %record.id, status = ?record.status, "payroll status changed");
    Ok(record)
}

pub async fn my_payroll<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: MyPayrollQuery,
) -> ApiResult<MyPayroll> {
    actor.require(Permission::PayrollRead)?;
    let employee_id = actor.employee_id()?;
    let page = validate::page(query.page, query.limit, 12)?;
    let mut checks = Checks::new();
    let year = query.year.unwrap_or_default();
    checks.check(
        (2020..=2030).contains(&year),
        "year",
        "Year must be between 2020 and 2030",
    );
    if let Some(month) = query.month {
        checks.check((1..=12).contains(&month), "month", "Month must be between 1 and 12");
    }
    checks.finish()?;

    let year_rows = payroll_records::Entity::find()
        .filter(payroll_records::Column::EmployeeId.eq(employee_id))
        .filter(payroll_records::Column::PeriodYear.eq(year))
        .order_by_desc(payroll_records::Column::PeriodMonth)
        .all(db)
        .await
        .map_err(db_error)?;
    let yearly_summary = totals(&year_rows);
    let filtered: Vec<payroll_records::Model> = year_rows
        .into_iter()
        .filter(|r| query.month.is_none_or(|m| r.period_month == m))
        .collect();
    let total = filtered.len() as u64;
    let items = filtered
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Ok(MyPayroll {
        records: Paged::new(items, page, total),
        yearly_summary,
    })
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    query: PayrollQuery,
) -> ApiResult<PayrollListing> {
    actor.require_role(&[Role::Admin, Role::Hr, Role::Manager])?;
    let page = validate::page(query.page, query.limit, 10)?;

    let mut select =
        payroll_records::Entity::find().filter(payroll_records::Column::OrgId.eq(actor.org_id));
    let mut scope = employees::Entity::find().filter(employees::Column::OrgId.eq(actor.org_id));
    let mut scoped = false;
    if actor.role == Role::Manager {
        scope = scope.filter(employees::Column::ManagerId.eq(actor.employee_id()?));
        scoped = true;
    }
    if let Some(department_id) = query.department_id {
        scope = scope.filter(employees::Column::DepartmentId.eq(department_id));
        scoped = true;
    }
    if scoped {
        let ids: Vec<Uuid> = scope
            .all(db)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(|e| e.id)
            .collect();
        select = select.filter(payroll_records::Column::EmployeeId.is_in(ids));
    }
    if let Some(employee_id) = query.employee_id {
        select = select.filter(payroll_records::Column::EmployeeId.eq(employee_id));
    }
    if let Some(year) = query.year {
        select = select.filter(payroll_records::Column::PeriodYear.eq(year));
    }
    if let Some(month) = query.month {
        select = select.filter(payroll_records::Column::PeriodMonth.eq(month));
    }
    if let Some(status) = query.status {
        select = select.filter(payroll_records::Column::Status.eq(status));
    }

    let matching = select
        .order_by_desc(payroll_records::Column::PeriodYear)
        .order_by_desc(payroll_records::Column::PeriodMonth)
        .all(db)
        .await
        .map_err(db_error)?;
    let summary = totals(&matching);
    let total = matching.len() as u64;
    let rows: Vec<payroll_records::Model> = matching
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
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
            PayrollView {
                employee_name: person.map(|p| p.full_name()),
                employee_code: person.map(|p| p.employee_code.clone()),
                record,
            }
        })
        .collect();
    Ok(PayrollListing {
        records: Paged::new(items, page, total),
        summary,
    })
}

pub async fn delete<C: ConnectionTrait>(db: &C, actor: &Actor, id: Uuid) -> ApiResult<()> {
    actor.require_role(&[Role::Admin])?;
    let record = org_record(db, actor.org_id, id).await?;
    payroll_records::Entity::delete_by_id(record.id)
        .exec(db)
        .await
        .map_err(db_error)?;
    info!(payroll_id = %id, "payroll record deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use payroll_records::Status;

    #[test]
    fn tax_brackets_are_progressive() {
        assert_eq!(income_tax(0), 0);
        assert_eq!(income_tax(800_000), 40_000);
        assert_eq!(income_tax(1_000_000), 50_000);
        assert_eq!(income_tax(3_000_000), 250_000);
        assert_eq!(income_tax(5_000_000), 450_000);
        assert_eq!(income_tax(6_000_000), 600_000);
    }

    #[test]
    fn salaried_slip_matches_batch_formula() {
        let slip = compute_payslip(Some(500_000), None, &Amounts::new(), &Amounts::new()).unwrap();
        assert_eq!(slip.gross_cents, 500_000);
        assert_eq!(slip.allowances.get("basic"), Some(&500_000));
        assert_eq!(slip.deductions.get("incomeTax"), Some(&50_000));
        assert_eq!(slip.deductions.get("socialSecurity"), Some(&30_000));
        assert_eq!(slip.total_deductions_cents, 80_000);
        assert_eq!(slip.tax_cents, 25_000);
        assert_eq!(slip.net_cents, 395_000);
    }

    #[test]
    fn hourly_staff_are_paid_a_full_month() {
        let custom = Amounts::from([("parking".to_string(), 5_000)]);
        let slip = compute_payslip(None, Some(2_500), &Amounts::new(), &custom).unwrap();
        assert_eq!(slip.gross_cents, 400_000);
        assert!(!slip.allowances.contains_key("basic"));
        assert_eq!(slip.total_deductions_cents, 5_000 + 40_000 + 24_000);
    }

    #[test]
    fn oversized_hourly_rates_fail_instead_of_wrapping() {
        let err = compute_payslip(None, Some(i64::MAX / 2), &Amounts::new(), &Amounts::new())
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(percent(i64::MAX, 15), 1_383_505_805_528_216_371);
    }

    #[test]
    fn status_moves_forward_or_to_dispute() {
        assert!(can_transition(Status::Processing, Status::Approved));
        assert!(can_transition(Status::Approved, Status::Paid));
        assert!(can_transition(Status::Paid, Status::Disputed));
        assert!(!can_transition(Status::Processing, Status::Paid));
        assert!(!can_transition(Status::Paid, Status::Processing));
        assert!(!can_transition(Status::Disputed, Status::Disputed));
    }

    #[test]
    fn totals_average_net_pay() {
        assert_eq!(totals(&[]).average_net_cents, 0);
    }
}
