mod common;

use common::{ADMIN, EMPLOYEE, HR, HrTestEnv, MANAGER};
use entity::payroll_records::Status;
use platform_api::ApiError;
use products_hr::payroll::{
    self, Amounts, CreatePayrollInput, MyPayrollQuery, PayrollQuery, ProcessInput, StatusInput,
};
use products_hr::validate;

fn march_2025() -> ProcessInput {
    ProcessInput {
        month: 3,
        year: 2025,
        custom_allowances: Default::default(),
        custom_deductions: Default::default(),
    }
}

fn status(status: Status) -> StatusInput {
    StatusInput {
        status,
        notes: None,
    }
}

#[tokio::test]
async fn processing_a_month_once_per_employee() {
    let env = HrTestEnv::new().await;
    let admin = env.actor(ADMIN).await;

    let first = payroll::process(&env.db, &admin, march_2025()).await.unwrap();
    assert_eq!(first.processed_count, 4);
    assert_eq!(first.payroll_period, "3/2025");
    assert!(first.skipped.is_empty());

    let second = payroll::process(&env.db, &admin, march_2025()).await.unwrap();
    assert_eq!(second.processed_count, 0);
    assert_eq!(second.skipped.len(), 4);

    let hr = env.actor(HR).await;
    let err = payroll::process(&env.db, &hr, march_2025()).await.unwrap_err();
    assert!(matches!(err, ApiError::Denied { .. }));
}

#[tokio::test]
async fn payslips_follow_the_release_path() {
    let env = HrTestEnv::new().await;
    let admin = env.actor(ADMIN).await;
    payroll::process(&env.db, &admin, march_2025()).await.unwrap();

    let employee = env.actor(EMPLOYEE).await;
    let mine = payroll::my_payroll(
        &env.db,
        &employee,
        MyPayrollQuery {
            year: Some(2025),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(mine.records.items.len(), 1);
    let record = mine.records.items[0].clone();
    assert_eq!(record.status, Status::Processing);
    assert_eq!(record.gross_cents, 6_500_000);
    assert!(record.net_cents < record.gross_cents);

    let hr = env.actor(HR).await;
    let err = payroll::update_status(&env.db, &hr, record.id, status(Status::Paid))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    payroll::update_status(&env.db, &hr, record.id, status(Status::Approved))
        .await
        .unwrap();
    let paid = payroll::update_status(&env.db, &hr, record.id, status(Status::Paid))
        .await
        .unwrap();
    assert!(paid.paid_at.is_some());

    let err = payroll::my_payroll(&env.db, &employee, MyPayrollQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_) | ApiError::InvalidInput(_)));
}

#[tokio::test]
async fn managers_see_only_their_team_payroll() {
    let env = HrTestEnv::new().await;
    let admin = env.actor(ADMIN).await;
    payroll::process(&env.db, &admin, march_2025()).await.unwrap();

    let manager = env.actor(MANAGER).await;
    let listing = payroll::list(&env.db, &manager, PayrollQuery::default())
        .await
        .unwrap();
    let owners: Vec<_> = listing.records.items.iter().map(|r| r.record.employee_id).collect();
    assert!(owners.contains(&env.employee(EMPLOYEE)));
    assert!(!owners.contains(&env.employee(HR)));
}

fn manual_slip(employee_id: uuid::Uuid, month: i32) -> CreatePayrollInput {
    CreatePayrollInput {
        employee_id,
        period_month: month,
        period_year: 2025,
        basic_salary_cents: 500_000,
        gross_cents: None,
        allowances: Amounts::from([("housing".to_string(), 100_000)]),
        deductions: Amounts::from([("pension".to_string(), 20_000)]),
        overtime_cents: 10_000,
        bonus_cents: 5_000,
        tax_cents: None,
        currency: Some("eur".into()),
        notes: None,
    }
}

fn failed_fields(err: ApiError) -> Vec<String> {
    match err {
        ApiError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn manual_slips_compute_net_pay() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let employee_id = env.employee(EMPLOYEE);

    let record = payroll::create(&env.db, &hr, manual_slip(employee_id, 4))
        .await
        .unwrap();
    assert_eq!(record.gross_cents, 600_000);
    assert_eq!(record.total_deductions_cents, 20_000);
    assert_eq!(record.tax_cents, payroll::income_tax(600_000));
    assert_eq!(record.tax_cents, 30_000);
    assert_eq!(record.net_cents, 600_000 + 10_000 + 5_000 - 20_000 - 30_000);
    assert_eq!(record.currency, "EUR");
    assert_eq!(record.status, Status::Processing);

    let err = payroll::create(&env.db, &hr, manual_slip(employee_id, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let employee = env.actor(EMPLOYEE).await;
    let err = payroll::create(&env.db, &employee, manual_slip(employee_id, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Denied { .. }));
}

#[tokio::test]
async fn manual_slips_reject_bad_currency_and_oversized_amounts() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let employee_id = env.employee(EMPLOYEE);

    let mut input = manual_slip(employee_id, 6);
    input.currency = Some("EURO".into());
    let err = payroll::create(&env.db, &hr, input).await.unwrap_err();
    assert_eq!(failed_fields(err), ["currency"]);

    let mut input = manual_slip(employee_id, 6);
    input.basic_salary_cents = 9_000_000_000_000_000_000;
    input.allowances = Amounts::from([("housing".to_string(), 1_000_000_000_000_000_000)]);
    let err = payroll::create(&env.db, &hr, input).await.unwrap_err();
    assert_eq!(failed_fields(err), ["basicSalaryCents", "allowances"]);

    let mut input = manual_slip(employee_id, 6);
    input.allowances = (0..10)
        .map(|n| (format!("extra{n}"), validate::MAX_AMOUNT_CENTS))
        .collect();
    let record = payroll::create(&env.db, &hr, input).await.unwrap();
    assert_eq!(record.gross_cents, 500_000 + 10 * validate::MAX_AMOUNT_CENTS);
}
