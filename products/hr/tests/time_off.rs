mod common;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use common::{ADMIN, EMPLOYEE, HR, HrTestEnv, MANAGER};
use entity::leave_requests::{LeaveType, Status};
use platform_api::ApiError;
use products_hr::attendance::{self, ClockInput, ManualAttendanceInput, MyAttendanceQuery};
use products_hr::leave::{self, DecisionInput, LeaveInput, MyLeavesQuery};

fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    date.and_hms_opt(hour, minute, 0)
        .unwrap()
        .and_utc()
        .fixed_offset()
}

fn vacation(start: NaiveDate, days: i64) -> LeaveInput {
    LeaveInput {
        leave_type: LeaveType::Vacation,
        start_date: start,
        end_date: start + Duration::days(days),
        reason: Some("Family trip".into()),
        work_coverage: None,
        is_emergency: false,
    }
}

#[tokio::test]
async fn a_working_day_records_hours_and_overtime() {
    let env = HrTestEnv::new().await;
    let employee = env.actor(EMPLOYEE).await;
    let day = Utc::now().date_naive();

    attendance::clock_in_at(&env.db, &employee, ClockInput::default(), at(day, 8, 0))
        .await
        .unwrap();
    let err = attendance::clock_in_at(&env.db, &employee, ClockInput::default(), at(day, 8, 5))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Already clocked in for today");

    let record = attendance::clock_out_at(&env.db, &employee, ClockInput::default(), at(day, 18, 30))
        .await
        .unwrap();
    assert!(record.hours_worked > 8.0);
    assert!(record.overtime_hours > 0.0);

    let err = attendance::clock_out_at(&env.db, &employee, ClockInput::default(), at(day, 19, 0))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Already clocked out for today");

    let mine = attendance::my_attendance(&env.db, &employee, MyAttendanceQuery::default())
        .await
        .unwrap();
    assert_eq!(mine.summary.total_days, 1);
}

#[tokio::test]
async fn clocking_out_needs_a_clock_in() {
    let env = HrTestEnv::new().await;
    let manager = env.actor(MANAGER).await;
    let err = attendance::clock_out(&env.db, &manager, ClockInput::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No clock-in record found for today");
}

fn manual_day(employee_id: uuid::Uuid, date: NaiveDate) -> ManualAttendanceInput {
    ManualAttendanceInput {
        employee_id,
        date,
        clock_in: Some(at(date, 9, 0)),
        clock_out: Some(at(date, 18, 30)),
        break_minutes: Some(30),
        hours_worked: None,
        overtime_hours: None,
        status: None,
        work_from_home: None,
        notes: Some("Entered from the paper log".into()),
    }
}

#[tokio::test]
async fn hr_records_a_missed_day_once() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let employee_id = env.employee(EMPLOYEE);
    let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let record = attendance::create(&env.db, &hr, manual_day(employee_id, day))
        .await
        .unwrap();
    assert_eq!(record.date, day);
    assert_eq!(record.hours_worked, 9.0);
    assert_eq!(record.overtime_hours, 1.0);
    assert_eq!(record.status, entity::attendance::Status::Present);

    let err = attendance::create(&env.db, &hr, manual_day(employee_id, day))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Attendance record already exists for this date");

    let manager = env.actor(MANAGER).await;
    let err = attendance::create(&env.db, &manager, manual_day(employee_id, day))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Denied { .. }));
}

#[tokio::test]
async fn manual_days_stay_inside_the_allowed_window() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let employee_id = env.employee(EMPLOYEE);

    let too_early = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
    let too_late = Utc::now().date_naive() + Duration::days(31);
    for date in [too_early, too_late] {
        let err = attendance::create(&env.db, &hr, manual_day(employee_id, date))
            .await
            .unwrap_err();
        match err {
            ApiError::Validation(errors) => assert_eq!(errors[0].field, "date"),
            other => panic!("unexpected {other:?}"),
        }
    }

    let edge = Utc::now().date_naive() + Duration::days(30);
    assert!(attendance::create(&env.db, &hr, manual_day(employee_id, edge)).await.is_ok());
}

#[tokio::test]
async fn leave_goes_to_the_manager_for_approval() {
    let env = HrTestEnv::new().await;
    let employee = env.actor(EMPLOYEE).await;
    let manager = env.actor(MANAGER).await;
    let start = Utc::now().date_naive() + Duration::days(10);

    let request = leave::create(&env.db, &employee, vacation(start, 3))
        .await
        .unwrap();
    assert_eq!(request.status, Status::Pending);
    assert_eq!(request.days_requested, 3);
    assert_eq!(request.approver_id, Some(env.employee(MANAGER)));

    let err = leave::create(&env.db, &employee, vacation(start + Duration::days(1), 2))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "You have a conflicting leave request for this period"
    );

    let pending = leave::pending(&env.db, &manager, None, None, None)
        .await
        .unwrap();
    assert_eq!(pending.items.len(), 1);

    let decided = leave::decide(
        &env.db,
        &manager,
        request.id,
        DecisionInput {
            action: Status::Approved,
            rejection_reason: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(decided.request.status, Status::Approved);
    assert!(decided.request.approved_at.is_some());

    let again = leave::decide(
        &env.db,
        &manager,
        request.id,
        DecisionInput {
            action: Status::Rejected,
            rejection_reason: Some("Too late".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(again, ApiError::InvalidInput(_)));

    let mine = leave::my_leaves(&env.db, &employee, MyLeavesQuery::default())
        .await
        .unwrap();
    if start.year() == Utc::now().year() {
        assert_eq!(mine.leave_balance.vacation, 17);
    }
}

#[tokio::test]
async fn only_the_owner_cancels_pending_requests() {
    let env = HrTestEnv::new().await;
    let employee = env.actor(EMPLOYEE).await;
    let hr = env.actor(HR).await;
    let start = Utc::now().date_naive() + Duration::days(20);

    let request = leave::create(&env.db, &employee, vacation(start, 1))
        .await
        .unwrap();
    let err = leave::cancel(&env.db, &hr, request.id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let cancelled = leave::cancel(&env.db, &employee, request.id).await.unwrap();
    assert_eq!(cancelled.status, Status::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
}

#[tokio::test]
async fn emergencies_are_approved_at_once_and_past_dates_refused() {
    let env = HrTestEnv::new().await;
    let admin = env.actor(ADMIN).await;
    let today = Utc::now().date_naive();

    let mut input = vacation(today, 1);
    input.leave_type = LeaveType::Emergency;
    input.is_emergency = true;
    let request = leave::create(&env.db, &admin, input).await.unwrap();
    assert_eq!(request.status, Status::Approved);
    assert_eq!(request.approver_id, None);

    let err = leave::create(&env.db, &admin, vacation(today - Duration::days(3), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn leave_summary_counts_every_page() {
    let env = HrTestEnv::new().await;
    let employee = env.actor(EMPLOYEE).await;
    let today = Utc::now().date_naive();

    let mut emergency = vacation(today, 1);
    emergency.leave_type = LeaveType::Emergency;
    emergency.is_emergency = true;
    leave::create(&env.db, &employee, emergency).await.unwrap();
    for offset in [10, 20] {
        leave::create(&env.db, &employee, vacation(today + Duration::days(offset), 1))
            .await
            .unwrap();
    }

    let first_page = leave::my_leaves(
        &env.db,
        &employee,
        MyLeavesQuery {
            limit: Some(1),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(first_page.requests.items.len(), 1);
    assert_eq!(first_page.summary.total_requests, 3);
    assert_eq!(first_page.summary.pending_requests, 2);
    assert_eq!(first_page.summary.approved_requests, 1);
    assert_eq!(first_page.summary.rejected_requests, 0);
}
