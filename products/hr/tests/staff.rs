mod common;

use common::{ADMIN, EMPLOYEE, HR, HrTestEnv, MANAGER};
use platform_api::ApiError;
use platform_authn::{TokenConfig, TokenService};
use products_hr::auth::{self, LoginInput, RegisterInput};
use products_hr::departments::{self, DepartmentInput};
use products_hr::employees::{self, CreateEmployeeInput, EmployeeQuery, UpdateEmployeeInput};
use products_hr::seed::{DEMO_PASSWORD, seed_demo};

fn tokens() -> TokenService {
    TokenService::new(TokenConfig {
        access_secret: "access-secret-for-tests".into(),
        refresh_secret: "refresh-secret-for-tests".into(),
        access_ttl_minutes: 15,
        refresh_ttl_days: 7,
        candidate_ttl_days: 7,
    })
}

fn new_hire(email: &str) -> CreateEmployeeInput {
    CreateEmployeeInput {
        first_name: "Quinn".into(),
        last_name: "Park".into(),
        email: email.into(),
        position: "Analyst".into(),
        department_id: None,
        manager_id: None,
        salary_cents: Some(5_000_000),
        hourly_rate_cents: None,
        employment_type: None,
        phone: None,
        role: None,
        password: None,
        hire_date: None,
    }
}

#[tokio::test]
async fn seeding_twice_creates_nothing_new() {
    let env = HrTestEnv::new().await;
    let again = seed_demo(&env.db, env.org_id).await.unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.employee(EMPLOYEE), Some(env.employee(EMPLOYEE)));
}

#[tokio::test]
async fn login_checks_credentials_and_refresh_rotates() {
    let env = HrTestEnv::new().await;
    let tokens = tokens();

    let session = auth::login(
        &env.db,
        &tokens,
        LoginInput {
            email: "HR@hrms.test".into(),
            password: DEMO_PASSWORD.into(),
        },
    )
    .await
    .unwrap();
    assert!(session.user.last_login_at.is_some());

    let pair = auth::refresh(&env.db, &tokens, &session.tokens.refresh_token)
        .await
        .unwrap();
    assert!(!pair.token.is_empty());

    let err = auth::refresh(&env.db, &tokens, &session.tokens.token)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));

    let err = auth::login(
        &env.db,
        &tokens,
        LoginInput {
            email: HR.into(),
            password: "wrong-password".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
}

#[tokio::test]
async fn self_registration_cannot_claim_admin() {
    let env = HrTestEnv::new().await;
    let input = RegisterInput {
        email: "new@hrms.test".into(),
        username: "new_person".into(),
        password: "Secret123".into(),
        first_name: "New".into(),
        last_name: "Person".into(),
        role: Some(platform_authz::Role::Admin),
        department_id: None,
        position: None,
        phone_number: None,
    };
    let err = auth::register(&env.db, &tokens(), env.org_id, input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let session = auth::register(
        &env.db,
        &tokens(),
        env.org_id,
        RegisterInput { role: None, ..input.clone() },
    )
    .await
    .unwrap();
    assert_eq!(session.user.role, platform_authz::Role::Employee);

    let err = auth::register(&env.db, &tokens(), env.org_id, RegisterInput { role: None, ..input })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict { ref field, .. } if field == "email"));
}

#[tokio::test]
async fn hr_creates_employee_with_temporary_password() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;

    let created = employees::create(&env.db, &hr, new_hire("quinn@hrms.test"))
        .await
        .unwrap();
    let password = created.temporary_password.clone().unwrap();
    assert!(password.len() >= 8);
    assert!(created.employee.employee.employee_code.starts_with("EMP-"));
    assert!(created.employee.employee.is_on_probation);

    auth::login(
        &env.db,
        &tokens(),
        LoginInput {
            email: "quinn@hrms.test".into(),
            password,
        },
    )
    .await
    .unwrap();

    let employee = env.actor(EMPLOYEE).await;
    let err = employees::create(&env.db, &employee, new_hire("other@hrms.test"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Denied { .. }));
}

#[tokio::test]
async fn managers_only_list_their_team() {
    let env = HrTestEnv::new().await;
    let manager = env.actor(MANAGER).await;
    let page = employees::list(&env.db, &manager, EmployeeQuery::default())
        .await
        .unwrap();
    let ids: Vec<_> = page.items.iter().map(|e| e.employee.id).collect();
    assert_eq!(ids, vec![env.employee(EMPLOYEE)]);

    let admin = env.actor(ADMIN).await;
    let all = employees::list(&env.db, &admin, EmployeeQuery::default())
        .await
        .unwrap();
    assert_eq!(all.pagination.total, 4);
}

#[tokio::test]
async fn employees_cannot_manage_themselves_and_deactivation_is_soft() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let target = env.employee(EMPLOYEE);

    let err = employees::update(
        &env.db,
        &hr,
        target,
        UpdateEmployeeInput {
            manager_id: Some(target),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let admin = env.actor(ADMIN).await;
    employees::deactivate(&env.db, &admin, target).await.unwrap();
    let view = employees::get(&env.db, &admin, target).await.unwrap();
    assert!(!view.employee.is_active);
    assert!(view.employee.termination_date.is_some());

    let err = auth::login(
        &env.db,
        &tokens(),
        LoginInput {
            email: EMPLOYEE.into(),
            password: DEMO_PASSWORD.into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Account is deactivated");
}

#[tokio::test]
async fn hr_cannot_demote_or_disable_an_admin() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let admin_profile = env.employee(ADMIN);

    for input in [
        UpdateEmployeeInput {
            is_active: Some(false),
            ..Default::default()
        },
        UpdateEmployeeInput {
            role: Some(platform_authz::Role::Employee),
            ..Default::default()
        },
    ] {
        let err = employees::update(&env.db, &hr, admin_profile, input)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
    let admin = env.actor(ADMIN).await;
    assert_eq!(admin.role, platform_authz::Role::Admin);
    let view = employees::get(&env.db, &admin, admin_profile).await.unwrap();
    assert!(view.employee.is_active);
}

#[tokio::test]
async fn reactivation_clears_the_termination_date() {
    let env = HrTestEnv::new().await;
    let admin = env.actor(ADMIN).await;
    let target = env.employee(EMPLOYEE);

    employees::deactivate(&env.db, &admin, target).await.unwrap();
    let view = employees::update(
        &env.db,
        &admin,
        target,
        UpdateEmployeeInput {
            is_active: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(view.employee.is_active);
    assert_eq!(view.employee.termination_date, None);

    auth::login(
        &env.db,
        &tokens(),
        LoginInput {
            email: EMPLOYEE.into(),
            password: DEMO_PASSWORD.into(),
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn department_hierarchy_refuses_cycles_and_guarded_deletes() {
    let env = HrTestEnv::new().await;
    let hr = env.actor(HR).await;
    let engineering = env.engineering();

    let platform = departments::create(
        &env.db,
        &hr,
        DepartmentInput {
            name: Some("Platform".into()),
            parent_department_id: Some(engineering),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let err = departments::update(
        &env.db,
        &hr,
        engineering,
        DepartmentInput {
            parent_department_id: Some(platform.department.id),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot set a sub-department as the parent department"
    );

    let duplicate = departments::create(
        &env.db,
        &hr,
        DepartmentInput {
            name: Some("Platform".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(duplicate, ApiError::Conflict { .. }));

    let admin = env.actor(ADMIN).await;
    assert!(departments::delete(&env.db, &admin, engineering).await.is_err());
    departments::delete(&env.db, &admin, platform.department.id)
        .await
        .unwrap();

    let tree = departments::tree(&env.db, &hr).await.unwrap();
    assert_eq!(tree.departments.len(), 2);
}

#[tokio::test]
async fn other_orgs_are_invisible() {
    let env = HrTestEnv::new().await;
    let other_org = common::insert_org(&env.db, "globex").await;

    let admin = env.actor(ADMIN).await;
    let outsider = products_hr::Actor {
        org_id: other_org,
        ..admin.clone()
    };
    let err = employees::get(&env.db, &outsider, env.employee(EMPLOYEE))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}
