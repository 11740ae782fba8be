use anyhow::{Context, Result};
use hrms_tests::{connect, docker, docker_available, postgres_image};
use migration::{Migrator, MigratorTrait};
use platform_authn::{TokenConfig, TokenService};
use platform_db::ensure_default_org;
use products_hr::auth::{self, RegisterInput};
use products_hr::departments::{self, DepartmentQuery};
use products_hr::employees::{self, EmployeeQuery};
use products_hr::seed::seed_demo;
use platform_authz::Role;
use products_hr::load_actor;

#[tokio::test]
async fn orgs_only_see_their_own_people() -> Result<()> {
    if !docker_available() {
        eprintln!("docker unavailable; skipping postgres suite");
        return Ok(());
    }
    let docker = docker();
    let container = docker.run(postgres_image());
    let db = connect(&container).await?;

    Migrator::up(&db, None).await?;
    let acme = ensure_default_org(&db, "acme", "Acme").await?;
    let globex = ensure_default_org(&db, "globex", "Globex").await?;
    let seeded = seed_demo(&db, acme).await?;
    assert_eq!(seeded.employees.len(), 4);

    let tokens = TokenService::new(TokenConfig::default());
    let founder = auth::register(
        &db,
        &tokens,
        globex,
        RegisterInput {
            email: "founder@globex.test".into(),
            username: "founder".into(),
            password: "Password123".into(),
            first_name: "Gale".into(),
            last_name: "Founder".into(),
            role: None,
            department_id: None,
            position: None,
            phone_number: None,
        },
    )
    .await?;
    let founder = load_actor(&db, founder.user.id).await?;
    assert_eq!(founder.org_id, globex);
    assert_eq!(founder.role, Role::Admin);

    let staff = employees::list(&db, &founder, EmployeeQuery::default()).await?;
    assert_eq!(staff.pagination.total, 1);
    let own = staff.items.first().context("founder has an employee record")?;
    assert_ne!(Some(own.employee.id), seeded.employee("employee@hrms.test"));

    let departments = departments::list(&db, &founder, DepartmentQuery::default()).await?;
    assert!(departments.items.is_empty());

    let err = employees::get(
        &db,
        &founder,
        seeded
            .employee("employee@hrms.test")
            .context("seeded employee")?,
    )
    .await
    .unwrap_err();
    assert_eq!(err.status().as_u16(), 404);

    // Seeding twice only fills gaps.
    let again = seed_demo(&db, acme).await?;
    assert_eq!(again.created, 0);
    Ok(())
}
