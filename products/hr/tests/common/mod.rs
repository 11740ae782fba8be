#![allow(dead_code)]

use entity::{orgs, users};
use migration::{Migrator, MigratorTrait};
use products_hr::seed::{SeededHr, seed_demo};
use products_hr::{Actor, load_actor};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectOptions, Database, DatabaseConnection,
    EntityTrait, QueryFilter,
};
use uuid::Uuid;

pub const ADMIN: &str = "admin@hrms.test";
pub const HR: &str = "hr@hrms.test";
pub const MANAGER: &str = "manager@hrms.test";
pub const EMPLOYEE: &str = "employee@hrms.test";

pub struct HrTestEnv {
    pub db: DatabaseConnection,
    pub org_id: Uuid,
    pub seeded: SeededHr,
}

impl HrTestEnv {
    pub async fn new() -> Self {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let org_id = insert_org(&db, "acme").await;
        let seeded = seed_demo(&db, org_id).await.unwrap();
        Self { db, org_id, seeded }
    }

    pub async fn actor(&self, email: &str) -> Actor {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .unwrap()
            .unwrap();
        load_actor(&self.db, user.id).await.unwrap()
    }

    pub fn employee(&self, email: &str) -> Uuid {
        self.seeded.employee(email).unwrap()
    }

    pub fn engineering(&self) -> Uuid {
        self.seeded.departments[0]
    }
}

pub async fn insert_org(db: &DatabaseConnection, slug: &str) -> Uuid {
    orgs::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slug.to_string()),
        name: Set(format!("{slug} Inc")),
        created_at: Set(chrono::Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
    .unwrap()
    .id
}
