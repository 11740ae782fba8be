pub use sea_orm_migration::prelude::*;

mod m20250301_000001_core;
mod m20250301_000002_time_and_pay;
mod m20250302_000003_recruitment;
mod m20250303_000004_hiring;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_core::Migration),
            Box::new(m20250301_000002_time_and_pay::Migration),
            Box::new(m20250302_000003_recruitment::Migration),
            Box::new(m20250303_000004_hiring::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm_migration::sea_orm::{ConnectOptions, Database};

    #[tokio::test]
    async fn migrations_apply_and_roll_back_on_sqlite() {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        assert!(Migrator::get_pending_migrations(&db).await.unwrap().is_empty());
        let manager = SchemaManager::new(&db);
        assert!(manager.has_table("employees").await.unwrap());
        assert!(manager.has_table("candidate_applications").await.unwrap());
        assert!(manager.has_table("interviews").await.unwrap());
        assert!(manager.has_table("onboarding_tasks").await.unwrap());
        assert!(manager.has_table("report_history").await.unwrap());
        Migrator::down(&db, None).await.unwrap();
        assert!(!manager.has_table("employees").await.unwrap());
        assert!(!manager.has_table("interviews").await.unwrap());
    }
}
