use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hrms_server::{AppConfig, AppState, ServeConfig, graphql, http};
use migration::{Migrator, MigratorTrait};
use platform_db::{self, DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use products_hr::seed::seed_demo;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hrms-server", version, about = "HRMS backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Create the default org and demo accounts.
    Seed,
    /// Print the GraphQL schema snapshot.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
    /// Roll back every migration, then apply them all again.
    Reset,
    /// List migrations that have not been applied yet.
    Status,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::from_env())?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, AppConfig::load()?).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
            MigrateCommand::Reset => migrate_reset().await,
            MigrateCommand::Status => migrate_status().await,
        },
        Command::Seed => run_seed(AppConfig::load()?).await,
        Command::SchemaPrint { output } => schema_print(output),
    }
}

async fn run_seed(config: AppConfig) -> Result<()> {
    let pool = setup_pool().await?;
    ensure_migrations(&pool, false).await?;
    let org_id =
        platform_db::ensure_default_org(&pool, &config.default_org_slug, &config.default_org_name)
            .await?;
    let seeded = seed_demo(&pool, org_id).await?;
    info!(
        org = %config.default_org_slug,
        created = seeded.created,
        "demo data seeded"
    );
    Ok(())
}

fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let target = path.unwrap_or_else(|| PathBuf::from("schema.graphql"));
    std::fs::write(&target, graphql::sdl())
        .with_context(|| format!("failed to write {}", target.display()))?;
    info!(path = %target.display(), "schema snapshot written");
    Ok(())
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings).await.map_err(Into::into)
}

async fn run_server(cmd: ServeCommand, config: AppConfig) -> Result<()> {
    let pool = setup_pool().await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let default_org_id =
        platform_db::ensure_default_org(&pool, &config.default_org_slug, &config.default_org_name)
            .await?;
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;
    let state = AppState::new(pool, config, default_org_id);
    http::serve(ServeConfig::from(&cmd), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `cargo run -p hrms-server -- migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

async fn migrate_reset() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::refresh(&pool).await?;
    info!("database schema rebuilt");
    Ok(())
}

async fn migrate_status() -> Result<()> {
    let pool = setup_pool().await?;
    let pending = Migrator::get_pending_migrations(&pool).await?;
    if pending.is_empty() {
        info!("schema is up to date");
    }
    for migration in pending {
        info!(name = migration.name(), "pending migration");
    }
    Ok(())
}
