use dotenv::dotenv;
use migration::Migrator;
use role_backfill::backfill::RoleBackfiller;
use role_backfill::constants::config::Config;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;

    let db: DatabaseConnection = Database::connect(&config.database_url).await?;
    log::info!("Database connected");

    if config.run_migrations {
        Migrator::up(&db, None).await?;
        log::info!("Migrations applied");
    }

    let backfiller = RoleBackfiller::new(db, config.strategy);
    log::info!("Backfilling roles with {:?}", backfiller.strategy());
    let (report, verification) = backfiller.run_and_verify().await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "backfill": report,
            "verification": verification,
        }))?
    );

    Ok(())
}
