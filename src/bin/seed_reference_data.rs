// Seeds subjects, grades, work types and the place hierarchy into the
// configured database. Run once before first start, or again after adding
// entries; existing rows are left alone.

use teachshare::{config::Config, data_seeder::seed_reference_data, database::Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let db = Database::new(&config.database.url).await?;
    db.init().await?;

    seed_reference_data(&db).await?;

    Ok(())
}
