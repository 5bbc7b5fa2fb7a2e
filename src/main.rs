use anyhow::Context;

use music_warehouse_etl::{config::Config, db, pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("etl=info,music_warehouse_etl=info")
        .init();

    let config = Config::from_env().context("failed to read configuration")?;

    let source = db::connect_source(&config)
        .await
        .context("failed to connect to source database")?;
    let warehouse = db::connect_warehouse(&config)
        .await
        .context("failed to connect to warehouse database")?;
    tracing::info!("database connections established");

    let summary = pipeline::run(&source, &warehouse).await?;

    tracing::info!(
        "run finished: {} tables loaded, {} failed, {} source tables unreadable",
        summary.tables.len() - summary.failed_tables(),
        summary.failed_tables(),
        summary.extract_failures.len()
    );
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
