use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Opens the pool and brings the schema up to date.
pub async fn connect_pg(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(max_connections, "database ready");

    Ok(pool)
}
