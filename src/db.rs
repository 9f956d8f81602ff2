use log::info;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgPool};

use crate::config::Config;
use crate::error::{Result, SyncError};

/// Open the pool used for the whole run and make sure the database answers.
///
/// One connection is enough: batches are loaded one after the other.
pub async fn init_pool(config: &Config) -> Result<PgPool> {
    let connect_err = |source| SyncError::Connect {
        target: config.redacted(),
        source,
    };

    let options = config.connect_options().map_err(connect_err)?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(connect_err)?;

    let mut conn = pool.acquire().await.map_err(connect_err)?;
    conn.ping().await.map_err(connect_err)?;

    info!("connected to {}", config.redacted());
    Ok(pool)
}
