use std::path::Path;

use anyhow::{Context, Result};
use tokio_rusqlite::Connection;

pub mod history;

pub async fn init(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    apply_schema(&conn).await?;
    Ok(conn)
}

/// Open a throwaway database, used by tests and dry runs.
pub async fn init_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().await?;
    apply_schema(&conn).await?;
    Ok(conn)
}

async fn apply_schema(conn: &Connection) -> Result<()> {
    conn.call(|conn| {
        let schema = include_str!("schema.sql");
        conn.execute_batch(schema)?;
        Ok::<(), tokio_rusqlite::rusqlite::Error>(())
    })
    .await?;

    Ok(())
}
