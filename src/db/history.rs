use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use tokio_rusqlite::rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params, rusqlite};

use crate::core::HistoryRecord;

pub async fn insert(conn: &Connection, record: HistoryRecord) -> Result<()> {
    conn.call(move |c| {
        c.execute(
            "INSERT INTO history (id, content_id, display_name, install_path, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &record.id,
                &record.content_id,
                &record.display_name,
                &record.install_path,
                record.timestamp.timestamp()
            ],
        )?;
        Ok::<(), rusqlite::Error>(())
    })
    .await?;

    Ok(())
}

/// All records, newest first.
pub async fn list(conn: &Connection) -> Result<Vec<HistoryRecord>> {
    conn.call(|c| {
        let mut stmt = c.prepare(
            "SELECT id, content_id, display_name, install_path, finished_at
             FROM history
             ORDER BY finished_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| anyhow!("Failed to list history: {}", e))
}

/// Delete one record, returning it if it existed.
pub async fn remove(conn: &Connection, id: String) -> Result<Option<HistoryRecord>> {
    conn.call(move |c| {
        let tx = c.transaction()?;

        let record = tx
            .query_row(
                "SELECT id, content_id, display_name, install_path, finished_at
                 FROM history WHERE id = ?1",
                params![&id],
                row_to_record,
            )
            .optional()?;

        tx.execute("DELETE FROM history WHERE id = ?1", params![&id])?;
        tx.commit()?;
        Ok::<_, rusqlite::Error>(record)
    })
    .await
    .map_err(|e| anyhow!("Failed to remove history record: {}", e))
}

/// Delete every record, returning how many were removed.
pub async fn clear(conn: &Connection) -> Result<usize> {
    let removed = conn
        .call(|c| Ok::<_, rusqlite::Error>(c.execute("DELETE FROM history", [])?))
        .await?;

    Ok(removed)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let finished_at: i64 = row.get(4)?;
    Ok(HistoryRecord {
        id: row.get(0)?,
        content_id: row.get(1)?,
        display_name: row.get(2)?,
        install_path: row.get(3)?,
        timestamp: DateTime::<Utc>::from_timestamp(finished_at, 0).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn record(id: &str, secs: i64) -> HistoryRecord {
        HistoryRecord {
            id: id.to_string(),
            content_id: "740".to_string(),
            display_name: format!("Record {}", id),
            install_path: format!("/downloads/{}", id),
            timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let conn = db::init_in_memory().await.unwrap();
        insert(&conn, record("old", 1_000)).await.unwrap();
        insert(&conn, record("new", 2_000)).await.unwrap();

        let records = list(&conn).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["new", "old"]);
        assert_eq!(records[0], record("new", 2_000));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let conn = db::init_in_memory().await.unwrap();
        insert(&conn, record("a", 1_000)).await.unwrap();

        let removed = remove(&conn, "a".to_string()).await.unwrap();
        assert_eq!(removed.map(|r| r.id), Some("a".to_string()));

        let again = remove(&conn, "a".to_string()).await.unwrap();
        assert!(again.is_none());
        assert!(list(&conn).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let conn = db::init_in_memory().await.unwrap();
        insert(&conn, record("a", 1_000)).await.unwrap();
        insert(&conn, record("b", 1_001)).await.unwrap();

        assert_eq!(clear(&conn).await.unwrap(), 2);
        assert!(list(&conn).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_database_file_persists_records() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("history.db");

        let conn = db::init(&path).await.unwrap();
        insert(&conn, record("kept", 1_000)).await.unwrap();
        drop(conn);

        let reopened = db::init(&path).await.unwrap();
        let records = list(&reopened).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "kept");
    }
}
