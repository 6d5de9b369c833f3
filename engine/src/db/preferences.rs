/// Preference record storage
///
/// Rows are keyed by (session, attribute). Writes upsert and refresh the
/// timestamp; expiry is decided by the caller at read time.
use anyhow::{Context, Result};
use sdk::types::PreferenceRecord;
use sqlx::{Row, SqlitePool};

const UPSERT: &str = r#"
    INSERT INTO preferences (session_id, attribute, value, last_updated)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(session_id, attribute)
    DO UPDATE SET value = excluded.value, last_updated = excluded.last_updated
"#;

pub struct PreferenceRepository {
    pool: SqlitePool,
}

impl PreferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update one attribute, setting `last_updated` to `now`
    pub async fn upsert(&self, session_id: &str, attribute: &str, value: &str, now: i64) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(session_id)
            .bind(attribute)
            .bind(value)
            .bind(now)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to save preference '{}'", attribute))?;

        Ok(())
    }

    /// Upsert several records in one transaction
    pub async fn upsert_all(&self, session_id: &str, records: &[PreferenceRecord], now: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for record in records {
            sqlx::query(UPSERT)
                .bind(session_id)
                .bind(&record.attribute)
                .bind(&record.value)
                .bind(now)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to save preference '{}'", record.attribute))?;
        }

        tx.commit().await.context("Failed to commit preferences")?;
        Ok(())
    }

    /// Records updated at or after `cutoff`, ordered by attribute
    pub async fn list_since(&self, session_id: &str, cutoff: i64) -> Result<Vec<PreferenceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT attribute, value, last_updated
            FROM preferences
            WHERE session_id = ? AND last_updated >= ?
            ORDER BY attribute
            "#,
        )
        .bind(session_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load preferences")?;

        Ok(rows
            .into_iter()
            .map(|row| PreferenceRecord {
                attribute: row.get("attribute"),
                value: row.get("value"),
                last_updated: row.get("last_updated"),
            })
            .collect())
    }

    /// Delete every record of a session; returns the number removed
    pub async fn delete_session(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM preferences WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete preferences")?;

        Ok(result.rows_affected())
    }
}
