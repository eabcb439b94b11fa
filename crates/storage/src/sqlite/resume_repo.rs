use async_trait::async_trait;
use chrono::Utc;
use quiz_core::model::SessionState;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{
    RESUME_KEY, ResumeLoad, ResumeStore, StorageError, decode_state, encode_state,
};

#[async_trait]
impl ResumeStore for SqliteRepository {
    async fn load(&self) -> Result<ResumeLoad, StorageError> {
        let row = sqlx::query("SELECT payload FROM resume_state WHERE key = ?1")
            .bind(RESUME_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(ResumeLoad::Absent);
        };
        let payload: String = row.try_get("payload").map_err(ser)?;
        Ok(decode_state(&payload))
    }

    async fn save(&self, state: &SessionState) -> Result<(), StorageError> {
        let payload = encode_state(state)?;
        sqlx::query(
            r"
            INSERT INTO resume_state (key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(RESUME_KEY)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM resume_state WHERE key = ?1")
            .bind(RESUME_KEY)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
