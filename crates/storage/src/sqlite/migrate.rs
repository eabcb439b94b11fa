use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Ordered schema steps. A version is applied in one transaction and never edited afterwards.
const MIGRATIONS: &[(i64, &[&str])] = &[(
    1,
    &[
        r"
        CREATE TABLE IF NOT EXISTS resume_state (
            key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        r"
        CREATE TABLE IF NOT EXISTS attempts (
            id INTEGER PRIMARY KEY,
            quiz_id TEXT NOT NULL,
            title TEXT NOT NULL,
            level INTEGER NOT NULL CHECK (level >= 1),
            started_at TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
            answered INTEGER NOT NULL CHECK (answered >= 0),
            unanswered INTEGER NOT NULL CHECK (unanswered >= 0),
            total_time_taken_secs INTEGER NOT NULL CHECK (total_time_taken_secs >= 0)
        )",
        r"
        CREATE INDEX IF NOT EXISTS idx_attempts_quiz_completed
            ON attempts (quiz_id, completed_at)",
    ],
)];

/// Applies every schema version that is not recorded in `schema_migrations`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    for &(version, statements) in MIGRATIONS {
        let applied = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?
            .is_some();
        if applied {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(version)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        log::info!("applied schema migration {version}");
    }

    Ok(())
}
