use sqlx::Row;
use tutor_core::model::{Concept, SessionId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, from_json, i64_from_usize, ser, session_id_from_str, to_json, usize_from_i64};
use crate::repository::{SessionRecord, SessionRepository, StorageError};

fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    let id = session_id_from_str(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?);
    let started_at = row.try_get("started_at").map_err(ser)?;
    let concept: Concept = from_json(&row.try_get::<String, _>("concept_data").map_err(ser)?)?;
    let next_question_index =
        usize_from_i64("next_q_idx", row.try_get::<i64, _>("next_q_idx").map_err(ser)?)?;
    let hint_level =
        usize_from_i64("hint_level", row.try_get::<i64, _>("hint_level").map_err(ser)?)?;

    Ok(SessionRecord {
        id,
        user_id,
        started_at,
        concept,
        next_question_index,
        hint_level,
    })
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let concept_data = to_json(&record.concept)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("INSERT OR IGNORE INTO users (id) VALUES (?1)")
            .bind(record.user_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        let inserted = sqlx::query(
            r"
                INSERT OR IGNORE INTO sessions (
                    id, user_id, started_at, concept_data, next_q_idx, hint_level
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(record.id.value().to_string())
        .bind(record.user_id.as_str())
        .bind(record.started_at)
        .bind(concept_data)
        .bind(i64_from_usize("next_q_idx", record.next_question_index)?)
        .bind(i64_from_usize("hint_level", record.hint_level)?)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if inserted.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        tx.commit().await.map_err(conn)
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, user_id, started_at, concept_data, next_q_idx, hint_level
                FROM sessions
                WHERE id = ?1
            ",
        )
        .bind(id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }

    async fn update_cursor(
        &self,
        id: SessionId,
        next_question_index: usize,
        hint_level: usize,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE sessions
                SET next_q_idx = ?2, hint_level = ?3
                WHERE id = ?1
            ",
        )
        .bind(id.value().to_string())
        .bind(i64_from_usize("next_q_idx", next_question_index)?)
        .bind(i64_from_usize("hint_level", hint_level)?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_sessions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, user_id, started_at, concept_data, next_q_idx, hint_level
                FROM sessions
                WHERE user_id = ?1
                ORDER BY started_at ASC, id ASC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }
}
