use std::str::FromStr;

use sqlx::Row;
use tutor_core::model::{SessionId, Speaker, Turn, TurnKind};

use super::SqliteRepository;
use super::mapping::{conn, ser, session_id_from_str};
use crate::repository::{StorageError, TurnRepository};

fn map_turn_row(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, StorageError> {
    let session_id = session_id_from_str(&row.try_get::<String, _>("session_id").map_err(ser)?)?;
    let speaker =
        Speaker::from_str(&row.try_get::<String, _>("speaker").map_err(ser)?).map_err(ser)?;
    let kind = TurnKind::from_str(&row.try_get::<String, _>("kind").map_err(ser)?).map_err(ser)?;
    let text: String = row.try_get("text").map_err(ser)?;
    let timestamp = row.try_get("timestamp").map_err(ser)?;
    let time_spent: Option<f64> = row.try_get("time_spent").map_err(ser)?;

    let mut turn = Turn::new(session_id, speaker, kind, text, timestamp);
    if let Some(seconds) = time_spent {
        turn = turn.with_time_spent(seconds);
    }
    Ok(turn)
}

#[async_trait::async_trait]
impl TurnRepository for SqliteRepository {
    async fn append_turn(&self, turn: &Turn) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO turns (session_id, timestamp, speaker, kind, text, time_spent)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(turn.session_id.value().to_string())
        .bind(turn.timestamp)
        .bind(turn.speaker.as_str())
        .bind(turn.kind.as_str())
        .bind(&turn.text)
        .bind(turn.time_spent)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(StorageError::NotFound)
            }
            Err(err) => Err(conn(err)),
        }
    }

    async fn list_turns(&self, session_id: SessionId) -> Result<Vec<Turn>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT session_id, timestamp, speaker, kind, text, time_spent
                FROM turns
                WHERE session_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(session_id.value().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_turn_row(&row)?);
        }
        Ok(out)
    }
}
