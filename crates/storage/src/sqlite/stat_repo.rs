use quiz_core::model::{UserId, UserQuizStat};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, date_key_from_str, ser, u32_from_i64, user_id_from_i64, user_id_to_i64};
use crate::repository::{StorageError, UserStatRepository};

fn map_stat_row(row: &SqliteRow) -> Result<UserQuizStat, StorageError> {
    let failed_on = row
        .try_get::<Option<String>, _>("failed_on")
        .map_err(ser)?
        .map(|s| date_key_from_str(&s))
        .transpose()?;

    Ok(UserQuizStat {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        last_completed_at: row.try_get("last_completed_at").map_err(ser)?,
        streak_count: u32_from_i64(
            "streak_count",
            row.try_get::<i64, _>("streak_count").map_err(ser)?,
        )?,
        failed_on,
    })
}

#[async_trait::async_trait]
impl UserStatRepository for SqliteRepository {
    async fn load_stat(&self, user_id: UserId) -> Result<Option<UserQuizStat>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, last_completed_at, streak_count, failed_on
                FROM user_quiz_stats
                WHERE user_id = ?1
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_stat_row).transpose()
    }

    async fn save_stat(&self, stat: &UserQuizStat) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO user_quiz_stats (user_id, last_completed_at, streak_count, failed_on)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id) DO UPDATE SET
                    last_completed_at = excluded.last_completed_at,
                    streak_count = excluded.streak_count,
                    failed_on = excluded.failed_on
            ",
        )
        .bind(user_id_to_i64(stat.user_id)?)
        .bind(stat.last_completed_at)
        .bind(i64::from(stat.streak_count))
        .bind(stat.failed_on.map(|d| d.to_string()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
