use quiz_core::model::{DailyResult, PointsTotal, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, date_key_from_str, insert_err, ser, u32_from_i64, u64_from_i64, user_id_from_i64,
    user_id_to_i64,
};
use crate::repository::{DailyResultRepository, StorageError};

fn map_result_row(row: &SqliteRow) -> Result<DailyResult, StorageError> {
    Ok(DailyResult {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        day: date_key_from_str(&row.try_get::<String, _>("day").map_err(ser)?)?,
        score: u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        points: u32_from_i64("points", row.try_get::<i64, _>("points").map_err(ser)?)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl DailyResultRepository for SqliteRepository {
    async fn append_result(&self, result: &DailyResult) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO daily_results (user_id, day, score, points, completed_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(user_id_to_i64(result.user_id)?)
        .bind(result.day.to_string())
        .bind(i64::from(result.score))
        .bind(i64::from(result.points))
        .bind(result.completed_at)
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        Ok(())
    }

    async fn list_results(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<DailyResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, day, score, points, completed_at
                FROM daily_results
                WHERE user_id = ?1
                ORDER BY completed_at DESC
                LIMIT ?2
            ",
        )
        .bind(user_id_to_i64(user_id)?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_result_row).collect()
    }

    async fn points_totals(&self, limit: u32) -> Result<Vec<PointsTotal>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, SUM(points) AS total_points, COUNT(*) AS completions
                FROM daily_results
                GROUP BY user_id
                ORDER BY total_points DESC, user_id ASC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(PointsTotal {
                user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
                total_points: u64_from_i64(
                    "total_points",
                    row.try_get::<i64, _>("total_points").map_err(ser)?,
                )?,
                completions: u32_from_i64(
                    "completions",
                    row.try_get::<i64, _>("completions").map_err(ser)?,
                )?,
            });
        }
        Ok(out)
    }
}
