use chrono::{NaiveDate, Utc};
use sqlx::Row;

use deskbook_core::domain::announcement::{AnnouncementRecord, MessageRef};

use super::{format_date, parse_date, AnnouncementRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAnnouncementRepository {
    pool: DbPool,
}

impl SqlAnnouncementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AnnouncementRepository for SqlAnnouncementRepository {
    async fn get_announcement(
        &self,
        date: NaiveDate,
    ) -> Result<Option<AnnouncementRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT target_date, channel_id, message_ts FROM daily_messages WHERE target_date = ?",
        )
        .bind(format_date(date))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let target_date: String =
            row.try_get("target_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let channel_id: String =
            row.try_get("channel_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let message_ts: String =
            row.try_get("message_ts").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        Ok(Some(AnnouncementRecord {
            target_date: parse_date(&target_date)?,
            channel_id,
            message_ref: MessageRef(message_ts),
        }))
    }

    async fn upsert_announcement(
        &self,
        record: AnnouncementRecord,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO daily_messages (target_date, channel_id, message_ts, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(target_date) DO UPDATE SET
                channel_id = excluded.channel_id,
                message_ts = excluded.message_ts,
                updated_at = excluded.updated_at",
        )
        .bind(format_date(record.target_date))
        .bind(&record.channel_id)
        .bind(&record.message_ref.0)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
