use super::Repository;
use crate::domain::EventCursor;
use sqlx::Row;

impl Repository {
    /// Cursor of the last committed event, if any.
    pub async fn get_cursor(&self) -> Result<Option<EventCursor>, sqlx::Error> {
        let row = sqlx::query("SELECT block, log_index FROM index_cursor WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| {
            let block: i64 = r.get("block");
            let log_index: i64 = r.get("log_index");
            EventCursor::new(block as u64, log_index as u32)
        }))
    }
}
