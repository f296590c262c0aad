use super::{EntityRow, EventWrite, Repository};
use crate::domain::EventCursor;
use crate::store::EntityKind;
use sqlx::Row;

impl Repository {
    /// Load every stored record, ordered by kind then id.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row names an unknown kind.
    pub async fn load_entities(&self) -> Result<Vec<EntityRow>, sqlx::Error> {
        let rows = sqlx::query("SELECT kind, id, body FROM entities ORDER BY kind, id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let kind: String = row.get("kind");
                let kind = kind
                    .parse::<EntityKind>()
                    .map_err(|e| sqlx::Error::Decode(e.into()))?;
                Ok(EntityRow {
                    kind,
                    id: row.get("id"),
                    body: row.get("body"),
                })
            })
            .collect()
    }

    /// Write one event's changes and advance the cursor in a single
    /// transaction. Either all of it lands or none of it does.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is committed then.
    pub async fn commit_event(
        &self,
        write: &EventWrite,
        cursor: EventCursor,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for row in &write.upserts {
            sqlx::query(
                r#"
                INSERT INTO entities (kind, id, body, updated_block)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(kind, id) DO UPDATE SET
                    body = excluded.body,
                    updated_block = excluded.updated_block
                "#,
            )
            .bind(row.kind.as_str())
            .bind(row.id.as_str())
            .bind(row.body.as_str())
            .bind(cursor.block as i64)
            .execute(&mut *tx)
            .await?;
        }

        for (kind, id) in &write.deletes {
            sqlx::query("DELETE FROM entities WHERE kind = ? AND id = ?")
                .bind(kind.as_str())
                .bind(id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO index_cursor (id, block, log_index, updated_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                block = excluded.block,
                log_index = excluded.log_index,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(cursor.block as i64)
        .bind(cursor.log_index as i64)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Number of stored records of one kind.
    pub async fn count_entities(&self, kind: EntityKind) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM entities WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}
