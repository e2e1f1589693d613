use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One stored file attached to an account collection.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MediaItem {
    pub id: Uuid,
    pub account_id: Uuid,
    pub collection: String,
    pub object_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn insert(&self, item: &MediaItem) -> anyhow::Result<()>;
    /// Oldest first.
    async fn list(&self, account_id: Uuid, collection: &str) -> anyhow::Result<Vec<MediaItem>>;
    /// Removes every row of the collection and returns what was removed.
    async fn remove_all(&self, account_id: Uuid, collection: &str)
        -> anyhow::Result<Vec<MediaItem>>;
}

#[derive(Clone)]
pub struct PgMediaRepository {
    db: PgPool,
}

impl PgMediaRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    async fn insert(&self, item: &MediaItem) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO media (id, account_id, collection, object_key, content_type, size_bytes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(item.account_id)
        .bind(&item.collection)
        .bind(&item.object_key)
        .bind(&item.content_type)
        .bind(item.size_bytes)
        .bind(item.created_at)
        .execute(&self.db)
        .await
        .context("insert media")?;
        Ok(())
    }

    async fn list(&self, account_id: Uuid, collection: &str) -> anyhow::Result<Vec<MediaItem>> {
        let rows = sqlx::query_as::<_, MediaItem>(
            r#"
            SELECT id, account_id, collection, object_key, content_type, size_bytes, created_at
              FROM media
             WHERE account_id = $1 AND collection = $2
             ORDER BY created_at ASC
            "#,
        )
        .bind(account_id)
        .bind(collection)
        .fetch_all(&self.db)
        .await
        .context("list media by collection")?;
        Ok(rows)
    }

    async fn remove_all(
        &self,
        account_id: Uuid,
        collection: &str,
    ) -> anyhow::Result<Vec<MediaItem>> {
        let rows = sqlx::query_as::<_, MediaItem>(
            r#"
            DELETE FROM media
             WHERE account_id = $1 AND collection = $2
            RETURNING id, account_id, collection, object_key, content_type, size_bytes, created_at
            "#,
        )
        .bind(account_id)
        .bind(collection)
        .fetch_all(&self.db)
        .await
        .context("remove media collection")?;
        Ok(rows)
    }
}
