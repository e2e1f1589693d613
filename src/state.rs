use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::accounts::repo::{AccountRepository, PgAccountRepository};
use crate::auth::{
    jwt::JwtKeys,
    tokens::{PgTokenStore, TokenIssuer},
};
use crate::config::AppConfig;
use crate::media::{MediaLibrary, PgMediaRepository};
use crate::storage::{Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountRepository>,
    pub tokens: TokenIssuer,
    pub media: MediaLibrary,
}

impl AppState {
    /// Connects Postgres and the object store from `config`. Returns the pool
    /// too so the caller can run migrations on it.
    pub async fn init(config: &AppConfig) -> anyhow::Result<(Self, PgPool)> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;

        let state = Self::from_parts(
            Arc::new(PgAccountRepository::new(db.clone())),
            TokenIssuer::new(
                JwtKeys::from_config(&config.jwt),
                Arc::new(PgTokenStore::new(db.clone())),
            ),
            MediaLibrary::new(
                Arc::new(PgMediaRepository::new(db.clone())),
                storage,
                config.storage.url_ttl_secs,
            ),
        );
        Ok((state, db))
    }

    pub fn from_parts(
        accounts: Arc<dyn AccountRepository>,
        tokens: TokenIssuer,
        media: MediaLibrary,
    ) -> Self {
        Self {
            accounts,
            tokens,
            media,
        }
    }

    /// In-memory stores only; nothing touches the network.
    #[cfg(test)]
    pub fn fake() -> Self {
        crate::fakes::harness().0
    }
}
