use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::jwt::JwtKeys;

/// Record of a token that has been handed out and not yet revoked.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn record(&self, token: &IssuedToken) -> anyhow::Result<()>;
    async fn is_active(&self, token_id: Uuid, account_id: Uuid) -> anyhow::Result<bool>;
    /// Returns false when the token was already gone.
    async fn revoke(&self, token_id: Uuid) -> anyhow::Result<bool>;
    async fn revoke_all(&self, account_id: Uuid) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgTokenStore {
    db: PgPool,
}

impl PgTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn record(&self, token: &IssuedToken) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (id, account_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token.id)
        .bind(token.account_id)
        .bind(token.expires_at)
        .execute(&self.db)
        .await
        .context("insert access token")?;
        Ok(())
    }

    async fn is_active(&self, token_id: Uuid, account_id: Uuid) -> anyhow::Result<bool> {
        let active: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM access_tokens
                 WHERE id = $1 AND account_id = $2 AND expires_at > now()
            )
            "#,
        )
        .bind(token_id)
        .bind(account_id)
        .fetch_one(&self.db)
        .await
        .context("lookup access token")?;
        Ok(active)
    }

    async fn revoke(&self, token_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM access_tokens WHERE id = $1")
            .bind(token_id)
            .execute(&self.db)
            .await
            .context("revoke access token")?;
        Ok(res.rows_affected() > 0)
    }

    async fn revoke_all(&self, account_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM access_tokens WHERE account_id = $1")
            .bind(account_id)
            .execute(&self.db)
            .await
            .context("revoke account tokens")?;
        Ok(res.rows_affected())
    }
}

/// A token that verified and is still on record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedToken {
    pub token_id: Uuid,
    pub account_id: Uuid,
}

/// Mints signed bearer tokens and tracks which of them are still valid.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: JwtKeys,
    store: Arc<dyn TokenStore>,
}

impl TokenIssuer {
    pub fn new(keys: JwtKeys, store: Arc<dyn TokenStore>) -> Self {
        Self { keys, store }
    }

    pub async fn issue(&self, account_id: Uuid) -> anyhow::Result<String> {
        let (token, claims) = self.keys.sign(account_id)?;
        self.store
            .record(&IssuedToken {
                id: claims.jti,
                account_id,
                expires_at: claims.expires_at(),
            })
            .await?;
        info!(%account_id, token_id = %claims.jti, "token issued");
        Ok(token)
    }

    /// `Ok(None)` for anything that should be treated as unauthenticated.
    pub async fn resolve(&self, token: &str) -> anyhow::Result<Option<ResolvedToken>> {
        let claims = match self.keys.verify(token) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "token failed verification");
                return Ok(None);
            }
        };
        if !self.store.is_active(claims.jti, claims.sub).await? {
            debug!(token_id = %claims.jti, "token revoked or expired");
            return Ok(None);
        }
        Ok(Some(ResolvedToken {
            token_id: claims.jti,
            account_id: claims.sub,
        }))
    }

    pub async fn revoke(&self, token_id: Uuid) -> anyhow::Result<bool> {
        self.store.revoke(token_id).await
    }

    pub async fn revoke_all(&self, account_id: Uuid) -> anyhow::Result<u64> {
        self.store.revoke_all(account_id).await
    }
}
