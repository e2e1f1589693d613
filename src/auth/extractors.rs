use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use crate::{accounts::repo_types::Account, errors::AppError, state::AppState};

/// The caller's account and the id of the token it presented.
#[derive(Debug, Clone)]
pub struct AuthAccount {
    pub account: Account,
    pub token_id: Uuid,
}

fn bearer(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(AppError::Unauthenticated)?;

        let Some(resolved) = state.tokens.resolve(token).await? else {
            warn!("invalid, expired or revoked token");
            return Err(AppError::Unauthenticated);
        };

        // token outlived its account
        let Some(account) = state.accounts.find_by_id(resolved.account_id).await? else {
            warn!(account_id = %resolved.account_id, "token for missing account");
            return Err(AppError::Unauthenticated);
        };

        Ok(AuthAccount {
            account,
            token_id: resolved.token_id,
        })
    }
}
