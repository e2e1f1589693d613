use crate::state::AppState;
use axum::Router;

pub mod dto;
mod extractors;
pub mod gender;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;
pub mod view;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::guest_routes())
        .merge(handlers::user_routes())
}
