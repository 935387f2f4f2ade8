//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod posts;
pub mod queue;
pub mod settings;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(posts::routes())
        .merge(queue::routes())
        .merge(settings::routes())
        .merge(admin::routes())
}
