//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::{Dispatcher, PostService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Post service for all business logic.
    pub post_service: Arc<PostService>,
    /// Dispatcher behind the manual tick endpoint.
    pub dispatcher: Arc<Dispatcher>,
}
