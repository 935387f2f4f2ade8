//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints are mounted under `/api/v1`; `/health` stays at the root.
//! With the `swagger-ui` feature the OpenAPI document is served at
//! `/api-docs/openapi.json` and browsable at `/swagger-ui`.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

pub use openapi::ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    };

    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::FixedOffset;
    use tower::ServiceExt;

    use super::*;
    use crate::channel::LogChannelSender;
    use crate::domain::EventBus;
    use crate::persistence::{MemoryAdminLog, MemoryPostRepository};
    use crate::service::{Dispatcher, DispatcherConfig, PostService};
    use crate::settings::{MemorySettings, Settings};

    fn app() -> Router {
        let utc_offset = FixedOffset::east_opt(0).unwrap_or_else(|| panic!("offset"));
        let service = PostService::new(
            Arc::new(MemoryPostRepository::new()),
            Arc::new(MemoryAdminLog::new()),
            Settings::new(Arc::new(MemorySettings::new())),
            EventBus::new(8),
            utc_offset,
        );
        let dispatcher = Dispatcher::new(
            service.clone(),
            Arc::new(LogChannelSender::default()),
            DispatcherConfig {
                send_timeout: Duration::from_secs(1),
                slot_catch_up_minutes: 0,
                utc_offset,
            },
        );
        build_router().with_state(AppState {
            post_service: Arc::new(service),
            dispatcher: Arc::new(dispatcher),
        })
    }

    async fn call(method: &str, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let Ok(request) = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
        else {
            panic!("bad request");
        };
        let Ok(response) = app().oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        (
            status,
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null),
        )
    }

    #[tokio::test]
    async fn unknown_post_maps_to_not_found_body() {
        let (status, body) = call("GET", "/api/v1/posts/99", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 2001);
    }

    #[tokio::test]
    async fn scheduled_target_without_time_is_bad_request() {
        let (status, body) = call(
            "POST",
            "/api/v1/posts",
            r#"{"owner_id": 1, "content": {"product_name": "Lamp"}, "target": "scheduled"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 1001);
    }

    #[tokio::test]
    async fn tick_without_channel_reports_skip() {
        let (status, body) = call("POST", "/api/v1/dispatch/tick", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["skipped"], "channel_not_configured");
    }
}
