//! OpenAPI document for the admin API.

use utoipa::OpenApi;

use crate::api::dto::{
    AdminLogResponse, CalendarEntryDto, CalendarResponse, CreatePostRequest,
    DuplicateCheckRequest, DuplicateCheckResponse, EffectiveSettingsDto, EstimateDto,
    PaginationMeta, PostDto, PostListResponse, QueueResponse, RenumberResponse,
    SchedulePostRequest, SettingChangeDto, SettingChangesResponse, SettingsResponse,
    StatsResponse, TargetDto, TickFailureDto, TickPublishedDto, TickResponse,
    TickUnrecordedDto,
    UpdateChannelRequest, UpdatePricesRequest, UpdateScheduleRequest, UpdateThresholdRequest,
};
use crate::api::handlers::{admin, posts, queue, settings, system};
use crate::domain::{
    ChannelRef, Lane, Payment, PaymentStatus, PaymentType, PostContent, PostId, PostStatus,
};
use crate::error::{ErrorBody, ErrorResponse};
use crate::persistence::{AdminLogEntry, StatusCounts};
use crate::settings::SettingEntry;

/// Generated OpenAPI specification, served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "post-scheduler",
        description = "Admin API of the advertising channel publication engine."
    ),
    paths(
        posts::create_post,
        posts::list_posts,
        posts::get_post,
        posts::queue_post,
        posts::schedule_post,
        posts::update_payment,
        posts::delete_post,
        posts::check_duplicate,
        queue::list_queue,
        queue::calendar,
        queue::renumber,
        settings::get_settings,
        settings::update_schedule,
        settings::update_prices,
        settings::update_channel,
        settings::update_duplicate_threshold,
        admin::admin_logs,
        admin::stats,
        admin::trigger_tick,
        system::health_handler,
    ),
    components(schemas(
        PostId,
        PostStatus,
        Lane,
        ChannelRef,
        Payment,
        PaymentType,
        PaymentStatus,
        PostContent,
        TargetDto,
        CreatePostRequest,
        SchedulePostRequest,
        EstimateDto,
        PostDto,
        PostListResponse,
        PaginationMeta,
        DuplicateCheckRequest,
        DuplicateCheckResponse,
        QueueResponse,
        CalendarEntryDto,
        CalendarResponse,
        RenumberResponse,
        SettingEntry,
        EffectiveSettingsDto,
        SettingsResponse,
        UpdateScheduleRequest,
        UpdatePricesRequest,
        UpdateChannelRequest,
        UpdateThresholdRequest,
        SettingChangeDto,
        SettingChangesResponse,
        AdminLogEntry,
        AdminLogResponse,
        StatusCounts,
        StatsResponse,
        TickPublishedDto,
        TickFailureDto,
        TickUnrecordedDto,
        TickResponse,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
    )),
    tags(
        (name = "Posts", description = "Post lifecycle"),
        (name = "Queue", description = "FIFO queue lane"),
        (name = "Settings", description = "Operational settings"),
        (name = "Admin", description = "Audit log, statistics, dispatch"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/posts",
            "/api/v1/posts/{id}",
            "/api/v1/posts/{id}/schedule",
            "/api/v1/queue/calendar",
            "/api/v1/settings/schedule",
            "/api/v1/dispatch/tick",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
