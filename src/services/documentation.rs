use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the karaoke host.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::api::post_action,
        crate::routes::api::signature,
        crate::routes::api::session,
        crate::routes::api::rescan,
        crate::routes::api::shutdown,
        crate::routes::settings::get_settings,
        crate::routes::settings::update_settings,
        crate::routes::websocket::karaoke_ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::action::ActionRequest,
            crate::dto::action::ActionResponse,
            crate::dto::action::AckResponse,
            crate::dto::events::ServerMessage,
            crate::dto::events::ClientMessage,
            crate::dto::session::SessionResponse,
            crate::dto::session::RescanResponse,
            crate::config::Settings,
            crate::config::SettingsUpdate,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "karaoke", description = "Actions and session state"),
        (name = "library", description = "Song library maintenance"),
        (name = "settings", description = "Persisted settings"),
        (name = "display", description = "WebSocket of the karaoke display server"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_action_route() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/action"));
        assert!(doc.paths.paths.contains_key("/settings"));
    }
}
