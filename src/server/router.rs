use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::ServerConfig;
use crate::server::handlers::{flags, health, page, sessions};
use crate::state::AppState;

/// Creates the main application router with all routes and middleware.
///
/// This function sets up:
/// - The chat page and health check
/// - One route per conversation event (start, redisplay, ask, rate, end)
/// - The flagged-question listing for reviewers
/// - CORS and HTTP tracing middleware
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.config.server);
    Router::new()
        .route("/", get(page::index))
        .route("/health", get(health::health))
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/:session_id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/api/sessions/:session_id/messages",
            post(sessions::submit_question),
        )
        .route(
            "/api/sessions/:session_id/ratings",
            post(sessions::submit_rating),
        )
        .route("/api/flags", get(flags::list_flags))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins = if server.cors_allowed_origins.is_empty() {
        default_local_origins(server.port)
    } else {
        server.cors_allowed_origins.clone()
    };

    let allow_origin = AllowOrigin::list(
        origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
            .collect::<Vec<_>>(),
    );

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn default_local_origins(port: u16) -> Vec<String> {
    vec![
        format!("http://localhost:{}", port),
        format!("http://127.0.0.1:{}", port),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_origins_follow_configured_port() {
        assert_eq!(
            default_local_origins(9000),
            vec!["http://localhost:9000", "http://127.0.0.1:9000"]
        );
    }
}
