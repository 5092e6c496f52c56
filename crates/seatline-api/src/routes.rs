//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use seatline_core::error::{Result, SeatlineError};

use crate::auth::{USER_ID_HEADER, USER_ROLE_HEADER};
use crate::handlers;
use crate::state::AppState;

/// CORS origins: the configured list, or localhost on the API port.
fn allowed_origins(state: &AppState) -> Vec<HeaderValue> {
    let configured = &state.config.api.cors_origins;
    let origins: Vec<String> = if configured.is_empty() {
        let port = state.config.general.port;
        vec![
            format!("http://127.0.0.1:{}", port),
            format!("http://localhost:{}", port),
        ]
    } else {
        configured.clone()
    };

    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(&state)))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ]);

    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        // Chat
        .route(
            "/chat/message",
            post(handlers::chat_message).layer(DefaultBodyLimit::max(16 * 1024)),
        )
        .route("/chat/clear-session", post(handlers::clear_session))
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/unread-count", get(handlers::unread_count))
        .route("/notifications/{id}/read", patch(handlers::mark_read))
        .route("/notifications/read-all", patch(handlers::mark_all_read))
        .route("/notifications/nearing-vacate", get(handlers::nearing_vacate))
        .route("/notifications/stream", get(handlers::notification_stream))
        // Reservations
        .route(
            "/reservations",
            get(handlers::list_reservations).post(handlers::create_reservation),
        )
        .route("/reservations/mine", get(handlers::my_reservations))
        .route("/reservations/history", get(handlers::reservation_history))
        .route(
            "/reservations/history/summary",
            get(handlers::history_summary),
        )
        .route(
            "/reservations/{table_id}",
            delete(handlers::cancel_reservation),
        )
        .route(
            "/reservations/{table_id}/seat",
            post(handlers::seat_reservation),
        )
        .route(
            "/reservations/{table_id}/complete",
            post(handlers::complete_reservation),
        )
        // Tables
        .route("/tables", get(handlers::list_tables))
        .route("/tables/{id}/status", put(handlers::update_table_status))
        // Queue
        .route("/queue", get(handlers::list_queue))
        .route("/queue/join", post(handlers::join_queue))
        .route("/queue/leave", post(handlers::leave_queue))
        .route("/queue/position", get(handlers::queue_position))
        .route("/queue/seat", post(handlers::seat_from_queue))
        // Settings
        .route("/settings/booking", get(handlers::booking_settings))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server and serve until `shutdown` resolves.
///
/// Binds to 127.0.0.1 (localhost only) on the given port.
pub async fn start_server(
    state: AppState,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SeatlineError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SeatlineError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
