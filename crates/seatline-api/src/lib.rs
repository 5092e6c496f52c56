//! Seatline API crate - axum HTTP server, route handlers, SSE streaming.
//!
//! Exposes the booking engine over REST: chat turns, reservations, the wait
//! queue, table status, the manager notification feed (JSON and SSE) and
//! health checks.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
