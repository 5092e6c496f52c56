//! Application state shared across all route handlers.
//!
//! AppState holds the booking services and shared resources. It is passed
//! to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use seatline_booking::{
    ConversationEngine, FloorService, KeywordClassifier, SessionStore, Stores, VacateScheduler,
};
use seatline_core::config::SeatlineConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (read-only after startup).
    pub config: Arc<SeatlineConfig>,
    /// Table, queue, history, user and settings stores.
    pub stores: Stores,
    /// Conversation engine; also owns the reservation desk and wait queue.
    pub engine: Arc<ConversationEngine>,
    /// Manual table status changes.
    pub floor: Arc<FloorService>,
    /// Vacate alerts and the manager notification feed.
    pub scheduler: Arc<VacateScheduler>,
    /// Bearer token required on protected routes.
    pub api_token: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the booking services over the given stores.
    pub fn new(
        config: SeatlineConfig,
        stores: Stores,
        sessions: Arc<dyn SessionStore>,
        scheduler: Arc<VacateScheduler>,
        api_token: String,
    ) -> Self {
        let engine = ConversationEngine::new(
            stores.clone(),
            sessions,
            Arc::new(KeywordClassifier::new()),
            scheduler.clone(),
        );
        Self {
            config: Arc::new(config),
            floor: Arc::new(FloorService::new(stores.clone(), scheduler.clone())),
            engine: Arc::new(engine),
            stores,
            scheduler,
            api_token,
            start_time: Instant::now(),
        }
    }
}
