//! Route handler functions for all API endpoints.
//!
//! Each handler extracts the caller and query/path/body parameters via axum
//! extractors, calls into the booking services on AppState, and returns
//! JSON responses.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

use seatline_booking::{
    HistorySummary, ManagerNotification, NewReservation, QueueStanding, Reply, Seating,
    StatusChange, VacateAlert,
};
use seatline_core::settings::BookingSettings;
use seatline_core::types::{
    HistoryEntry, HistoryFilter, HistoryStatus, QueueEntry, ReservationSlot, Table, TableCounts,
    TableId, TableType, UserId,
};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

/// Longest chat message accepted.
const MAX_MESSAGE_CHARS: usize = 1000;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationParams {
    pub unread: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub customer: Option<i64>,
    pub status: Option<String>,
    pub table_id: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct JoinQueueRequest {
    pub party_size: u32,
    #[serde(default)]
    pub table_type: Option<TableType>,
}

#[derive(Debug, Deserialize)]
pub struct SeatFromQueueRequest {
    pub customer_id: i64,
    pub table_id: i64,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<ManagerNotification>,
    pub unread_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReservationsResponse {
    pub reservations: Vec<ReservationSlot>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TablesResponse {
    pub tables: Vec<Table>,
    pub counts: TableCounts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueuePositionResponse {
    pub in_queue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standing: Option<QueueStanding>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueListResponse {
    pub entries: Vec<QueueEntry>,
    pub total_waiting: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub tables: TableCounts,
    pub armed_alerts: usize,
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat/message - one conversational turn.
pub async fn chat_message(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<ChatMessageRequest>,
) -> Result<Json<Reply>, ApiError> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let reply = state
        .engine
        .handle_message(caller.identity(), message)
        .await?;
    debug!(user_id = %caller.user_id(), step = %reply.session_step, "chat turn");
    Ok(Json(reply))
}

/// POST /chat/clear-session - reset the caller's dialogue.
pub async fn clear_session(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.engine.clear_session(caller.user_id())?;
    Ok(SuccessResponse::ok("Session cleared"))
}

// =============================================================================
// Notifications (staff)
// =============================================================================

/// GET /notifications?unread=true
pub async fn list_notifications(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<NotificationParams>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    caller.require_staff()?;
    let notifications = state.scheduler.list(params.unread.unwrap_or(false))?;
    let unread_count = state.scheduler.unread_count()?;
    Ok(Json(NotificationsResponse {
        notifications,
        unread_count,
    }))
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    caller.require_staff()?;
    Ok(Json(UnreadCountResponse {
        count: state.scheduler.unread_count()?,
    }))
}

/// PATCH /notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<u64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    caller.require_staff()?;
    if !state.scheduler.mark_read(id)? {
        return Err(ApiError::NotFound(format!("Notification {} not found", id)));
    }
    Ok(SuccessResponse::ok("Notification marked as read"))
}

/// PATCH /notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<SuccessResponse>, ApiError> {
    caller.require_staff()?;
    state.scheduler.mark_all_read()?;
    Ok(SuccessResponse::ok("All notifications marked as read"))
}

/// GET /notifications/nearing-vacate - occupied tables about to free up.
pub async fn nearing_vacate(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<VacateAlert>>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.scheduler.nearing_vacate()?))
}

/// GET /notifications/stream - SSE stream of fired notifications.
pub async fn notification_stream(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    caller.require_staff()?;
    let rx = state.scheduler.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(notification) => {
            let data = serde_json::to_string(&notification).unwrap_or_default();
            Some(Ok(Event::default().event("notification").data(data)))
        }
        Err(_) => None,
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

// =============================================================================
// Reservations
// =============================================================================

fn reservations(reservations: Vec<ReservationSlot>) -> Json<ReservationsResponse> {
    let count = reservations.len();
    Json(ReservationsResponse {
        reservations,
        count,
    })
}

/// GET /reservations - every active reservation (staff).
pub async fn list_reservations(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ReservationsResponse>, ApiError> {
    Ok(reservations(state.engine.desk().list_all(caller.identity())?))
}

/// GET /reservations/mine
pub async fn my_reservations(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ReservationsResponse>, ApiError> {
    Ok(reservations(state.engine.desk().list_for(caller.identity())?))
}

/// POST /reservations
pub async fn create_reservation(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<NewReservation>,
) -> Result<(StatusCode, Json<ReservationSlot>), ApiError> {
    let slot = state.engine.desk().create(caller.identity(), request)?;
    Ok((StatusCode::CREATED, Json(slot)))
}

/// DELETE /reservations/{table_id}
pub async fn cancel_reservation(
    State(state): State<AppState>,
    caller: Caller,
    Path(table_id): Path<i64>,
) -> Result<Json<ReservationSlot>, ApiError> {
    let slot = state
        .engine
        .desk()
        .cancel(caller.identity(), TableId(table_id))?;
    Ok(Json(slot))
}

/// POST /reservations/{table_id}/seat
pub async fn seat_reservation(
    State(state): State<AppState>,
    caller: Caller,
    Path(table_id): Path<i64>,
) -> Result<Json<Seating>, ApiError> {
    let seating = state
        .engine
        .desk()
        .seat(caller.identity(), TableId(table_id))?;
    Ok(Json(seating))
}

/// POST /reservations/{table_id}/complete
pub async fn complete_reservation(
    State(state): State<AppState>,
    caller: Caller,
    Path(table_id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .engine
        .desk()
        .complete(caller.identity(), TableId(table_id))?;
    Ok(SuccessResponse::ok("Reservation completed"))
}

/// GET /reservations/history - customers only ever see their own.
pub async fn reservation_history(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<HistoryStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let filter = HistoryFilter {
        customer: params.customer.map(UserId),
        status,
        table_id: params.table_id.map(TableId),
        limit: Some(params.limit.unwrap_or(50).clamp(1, 500)),
        offset: params.offset,
    };

    let entries = state.engine.desk().history(caller.identity(), filter)?;
    let count = entries.len();
    Ok(Json(HistoryResponse { entries, count }))
}

/// GET /reservations/history/summary (staff)
pub async fn history_summary(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<HistorySummary>, ApiError> {
    Ok(Json(state.engine.desk().history_summary(caller.identity())?))
}

// =============================================================================
// Tables
// =============================================================================

/// GET /tables
pub async fn list_tables(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<TablesResponse>, ApiError> {
    let tables = state.floor.list()?;
    let counts = TableCounts::tally(&tables);
    Ok(Json(TablesResponse { tables, counts }))
}

/// PUT /tables/{id}/status (staff)
pub async fn update_table_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Table>, ApiError> {
    let table = state
        .floor
        .update_status(caller.identity(), TableId(id), change)?;
    Ok(Json(table))
}

// =============================================================================
// Queue
// =============================================================================

/// POST /queue/join
pub async fn join_queue(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<JoinQueueRequest>,
) -> Result<(StatusCode, Json<QueueStanding>), ApiError> {
    let standing = state.engine.queue().join(
        caller.identity(),
        body.party_size,
        body.table_type.unwrap_or(TableType::Regular),
    )?;
    Ok((StatusCode::CREATED, Json(standing)))
}

/// POST /queue/leave
pub async fn leave_queue(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.engine.queue().leave(caller.identity())?;
    Ok(SuccessResponse::ok("Left the queue"))
}

/// GET /queue/position
pub async fn queue_position(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<QueuePositionResponse>, ApiError> {
    let standing = state.engine.queue().position(caller.user_id())?;
    Ok(Json(QueuePositionResponse {
        in_queue: standing.is_some(),
        standing,
    }))
}

/// GET /queue (staff)
pub async fn list_queue(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<QueueListResponse>, ApiError> {
    caller.require_staff()?;
    let entries = state.engine.queue().list()?;
    let total_waiting = entries.len();
    Ok(Json(QueueListResponse {
        entries,
        total_waiting,
    }))
}

/// POST /queue/seat (staff)
pub async fn seat_from_queue(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<SeatFromQueueRequest>,
) -> Result<Json<Seating>, ApiError> {
    let seating = state.engine.queue().seat_from_queue(
        caller.identity(),
        UserId(body.customer_id),
        TableId(body.table_id),
    )?;
    Ok(Json(seating))
}

// =============================================================================
// Settings and health
// =============================================================================

/// GET /settings/booking - effective booking settings.
pub async fn booking_settings(
    State(state): State<AppState>,
    _caller: Caller,
) -> Json<BookingSettings> {
    Json(state.stores.booking_settings())
}

/// GET /health - liveness plus a floor summary. No auth.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let tables = state.stores.tables.counts()?;
    let armed_alerts = state.scheduler.armed_count()?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        tables,
        armed_alerts,
    }))
}
