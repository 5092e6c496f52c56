//! Conversational booking assistant.
//!
//! One turn takes a verified caller and a line of text, reads that user's
//! session, runs either the active dialogue step or an idle intent, and
//! writes the session back. Turns for the same user are serialized; turns
//! for different users run independently. A store failure aborts the turn
//! before the session is written, so the user can simply retry.

mod flow;
mod idle;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use seatline_core::error::SeatlineError;
use seatline_core::types::{Identity, UserId};

use crate::error::BookingError;
use crate::intent::{Classifier, Intent};
use crate::queue::WaitQueue;
use crate::reservations::ReservationDesk;
use crate::scheduler::VacateScheduler;
use crate::session::{Session, SessionStore, Step};
use crate::slots::is_global_cancel;
use crate::Stores;

/// One assistant response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub response: String,
    pub intent: Option<Intent>,
    pub confidence: u32,
    pub quick_replies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub session_step: Step,
    pub success: bool,
}

impl Reply {
    pub(crate) fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            intent: None,
            confidence: 0,
            quick_replies: Vec::new(),
            data: None,
            session_step: Step::Idle,
            success: true,
        }
    }

    pub(crate) fn intent(mut self, intent: Option<Intent>) -> Self {
        self.intent = intent;
        self
    }

    pub(crate) fn quick<S: Into<String>>(mut self, replies: impl IntoIterator<Item = S>) -> Self {
        self.quick_replies = replies.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn data<T: Serialize>(mut self, value: &T) -> Self {
        self.data = serde_json::to_value(value).ok();
        self
    }

    pub(crate) fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

pub struct ConversationEngine {
    stores: Stores,
    sessions: Arc<dyn SessionStore>,
    classifier: Arc<dyn Classifier>,
    scheduler: Arc<VacateScheduler>,
    desk: ReservationDesk,
    queue: WaitQueue,
    turns: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationEngine {
    pub fn new(
        stores: Stores,
        sessions: Arc<dyn SessionStore>,
        classifier: Arc<dyn Classifier>,
        scheduler: Arc<VacateScheduler>,
    ) -> Self {
        Self {
            desk: ReservationDesk::new(stores.clone(), scheduler.clone()),
            queue: WaitQueue::new(stores.clone(), scheduler.clone()),
            stores,
            sessions,
            classifier,
            scheduler,
            turns: Mutex::new(HashMap::new()),
        }
    }

    pub async fn handle_message(&self, caller: Identity, text: &str) -> Result<Reply, BookingError> {
        self.handle_message_at(caller, text, Local::now().naive_local())
            .await
    }

    /// Runs one conversational turn with `now` as the restaurant's wall clock.
    pub async fn handle_message_at(
        &self,
        caller: Identity,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<Reply, BookingError> {
        let turn = self.turn_lock(caller.user_id)?;
        let _guard = turn.lock().await;

        let text = text.trim();
        let mut session = self.sessions.get(caller.user_id)?;
        let classification = self.classifier.classify(text, &session);
        debug!(
            user_id = %caller.user_id,
            step = %session.step,
            intent = %classification.intent,
            confidence = classification.confidence,
            "Conversation turn"
        );

        let confidence = classification.confidence;
        let step_turn = session.step != Step::Idle;
        let reply = if step_turn && is_global_cancel(text) {
            session = Session::default();
            Reply::new("Process cancelled. How can I help you now?")
                .intent(Some(Intent::Cancel))
                .quick(["Check tables", "Make reservation", "Join queue", "Help"])
        } else {
            match session.step {
                Step::Idle => self.idle(caller, text, classification, &mut session)?,
                Step::AwaitingCapacity => self.on_capacity(text, &mut session)?,
                Step::AwaitingTableSelection => self.on_table(text, &mut session),
                Step::AwaitingDate => self.on_date(text, now, &mut session),
                Step::AwaitingTime => self.on_time(text, now, &mut session),
                Step::AwaitingConfirmation => {
                    self.on_confirmation(caller, classification.intent, now, &mut session)?
                }
            }
        };

        let step = session.step;
        if step == Step::Idle {
            self.sessions.delete(caller.user_id)?;
        } else {
            self.sessions.put(caller.user_id, session)?;
        }
        // Step turns report the flow intent with this turn's score.
        let confidence = if step_turn { confidence } else { reply.confidence };
        Ok(Reply {
            session_step: step,
            confidence,
            ..reply
        })
    }

    /// Drops the user's dialogue state.
    pub fn clear_session(&self, user: UserId) -> Result<(), BookingError> {
        Ok(self.sessions.delete(user)?)
    }

    /// Drops expired sessions and idle per-user turn locks.
    pub fn sweep_sessions(&self) -> Result<usize, BookingError> {
        let removed = self.sessions.sweep_expired()?;
        if let Ok(mut turns) = self.turns.lock() {
            turns.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Ok(removed)
    }

    /// Sweeps expired sessions every `interval` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.sweep_sessions() {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "Swept expired sessions"),
                    Err(e) => warn!("Session sweep failed: {}", e),
                }
            }
        })
    }

    pub fn desk(&self) -> &ReservationDesk {
        &self.desk
    }

    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }

    fn turn_lock(&self, user: UserId) -> Result<Arc<tokio::sync::Mutex<()>>, BookingError> {
        let mut turns = self.turns.lock().map_err(|e| {
            SeatlineError::Storage(format!("Conversation lock map poisoned: {}", e))
        })?;
        Ok(turns.entry(user).or_default().clone())
    }
}
