//! Per-user dialogue sessions with an inactivity TTL.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use seatline_core::error::{Result, SeatlineError};
use seatline_core::types::{Table, TableType, UserId};

use crate::intent::Intent;

/// Where a user is in the reservation dialogue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    #[default]
    Idle,
    AwaitingCapacity,
    AwaitingTableSelection,
    AwaitingDate,
    AwaitingTime,
    AwaitingConfirmation,
}

impl Step {
    /// Guidance repeated whenever input for this step cannot be used.
    pub fn help(&self) -> &'static str {
        match self {
            Step::AwaitingCapacity => {
                "Please enter the number of people (1-20), or type \"cancel\" to stop."
            }
            Step::AwaitingTableSelection => {
                "Please select a table number from the list, or type \"cancel\" to stop."
            }
            Step::AwaitingDate => {
                "Please specify a date like \"today\", \"tomorrow\", or \"Friday\", or type \"cancel\" to stop."
            }
            Step::AwaitingTime => {
                "Please select a time slot from the options, or type \"cancel\" to stop."
            }
            Step::AwaitingConfirmation => "Please say \"yes\" to confirm or \"no\" to cancel.",
            Step::Idle => "Type \"help\" for available commands or \"cancel\" to start over.",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Idle => "IDLE",
            Step::AwaitingCapacity => "AWAITING_CAPACITY",
            Step::AwaitingTableSelection => "AWAITING_TABLE_SELECTION",
            Step::AwaitingDate => "AWAITING_DATE",
            Step::AwaitingTime => "AWAITING_TIME",
            Step::AwaitingConfirmation => "AWAITING_CONFIRMATION",
        };
        f.write_str(name)
    }
}

/// Dialogue state for one user.
#[derive(Debug, Clone)]
pub struct Session {
    pub step: Step,
    /// Intent that started the active flow.
    pub current_intent: Option<Intent>,
    pub capacity: Option<u32>,
    pub table_type: Option<TableType>,
    /// Tables offered to the user, smallest capacity first.
    pub available_tables: Vec<Table>,
    pub selected_table: Option<Table>,
    pub reservation_date: Option<NaiveDate>,
    pub reservation_time: Option<NaiveTime>,
    pub last_updated: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            step: Step::Idle,
            current_intent: None,
            capacity: None,
            table_type: None,
            available_tables: Vec::new(),
            selected_table: None,
            reservation_date: None,
            reservation_time: None,
            last_updated: Instant::now(),
        }
    }
}

impl Session {
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_updated) >= ttl
    }

    /// Combined reservation target, once both date and time are known.
    pub fn reservation_start(&self) -> Option<NaiveDateTime> {
        Some(self.reservation_date?.and_time(self.reservation_time?))
    }

    /// Offered table with the given printed number.
    pub fn offered(&self, number: u32) -> Option<&Table> {
        self.available_tables.iter().find(|t| t.number == number)
    }

    /// Names of the slots still missing before a reservation can be written.
    pub fn missing_slots(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.selected_table.is_none() {
            missing.push("table selection");
        }
        if self.reservation_date.is_none() {
            missing.push("date");
        }
        if self.reservation_time.is_none() {
            missing.push("time");
        }
        missing
    }
}

/// Storage for dialogue sessions, keyed by user.
///
/// `get` never fails for a missing or stale session: it hands back a fresh
/// idle one instead.
pub trait SessionStore: Send + Sync {
    fn get(&self, user: UserId) -> Result<Session>;

    /// Stores the session and refreshes its `last_updated`.
    fn put(&self, user: UserId, session: Session) -> Result<()>;

    fn delete(&self, user: UserId) -> Result<()>;

    /// Drops every expired session; returns how many were removed.
    fn sweep_expired(&self) -> Result<usize>;
}

/// Process-local session map with lazy expiry.
pub struct InMemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<UserId, Session>>> {
        self.sessions
            .lock()
            .map_err(|e| SeatlineError::Storage(format!("Session mutex poisoned: {}", e)))
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, user: UserId) -> Result<Session> {
        let mut sessions = self.lock()?;
        let now = Instant::now();
        match sessions.get(&user) {
            Some(session) if !session.is_expired(self.ttl, now) => Ok(session.clone()),
            _ => {
                let fresh = Session::default();
                sessions.insert(user, fresh.clone());
                Ok(fresh)
            }
        }
    }

    fn put(&self, user: UserId, mut session: Session) -> Result<()> {
        session.last_updated = Instant::now();
        self.lock()?.insert(user, session);
        Ok(())
    }

    fn delete(&self, user: UserId) -> Result<()> {
        self.lock()?.remove(&user);
        Ok(())
    }

    fn sweep_expired(&self) -> Result<usize> {
        let mut sessions = self.lock()?;
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.ttl, now));
        Ok(before - sessions.len())
    }
}
