//! Intents answered in a single turn from an idle session.

use serde_json::json;

use seatline_core::types::{Identity, Role, TableType};

use super::{ConversationEngine, Reply};
use crate::error::BookingError;
use crate::hours::{format_clock, format_day};
use crate::intent::{allowed, Classification, Intent};
use crate::session::Session;
use crate::slots::{extract_capacity, extract_table_type};

/// Party size assumed when a queue request names none.
const DEFAULT_QUEUE_PARTY: u32 = 2;

const CUSTOMER_HELP: &str = "Here's what I can help you with:\n\
    • Check table availability - \"Is a table available for 4?\"\n\
    • Make a reservation - \"Book a table for 4\"\n\
    • Join the queue - \"Add me to the queue\"\n\
    • Check queue position - \"What's my queue position?\"\n\
    • View reservations - \"Show my reservations\"\n\
    • Cancel reservation - \"Cancel my reservation\"";

const STAFF_HELP: &str = "Manager commands:\n\
    • Check tables - \"Show available tables\"\n\
    • View stats - \"Show today's stats\"\n\
    • View reservations - \"Show all reservations\"";

impl ConversationEngine {
    pub(super) fn idle(
        &self,
        caller: Identity,
        text: &str,
        classification: Classification,
        session: &mut Session,
    ) -> Result<Reply, BookingError> {
        let intent = classification.intent;
        if intent != Intent::Unknown && !allowed(caller.role, intent) {
            return Ok(
                Reply::new("Sorry, you don't have permission to perform this action.")
                    .intent(Some(intent))
                    .failed(),
            );
        }

        let reply = match intent {
            Intent::MakeReservation | Intent::CheckTable => {
                self.start_booking(intent, text, session)?
            }
            Intent::Greeting => Reply::new("Hello! Welcome to our restaurant. How can I help you today?")
                .quick(["Check tables", "Make reservation", "Join queue", "Help"]),
            Intent::Help => {
                let text = if caller.role == Role::Customer {
                    CUSTOMER_HELP
                } else {
                    STAFF_HELP
                };
                Reply::new(text).quick(["Check tables", "Make reservation", "View reservations"])
            }
            Intent::QueuePosition => self.queue_position(caller)?,
            Intent::JoinQueue => self.join_queue(caller, text)?,
            Intent::LeaveQueue => self.leave_queue(caller)?,
            Intent::ViewReservation => self.view_reservations(caller)?,
            Intent::CancelReservation => self.cancel_reservation(caller)?,
            Intent::ManagerStats => self.manager_stats()?,
            Intent::Confirm => Reply::new(
                "There's nothing to confirm right now. Would you like to:\n\
                 • Make a reservation\n\
                 • Check available tables\n\
                 • Join the queue",
            )
            .quick(["Make reservation", "Check tables", "Join queue"]),
            Intent::Cancel => Reply::new("There's nothing to cancel. How can I help you?")
                .quick(["Check tables", "Make reservation", "Help"]),
            Intent::Unknown => Reply::new(
                "I'm not sure what you mean. Try saying:\n\
                 • \"Book a table for 4\"\n\
                 • \"Check available tables\"\n\
                 • \"Join the queue\"\n\
                 • \"Help\" for more options",
            )
            .quick(["Check tables", "Make reservation", "Help"]),
        };

        Ok(Reply {
            intent: Some(intent),
            confidence: classification.confidence,
            ..reply
        })
    }

    fn queue_position(&self, caller: Identity) -> Result<Reply, BookingError> {
        Ok(match self.queue.position(caller.user_id)? {
            Some(standing) => Reply::new(format!(
                "You're #{} in the queue ({} total waiting).\nEstimated wait: ~{} minutes. Party size: {}.",
                standing.position,
                standing.total_waiting,
                standing.estimated_wait_minutes,
                standing.entry.party_size
            ))
            .quick(["Leave queue", "Check tables"])
            .data(&standing),
            None => Reply::new("You're not currently in the queue. Would you like to join?")
                .quick(["Join queue", "Check tables"]),
        })
    }

    fn join_queue(&self, caller: Identity, text: &str) -> Result<Reply, BookingError> {
        let party_size = extract_capacity(text).unwrap_or(DEFAULT_QUEUE_PARTY);
        let table_type = extract_table_type(text).unwrap_or(TableType::Regular);

        match self.queue.join(caller, party_size, table_type) {
            Ok(standing) => Ok(Reply::new(format!(
                "You've been added to the queue!\nPosition: #{}\nParty size: {}\nEstimated wait: ~{} minutes",
                standing.position, party_size, standing.estimated_wait_minutes
            ))
            .quick(["Queue position", "Leave queue"])
            .data(&standing)),
            Err(BookingError::AlreadyQueued) => Ok(Reply::new(
                "You're already in the queue! Say \"What's my queue position?\" to check your status.",
            )
            .quick(["Queue position", "Leave queue"])),
            Err(e) if e.is_rejection() => Ok(Reply::new(format!("Sorry, {}.", e))
                .quick(["Check tables", "Help"])
                .failed()),
            Err(e) => Err(e),
        }
    }

    fn leave_queue(&self, caller: Identity) -> Result<Reply, BookingError> {
        match self.queue.leave(caller) {
            Ok(_) => Ok(
                Reply::new("You've been removed from the queue. Hope to see you again!")
                    .quick(["Check tables", "Make reservation"]),
            ),
            Err(BookingError::NotQueued) => Ok(Reply::new("You're not currently in the queue.")
                .quick(["Join queue", "Check tables"])),
            Err(e) => Err(e),
        }
    }

    fn view_reservations(&self, caller: Identity) -> Result<Reply, BookingError> {
        let slots = self.desk.list_for(caller)?;
        if slots.is_empty() {
            return Ok(
                Reply::new("You don't have any active reservations. Would you like to make one?")
                    .quick(["Make reservation", "Check tables"]),
            );
        }

        let lines: Vec<String> = slots
            .iter()
            .map(|s| {
                format!(
                    "• Table #{} on {} at {}",
                    s.table_number,
                    format_day(s.start.date()),
                    format_clock(s.start.time())
                )
            })
            .collect();
        Ok(Reply::new(format!("Your reservations:\n{}", lines.join("\n")))
            .quick(["Cancel reservation", "Make another"])
            .data(&slots))
    }

    fn cancel_reservation(&self, caller: Identity) -> Result<Reply, BookingError> {
        let reply = match self.desk.cancel_first_for(caller) {
            Ok(Some(slot)) => Reply::new(format!(
                "Your reservation for Table #{} has been cancelled.",
                slot.table_number
            ))
            .data(&slot),
            Ok(None) => Reply::new("You don't have any reservations to cancel."),
            Err(e) if e.is_rejection() => Reply::new(format!("Sorry, {}.", e)).failed(),
            Err(e) => return Err(e),
        };
        Ok(reply.quick(["Make reservation", "Check tables"]))
    }

    fn manager_stats(&self) -> Result<Reply, BookingError> {
        let counts = self.stores.tables.counts()?;
        let waiting = self.queue.list()?.len();
        Ok(Reply::new(format!(
            "Current Status:\n• Tables: {} available, {} occupied, {} reserved ({} total)\n• Queue: {} parties waiting",
            counts.available, counts.occupied, counts.reserved, counts.total, waiting
        ))
        .data(&json!({ "tables": counts, "queue": { "waiting": waiting } })))
    }
}
