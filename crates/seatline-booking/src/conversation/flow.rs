//! The multi-step booking dialogue: capacity, table, date, time, confirmation.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use seatline_core::types::{Identity, Table, TableType};

use super::{ConversationEngine, Reply};
use crate::error::BookingError;
use crate::hours::{format_clock, format_day, has_notice, is_open, TimeSlots};
use crate::intent::Intent;
use crate::reservations::{NewReservation, MAX_PARTY_SIZE, MIN_PARTY_SIZE};
use crate::scheduler::VacateRequest;
use crate::session::{Session, Step};
use crate::slots::{extract_capacity, extract_date, extract_table_number, extract_table_type, extract_time};

/// Tables offered per search.
const OFFERED_TABLES: usize = 5;

const CAPACITY_CHOICES: [&str; 4] = ["2", "4", "6", "Cancel"];
const DATE_CHOICES: [&str; 3] = ["Today", "Tomorrow", "Cancel"];

fn in_range(capacity: u32) -> bool {
    (MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&capacity)
}

fn describe(table: &Table) -> String {
    format!("{}, {} seats", table.table_type, table.capacity)
}

fn table_list(tables: &[Table]) -> String {
    tables
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. Table #{} ({})", i + 1, t.number, describe(t)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn table_choices(tables: &[Table]) -> Vec<String> {
    tables
        .iter()
        .take(3)
        .map(|t| format!("Table {}", t.number))
        .chain(std::iter::once("Cancel".to_string()))
        .collect()
}

fn no_tables(capacity: u32, table_type: Option<TableType>) -> Reply {
    let kind = match table_type {
        Some(t) => format!("{} tables", t),
        None => "tables".to_string(),
    };
    Reply::new(format!(
        "Sorry, no {} available for {} people right now. Would you like to join the waiting queue?",
        kind, capacity
    ))
    .quick(["Join queue", "Try different size", "Cancel"])
}

impl ConversationEngine {
    /// Starts a check-table or make-reservation flow from an idle session.
    pub(super) fn start_booking(
        &self,
        intent: Intent,
        text: &str,
        session: &mut Session,
    ) -> Result<Reply, BookingError> {
        session.current_intent = Some(intent);
        session.table_type = extract_table_type(text);

        match extract_capacity(text) {
            Some(capacity) if in_range(capacity) => {
                let prompt = if intent == Intent::MakeReservation {
                    "Which table would you like to reserve? (Say \"Table 1\" or just the number)"
                } else {
                    "Would you like to reserve one? Just say the table number."
                };
                let lead = if intent == Intent::MakeReservation {
                    ""
                } else {
                    "Great news! "
                };
                self.offer_tables(capacity, lead, prompt, session)
            }
            Some(capacity) => {
                session.step = Step::AwaitingCapacity;
                Ok(Reply::new(format!(
                    "Party size must be between {} and {} people, and {} is outside that range. {}",
                    MIN_PARTY_SIZE,
                    MAX_PARTY_SIZE,
                    capacity,
                    Step::AwaitingCapacity.help()
                ))
                .quick(CAPACITY_CHOICES))
            }
            None => {
                session.step = Step::AwaitingCapacity;
                Ok(Reply::new("How many people will be dining? (1-20)").quick(["2", "4", "6", "8"]))
            }
        }
    }

    pub(super) fn on_capacity(&self, text: &str, session: &mut Session) -> Result<Reply, BookingError> {
        let reply = match extract_capacity(text) {
            Some(capacity) if in_range(capacity) => {
                return self.offer_tables(
                    capacity,
                    "",
                    "Which table would you like? (Say \"Table 1\" or just the number)",
                    session,
                );
            }
            Some(_) => Reply::new(format!(
                "Party size must be between {} and {} people. {}",
                MIN_PARTY_SIZE,
                MAX_PARTY_SIZE,
                session.step.help()
            )),
            None => Reply::new(format!(
                "I didn't catch the party size. {}",
                session.step.help()
            )),
        };
        Ok(reply.intent(session.current_intent).quick(CAPACITY_CHOICES))
    }

    fn offer_tables(
        &self,
        capacity: u32,
        lead: &str,
        prompt: &str,
        session: &mut Session,
    ) -> Result<Reply, BookingError> {
        let intent = session.current_intent;
        let tables = self
            .stores
            .tables
            .find_available(capacity, session.table_type, OFFERED_TABLES)?;

        if tables.is_empty() {
            let reply = no_tables(capacity, session.table_type).intent(intent);
            *session = Session::default();
            return Ok(reply);
        }

        let reply = Reply::new(format!(
            "{}Found {} table(s) for {} people:\n\n{}\n\n{}",
            lead,
            tables.len(),
            capacity,
            table_list(&tables),
            prompt
        ))
        .intent(intent)
        .quick(table_choices(&tables))
        .data(&tables);

        session.capacity = Some(capacity);
        session.available_tables = tables;
        session.step = Step::AwaitingTableSelection;
        Ok(reply)
    }

    pub(super) fn on_table(&self, text: &str, session: &mut Session) -> Reply {
        let intent = session.current_intent;
        let Some(number) = extract_table_number(text) else {
            let offered: Vec<String> = session
                .available_tables
                .iter()
                .map(|t| format!("#{}", t.number))
                .collect();
            return Reply::new(format!(
                "I didn't catch the table number. {}\n\nAvailable tables: {}",
                session.step.help(),
                offered.join(", ")
            ))
            .intent(intent)
            .quick(table_choices(&session.available_tables));
        };

        let Some(table) = session.offered(number).cloned() else {
            let offered: Vec<String> = session
                .available_tables
                .iter()
                .map(|t| t.number.to_string())
                .collect();
            return Reply::new(format!(
                "Table #{} is not in the available list.\n\nPlease choose from these tables: {}\n\nOr type \"cancel\" to start over.",
                number,
                offered.join(", ")
            ))
            .intent(intent)
            .quick(table_choices(&session.available_tables));
        };

        if intent == Some(Intent::MakeReservation) {
            let reply = Reply::new(format!(
                "Table #{} selected ({}).\n\nWhen would you like to reserve? Please specify a date like \"tomorrow\" or \"Friday\".",
                table.number,
                describe(&table)
            ))
            .intent(intent)
            .quick(DATE_CHOICES);
            session.selected_table = Some(table);
            session.step = Step::AwaitingDate;
            reply
        } else {
            *session = Session::default();
            Reply::new(format!(
                "Table #{} is available!\n• Type: {}\n• Capacity: {} seats\n\nWould you like to make a reservation for this table?",
                table.number, table.table_type, table.capacity
            ))
            .intent(intent)
            .quick(["Make reservation", "Check other tables", "Help"])
            .data(&table)
        }
    }

    pub(super) fn on_date(&self, text: &str, now: NaiveDateTime, session: &mut Session) -> Reply {
        let intent = session.current_intent;
        let Some(date) = extract_date(text, now.date()) else {
            return Reply::new(format!(
                "I didn't understand that date. {}",
                session.step.help()
            ))
            .intent(intent)
            .quick(DATE_CHOICES);
        };

        let slots = TimeSlots::for_date(date, now);
        if slots.is_empty() {
            *session = Session::default();
            return Reply::new(format!(
                "Sorry, no available time slots for {}. The restaurant may be closed or fully booked.\n\nWould you like to try a different date?",
                format_day(date)
            ))
            .intent(intent)
            .quick(["Tomorrow", "Make reservation", "Cancel"]);
        }

        session.reservation_date = Some(date);
        session.step = Step::AwaitingTime;
        Reply::new(format!(
            "Date set to {}.\n\nAvailable time slots:\n{}\n\nPlease select a time:",
            format_day(date),
            slots.summary()
        ))
        .intent(intent)
        .quick(slots.quick_replies())
    }

    pub(super) fn on_time(&self, text: &str, now: NaiveDateTime, session: &mut Session) -> Reply {
        let intent = session.current_intent;
        let (Some(date), Some(table)) = (session.reservation_date, session.selected_table.clone())
        else {
            return missing_information(session);
        };
        let choices = TimeSlots::for_date(date, now).quick_replies();

        let Some(time) = extract_time(text) else {
            return Reply::new(format!(
                "I didn't understand that time. {}\n\nPlease select from the available slots:",
                session.step.help()
            ))
            .intent(intent)
            .quick(choices);
        };

        if !is_open(time) {
            return Reply::new(
                "Sorry, we're only open from 10 AM to 10 PM. Please select a time within business hours:",
            )
            .intent(intent)
            .quick(choices);
        }
        if !has_notice(date.and_time(time), now) {
            return Reply::new("That time has already passed or is too soon. Please select a later time:")
                .intent(intent)
                .quick(choices);
        }

        session.reservation_time = Some(time);
        session.step = Step::AwaitingConfirmation;
        let party = session
            .capacity
            .map_or_else(|| "unknown".to_string(), |c| c.to_string());
        Reply::new(format!(
            "Reservation Summary:\n• Table: #{} ({})\n• Date: {}\n• Time: {}\n• Party size: {}\n\nWould you like to confirm this reservation? Say \"yes\" to confirm or \"no\" to cancel.",
            table.number,
            describe(&table),
            format_day(date),
            format_clock(time),
            party
        ))
        .intent(intent)
        .quick(["Yes, confirm", "No, cancel"])
    }

    /// Commits the reservation on CONFIRM; anything else abandons it.
    ///
    /// Rule rejections end the flow with the reason. Store failures
    /// propagate and leave the session as it was.
    pub(super) fn on_confirmation(
        &self,
        caller: Identity,
        intent: Intent,
        now: NaiveDateTime,
        session: &mut Session,
    ) -> Result<Reply, BookingError> {
        let flow = Some(Intent::MakeReservation);
        if intent != Intent::Confirm {
            *session = Session::default();
            return Ok(Reply::new("No problem! Reservation cancelled. How else can I help you?")
                .intent(flow)
                .quick(["Check tables", "Make reservation", "Help"]));
        }

        let (Some(table), Some(start)) = (session.selected_table.clone(), session.reservation_start())
        else {
            return Ok(missing_information(session));
        };
        if start <= now {
            *session = Session::default();
            return Ok(Reply::new(
                "That time has already passed. Please start a new reservation with a future date and time.",
            )
            .intent(flow)
            .quick(["Make reservation", "Help"])
            .failed());
        }

        let party_size = session.capacity.unwrap_or(table.capacity);
        let request = NewReservation {
            table_id: table.id,
            reservation_time: start,
            party_size,
            duration_minutes: None,
        };
        let slot = match self.desk.create_at(caller, request, now) {
            Ok(slot) => slot,
            Err(e) if e.is_rejection() => {
                *session = Session::default();
                return Ok(Reply::new(format!(
                    "Sorry, I couldn't complete that reservation: {}.\n\nWould you like to start over?",
                    e
                ))
                .intent(flow)
                .quick(["Make reservation", "Help"])
                .failed());
            }
            Err(e) => return Err(e),
        };

        let duration = slot
            .duration_minutes
            .unwrap_or(self.stores.booking_settings().default_reservation_duration);
        let alert = VacateRequest {
            table_id: table.id,
            table_number: table.number,
            customer: Some(caller.user_id),
            customer_name: self.stores.users.name_or_fallback(caller.user_id),
            duration_minutes: duration,
        };
        if let Err(e) = self.scheduler.schedule(alert) {
            warn!(table_id = %table.id, "Reservation confirmed but vacate alert not armed: {}", e);
        }
        info!(
            user_id = %caller.user_id,
            table_id = %table.id,
            start = %start,
            "Reservation confirmed through assistant"
        );

        *session = Session::default();
        Ok(Reply::new(format!(
            "Reservation confirmed!\n\n• Table #{} ({})\n• {} at {}\n• Party size: {}\n\nSee you then!",
            table.number,
            table.table_type,
            format_day(start.date()),
            format_clock(start.time()),
            party_size
        ))
        .intent(flow)
        .quick(["View reservations", "Help"])
        .data(&slot))
    }
}

/// Ends a flow that lost a required slot, naming what is missing.
fn missing_information(session: &mut Session) -> Reply {
    let missing = session.missing_slots().join(", ");
    *session = Session::default();
    Reply::new(format!(
        "I'm missing some information: {}.\n\nLet's start over. Would you like to make a reservation?",
        missing
    ))
    .intent(Some(Intent::MakeReservation))
    .quick(["Make reservation", "Help"])
    .failed()
}
