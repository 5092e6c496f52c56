//! Keyword-scored intent classification.
//!
//! Each intent owns a keyword set and the roles allowed to use it. The score
//! of an intent is the number of its keywords found as substrings of the
//! lower-cased input. The strictly highest score wins, so ties go to the
//! intent declared first; an all-zero score is `Unknown`.

use serde::{Deserialize, Serialize};
use std::fmt;

use seatline_core::types::Role;

use crate::session::Session;

/// The classified purpose of a user utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    MakeReservation,
    CheckTable,
    QueuePosition,
    JoinQueue,
    LeaveQueue,
    ViewReservation,
    CancelReservation,
    ManagerStats,
    Help,
    Greeting,
    Confirm,
    Cancel,
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::MakeReservation => "MAKE_RESERVATION",
            Intent::CheckTable => "CHECK_TABLE",
            Intent::QueuePosition => "QUEUE_POSITION",
            Intent::JoinQueue => "JOIN_QUEUE",
            Intent::LeaveQueue => "LEAVE_QUEUE",
            Intent::ViewReservation => "VIEW_RESERVATION",
            Intent::CancelReservation => "CANCEL_RESERVATION",
            Intent::ManagerStats => "MANAGER_STATS",
            Intent::Help => "HELP",
            Intent::Greeting => "GREETING",
            Intent::Confirm => "CONFIRM",
            Intent::Cancel => "CANCEL",
            Intent::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Intent {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        INTENT_RULES
            .iter()
            .map(|r| r.intent)
            .chain(std::iter::once(Intent::Unknown))
            .find(|i| i.to_string() == s)
            .ok_or_else(|| format!("Unknown intent: {}", s))
    }
}

/// Keyword set and role gate for one intent.
pub struct IntentRule {
    pub intent: Intent,
    pub keywords: &'static [&'static str],
    pub roles: &'static [Role],
}

const EVERYONE: &[Role] = &[Role::Customer, Role::Manager, Role::Admin];
const CUSTOMERS: &[Role] = &[Role::Customer];
const STAFF: &[Role] = &[Role::Manager, Role::Admin];

/// Intent rules in declaration order (earlier wins ties).
pub static INTENT_RULES: [IntentRule; 12] = [
    IntentRule {
        intent: Intent::MakeReservation,
        keywords: &["book", "reserve", "reservation"],
        roles: CUSTOMERS,
    },
    IntentRule {
        intent: Intent::CheckTable,
        keywords: &["table", "available", "free", "seat", "capacity"],
        roles: EVERYONE,
    },
    IntentRule {
        intent: Intent::QueuePosition,
        keywords: &["queue", "position", "wait", "waiting", "line", "turn"],
        roles: EVERYONE,
    },
    IntentRule {
        intent: Intent::JoinQueue,
        keywords: &["join", "add", "queue", "wait", "line"],
        roles: CUSTOMERS,
    },
    IntentRule {
        intent: Intent::LeaveQueue,
        keywords: &["leave", "exit", "queue", "remove"],
        roles: CUSTOMERS,
    },
    IntentRule {
        intent: Intent::ViewReservation,
        keywords: &["my", "reservation", "booking", "show", "view"],
        roles: EVERYONE,
    },
    IntentRule {
        intent: Intent::CancelReservation,
        keywords: &["cancel", "delete", "remove", "reservation", "booking"],
        roles: EVERYONE,
    },
    IntentRule {
        intent: Intent::ManagerStats,
        keywords: &["stats", "statistics", "dashboard", "overview", "report"],
        roles: STAFF,
    },
    IntentRule {
        intent: Intent::Help,
        keywords: &["help", "what", "can", "do", "commands", "options"],
        roles: EVERYONE,
    },
    IntentRule {
        intent: Intent::Greeting,
        keywords: &["hi", "hello", "hey", "good morning", "good afternoon", "good evening"],
        roles: EVERYONE,
    },
    IntentRule {
        intent: Intent::Confirm,
        keywords: &["yes", "confirm", "ok", "sure", "proceed", "go ahead"],
        roles: EVERYONE,
    },
    IntentRule {
        intent: Intent::Cancel,
        keywords: &["no", "cancel", "stop", "nevermind", "abort"],
        roles: EVERYONE,
    },
];

/// Best intent for an utterance; `confidence` is the raw keyword match count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: u32,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0,
        }
    }
}

/// Pluggable utterance classifier used by the conversation engine.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str, session: &Session) -> Classification;
}

/// Substring keyword counter over [`INTENT_RULES`].
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Score of a single rule against already lower-cased text.
    fn score(rule: &IntentRule, lower: &str) -> u32 {
        rule.keywords.iter().filter(|k| lower.contains(*k)).count() as u32
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str, _session: &Session) -> Classification {
        let lower = text.to_lowercase();
        let mut best = Classification::unknown();
        for rule in INTENT_RULES.iter() {
            let score = Self::score(rule, &lower);
            if score > best.confidence {
                best = Classification {
                    intent: rule.intent,
                    confidence: score,
                };
            }
        }
        best
    }
}

/// Whether `role` may use `intent`. Unknown intents are always denied.
pub fn allowed(role: Role, intent: Intent) -> bool {
    INTENT_RULES
        .iter()
        .find(|r| r.intent == intent)
        .is_some_and(|r| r.roles.contains(&role))
}
