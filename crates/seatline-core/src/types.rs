use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Authenticated user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Restaurant table row identifier (not the printed table number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub i64);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Role carried by every verified caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Manager,
    Admin,
}

impl Role {
    /// Managers and admins share the staff-only operations.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Table category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Regular,
    Vip,
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableType::Regular => write!(f, "Regular"),
            TableType::Vip => write!(f, "VIP"),
        }
    }
}

impl std::str::FromStr for TableType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "regular" => Ok(TableType::Regular),
            "vip" => Ok(TableType::Vip),
            _ => Err(format!("Unknown table type: {}", s)),
        }
    }
}

/// Table occupancy status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    Occupied,
    Reserved,
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableStatus::Available => write!(f, "available"),
            TableStatus::Occupied => write!(f, "occupied"),
            TableStatus::Reserved => write!(f, "reserved"),
        }
    }
}

impl std::str::FromStr for TableStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(TableStatus::Available),
            "occupied" => Ok(TableStatus::Occupied),
            "reserved" => Ok(TableStatus::Reserved),
            _ => Err(format!("Unknown table status: {}", s)),
        }
    }
}

/// Wait queue entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Seated,
    Cancelled,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStatus::Waiting => write!(f, "waiting"),
            QueueStatus::Seated => write!(f, "seated"),
            QueueStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "waiting" => Ok(QueueStatus::Waiting),
            "seated" => Ok(QueueStatus::Seated),
            "cancelled" => Ok(QueueStatus::Cancelled),
            _ => Err(format!("Unknown queue status: {}", s)),
        }
    }
}

/// Lifecycle of a reservation history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Reserved,
    Occupied,
    Completed,
    Cancelled,
    Expired,
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryStatus::Reserved => write!(f, "reserved"),
            HistoryStatus::Occupied => write!(f, "occupied"),
            HistoryStatus::Completed => write!(f, "completed"),
            HistoryStatus::Cancelled => write!(f, "cancelled"),
            HistoryStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for HistoryStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reserved" => Ok(HistoryStatus::Reserved),
            "occupied" => Ok(HistoryStatus::Occupied),
            "completed" => Ok(HistoryStatus::Completed),
            "cancelled" => Ok(HistoryStatus::Cancelled),
            "expired" => Ok(HistoryStatus::Expired),
            _ => Err(format!("Unknown history status: {}", s)),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// Verified caller identity, produced by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// A restaurant table as held by the table store.
///
/// Reservation times are restaurant wall-clock times; `occupied_at` is an
/// instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub number: u32,
    pub capacity: u32,
    pub table_type: TableType,
    pub status: TableStatus,
    pub enabled: bool,
    pub occupant: Option<UserId>,
    pub reservation_time: Option<NaiveDateTime>,
    pub duration_minutes: Option<u32>,
    pub occupied_at: Option<DateTime<Utc>>,
}

impl Table {
    /// A fresh, enabled and available table.
    pub fn available(id: TableId, number: u32, capacity: u32, table_type: TableType) -> Self {
        Self {
            id,
            number,
            capacity,
            table_type,
            status: TableStatus::Available,
            enabled: true,
            occupant: None,
            reservation_time: None,
            duration_minutes: None,
            occupied_at: None,
        }
    }

    /// The active reservation held on this table, if any.
    pub fn reservation(&self) -> Option<ReservationSlot> {
        match (self.status, self.occupant, self.reservation_time) {
            (TableStatus::Reserved, Some(customer), Some(start)) => Some(ReservationSlot {
                table_id: self.id,
                table_number: self.number,
                customer,
                start,
                duration_minutes: self.duration_minutes,
            }),
            _ => None,
        }
    }
}

/// Definition used to create tables (seed data and admin tooling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTable {
    pub number: u32,
    pub capacity: u32,
    #[serde(rename = "type", default = "default_table_type")]
    pub table_type: TableType,
}

fn default_table_type() -> TableType {
    TableType::Regular
}

/// An existing reservation window, as consumed by conflict checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSlot {
    pub table_id: TableId,
    pub table_number: u32,
    pub customer: UserId,
    pub start: NaiveDateTime,
    /// Missing durations fall back to the configured default.
    pub duration_minutes: Option<u32>,
}

impl ReservationSlot {
    pub fn end(&self, default_duration: u32) -> NaiveDateTime {
        let minutes = self.duration_minutes.unwrap_or(default_duration);
        self.start + Duration::minutes(i64::from(minutes))
    }
}

/// Table counts by status (enabled tables only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub total: u32,
    pub available: u32,
    pub occupied: u32,
    pub reserved: u32,
}

impl TableCounts {
    pub fn tally<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Self {
        let mut counts = Self::default();
        for table in tables.into_iter().filter(|t| t.enabled) {
            counts.total += 1;
            match table.status {
                TableStatus::Available => counts.available += 1,
                TableStatus::Occupied => counts.occupied += 1,
                TableStatus::Reserved => counts.reserved += 1,
            }
        }
        counts
    }
}

/// A party waiting for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub customer: UserId,
    pub party_size: u32,
    pub table_type: TableType,
    pub position: u32,
    pub status: QueueStatus,
    pub joined_at: DateTime<Utc>,
}

/// A reservation history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub customer: UserId,
    pub table_id: TableId,
    pub table_number: u32,
    pub table_type: TableType,
    pub party_size: u32,
    pub reservation_time: NaiveDateTime,
    pub duration_minutes: u32,
    pub status: HistoryStatus,
    pub created_by: UserId,
    pub created_by_role: Role,
    pub seated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields supplied when writing a new history record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub customer: UserId,
    pub table_id: TableId,
    pub table_number: u32,
    pub table_type: TableType,
    pub party_size: u32,
    pub reservation_time: NaiveDateTime,
    pub duration_minutes: u32,
    pub created_by: Identity,
}

/// Filters for listing history, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub customer: Option<UserId>,
    pub status: Option<HistoryStatus>,
    pub table_id: Option<TableId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        self.customer.map_or(true, |c| entry.customer == c)
            && self.status.map_or(true, |s| entry.status == s)
            && self.table_id.map_or(true, |t| entry.table_id == t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_role_from_str_is_case_insensitive() {
        assert_eq!("Customer".parse::<Role>().unwrap(), Role::Customer);
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("waiter".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_is_staff() {
        assert!(!Role::Customer.is_staff());
        assert!(Role::Manager.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn test_table_type_display_and_parse() {
        assert_eq!(TableType::Vip.to_string(), "VIP");
        assert_eq!(TableType::Regular.to_string(), "Regular");
        assert_eq!("vip".parse::<TableType>().unwrap(), TableType::Vip);
        assert_eq!("VIP".parse::<TableType>().unwrap(), TableType::Vip);
    }

    #[test]
    fn test_history_status_accepts_upper_case() {
        assert_eq!("RESERVED".parse::<HistoryStatus>().unwrap(), HistoryStatus::Reserved);
        assert_eq!("completed".parse::<HistoryStatus>().unwrap(), HistoryStatus::Completed);
        assert!("seated".parse::<HistoryStatus>().is_err());
    }

    #[test]
    fn test_table_type_serde() {
        let json = serde_json::to_string(&TableType::Vip).unwrap();
        assert_eq!(json, "\"vip\"");
    }

    #[test]
    fn test_reservation_only_for_reserved_tables() {
        let mut table = Table::available(TableId(1), 3, 4, TableType::Regular);
        assert!(table.reservation().is_none());

        table.status = TableStatus::Reserved;
        table.occupant = Some(UserId(9));
        table.reservation_time = Some(at(19, 0));
        table.duration_minutes = Some(90);

        let slot = table.reservation().unwrap();
        assert_eq!(slot.customer, UserId(9));
        assert_eq!(slot.end(60), at(20, 30));
    }

    #[test]
    fn test_slot_end_uses_default_when_missing() {
        let slot = ReservationSlot {
            table_id: TableId(1),
            table_number: 1,
            customer: UserId(1),
            start: at(10, 0),
            duration_minutes: None,
        };
        assert_eq!(slot.end(60), at(11, 0));
    }

    #[test]
    fn test_table_counts_skip_disabled() {
        let mut a = Table::available(TableId(1), 1, 2, TableType::Regular);
        let mut b = Table::available(TableId(2), 2, 4, TableType::Vip);
        b.status = TableStatus::Occupied;
        let mut c = Table::available(TableId(3), 3, 6, TableType::Regular);
        c.enabled = false;
        a.status = TableStatus::Reserved;

        let counts = TableCounts::tally([&a, &b, &c]);
        assert_eq!(counts.total, 2);
        assert_eq!(counts.reserved, 1);
        assert_eq!(counts.occupied, 1);
        assert_eq!(counts.available, 0);
    }

    #[test]
    fn test_new_table_type_defaults_to_regular() {
        let t: NewTable = toml::from_str("number = 4\ncapacity = 2").unwrap();
        assert_eq!(t.table_type, TableType::Regular);
        let t: NewTable = toml::from_str("number = 5\ncapacity = 8\ntype = \"vip\"").unwrap();
        assert_eq!(t.table_type, TableType::Vip);
    }
}
