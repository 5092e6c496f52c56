//! Vacate notification scheduler.
//!
//! Keeps at most one armed alert per table. Each alert is due `lead` minutes
//! before the table is expected to free up, where `lead` is the
//! `notification_minutes_before` setting read when the alert is armed. A
//! background loop sleeps until the earliest due alert and converts it into a
//! manager notification; arming or cancelling wakes the loop so it re-plans.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use seatline_core::error::{Result, SeatlineError};
use seatline_core::settings::{SettingKey, SettingLookup};
use seatline_core::types::{TableId, UserId};

/// Newest notifications kept in the feed.
pub const FEED_CAPACITY: usize = 50;
/// Extra minutes beyond the lead time covered by the nearing-vacate view.
pub const NEARING_WINDOW_MINUTES: i64 = 5;

const IDLE_POLL: std::time::Duration = std::time::Duration::from_secs(60);

/// What to arm when a table becomes occupied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VacateRequest {
    pub table_id: TableId,
    pub table_number: u32,
    pub customer: Option<UserId>,
    pub customer_name: String,
    pub duration_minutes: u32,
}

/// An armed, not yet fired alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledVacate {
    pub table_id: TableId,
    pub table_number: u32,
    pub customer: Option<UserId>,
    pub customer_name: String,
    pub expected_vacate: DateTime<Utc>,
    pub notify_at: DateTime<Utc>,
    pub lead_minutes: u32,
}

/// Alert shown in the manager feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerNotification {
    pub id: u64,
    pub table_id: TableId,
    pub table_number: u32,
    pub customer_name: String,
    pub expected_vacate: DateTime<Utc>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// A table that is about to free up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacateAlert {
    pub table_id: TableId,
    pub table_number: u32,
    pub customer_name: String,
    pub expected_vacate: DateTime<Utc>,
    pub minutes_remaining: i64,
}

pub struct VacateScheduler {
    settings: Arc<dyn SettingLookup>,
    armed: Mutex<HashMap<TableId, ScheduledVacate>>,
    feed: Mutex<VecDeque<ManagerNotification>>,
    next_id: AtomicU64,
    wake: Notify,
    shutdown: Notify,
    events: broadcast::Sender<ManagerNotification>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| SeatlineError::Storage(format!("Scheduler mutex poisoned: {}", e)))
}

impl VacateScheduler {
    pub fn new(settings: Arc<dyn SettingLookup>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            settings,
            armed: Mutex::new(HashMap::new()),
            feed: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            wake: Notify::new(),
            shutdown: Notify::new(),
            events,
        }
    }

    fn lead_minutes(&self) -> u32 {
        let key = SettingKey::NotificationMinutesBefore;
        let default = key.default_value().parse().unwrap_or(5);
        self.settings.get_u32(key.as_str(), default)
    }

    // =========================================================================
    // Arming
    // =========================================================================

    pub fn schedule(&self, request: VacateRequest) -> Result<ScheduledVacate> {
        self.schedule_at(request, Utc::now())
    }

    /// Arms an alert for the table, replacing any alert already armed for it.
    ///
    /// When the lead time already covers the whole duration the alert fires
    /// immediately.
    pub fn schedule_at(&self, request: VacateRequest, now: DateTime<Utc>) -> Result<ScheduledVacate> {
        let lead_minutes = self.lead_minutes();
        let expected_vacate = now + Duration::minutes(i64::from(request.duration_minutes));
        let notify_at = expected_vacate - Duration::minutes(i64::from(lead_minutes));

        let scheduled = ScheduledVacate {
            table_id: request.table_id,
            table_number: request.table_number,
            customer: request.customer,
            customer_name: request.customer_name,
            expected_vacate,
            notify_at,
            lead_minutes,
        };

        let delay_secs = (notify_at - now).num_seconds().max(0);
        {
            let mut armed = lock(&self.armed)?;
            if armed.remove(&scheduled.table_id).is_some() {
                debug!(table_id = %scheduled.table_id, "Replacing armed vacate alert");
            }
            if delay_secs > 0 {
                armed.insert(scheduled.table_id, scheduled.clone());
            }
        }

        info!(
            table_id = %scheduled.table_id,
            table_number = scheduled.table_number,
            duration_minutes = request.duration_minutes,
            delay_secs,
            "Vacate alert scheduled"
        );

        if delay_secs == 0 {
            self.fire(scheduled.clone(), now)?;
        } else {
            self.wake.notify_one();
        }
        Ok(scheduled)
    }

    /// Disarms the table's alert. Returns whether one was armed.
    pub fn cancel(&self, table_id: TableId) -> Result<bool> {
        let removed = lock(&self.armed)?.remove(&table_id);
        match removed {
            Some(scheduled) => {
                info!(
                    table_id = %table_id,
                    table_number = scheduled.table_number,
                    "Vacate alert cancelled"
                );
                self.wake.notify_one();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn armed(&self, table_id: TableId) -> Result<Option<ScheduledVacate>> {
        Ok(lock(&self.armed)?.get(&table_id).cloned())
    }

    pub fn armed_count(&self) -> Result<usize> {
        Ok(lock(&self.armed)?.len())
    }

    /// Earliest due time among armed alerts.
    pub fn next_due(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(lock(&self.armed)?.values().map(|s| s.notify_at).min())
    }

    // =========================================================================
    // Firing
    // =========================================================================

    /// Fires every armed alert due at or before `now`, earliest first.
    pub fn fire_due(&self, now: DateTime<Utc>) -> Result<Vec<ManagerNotification>> {
        let mut due: Vec<ScheduledVacate> = {
            let mut armed = lock(&self.armed)?;
            let ids: Vec<TableId> = armed
                .values()
                .filter(|s| s.notify_at <= now)
                .map(|s| s.table_id)
                .collect();
            ids.iter().filter_map(|id| armed.remove(id)).collect()
        };
        due.sort_by_key(|s| s.notify_at);

        due.into_iter().map(|s| self.fire(s, now)).collect()
    }

    fn fire(&self, scheduled: ScheduledVacate, now: DateTime<Utc>) -> Result<ManagerNotification> {
        let vacate_clock = scheduled
            .expected_vacate
            .with_timezone(&Local)
            .format("%-I:%M %p");
        let notification = ManagerNotification {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            table_id: scheduled.table_id,
            table_number: scheduled.table_number,
            customer_name: scheduled.customer_name.clone(),
            expected_vacate: scheduled.expected_vacate,
            message: format!(
                "Table #{} will be vacated at {} (in {} minutes). Customer: {}",
                scheduled.table_number, vacate_clock, scheduled.lead_minutes, scheduled.customer_name
            ),
            created_at: now,
            read: false,
        };

        {
            let mut feed = lock(&self.feed)?;
            feed.push_front(notification.clone());
            feed.truncate(FEED_CAPACITY);
        }

        info!(
            notification_id = notification.id,
            table_id = %notification.table_id,
            "{}",
            notification.message
        );
        // No subscribers is fine.
        let _ = self.events.send(notification.clone());
        Ok(notification)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn nearing_vacate(&self) -> Result<Vec<VacateAlert>> {
        self.nearing_vacate_at(Utc::now())
    }

    /// Armed alerts whose table frees up within the lead time plus five
    /// minutes, soonest first.
    pub fn nearing_vacate_at(&self, now: DateTime<Utc>) -> Result<Vec<VacateAlert>> {
        let horizon = i64::from(self.lead_minutes()) + NEARING_WINDOW_MINUTES;
        let armed = lock(&self.armed)?;
        let mut alerts: Vec<VacateAlert> = armed
            .values()
            .filter_map(|s| {
                let seconds = (s.expected_vacate - now).num_seconds();
                let minutes = (seconds as f64 / 60.0).round() as i64;
                (minutes > 0 && minutes <= horizon).then(|| VacateAlert {
                    table_id: s.table_id,
                    table_number: s.table_number,
                    customer_name: s.customer_name.clone(),
                    expected_vacate: s.expected_vacate,
                    minutes_remaining: minutes,
                })
            })
            .collect();
        alerts.sort_by_key(|a| (a.minutes_remaining, a.table_number));
        Ok(alerts)
    }

    /// Feed contents, newest first.
    pub fn list(&self, unread_only: bool) -> Result<Vec<ManagerNotification>> {
        Ok(lock(&self.feed)?
            .iter()
            .filter(|n| !unread_only || !n.read)
            .cloned()
            .collect())
    }

    pub fn unread_count(&self) -> Result<usize> {
        Ok(lock(&self.feed)?.iter().filter(|n| !n.read).count())
    }

    /// Returns false when no notification has that id.
    pub fn mark_read(&self, id: u64) -> Result<bool> {
        let mut feed = lock(&self.feed)?;
        match feed.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn mark_all_read(&self) -> Result<()> {
        lock(&self.feed)?.iter_mut().for_each(|n| n.read = true);
        Ok(())
    }

    /// Live stream of fired notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerNotification> {
        self.events.subscribe()
    }

    // =========================================================================
    // Background loop
    // =========================================================================

    /// Fires alerts as they come due until [`shutdown`](Self::shutdown).
    pub async fn run(&self) {
        info!("Vacate scheduler started");
        loop {
            if let Err(e) = self.fire_due(Utc::now()) {
                warn!("Failed to fire vacate alerts: {}", e);
            }

            let wait = match self.next_due() {
                Ok(Some(due)) => (due - Utc::now()).to_std().unwrap_or_default(),
                Ok(None) => IDLE_POLL,
                Err(e) => {
                    warn!("Failed to read armed vacate alerts: {}", e);
                    IDLE_POLL
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.wake.notified() => {}
                _ = self.shutdown.notified() => {
                    info!("Vacate scheduler stopped");
                    return;
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatline_core::settings::StaticSettings;

    fn scheduler(lead: u32) -> VacateScheduler {
        let settings = StaticSettings::new().with(SettingKey::NotificationMinutesBefore, lead);
        VacateScheduler::new(Arc::new(settings))
    }

    fn request(table: i64, minutes: u32) -> VacateRequest {
        VacateRequest {
            table_id: TableId(table),
            table_number: table as u32,
            customer: Some(UserId(7)),
            customer_name: "Ada".to_string(),
            duration_minutes: minutes,
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-14T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    // =========================================================================
    // Arming and firing
    // =========================================================================

    #[test]
    fn test_schedule_computes_times() {
        let s = scheduler(5);
        let armed = s.schedule_at(request(3, 60), t0()).unwrap();
        assert_eq!(armed.expected_vacate, t0() + Duration::minutes(60));
        assert_eq!(armed.notify_at, t0() + Duration::minutes(55));
        assert_eq!(s.next_due().unwrap(), Some(t0() + Duration::minutes(55)));
        assert!(s.list(false).unwrap().is_empty());
    }

    #[test]
    fn test_fire_due_produces_notification() {
        let s = scheduler(5);
        s.schedule_at(request(3, 60), t0()).unwrap();

        assert!(s.fire_due(t0() + Duration::minutes(54)).unwrap().is_empty());
        let fired = s.fire_due(t0() + Duration::minutes(55)).unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, 1);
        assert!(fired[0].message.starts_with("Table #3 will be vacated at "));
        assert!(fired[0].message.ends_with("(in 5 minutes). Customer: Ada"));
        assert!(s.armed(TableId(3)).unwrap().is_none());
        assert_eq!(s.unread_count().unwrap(), 1);
    }

    #[test]
    fn test_zero_delay_fires_immediately() {
        let s = scheduler(5);
        s.schedule_at(request(2, 3), t0()).unwrap();
        assert!(s.armed(TableId(2)).unwrap().is_none());
        let feed = s.list(false).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].table_number, 2);
    }

    #[test]
    fn test_rescheduling_replaces_prior_alert() {
        let s = scheduler(5);
        s.schedule_at(request(4, 30), t0()).unwrap();
        s.schedule_at(request(4, 90), t0()).unwrap();

        assert!(s.fire_due(t0() + Duration::minutes(30)).unwrap().is_empty());
        let fired = s.fire_due(t0() + Duration::minutes(90)).unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(s.list(false).unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let s = scheduler(5);
        s.schedule_at(request(1, 60), t0()).unwrap();
        assert!(s.cancel(TableId(1)).unwrap());
        assert!(!s.cancel(TableId(1)).unwrap());
        assert!(s.fire_due(t0() + Duration::hours(2)).unwrap().is_empty());
    }

    #[test]
    fn test_feed_is_capped_newest_first() {
        let s = scheduler(5);
        for table in 1..=51 {
            s.schedule_at(request(table, 1), t0()).unwrap();
        }
        let feed = s.list(false).unwrap();
        assert_eq!(feed.len(), FEED_CAPACITY);
        assert_eq!(feed[0].id, 51);
        assert_eq!(feed[49].id, 2);
    }

    #[test]
    fn test_ids_are_per_instance() {
        let a = scheduler(5);
        let b = scheduler(5);
        a.schedule_at(request(1, 1), t0()).unwrap();
        b.schedule_at(request(1, 1), t0()).unwrap();
        assert_eq!(a.list(false).unwrap()[0].id, 1);
        assert_eq!(b.list(false).unwrap()[0].id, 1);
    }

    // =========================================================================
    // Read flags
    // =========================================================================

    #[test]
    fn test_mark_read() {
        let s = scheduler(5);
        s.schedule_at(request(1, 1), t0()).unwrap();
        s.schedule_at(request(2, 1), t0()).unwrap();

        assert!(s.mark_read(1).unwrap());
        assert!(s.mark_read(1).unwrap());
        assert!(!s.mark_read(99).unwrap());
        assert_eq!(s.unread_count().unwrap(), 1);
        assert_eq!(s.list(true).unwrap()[0].id, 2);

        s.mark_all_read().unwrap();
        assert_eq!(s.unread_count().unwrap(), 0);
        assert!(s.list(true).unwrap().is_empty());
    }

    // =========================================================================
    // Nearing vacate
    // =========================================================================

    #[test]
    fn test_nearing_vacate_window_and_order() {
        let s = scheduler(5);
        s.schedule_at(request(1, 30), t0()).unwrap();
        s.schedule_at(request(2, 12), t0()).unwrap();
        s.schedule_at(request(3, 60), t0()).unwrap();

        let now = t0() + Duration::minutes(19);
        let alerts = s.nearing_vacate_at(now).unwrap();
        // Table 2 is past its vacate time; tables 1 and 3 are still beyond the window.
        assert!(alerts.is_empty());

        let now = t0() + Duration::minutes(22);
        let alerts = s.nearing_vacate_at(now).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].table_number, 1);
        assert_eq!(alerts[0].minutes_remaining, 8);
    }

    #[test]
    fn test_nearing_vacate_sorted_ascending() {
        let s = scheduler(20);
        s.schedule_at(request(1, 34), t0()).unwrap();
        s.schedule_at(request(2, 30), t0()).unwrap();

        let alerts = s.nearing_vacate_at(t0() + Duration::minutes(10)).unwrap();
        let numbers: Vec<u32> = alerts.iter().map(|a| a.table_number).collect();
        assert_eq!(numbers, vec![2, 1]);
        assert_eq!(alerts[0].minutes_remaining, 20);
    }

    // =========================================================================
    // Background loop
    // =========================================================================

    #[tokio::test]
    async fn test_run_shutdown() {
        let s = scheduler(5);
        s.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), s.run())
            .await
            .expect("Scheduler should shut down within timeout");
    }

    #[tokio::test]
    async fn test_run_fires_overdue_alert() {
        let s = Arc::new(scheduler(5));
        let mut events = s.subscribe();
        // Armed relative to an hour ago, so it is already due.
        s.schedule_at(request(6, 60), Utc::now() - Duration::hours(1))
            .unwrap();

        let runner = Arc::clone(&s);
        let handle = tokio::spawn(async move { runner.run().await });

        let fired = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
            .await
            .expect("alert should fire")
            .unwrap();
        assert_eq!(fired.table_number, 6);

        s.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("Scheduler should shut down within timeout")
            .unwrap();
    }
}
