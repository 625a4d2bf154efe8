//! Reminder dispatcher
//!
//! On a fixed interval, scans the full store for unnotified due notes and
//! delivers each through the gateway. The whole scan-and-mark cycle runs
//! inside one store transaction, so a conversation completing a note in
//! parallel can never be lost, and the notified flags are persisted with a
//! single save per tick.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::core::clock::{format_minute, parse_minute, MinuteClock};
use crate::gateway::MessagingGateway;
use crate::store::{Note, NoteStore};

/// Default tick interval, matching the minute resolution of `remind_at`.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Default bound on a single delivery, so one unreachable user cannot
/// stall the whole tick.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// How a note's scheduled minute is matched against "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuePolicy {
    /// `remind_at <= now`: reminders that fell between ticks (downtime,
    /// clock jumps) are still delivered on the next tick.
    #[default]
    CatchUp,
    /// `remind_at == now`: a missed minute is silently dropped. Kept for
    /// callers that prefer the historical behavior.
    Exact,
}

/// Background scanner delivering due reminders.
pub struct ReminderDispatcher {
    store: Arc<NoteStore>,
    gateway: Arc<dyn MessagingGateway>,
    clock: MinuteClock,
    tick_interval: Duration,
    send_timeout: Duration,
    policy: DuePolicy,
}

impl ReminderDispatcher {
    pub fn new(
        store: Arc<NoteStore>,
        gateway: Arc<dyn MessagingGateway>,
        clock: MinuteClock,
    ) -> Self {
        ReminderDispatcher {
            store,
            gateway,
            clock,
            tick_interval: DEFAULT_TICK_INTERVAL,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            policy: DuePolicy::default(),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: DuePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run until the shutdown signal flips. A tick already in flight
    /// always finishes (including its store commit) before the loop
    /// exits; the signal only ever interrupts the wait between ticks.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "reminder dispatcher running (every {:?}, {:?} policy)",
            self.tick_interval, self.policy
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // A failed tick (store unreadable, ...) is logged and
                    // retried on the next natural tick, never in a tight loop.
                    if let Err(e) = self.tick().await {
                        error!("reminder tick failed: {e:#}");
                    }
                }
                _ = shutdown.changed() => {
                    info!("reminder dispatcher stopping");
                    break;
                }
            }
        }
    }

    /// Execute one scan-and-deliver cycle against the current wall clock.
    /// Returns how many reminders were delivered.
    pub async fn tick(&self) -> Result<usize> {
        self.tick_at(self.clock.now_minute()).await
    }

    async fn tick_at(&self, now: NaiveDateTime) -> Result<usize> {
        let mut txn = self
            .store
            .transaction()
            .await
            .context("opening store transaction")?;

        let mut delivered = 0usize;
        let mut changed = false;

        for (user_id, notes) in txn.notes.iter_mut() {
            for note in notes.iter_mut() {
                if note.notified || !self.is_due(user_id, note, now) {
                    continue;
                }

                let message = format_notification(note);
                match tokio::time::timeout(self.send_timeout, self.gateway.send(user_id, &message))
                    .await
                {
                    Ok(Ok(())) => {
                        note.notified = true;
                        changed = true;
                        delivered += 1;
                        info!("delivered reminder {} to user {user_id}", note.id);
                    }
                    // Delivery failures leave the note unnotified so the
                    // next tick retries; a false-negative send can thus
                    // deliver twice, which beats silently losing it.
                    Ok(Err(e)) => {
                        error!("failed to deliver reminder {} to user {user_id}: {e:#}", note.id)
                    }
                    Err(_) => error!(
                        "delivery of reminder {} to user {user_id} timed out after {:?}",
                        note.id, self.send_timeout
                    ),
                }
            }
        }

        if changed {
            txn.commit().await.context("persisting notified flags")?;
        }
        if delivered > 0 {
            info!("tick at {} delivered {delivered} reminder(s)", format_minute(now));
        }
        Ok(delivered)
    }

    fn is_due(&self, user_id: &str, note: &Note, now: NaiveDateTime) -> bool {
        match parse_minute(&note.remind_at) {
            Ok(at) => match self.policy {
                DuePolicy::CatchUp => at <= now,
                DuePolicy::Exact => at == now,
            },
            Err(e) => {
                warn!(
                    "note {} for user {user_id} has an unparseable remind_at {:?}: {e}",
                    note.id, note.remind_at
                );
                false
            }
        }
    }
}

/// Message delivered for one due note.
fn format_notification(note: &Note) -> String {
    if note.description.is_empty() {
        format!("🔔 Reminder: **{}**", note.title)
    } else {
        format!("🔔 Reminder: **{}**\n{}", note.title, note.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Gateway double recording every send; sends to users in `failing`
    /// return an error.
    #[derive(Default)]
    struct MockGateway {
        sent: Mutex<Vec<(String, String)>>,
        failing: Mutex<HashSet<String>>,
    }

    impl MockGateway {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn fail_for(&self, user_id: &str) {
            self.failing.lock().unwrap().insert(user_id.to_string());
        }

        fn recover(&self, user_id: &str) {
            self.failing.lock().unwrap().remove(user_id);
        }
    }

    #[async_trait]
    impl MessagingGateway for MockGateway {
        async fn send(&self, user_id: &str, text: &str) -> Result<()> {
            if self.failing.lock().unwrap().contains(user_id) {
                anyhow::bail!("user unreachable");
            }
            self.sent
                .lock()
                .unwrap()
                .push((user_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<NoteStore>,
        gateway: Arc<MockGateway>,
        dispatcher: ReminderDispatcher,
    }

    fn fixture(policy: DuePolicy) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(NoteStore::new(dir.path().join("db.json")));
        let gateway = Arc::new(MockGateway::default());
        let dispatcher = ReminderDispatcher::new(
            store.clone(),
            gateway.clone(),
            MinuteClock::utc(),
        )
        .with_policy(policy)
        .with_send_timeout(Duration::from_secs(1));
        Fixture {
            _dir: dir,
            store,
            gateway,
            dispatcher,
        }
    }

    fn note_at(title: &str, description: &str, remind_at: &str) -> Note {
        Note::new(title, description, parse_minute(remind_at).unwrap())
    }

    fn minute(s: &str) -> NaiveDateTime {
        parse_minute(s).unwrap()
    }

    #[tokio::test]
    async fn test_due_note_is_delivered_and_marked_once() {
        let f = fixture(DuePolicy::CatchUp);
        f.store
            .append_note("42", note_at("Buy milk", "2 liters, whole", "2025-03-29 17:30"))
            .await
            .unwrap();

        let delivered = f.dispatcher.tick_at(minute("2025-03-29 17:30")).await.unwrap();
        assert_eq!(delivered, 1);

        let sent = f.gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "42");
        assert!(sent[0].1.contains("Buy milk"));
        assert!(sent[0].1.contains("2 liters, whole"));

        // Persisted exactly once, as notified
        let book = f.store.load().await.unwrap();
        assert!(book.get("42").unwrap()[0].notified);

        // Subsequent ticks never re-deliver
        for _ in 0..3 {
            assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:31")).await.unwrap(), 0);
        }
        assert_eq!(f.gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_future_note_is_not_delivered() {
        let f = fixture(DuePolicy::CatchUp);
        f.store
            .append_note("42", note_at("later", "", "2025-03-29 18:00"))
            .await
            .unwrap();

        assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:30")).await.unwrap(), 0);
        assert!(f.gateway.sent().is_empty());
        assert!(!f.store.load().await.unwrap().get("42").unwrap()[0].notified);
    }

    #[tokio::test]
    async fn test_catch_up_delivers_missed_notes() {
        let f = fixture(DuePolicy::CatchUp);
        f.store
            .append_note("42", note_at("missed", "", "2025-03-29 17:00"))
            .await
            .unwrap();

        // The process was down at 17:00; the 17:45 tick still delivers
        assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:45")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exact_policy_skips_missed_notes() {
        let f = fixture(DuePolicy::Exact);
        f.store
            .append_note("42", note_at("missed", "", "2025-03-29 17:00"))
            .await
            .unwrap();

        assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:45")).await.unwrap(), 0);
        assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:00")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_is_retried_next_tick() {
        let f = fixture(DuePolicy::CatchUp);
        f.store
            .append_note("42", note_at("flaky", "", "2025-03-29 17:30"))
            .await
            .unwrap();

        f.gateway.fail_for("42");
        assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:30")).await.unwrap(), 0);
        assert!(!f.store.load().await.unwrap().get("42").unwrap()[0].notified);

        f.gateway.recover("42");
        assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:31")).await.unwrap(), 1);
        assert!(f.store.load().await.unwrap().get("42").unwrap()[0].notified);
    }

    #[tokio::test]
    async fn test_one_failing_user_does_not_block_others() {
        let f = fixture(DuePolicy::CatchUp);
        f.store
            .append_note("alice", note_at("a", "", "2025-03-29 17:30"))
            .await
            .unwrap();
        f.store
            .append_note("bob", note_at("b", "", "2025-03-29 17:30"))
            .await
            .unwrap();

        f.gateway.fail_for("alice");
        assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:30")).await.unwrap(), 1);

        let book = f.store.load().await.unwrap();
        assert!(!book.get("alice").unwrap()[0].notified);
        assert!(book.get("bob").unwrap()[0].notified);
    }

    #[tokio::test]
    async fn test_quiet_tick_writes_nothing() {
        let f = fixture(DuePolicy::CatchUp);

        assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:30")).await.unwrap(), 0);
        // No change, no save: the backing file was never created
        assert!(!f.store.path().exists());
    }

    #[tokio::test]
    async fn test_unparseable_remind_at_is_skipped_not_marked() {
        let f = fixture(DuePolicy::CatchUp);
        let mut note = note_at("broken", "", "2025-03-29 17:30");
        note.remind_at = "whenever".to_string();
        f.store.append_note("42", note).await.unwrap();

        assert_eq!(f.dispatcher.tick_at(minute("2025-03-29 17:30")).await.unwrap(), 0);
        assert!(f.gateway.sent().is_empty());
        assert!(!f.store.load().await.unwrap().get("42").unwrap()[0].notified);
    }

    #[tokio::test]
    async fn test_notification_format() {
        let with_description = note_at("Buy milk", "2 liters", "2025-03-29 17:30");
        assert_eq!(
            format_notification(&with_description),
            "🔔 Reminder: **Buy milk**\n2 liters"
        );

        let without_description = note_at("Buy milk", "", "2025-03-29 17:30");
        assert_eq!(format_notification(&without_description), "🔔 Reminder: **Buy milk**");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let f = fixture(DuePolicy::CatchUp);
        let dispatcher = f
            .dispatcher
            .with_tick_interval(Duration::from_millis(10));

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(dispatcher.run(rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("dispatcher did not stop")
            .unwrap();
    }
}
