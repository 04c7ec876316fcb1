//! Offline mode: a single fifteen-minute window of degraded access per user.
//!
//! The database is the source of truth. A session counts as active while
//! `is_active` is set and `expires_at` lies in the future, so an expired row
//! stops counting without anything having to write to it. The per-second
//! [`Countdown`] is the client-side view of the same window and ends the
//! session when it reaches zero.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::OfflineSession;
use crate::features::{capabilities, OfflineCapabilities};
use crate::feed::Collection;
use crate::ports::{ChangeFeed, Clock, DatabaseService};

pub const OFFLINE_WINDOW_SECS: u32 = 15 * 60;

pub fn offline_window() -> Duration {
    Duration::seconds(i64::from(OFFLINE_WINDOW_SECS))
}

/// Whole seconds left in `session` at `now`, never negative.
pub fn remaining_seconds(session: &OfflineSession, now: DateTime<Utc>) -> u32 {
    let left = (session.expires_at - now).num_seconds();
    left.clamp(0, i64::from(u32::MAX)) as u32
}

/// `m:ss`, as shown on the offline indicator.
pub fn format_remaining(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

//=========================================================================================
// Session Timer
//=========================================================================================

#[derive(Clone)]
pub struct OfflineMode {
    db: Arc<dyn DatabaseService>,
    feed: Arc<dyn ChangeFeed>,
    clock: Arc<dyn Clock>,
}

impl OfflineMode {
    pub fn new(db: Arc<dyn DatabaseService>, feed: Arc<dyn ChangeFeed>, clock: Arc<dyn Clock>) -> Self {
        Self { db, feed, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Supersedes any active session and opens a new window.
    /// `None` means the write failed and nothing changed.
    pub async fn start(&self, owner_id: Uuid) -> Option<OfflineSession> {
        let started_at = self.clock.now();
        let expires_at = started_at + offline_window();
        match self.db.start_offline_session(owner_id, started_at, expires_at).await {
            Ok(session) => {
                info!("Offline mode started for {} until {}", owner_id, session.expires_at);
                self.feed.publish(Collection::OfflineSessions, owner_id, session.id);
                Some(session)
            }
            Err(e) => {
                error!("Error starting offline session for {}: {:?}", owner_id, e);
                None
            }
        }
    }

    /// The newest unexpired active session, if any. Read failures count as inactive.
    pub async fn check_active(&self, owner_id: Uuid) -> Option<OfflineSession> {
        match self.db.find_active_offline_session(owner_id, self.clock.now()).await {
            Ok(session) => session,
            Err(e) => {
                error!("Error checking offline session for {}: {:?}", owner_id, e);
                None
            }
        }
    }

    /// Deactivates the owner's sessions. Ending twice is the same as ending once.
    /// Returns `false` only when the write failed.
    pub async fn end(&self, owner_id: Uuid) -> bool {
        match self.db.deactivate_offline_sessions(owner_id).await {
            Ok(0) => true,
            Ok(count) => {
                info!("Offline mode ended for {} ({} session(s))", owner_id, count);
                self.feed.publish(Collection::OfflineSessions, owner_id, owner_id);
                true
            }
            Err(e) => {
                error!("Error ending offline session for {}: {:?}", owner_id, e);
                false
            }
        }
    }

    pub async fn capabilities(&self, owner_id: Uuid) -> OfflineCapabilities {
        capabilities(self.check_active(owner_id).await.is_some())
    }
}

//=========================================================================================
// Client Countdown
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running(u32),
    /// Emitted once, on the tick that reaches zero.
    Expired,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
}

impl Countdown {
    pub fn new(remaining: u32) -> Self {
        Self { remaining }
    }

    pub fn for_session(session: &OfflineSession, now: DateTime<Utc>) -> Self {
        Self::new(remaining_seconds(session, now))
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn tick(&mut self) -> Tick {
        match self.remaining {
            0 => Tick::Stopped,
            1 => {
                self.remaining = 0;
                Tick::Expired
            }
            n => {
                self.remaining = n - 1;
                Tick::Running(self.remaining)
            }
        }
    }
}

/// Runs at most one countdown at a time for a single client.
#[derive(Default)]
pub struct CountdownRunner {
    current: Option<(CancellationToken, JoinHandle<()>)>,
}

impl CountdownRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a countdown, cancelling any that is already running. Every tick is
    /// forwarded to `ticks`; on expiry the owner's session is ended.
    pub fn restart(
        &mut self,
        offline: OfflineMode,
        owner_id: Uuid,
        mut countdown: Countdown,
        ticks: mpsc::UnboundedSender<Tick>,
    ) {
        self.stop();
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(StdDuration::from_secs(1));
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        let tick = countdown.tick();
                        if tick == Tick::Expired {
                            offline.end(owner_id).await;
                        }
                        let done = !matches!(tick, Tick::Running(_));
                        if ticks.send(tick).is_err() || done {
                            break;
                        }
                    }
                }
            }
        });
        self.current = Some((token, handle));
    }

    pub fn stop(&mut self) {
        if let Some((token, _handle)) = self.current.take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|(token, handle)| !token.is_cancelled() && !handle.is_finished())
    }
}

impl Drop for CountdownRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::feed::BroadcastFeed;
    use crate::features::Capability;
    use crate::memory::InMemoryDatabase;

    struct Fixture {
        db: Arc<InMemoryDatabase>,
        clock: Arc<ManualClock>,
        offline: OfflineMode,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(InMemoryDatabase::new());
        let clock = Arc::new(ManualClock::default());
        let offline = OfflineMode::new(db.clone(), Arc::new(BroadcastFeed::new()), clock.clone());
        Fixture { db, clock, offline }
    }

    #[tokio::test]
    async fn repeated_starts_leave_exactly_one_active_session() {
        let f = fixture();
        let owner = Uuid::new_v4();
        for _ in 0..4 {
            assert!(f.offline.start(owner).await.is_some());
            assert_eq!(f.db.active_offline_sessions(owner), 1);
            f.clock.advance(Duration::seconds(30));
        }
        assert_eq!(f.db.offline_sessions(owner).len(), 4);
    }

    #[tokio::test]
    async fn session_lapses_after_the_window_without_an_explicit_end() {
        let f = fixture();
        let owner = Uuid::new_v4();
        f.offline.start(owner).await.unwrap();

        f.clock.advance(Duration::seconds(899));
        assert!(f.offline.check_active(owner).await.is_some());

        f.clock.advance(Duration::seconds(1));
        assert!(f.offline.check_active(owner).await.is_none());
        // Expiry is a read filter; the row itself is untouched.
        assert_eq!(f.db.active_offline_sessions(owner), 1);
    }

    #[tokio::test]
    async fn ending_twice_matches_ending_once() {
        let f = fixture();
        let owner = Uuid::new_v4();
        f.offline.start(owner).await.unwrap();

        assert!(f.offline.end(owner).await);
        let after_one = f.db.offline_sessions(owner);
        assert!(f.offline.end(owner).await);
        assert_eq!(f.db.offline_sessions(owner), after_one);
        assert!(f.offline.check_active(owner).await.is_none());
    }

    #[tokio::test]
    async fn restarting_resets_the_clock() {
        let f = fixture();
        let owner = Uuid::new_v4();
        f.offline.start(owner).await.unwrap();
        f.clock.advance(Duration::minutes(5));
        f.offline.start(owner).await.unwrap();

        let session = f.offline.check_active(owner).await.unwrap();
        assert_eq!(remaining_seconds(&session, f.clock.now()), OFFLINE_WINDOW_SECS);
    }

    #[tokio::test]
    async fn failed_start_changes_nothing() {
        let f = fixture();
        let owner = Uuid::new_v4();
        f.db.set_failing(true);
        assert!(f.offline.start(owner).await.is_none());
        assert!(!f.offline.end(owner).await);

        f.db.set_failing(false);
        assert!(f.db.offline_sessions(owner).is_empty());
    }

    #[tokio::test]
    async fn capabilities_follow_the_active_session() {
        let f = fixture();
        let owner = Uuid::new_v4();
        assert!(f.offline.capabilities(owner).await.allows(Capability::AccessWallet));

        f.offline.start(owner).await.unwrap();
        let caps = f.offline.capabilities(owner).await;
        assert!(!caps.allows(Capability::AccessWallet));
        assert!(caps.allows(Capability::UseAiAssistant));
    }

    #[test]
    fn countdown_reports_expiry_exactly_once() {
        let mut countdown = Countdown::new(2);
        assert_eq!(countdown.tick(), Tick::Running(1));
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.tick(), Tick::Stopped);
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn remaining_time_is_formatted_as_minutes_and_seconds() {
        assert_eq!(format_remaining(900), "15:00");
        assert_eq!(format_remaining(65), "1:05");
        assert_eq!(format_remaining(0), "0:00");
    }

    #[tokio::test(start_paused = true)]
    async fn runner_ends_the_session_when_the_countdown_expires() {
        let f = fixture();
        let owner = Uuid::new_v4();
        f.offline.start(owner).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = CountdownRunner::new();
        runner.restart(f.offline.clone(), owner, Countdown::new(3), tx);

        assert_eq!(rx.recv().await, Some(Tick::Running(2)));
        assert_eq!(rx.recv().await, Some(Tick::Running(1)));
        assert_eq!(rx.recv().await, Some(Tick::Expired));
        assert_eq!(rx.recv().await, None);
        assert_eq!(f.db.active_offline_sessions(owner), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_the_runner_cancels_the_previous_countdown() {
        let f = fixture();
        let owner = Uuid::new_v4();

        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();
        let mut runner = CountdownRunner::new();
        runner.restart(f.offline.clone(), owner, Countdown::new(100), first_tx);
        assert_eq!(first_rx.recv().await, Some(Tick::Running(99)));

        runner.restart(f.offline.clone(), owner, Countdown::new(50), second_tx);
        assert_eq!(second_rx.recv().await, Some(Tick::Running(49)));
        // The first task dropped its sender when it was cancelled.
        assert_eq!(first_rx.recv().await, None);

        runner.stop();
        assert!(!runner.is_running());
    }
}
