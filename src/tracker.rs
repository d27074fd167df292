// Leave runs before enter. Storage errors are logged here and go no further.

use crate::clock::{Clock, Timestamp};
use crate::config::Roster;
use crate::interval::{self, WorkInterval};
use crate::store::{HistorySink, SessionStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// One voice-state change as seen by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceTransition {
    pub identity: Option<String>,
    pub old_channel: Option<u64>,
    pub new_channel: Option<u64>,
}

#[derive(Debug, PartialEq)]
pub enum LeaveOutcome {
    /// No session was open; nothing was written.
    NoSession,
    /// The session was closed. `failed_writes` intervals could not be stored.
    Recorded {
        intervals: Vec<WorkInterval>,
        failed_writes: usize,
    },
    /// The stored join time lies after `now`; the session was dropped
    /// without history.
    Rejected,
}

pub struct PresenceTracker {
    tracked_channel: u64,
    sessions: Arc<dyn SessionStore>,
    history: Arc<dyn HistorySink>,
    clock: Arc<dyn Clock>,
    roster: Roster,
    // Serializes transitions of the same identity.
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PresenceTracker {
    pub fn new(
        tracked_channel: u64,
        sessions: Arc<dyn SessionStore>,
        history: Arc<dyn HistorySink>,
        clock: Arc<dyn Clock>,
        roster: Roster,
    ) -> Self {
        Self {
            tracked_channel,
            sessions,
            history,
            clock,
            roster,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn handle(&self, transition: PresenceTransition) {
        let Some(identity) = transition.identity.filter(|id| !id.is_empty()) else {
            return;
        };
        let (old, new) = (transition.old_channel, transition.new_channel);
        let left = old == Some(self.tracked_channel) && old != new;
        let entered = new == Some(self.tracked_channel) && old != new;
        if !left && !entered {
            return;
        }

        let lock = self.identity_lock(&identity);
        let guard = lock.lock().await;
        let now = self.clock.now();
        let member = self.roster.label(&identity);

        if left {
            match self.on_leave(&identity, now).await {
                Ok(LeaveOutcome::Recorded {
                    intervals,
                    failed_writes,
                }) if failed_writes > 0 => warn!(
                    %member,
                    stored = intervals.len() - failed_writes,
                    failed = failed_writes,
                    "leave partially recorded"
                ),
                Ok(_) => {}
                Err(e) => error!(%member, error = %e, "leave not recorded"),
            }
        }

        if entered {
            match self.on_enter(&identity, now).await {
                Ok(()) => info!(%member, channel = self.tracked_channel, at = %now, "entered"),
                Err(e) => error!(%member, error = %e, "enter not recorded"),
            }
        }

        drop(guard);
        self.release_identity_lock(&identity, lock);
    }

    /// Closes the session of `identity` at `now`. The session is deleted
    /// once the lookup succeeded, whatever happened to the history writes.
    pub async fn on_leave(
        &self,
        identity: &str,
        now: Timestamp,
    ) -> Result<LeaveOutcome, StoreError> {
        let member = self.roster.label(identity);
        let outcome = match self.sessions.get(identity).await? {
            None => {
                info!(%member, at = %now, "left without a recorded join");
                LeaveOutcome::NoSession
            }
            Some(joined_at) => {
                info!(
                    %member,
                    joined_at = %joined_at,
                    at = %now,
                    minutes = joined_at.minutes_until(&now),
                    "left"
                );
                match interval::split(identity, joined_at, now) {
                    Ok(intervals) => {
                        let failed_writes = self.write_history(&intervals).await;
                        LeaveOutcome::Recorded { intervals, failed_writes }
                    }
                    Err(e) => {
                        warn!(%member, error = %e, "dropping session with join time in the future");
                        LeaveOutcome::Rejected
                    }
                }
            }
        };

        self.sessions.delete(identity).await?;
        Ok(outcome)
    }

    /// Opens a session for `identity`, replacing any session already open.
    pub async fn on_enter(&self, identity: &str, now: Timestamp) -> Result<(), StoreError> {
        self.sessions.put(identity, now).await
    }

    async fn write_history(&self, intervals: &[WorkInterval]) -> usize {
        let mut failed = 0;
        for interval in intervals {
            match self.history.put(interval).await {
                Ok(()) => info!(
                    identity = %interval.id,
                    start_at = %interval.start_at,
                    end_at = %interval.end_at,
                    duration = format_args!("{:.2}", interval.duration),
                    "work interval stored"
                ),
                Err(e) => {
                    failed += 1;
                    error!(
                        identity = %interval.id,
                        start_at = %interval.start_at,
                        end_at = %interval.end_at,
                        error = %e,
                        "work interval not stored"
                    );
                }
            }
        }
        failed
    }

    fn identity_lock(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.entry(identity.to_string()).or_default().clone()
    }

    fn release_identity_lock(&self, identity: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // The map and `lock` are the only holders when nobody else is waiting.
        if Arc::strong_count(&lock) == 2 {
            in_flight.remove(identity);
        }
    }
}
