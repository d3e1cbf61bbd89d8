// Order-arrival notification engine
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::order::{Ident, Order};
use super::table_key::TableKey;
use crate::audio::AudioSink;
use crate::cache::{ClipCache, ClipLocator, Tier};
use crate::error::{NotifyError, Result};
use crate::state::{PlaybackSlot, PlaybackState};

/// Result of one playback request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RequestOutcome {
    Started { table: TableKey, tier: Tier },
    /// Another alert was sounding; the request was dropped
    Skipped { table: TableKey },
}

/// What one snapshot did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    /// True if this snapshot only established the baseline
    pub baseline: bool,
    /// Ids of newly arrived orders, in snapshot order
    pub arrivals: Vec<Ident>,
    pub started: Option<TableKey>,
    pub skipped: usize,
    pub invalid: usize,
}

/// Watches successive order snapshots and sounds one alert per new order.
///
/// At most one alert plays at a time: a request that finds the slot busy is
/// dropped, not queued. Order ids seen in the retained snapshot never alert
/// again.
pub struct NotificationEngine<S: AudioSink> {
    sink: Arc<S>,
    cache: ClipCache<S>,
    slot: Arc<Mutex<PlaybackSlot<S::Clip>>>,
    previous: Mutex<Option<Vec<Order>>>,
    runtime: Handle,
}

impl<S: AudioSink> NotificationEngine<S> {
    /// Build the engine and preload clips for `preload`.
    /// Must be called inside a tokio runtime; playback tasks run on it.
    pub fn new<'a, I>(sink: Arc<S>, locator: ClipLocator, preload: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a TableKey>,
    {
        let runtime = Handle::try_current().map_err(|_| NotifyError::NoRuntime)?;
        let cache = ClipCache::new(Arc::clone(&sink), locator);
        cache.preload(preload);

        Ok(Self {
            sink,
            cache,
            slot: Arc::new(Mutex::new(PlaybackSlot::new())),
            previous: Mutex::new(None),
            runtime,
        })
    }

    pub fn cache(&self) -> &ClipCache<S> {
        &self.cache
    }

    /// Diff `snapshot` against the previous one and alert for new orders.
    pub fn on_snapshot(&self, snapshot: Vec<Order>) -> SnapshotReport {
        let mut previous = self.previous.lock();
        let mut report = SnapshotReport::default();

        if previous.is_none() {
            // First snapshot: whatever is already live is backlog, not news
            tracing::debug!(orders = snapshot.len(), "baseline snapshot recorded");
            report.baseline = true;
            *previous = Some(snapshot);
            return report;
        }

        let seen: HashSet<&Ident> = previous.iter().flatten().map(|o| &o.id).collect();
        let arrivals: Vec<&Order> = snapshot.iter().filter(|o| !seen.contains(&o.id)).collect();

        for order in arrivals {
            report.arrivals.push(order.id.clone());
            let key = match order.table_identifier.table_key() {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(order = %order.id, "{}", e);
                    report.invalid += 1;
                    continue;
                }
            };
            match self.request(key) {
                RequestOutcome::Started { table, .. } => report.started = Some(table),
                RequestOutcome::Skipped { .. } => report.skipped += 1,
            }
        }

        *previous = Some(snapshot);
        report
    }

    /// Sound the alert for one table as if its order had just arrived
    pub fn manual_trigger(&self, table_identifier: impl Into<Ident>) -> Result<RequestOutcome> {
        let key = table_identifier.into().table_key()?;
        Ok(self.request(key))
    }

    fn request(&self, key: TableKey) -> RequestOutcome {
        let mut slot = self.slot.lock();
        if slot.is_playing() {
            tracing::debug!(table = %key, "alert already playing, request dropped");
            return RequestOutcome::Skipped { table: key };
        }

        let (clip, tier) = self.cache.resolve(&key);
        let playback = self.sink.play(&clip);
        let generation = slot.begin(key.clone(), clip);
        drop(slot);

        tracing::info!(table = %key, ?tier, "playing order alert");

        let slot = Arc::clone(&self.slot);
        self.runtime.spawn(async move {
            let result = playback.await;
            let finished = slot.lock().finish(generation);
            match (result, finished) {
                (Ok(()), Some(table)) => tracing::info!(table = %table, "order alert finished"),
                (Err(e), Some(table)) => tracing::warn!(table = %table, "order alert failed: {}", e),
                // Stopped or superseded; nothing to report
                (_, None) => {}
            }
        });

        RequestOutcome::Started { table: key, tier }
    }

    /// Silence the current alert. No-op when idle.
    pub fn stop(&self) {
        let mut slot = self.slot.lock();
        if let Some((table, clip)) = slot.take() {
            // Halt under the lock so a new request cannot start in between
            self.sink.halt(&clip);
            tracing::info!(table = %table, "order alert stopped");
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.slot.lock().state()
    }

    /// Receive every state change, for UI binding
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.slot.lock().subscribe()
    }

    /// Forget the retained snapshot; the next one becomes the new baseline
    pub fn reset_baseline(&self) {
        *self.previous.lock() = None;
    }

    /// Stop playback and release every preloaded clip. Idempotent.
    pub fn shutdown(&self) {
        self.stop();
        self.cache.release();
    }
}

impl<S: AudioSink> Drop for NotificationEngine<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
