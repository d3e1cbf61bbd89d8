// Playback state machine for the single alert slot
use serde::Serialize;
use tokio::sync::watch;

use crate::notify::TableKey;

/// What the UI shows: whether an alert is sounding and for which table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_table: Option<TableKey>,
}

impl PlaybackState {
    pub fn idle() -> Self {
        Self::default()
    }
}

struct Active<C> {
    table: TableKey,
    clip: C,
    generation: u64,
}

/// The one playback slot an engine owns.
///
/// `Idle` is `active == None`. Every entry into `Playing` gets a new
/// generation; completion signals carry it and are ignored once stale.
pub(crate) struct PlaybackSlot<C> {
    active: Option<Active<C>>,
    generation: u64,
    tx: watch::Sender<PlaybackState>,
}

impl<C> PlaybackSlot<C> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PlaybackState::idle());
        Self {
            active: None,
            generation: 0,
            tx,
        }
    }

    pub fn state(&self) -> PlaybackState {
        match &self.active {
            Some(active) => PlaybackState {
                is_playing: true,
                current_table: Some(active.table.clone()),
            },
            None => PlaybackState::idle(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.tx.subscribe()
    }

    /// Idle -> Playing. Caller must have checked `is_playing()` under the same lock.
    pub fn begin(&mut self, table: TableKey, clip: C) -> u64 {
        debug_assert!(self.active.is_none());
        self.generation += 1;
        self.active = Some(Active {
            table,
            clip,
            generation: self.generation,
        });
        self.publish();
        self.generation
    }

    /// Playing -> Idle on completion or failure of `generation`.
    /// Returns the table that finished, or None if the signal was stale.
    pub fn finish(&mut self, generation: u64) -> Option<TableKey> {
        match &self.active {
            Some(active) if active.generation == generation => {
                let table = self.active.take().map(|a| a.table);
                self.publish();
                table
            }
            _ => None,
        }
    }

    /// Playing -> Idle on stop. Hands back the clip so it can be halted.
    pub fn take(&mut self) -> Option<(TableKey, C)> {
        let active = self.active.take()?;
        self.publish();
        Some((active.table, active.clip))
    }

    fn publish(&self) {
        self.tx.send_replace(self.state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> TableKey {
        TableKey::parse(s).unwrap()
    }

    #[test]
    fn test_begin_and_finish() {
        let mut slot = PlaybackSlot::<()>::new();
        let generation = slot.begin(key("5"), ());
        assert_eq!(
            slot.state(),
            PlaybackState {
                is_playing: true,
                current_table: Some(key("5")),
            }
        );
        assert_eq!(slot.finish(generation), Some(key("5")));
        assert_eq!(slot.state(), PlaybackState::idle());
    }

    #[test]
    fn test_stale_finish_is_ignored() {
        let mut slot = PlaybackSlot::<()>::new();
        let first = slot.begin(key("1"), ());
        assert!(slot.take().is_some());
        let second = slot.begin(key("2"), ());
        assert_ne!(first, second);
        assert_eq!(slot.finish(first), None);
        assert!(slot.is_playing());
    }

    #[test]
    fn test_take_when_idle() {
        let mut slot = PlaybackSlot::<()>::new();
        assert!(slot.take().is_none());
        assert_eq!(slot.state(), PlaybackState::idle());
    }

    #[test]
    fn test_subscribers_see_transitions() {
        let mut slot = PlaybackSlot::<()>::new();
        let rx = slot.subscribe();
        slot.begin(key("9"), ());
        assert!(rx.borrow().is_playing);
        slot.take();
        assert!(!rx.borrow().is_playing);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(PlaybackState {
            is_playing: true,
            current_table: Some(key("3")),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"isPlaying": true, "currentTable": "3"}));
    }
}
