// Two-tier clip cache: preloaded handles plus on-demand fallback
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::locator::ClipLocator;
use crate::audio::AudioSink;
use crate::notify::TableKey;

/// Which tier satisfied a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Cached,
    OnDemand,
}

pub struct ClipCache<S: AudioSink> {
    sink: Arc<S>,
    locator: ClipLocator,
    entries: RwLock<HashMap<TableKey, S::Clip>>,
}

impl<S: AudioSink> ClipCache<S> {
    pub fn new(sink: Arc<S>, locator: ClipLocator) -> Self {
        Self {
            sink,
            locator,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn locator(&self) -> &ClipLocator {
        &self.locator
    }

    /// Open a handle for every key. Loading continues in the background;
    /// keys already cached keep their handle.
    pub fn preload<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a TableKey>,
    {
        let mut entries = self.entries.write();
        for key in keys {
            if entries.contains_key(key) {
                continue;
            }
            let clip = self.sink.open(&self.locator.path_for(key));
            entries.insert(key.clone(), clip);
        }
        tracing::debug!(count = entries.len(), "clip cache preloaded");
    }

    pub fn get(&self, key: &TableKey) -> Option<S::Clip> {
        self.entries.read().get(key).cloned()
    }

    /// Fresh, uncached handle for a table outside the preload set
    pub fn load_on_demand(&self, key: &TableKey) -> S::Clip {
        self.sink.open(&self.locator.path_for(key))
    }

    pub fn resolve(&self, key: &TableKey) -> (S::Clip, Tier) {
        match self.get(key) {
            Some(clip) => (clip, Tier::Cached),
            None => (self.load_on_demand(key), Tier::OnDemand),
        }
    }

    pub fn contains(&self, key: &TableKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Halt and drop every preloaded handle
    pub fn release(&self) {
        let drained: Vec<S::Clip> = self.entries.write().drain().map(|(_, clip)| clip).collect();
        for clip in &drained {
            self.sink.halt(clip);
        }
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "clip cache released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackError;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};

    #[derive(Default)]
    struct CountingSink {
        opened: Mutex<Vec<PathBuf>>,
        halted: Mutex<Vec<PathBuf>>,
    }

    impl AudioSink for CountingSink {
        type Clip = PathBuf;

        fn open(&self, path: &Path) -> PathBuf {
            self.opened.lock().push(path.to_path_buf());
            path.to_path_buf()
        }

        fn play(&self, _clip: &PathBuf) -> BoxFuture<'static, Result<(), PlaybackError>> {
            Box::pin(async { Ok(()) })
        }

        fn halt(&self, clip: &PathBuf) {
            self.halted.lock().push(clip.clone());
        }
    }

    fn key(s: &str) -> TableKey {
        TableKey::parse(s).unwrap()
    }

    fn cache() -> (Arc<CountingSink>, ClipCache<CountingSink>) {
        let sink = Arc::new(CountingSink::default());
        let locator = ClipLocator::new("/sounds", "table{table}.mp3").unwrap();
        (Arc::clone(&sink), ClipCache::new(sink, locator))
    }

    #[test]
    fn test_preload_opens_each_key_once() {
        let (sink, cache) = cache();
        cache.preload(&[key("1"), key("2")]);
        cache.preload(&[key("2")]);
        assert_eq!(sink.opened.lock().len(), 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key("1")));
    }

    #[test]
    fn test_get_does_not_load() {
        let (sink, cache) = cache();
        assert!(cache.get(&key("4")).is_none());
        assert!(sink.opened.lock().is_empty());
    }

    #[test]
    fn test_resolve_tiers() {
        let (sink, cache) = cache();
        cache.preload(&[key("1")]);

        let (clip, tier) = cache.resolve(&key("1"));
        assert_eq!(tier, Tier::Cached);
        assert_eq!(clip, PathBuf::from("/sounds/table1.mp3"));
        assert_eq!(sink.opened.lock().len(), 1);

        let (clip, tier) = cache.resolve(&key("9"));
        assert_eq!(tier, Tier::OnDemand);
        assert_eq!(clip, PathBuf::from("/sounds/table9.mp3"));
        cache.resolve(&key("9"));
        assert_eq!(sink.opened.lock().len(), 3);
        assert!(!cache.contains(&key("9")));
    }

    #[test]
    fn test_release_is_idempotent() {
        let (sink, cache) = cache();
        cache.preload(&[key("1"), key("2")]);
        cache.release();
        cache.release();
        assert!(cache.is_empty());
        assert_eq!(sink.halted.lock().len(), 2);
    }
}
