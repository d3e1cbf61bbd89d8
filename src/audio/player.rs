// Clip playback on the default output device
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;

use super::decoder::{load_clip, PcmClip};
use super::output::AudioOutput;
use super::sink::AudioSink;
use crate::error::{AudioError, PlaybackError};

/// Handle to one alert clip. Decoding happens once, on first use or preload.
#[derive(Clone)]
pub struct ClipHandle {
    inner: Arc<ClipInner>,
}

struct ClipInner {
    path: PathBuf,
    pcm: OnceCell<Result<Arc<PcmClip>, PlaybackError>>,
    // Halt flag of the play in progress, if any. Each play gets a fresh one
    // so a finished or halted play can never touch a later one.
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl ClipInner {
    fn begin_play(&self) -> Arc<AtomicBool> {
        let token = Arc::new(AtomicBool::new(false));
        if let Some(previous) = self.current.lock().replace(Arc::clone(&token)) {
            previous.store(true, Ordering::SeqCst);
        }
        token
    }

    fn end_play(&self, token: &Arc<AtomicBool>) {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|t| Arc::ptr_eq(t, token)) {
            *current = None;
        }
    }

    /// Returns true if a play was in progress
    fn halt(&self) -> bool {
        match self.current.lock().take() {
            Some(token) => {
                token.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

impl ClipHandle {
    fn new(path: &Path) -> Self {
        Self {
            inner: Arc::new(ClipInner {
                path: path.to_path_buf(),
                pcm: OnceCell::new(),
                current: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether decoding has finished (successfully or not)
    pub fn is_loaded(&self) -> bool {
        self.inner.pcm.initialized()
    }
}

impl std::fmt::Debug for ClipHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipHandle")
            .field("path", &self.inner.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// `AudioSink` backed by cpal
pub struct CpalSink {
    output: Arc<AudioOutput>,
    runtime: Handle,
}

impl CpalSink {
    /// Open the default output device. Must be called inside a tokio runtime.
    pub fn new(volume: f32) -> Result<Self, AudioError> {
        let runtime = Handle::try_current()
            .map_err(|_| AudioError::Stream("no tokio runtime for clip loading".into()))?;
        let output = AudioOutput::start(volume)?;
        Ok(Self {
            output: Arc::new(output),
            runtime,
        })
    }

    pub fn set_volume(&self, volume: f32) {
        self.output.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.output.volume()
    }

    fn load(&self, clip: &ClipHandle) -> BoxFuture<'static, Result<Arc<PcmClip>, PlaybackError>> {
        let inner = Arc::clone(&clip.inner);
        let channels = self.output.channels() as usize;
        let sample_rate = self.output.sample_rate();

        Box::pin(async move {
            inner
                .pcm
                .get_or_init(|| {
                    let path = inner.path.clone();
                    async move {
                        let shown = path.display().to_string();
                        let decoded = tokio::task::spawn_blocking(move || {
                            load_clip(&path, channels, sample_rate)
                        })
                        .await;
                        match decoded {
                            Ok(Ok(pcm)) => {
                                tracing::debug!(path = %shown, frames = pcm.frames(), "clip decoded");
                                Ok(Arc::new(pcm))
                            }
                            Ok(Err(e)) => Err(PlaybackError::Load {
                                path: shown,
                                reason: e.to_string(),
                            }),
                            Err(e) => Err(PlaybackError::Load {
                                path: shown,
                                reason: e.to_string(),
                            }),
                        }
                    }
                })
                .await
                .clone()
        })
    }
}

impl AudioSink for CpalSink {
    type Clip = ClipHandle;

    fn open(&self, path: &Path) -> ClipHandle {
        let clip = ClipHandle::new(path);
        let load = self.load(&clip);
        self.runtime.spawn(async move {
            if let Err(e) = load.await {
                tracing::warn!("{}", e);
            }
        });
        clip
    }

    fn play(&self, clip: &ClipHandle) -> BoxFuture<'static, Result<(), PlaybackError>> {
        let inner = Arc::clone(&clip.inner);
        let output = Arc::clone(&self.output);
        // Registered before returning so a halt issued while loading still wins
        let token = inner.begin_play();
        let load = self.load(clip);

        Box::pin(async move {
            let halted = Arc::clone(&token);
            let result = async move {
                let pcm = load.await?;
                if halted.load(Ordering::SeqCst) {
                    return Err(PlaybackError::Halted);
                }
                tokio::task::spawn_blocking(move || output.play_blocking(&pcm.samples, &halted))
                    .await
                    .map_err(|e| PlaybackError::Device(e.to_string()))?
            }
            .await;
            inner.end_play(&token);
            result
        })
    }

    fn halt(&self, clip: &ClipHandle) {
        if clip.inner.halt() {
            self.output.clear();
        }
    }
}
