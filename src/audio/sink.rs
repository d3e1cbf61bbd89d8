// Playback seam between the notification engine and the host audio output
use futures::future::BoxFuture;
use std::path::Path;

use crate::error::PlaybackError;

/// Host audio output as seen by the engine.
///
/// A clip is a cheap, cloneable handle to one playable file. `open` must not
/// block on decoding: loading starts in the background and `play` waits for
/// it. The future returned by `play` resolves `Ok(())` when the clip reaches
/// its natural end, or rejects with the reason it could not be played.
pub trait AudioSink: Send + Sync + 'static {
    type Clip: Clone + Send + Sync + 'static;

    /// Create a handle bound to `path` and start loading it.
    fn open(&self, path: &Path) -> Self::Clip;

    /// Start playback from the beginning of the clip.
    fn play(&self, clip: &Self::Clip) -> BoxFuture<'static, Result<(), PlaybackError>>;

    /// Stop output immediately and rewind. Safe on a clip that is not playing.
    fn halt(&self, clip: &Self::Clip);
}
