// Audio playback module
// Uses Symphonia for decoding and cpal for output

pub mod decoder;
pub mod output;
pub mod player;
pub mod sink;

pub use player::{ClipHandle, CpalSink};
pub use sink::AudioSink;
