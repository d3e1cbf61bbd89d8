// Settings module
// JSON configuration for clips, playback and polling

#[allow(clippy::module_inception)]
pub mod settings;

pub use settings::Settings;
