// Clip cache module
// Per-table alert clips, preloaded or opened on demand

pub mod clip_cache;
pub mod locator;

pub use clip_cache::{ClipCache, Tier};
pub use locator::ClipLocator;
