// Tablechime - order-arrival notification engine
// Module declarations
pub mod audio;
pub mod cache;
pub mod commands;
pub mod error;
pub mod library;
pub mod notify;
pub mod settings;
pub mod state;

pub use audio::{AudioSink, ClipHandle, CpalSink};
pub use cache::{ClipCache, ClipLocator, Tier};
pub use error::{AudioError, NotifyError, PlaybackError};
pub use notify::{
    parse_snapshot, Ident, NotificationEngine, Order, RequestOutcome, Snapshot, SnapshotReport, TableKey,
};
pub use settings::Settings;
pub use state::PlaybackState;
