// Order-arrival notifications
// Snapshot diffing and the single-slot alert engine

pub mod engine;
pub mod order;
pub mod table_key;

pub use engine::{NotificationEngine, RequestOutcome, SnapshotReport};
pub use order::{parse_snapshot, Ident, Order, Snapshot};
pub use table_key::TableKey;
