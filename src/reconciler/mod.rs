pub mod core;
pub mod snapshot;

pub use core::StateReconciler;
pub use snapshot::{EntitySnapshot, EventIdRing, SnapshotDelta};
