//! Domain models - zones, upstream detections and display snapshots
//!
//! - `ZoneCatalog` - fixed ordered set of directional zones
//! - `DetectionBatch` - per-batch object observations and frame counters
//! - `DisplaySnapshot` - per-frame view handed to the overlay renderer

pub mod types;
pub mod zones;

// Re-export commonly used types at module level
pub use types::{ClassId, DetectionBatch, DisplaySnapshot, FrameAnalytics, FrameMeta, ObjectId, ObjectObservation};
pub use zones::{ZoneCatalog, ZoneIndex};
