//! Services - zone-transit business logic
//!
//! - `transit` - transit record and entry/exit crossing matrix
//! - `ingest` - folds detection batches into the aggregator and builds display snapshots

pub mod ingest;
pub mod transit;

// Re-export commonly used types
pub use ingest::{ingest_batch, CompletedTransit, IngestReport};
pub use transit::{CrossingMatrix, CrossingMatrixView, CrossingPolicy, TransitUpdate, ZoneTransitAggregator};
