//! Zone-transit aggregation
//!
//! Maintains, per pipeline instance:
//! - the transit record (object id -> zone the object was first seen crossing)
//! - the N×N crossing matrix (entry zone × exit zone counts)
//!
//! The aggregator is plain owned state. Calls must be serialized by the
//! caller: the upstream pipeline delivers one detection batch at a time, so
//! no locking happens here.

mod matrix;
#[cfg(test)]
mod tests;

pub use matrix::{CrossingMatrix, CrossingMatrixView};

use crate::domain::types::ObjectId;
use crate::domain::zones::{ZoneCatalog, ZoneIndex};
use crate::error::TransitError;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::debug;

/// Whether an object can register more than one transit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingPolicy {
    /// Only the first crossing after entry is counted
    #[default]
    FirstExitOnly,
    /// Every later crossing is counted against the original entry zone
    EveryExit,
}

/// Per-object transit state. The entry zone is fixed at first sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitRecord {
    pub entry: ZoneIndex,
    /// Exits counted so far for this object
    pub exits: u32,
}

/// Outcome of a single zone-status observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitUpdate {
    /// No crossing labels this frame
    Idle,
    /// First crossing seen; recorded as the entry zone
    Entered { entry: ZoneIndex },
    /// Transit completed; the matrix cell was incremented
    Crossed { entry: ZoneIndex, exit: ZoneIndex },
    /// Object already counted and the policy does not re-arm it
    AlreadyCounted { entry: ZoneIndex },
}

/// Owned zone-transit state for one pipeline
pub struct ZoneTransitAggregator {
    catalog: ZoneCatalog,
    policy: CrossingPolicy,
    records: FxHashMap<ObjectId, TransitRecord>,
    matrix: CrossingMatrix,
}

impl ZoneTransitAggregator {
    pub fn new(catalog: ZoneCatalog) -> Self {
        Self::with_policy(catalog, CrossingPolicy::default())
    }

    pub fn with_policy(catalog: ZoneCatalog, policy: CrossingPolicy) -> Self {
        let matrix = CrossingMatrix::new(catalog.len());
        Self { catalog, policy, records: FxHashMap::default(), matrix }
    }

    pub fn catalog(&self) -> &ZoneCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> CrossingPolicy {
        self.policy
    }

    /// Apply the crossing labels observed for one object in one frame
    ///
    /// Only the first label is used. An unknown zone prefix returns
    /// `UnknownZoneLabel` and leaves all state untouched.
    pub fn on_zone_status<S: AsRef<str>>(
        &mut self,
        object_id: ObjectId,
        labels: &[S],
    ) -> Result<TransitUpdate, TransitError> {
        let Some(label) = labels.first() else {
            return Ok(TransitUpdate::Idle);
        };
        let zone = self.catalog.parse_crossing(label.as_ref())?;

        let Some(record) = self.records.get_mut(&object_id) else {
            self.records.insert(object_id, TransitRecord { entry: zone, exits: 0 });
            debug!(object_id = %object_id, entry = %zone, "transit_entry_recorded");
            return Ok(TransitUpdate::Entered { entry: zone });
        };

        if record.exits > 0 && self.policy == CrossingPolicy::FirstExitOnly {
            return Ok(TransitUpdate::AlreadyCounted { entry: record.entry });
        }

        record.exits += 1;
        self.matrix.increment(record.entry, zone);
        debug!(object_id = %object_id, entry = %record.entry, exit = %zone, "transit_exit_counted");
        Ok(TransitUpdate::Crossed { entry: record.entry, exit: zone })
    }

    /// Entry zone recorded for an object, if any
    pub fn entry_zone(&self, object_id: ObjectId) -> Option<ZoneIndex> {
        self.records.get(&object_id).map(|r| r.entry)
    }

    pub fn record(&self, object_id: ObjectId) -> Option<&TransitRecord> {
        self.records.get(&object_id)
    }

    /// Number of objects in the transit record (never shrinks)
    pub fn tracked_objects(&self) -> usize {
        self.records.len()
    }

    /// Total completed transits across all cells
    pub fn total_crossings(&self) -> u64 {
        self.matrix.total()
    }

    /// Read-only copy of the matrix paired with zone labels
    pub fn snapshot(&self) -> CrossingMatrixView {
        self.matrix.view(&self.catalog)
    }
}
