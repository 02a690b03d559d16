//! Shared types for upstream detection batches and display snapshots

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Detector class id for buses
pub const CLASS_ID_BUS: u32 = 0;
/// Detector class id for cars
pub const CLASS_ID_CAR: u32 = 1;

/// Newtype wrapper for tracker-issued object ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for detector class ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            CLASS_ID_BUS => "bus",
            CLASS_ID_CAR => "car",
            _ => "other",
        }
    }
}

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One upstream detection batch (one JSON line from the analytics stage)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionBatch {
    /// Free-text status for the batch (e.g. the fps sink's last message)
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub frames: Vec<FrameMeta>,
}

/// Per-frame detections and analytics counters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameMeta {
    #[serde(default)]
    pub frame_num: u64,
    #[serde(default)]
    pub source_id: u32,
    #[serde(default)]
    pub objects: Vec<ObjectObservation>,
    #[serde(default)]
    pub analytics: Option<FrameAnalytics>,
}

/// A tracked object as seen in one frame
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectObservation {
    pub object_id: ObjectId,
    pub class_id: ClassId,
    /// Line-crossing status labels observed this frame (`"<ZONE>-<suffix>"`)
    #[serde(default)]
    pub crossings: Vec<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

/// Frame-level counters computed upstream, passed through verbatim
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameAnalytics {
    /// Objects currently inside each region of interest
    #[serde(default)]
    pub roi_counts: BTreeMap<String, u32>,
    /// Cumulative line-crossing counts since stream start
    #[serde(default)]
    pub crossing_cumulative: BTreeMap<String, u64>,
    /// Line crossings in this frame only
    #[serde(default)]
    pub crossing_current: BTreeMap<String, u64>,
    /// Overcrowding status per region
    #[serde(default)]
    pub overcrowding: BTreeMap<String, bool>,
}

/// Display-ready view of one frame, rebuilt on every ingest call
///
/// Owned by the caller; the aggregator keeps no reference to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplaySnapshot {
    pub frame_num: u64,
    pub source_id: u32,
    /// Status text supplied upstream
    pub status_line: String,
    /// Region occupancy summary
    pub region_line: String,
    /// Crossing label -> cumulative count
    pub crossings: BTreeMap<String, u64>,
    /// Crossing label -> count in this frame
    pub crossings_current: BTreeMap<String, u64>,
    /// Regions flagged as overcrowded
    pub overcrowded: Vec<String>,
    pub bus_count: u32,
    pub car_count: u32,
    /// Buses plus cars in this frame; other classes are not counted
    pub vehicle_count: u32,
}

impl DisplaySnapshot {
    /// Text lines for the overlay: status, regions, then one line per crossing
    pub fn overlay_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(2 + self.crossings.len());
        lines.push(self.status_line.clone());
        lines.push(self.region_line.clone());
        for (label, count) in &self.crossings {
            lines.push(format!("{} = {}", label, count));
        }
        lines
    }
}
