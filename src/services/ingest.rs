//! Frame event ingest
//!
//! Folds one upstream detection batch into the zone-transit aggregator and
//! builds a `DisplaySnapshot` per frame. Region and line-crossing counters are
//! computed upstream and copied through untouched.

use crate::domain::types::{
    ClassId, DetectionBatch, DisplaySnapshot, FrameAnalytics, FrameMeta, ObjectId, CLASS_ID_BUS,
    CLASS_ID_CAR,
};
use crate::services::transit::{TransitUpdate, ZoneTransitAggregator};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::{info, warn};

/// A transit completed during ingest, ready for publishing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedTransit {
    pub object_id: ObjectId,
    pub class_id: ClassId,
    pub entry: String,
    pub exit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    pub frame_num: u64,
    pub source_id: u32,
}

/// Result of ingesting one detection batch
#[derive(Debug, Default)]
pub struct IngestReport {
    /// One snapshot per frame, in frame order
    pub snapshots: Vec<DisplaySnapshot>,
    pub transits: Vec<CompletedTransit>,
    /// Observations skipped because of an unknown zone label
    pub skipped: usize,
}

/// Ingest a full detection batch
pub fn ingest_batch(aggregator: &mut ZoneTransitAggregator, batch: &DetectionBatch) -> IngestReport {
    let mut report = IngestReport { snapshots: Vec::with_capacity(batch.frames.len()), ..Default::default() };
    let status = batch.status.as_deref().unwrap_or_default();

    for frame in &batch.frames {
        let snapshot = ingest_frame(aggregator, frame, status, &mut report);
        report.snapshots.push(snapshot);
    }

    report
}

fn ingest_frame(
    aggregator: &mut ZoneTransitAggregator,
    frame: &FrameMeta,
    status: &str,
    report: &mut IngestReport,
) -> DisplaySnapshot {
    let mut snapshot = DisplaySnapshot {
        frame_num: frame.frame_num,
        source_id: frame.source_id,
        status_line: status.to_string(),
        ..Default::default()
    };

    for object in &frame.objects {
        match object.class_id.0 {
            CLASS_ID_BUS => snapshot.bus_count += 1,
            CLASS_ID_CAR => snapshot.car_count += 1,
            _ => {}
        }

        match aggregator.on_zone_status(object.object_id, &object.crossings) {
            Ok(TransitUpdate::Crossed { entry, exit }) => {
                let catalog = aggregator.catalog();
                let entry = catalog.label(entry).unwrap_or_default().to_string();
                let exit = catalog.label(exit).unwrap_or_default().to_string();
                info!(object_id = %object.object_id, entry = %entry, exit = %exit, "object_exited");
                report.transits.push(CompletedTransit {
                    object_id: object.object_id,
                    class_id: object.class_id,
                    entry,
                    exit,
                    direction: object.direction.clone(),
                    frame_num: frame.frame_num,
                    source_id: frame.source_id,
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(object_id = %object.object_id, frame = %frame.frame_num, error = %e, "zone_status_skipped");
                report.skipped += 1;
            }
        }
    }

    snapshot.vehicle_count = snapshot.bus_count + snapshot.car_count;

    if let Some(analytics) = &frame.analytics {
        apply_analytics(&mut snapshot, analytics);
    }

    snapshot
}

/// Copy upstream frame counters into the snapshot
fn apply_analytics(snapshot: &mut DisplaySnapshot, analytics: &FrameAnalytics) {
    let mut region_line = String::new();
    for (region, count) in &analytics.roi_counts {
        if !region_line.is_empty() {
            region_line.push_str(", ");
        }
        let _ = write!(region_line, "Vehicles in {} = {}", region, count);
        if analytics.overcrowding.get(region).copied().unwrap_or(false) {
            region_line.push_str(" (overcrowded)");
        }
    }
    snapshot.region_line = region_line;

    snapshot.overcrowded =
        analytics.overcrowding.iter().filter(|(_, flag)| **flag).map(|(region, _)| region.clone()).collect();
    snapshot.crossings = analytics.crossing_cumulative.clone();
    snapshot.crossings_current = analytics.crossing_current.clone();
}
