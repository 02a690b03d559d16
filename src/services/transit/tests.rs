//! Tests for the zone-transit aggregator

use super::*;
use crate::error::ErrorKind;

fn zone(label: &str) -> ZoneIndex {
    ZoneCatalog::default().index_of(label).unwrap()
}

fn create_aggregator() -> ZoneTransitAggregator {
    ZoneTransitAggregator::new(ZoneCatalog::default())
}

#[test]
fn test_first_sighting_records_entry_only() {
    let mut agg = create_aggregator();

    let update = agg.on_zone_status(ObjectId(42), &["N-exit"]).unwrap();
    assert_eq!(update, TransitUpdate::Entered { entry: zone("N") });
    assert_eq!(agg.entry_zone(ObjectId(42)), Some(zone("N")));
    assert_eq!(agg.total_crossings(), 0);
    assert_eq!(agg.snapshot().total(), 0);
}

#[test]
fn test_second_crossing_increments_single_cell() {
    let mut agg = create_aggregator();
    agg.on_zone_status(ObjectId(42), &["N-exit"]).unwrap();
    let before = agg.snapshot();

    let update = agg.on_zone_status(ObjectId(42), &["SE-exit"]).unwrap();
    assert_eq!(update, TransitUpdate::Crossed { entry: zone("N"), exit: zone("SE") });

    let after = agg.snapshot();
    for (r, row) in after.counts.iter().enumerate() {
        for (c, count) in row.iter().enumerate() {
            let expected = if (r, c) == (zone("N").0, zone("SE").0) {
                before.counts[r][c] + 1
            } else {
                before.counts[r][c]
            };
            assert_eq!(*count, expected, "cell ({}, {})", r, c);
        }
    }
    assert_eq!(after.get("N", "SE"), Some(1));
}

#[test]
fn test_every_zone_pair_counts_exactly_once() {
    let catalog = ZoneCatalog::default();
    let mut agg = ZoneTransitAggregator::new(catalog.clone());
    let mut next_id = 0u64;

    for entry in catalog.labels() {
        for exit in catalog.labels() {
            next_id += 1;
            let id = ObjectId(next_id);
            agg.on_zone_status(id, &[format!("{}-exit", entry)]).unwrap();
            agg.on_zone_status(id, &[format!("{}-exit", exit)]).unwrap();
        }
    }

    let view = agg.snapshot();
    for entry in catalog.labels() {
        for exit in catalog.labels() {
            assert_eq!(view.get(entry, exit), Some(1), "{} -> {}", entry, exit);
        }
    }
    assert_eq!(agg.tracked_objects(), 25);
}

#[test]
fn test_entry_zone_fixed_at_first_observation() {
    let mut agg = create_aggregator();
    agg.on_zone_status(ObjectId(7), &["SW-exit"]).unwrap();
    agg.on_zone_status(ObjectId(7), &["NE-exit"]).unwrap();
    agg.on_zone_status(ObjectId(7), &["NW-exit"]).unwrap();

    assert_eq!(agg.entry_zone(ObjectId(7)), Some(zone("SW")));
    assert_eq!(agg.tracked_objects(), 1);
}

#[test]
fn test_first_exit_only_policy_ignores_later_crossings() {
    let mut agg = create_aggregator();
    agg.on_zone_status(ObjectId(1), &["N-exit"]).unwrap();
    agg.on_zone_status(ObjectId(1), &["SE-exit"]).unwrap();

    let update = agg.on_zone_status(ObjectId(1), &["NW-exit"]).unwrap();
    assert_eq!(update, TransitUpdate::AlreadyCounted { entry: zone("N") });

    let view = agg.snapshot();
    assert_eq!(view.get("N", "SE"), Some(1));
    assert_eq!(view.get("N", "NW"), Some(0));
    assert_eq!(agg.total_crossings(), 1);
    assert_eq!(agg.record(ObjectId(1)).map(|r| r.exits), Some(1));
}

#[test]
fn test_every_exit_policy_counts_against_original_entry() {
    let mut agg = ZoneTransitAggregator::with_policy(ZoneCatalog::default(), CrossingPolicy::EveryExit);
    agg.on_zone_status(ObjectId(1), &["N-exit"]).unwrap();
    agg.on_zone_status(ObjectId(1), &["SE-exit"]).unwrap();
    agg.on_zone_status(ObjectId(1), &["NW-exit"]).unwrap();

    let view = agg.snapshot();
    assert_eq!(view.get("N", "SE"), Some(1));
    assert_eq!(view.get("N", "NW"), Some(1));
    assert_eq!(agg.entry_zone(ObjectId(1)), Some(zone("N")));
}

#[test]
fn test_unknown_label_leaves_state_unchanged() {
    let mut agg = create_aggregator();
    agg.on_zone_status(ObjectId(42), &["N-exit"]).unwrap();
    let before = agg.snapshot();

    // Unknown prefix on first sighting of a new object
    let err = agg.on_zone_status(ObjectId(99), &["XX-exit"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownZoneLabel);
    assert_eq!(agg.entry_zone(ObjectId(99)), None);

    // Unknown prefix for an object that already has an entry
    assert!(agg.on_zone_status(ObjectId(42), &["XX-exit"]).is_err());
    assert_eq!(agg.record(ObjectId(42)).map(|r| r.exits), Some(0));

    assert_eq!(agg.snapshot(), before);
    assert_eq!(agg.tracked_objects(), 1);

    // The object is still armed for a valid exit
    let update = agg.on_zone_status(ObjectId(42), &["SE-exit"]).unwrap();
    assert_eq!(update, TransitUpdate::Crossed { entry: zone("N"), exit: zone("SE") });
}

#[test]
fn test_empty_status_is_idle() {
    let mut agg = create_aggregator();
    let none: [&str; 0] = [];
    assert_eq!(agg.on_zone_status(ObjectId(5), &none).unwrap(), TransitUpdate::Idle);
    assert_eq!(agg.tracked_objects(), 0);
}

#[test]
fn test_only_first_label_is_used() {
    let mut agg = create_aggregator();
    agg.on_zone_status(ObjectId(3), &["NE-exit", "XX-exit"]).unwrap();
    assert_eq!(agg.entry_zone(ObjectId(3)), Some(zone("NE")));
}

#[test]
fn test_matrix_monotonic_across_sequence() {
    let mut agg = ZoneTransitAggregator::with_policy(ZoneCatalog::default(), CrossingPolicy::EveryExit);
    let labels = ["N-exit", "SE-exit", "XX-exit", "NW-exit", "SW-exit", "NE-exit"];
    let mut previous = agg.snapshot();

    for step in 0..60u64 {
        let id = ObjectId(step % 7);
        let label = labels[(step as usize * 5) % labels.len()];
        let _ = agg.on_zone_status(id, &[label]);

        let current = agg.snapshot();
        for (prev_row, row) in previous.counts.iter().zip(&current.counts) {
            for (p, c) in prev_row.iter().zip(row) {
                assert!(c >= p, "matrix decreased at step {}", step);
            }
        }
        previous = current;
    }
}

#[test]
fn test_snapshot_read_stability() {
    let mut agg = create_aggregator();
    agg.on_zone_status(ObjectId(1), &["N-exit"]).unwrap();
    agg.on_zone_status(ObjectId(1), &["SW-exit"]).unwrap();

    let first = agg.snapshot();
    let second = agg.snapshot();
    assert_eq!(first, second);
}

#[test]
fn test_snapshot_is_detached_copy() {
    let mut agg = create_aggregator();
    agg.on_zone_status(ObjectId(1), &["N-exit"]).unwrap();
    let before = agg.snapshot();
    agg.on_zone_status(ObjectId(1), &["NE-exit"]).unwrap();

    assert_eq!(before.total(), 0);
    assert_eq!(agg.snapshot().total(), 1);
}

#[test]
fn test_matrix_report_layout() {
    let mut agg = create_aggregator();
    agg.on_zone_status(ObjectId(42), &["N-exit"]).unwrap();
    agg.on_zone_status(ObjectId(42), &["SE-exit"]).unwrap();

    let report = agg.snapshot().to_string();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "    N NE SE SW NW");
    assert_eq!(lines[1], "N   0  0  1  0  0");
    assert_eq!(lines[5], "NW  0  0  0  0  0");
}

#[test]
fn test_snapshot_serializes_with_labels() {
    let agg = ZoneTransitAggregator::new(ZoneCatalog::new(["A", "B"]).unwrap());
    let json = serde_json::to_string(&agg.snapshot()).unwrap();
    assert_eq!(json, r#"{"zones":["A","B"],"counts":[[0,0],[0,0]]}"#);
}
