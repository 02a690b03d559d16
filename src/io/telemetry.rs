//! Typed telemetry payloads published on the transit topic
//!
//! Every message carries a `type` tag so consumers can multiplex the topic:
//! - `transit` - one completed entry/exit pair
//! - `matrix` - periodic crossing-matrix snapshot

use crate::infra::metrics::{epoch_ms, DeliveryStats};
use crate::io::publisher::TelemetrySender;
use crate::services::ingest::CompletedTransit;
use crate::services::transit::CrossingMatrixView;
use serde::Serialize;
use tracing::{debug, warn};

/// Payload for a completed transit
#[derive(Debug, Clone, Serialize)]
pub struct TransitPayload<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub ts: u64,
    #[serde(flatten)]
    pub transit: &'a CompletedTransit,
    /// `bus`, `car` or `other`
    pub class: &'static str,
}

impl<'a> TransitPayload<'a> {
    pub fn new(transit: &'a CompletedTransit) -> Self {
        Self { kind: "transit", ts: epoch_ms(), transit, class: transit.class_id.as_str() }
    }
}

/// Payload for a crossing-matrix snapshot
#[derive(Debug, Clone, Serialize)]
pub struct MatrixPayload<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub ts: u64,
    pub total: u64,
    /// Objects with a recorded entry zone
    pub tracked: usize,
    #[serde(flatten)]
    pub matrix: &'a CrossingMatrixView,
}

impl<'a> MatrixPayload<'a> {
    pub fn new(matrix: &'a CrossingMatrixView, tracked: usize) -> Self {
        Self { kind: "matrix", ts: epoch_ms(), total: matrix.total(), tracked, matrix }
    }
}

/// Serializes payloads and hands them to the publisher
#[derive(Clone)]
pub struct TelemetryEmitter {
    sender: TelemetrySender,
}

impl TelemetryEmitter {
    pub fn new(sender: TelemetrySender) -> Self {
        Self { sender }
    }

    /// Returns false when the payload could not be enqueued
    pub fn send_transit(&self, transit: &CompletedTransit) -> bool {
        self.send(&TransitPayload::new(transit), "transit")
    }

    pub fn send_matrix(&self, matrix: &CrossingMatrixView, tracked: usize) -> bool {
        self.send(&MatrixPayload::new(matrix, tracked), "matrix")
    }

    pub fn stats(&self) -> DeliveryStats {
        self.sender.stats()
    }

    fn send<T: Serialize>(&self, payload: &T, kind: &str) -> bool {
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(kind = %kind, error = %e, "telemetry_serialize_failed");
                return false;
            }
        };

        let queued = self.sender.publish(&bytes);
        if !queued {
            debug!(kind = %kind, topic = %self.sender.topic(), "telemetry_dropped");
        }
        queued
    }
}
