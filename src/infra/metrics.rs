//! Lock-free delivery metrics for the telemetry publisher
//!
//! The caller context records enqueue outcomes while the delivery poll loop
//! records acknowledgements and errors, so every counter is an atomic.
//!
//! NOTE: All atomics use Relaxed ordering; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;

/// Milliseconds since the Unix epoch
pub fn epoch_ms() -> u64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64
}

/// Delivery counters shared between `publish` and the poll loop
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    /// Messages handed to the client send queue
    enqueued: AtomicU64,
    /// Messages rejected by the send queue (full or closed)
    enqueue_failed: AtomicU64,
    /// Payload bytes handed to the send queue
    bytes_enqueued: AtomicU64,
    /// Publish packets written to the network
    sent: AtomicU64,
    /// Publish acknowledgements received from the broker
    delivered: AtomicU64,
    /// Transport or protocol errors surfaced by the poll loop
    errors: AtomicU64,
    /// Successful (re)connections
    connects: AtomicU64,
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_enqueued(&self, bytes: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.bytes_enqueued.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_enqueue_failed(&self) {
        self.enqueue_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            ts: epoch_ms(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            enqueue_failed: self.enqueue_failed.load(Ordering::Relaxed),
            bytes_enqueued: self.bytes_enqueued.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
        }
    }
}

/// Serializable statistics snapshot, emitted as a `Stats` broker event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Timestamp (epoch ms)
    pub ts: u64,
    pub enqueued: u64,
    pub enqueue_failed: u64,
    pub bytes_enqueued: u64,
    pub sent: u64,
    pub delivered: u64,
    pub errors: u64,
    pub connects: u64,
}

impl DeliveryStats {
    /// Messages accepted by the client but not yet acknowledged
    pub fn in_flight(&self) -> u64 {
        self.enqueued.saturating_sub(self.delivered)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
