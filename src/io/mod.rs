//! IO modules - external system interfaces
//!
//! - `publisher` - MQTT telemetry publisher with a background delivery poll loop
//! - `bootstrap` - ensure-exists handshake for the destination topic
//! - `broker_event` - classification of client events for the caller's handler
//! - `telemetry` - typed transit and matrix payloads
//! - `batch_reader` - JSONL detection batches from a file or stdin

pub mod batch_reader;
pub mod bootstrap;
pub mod broker_event;
pub mod publisher;
pub mod telemetry;

// Re-export commonly used types
pub use batch_reader::{parse_batch_line, BatchReader, BatchSource};
pub use bootstrap::{BootstrapOutcome, TopicBootstrap};
pub use broker_event::{BrokerErrorCode, BrokerEvent, BrokerEventHandler, BrokerEventKind, LogEventHandler};
pub use publisher::{PublisherConfig, TelemetryPublisher, TelemetrySender};
pub use telemetry::{MatrixPayload, TelemetryEmitter, TransitPayload};
