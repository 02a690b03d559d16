//! Broker event bridge
//!
//! Turns raw client events into a closed set of `BrokerEvent` variants and
//! forwards them, in arrival order, to the caller-supplied handler. The bridge
//! is owned by the delivery poll loop, so handlers always run on that task.

use crate::infra::metrics::DeliveryMetrics;
use rumqttc::{ConnectionError, Event, Outgoing, Packet, SubscribeReasonCode};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tag used for publish acknowledgements in `BrokerEvent::Other`
pub const TAG_DELIVERY_REPORT: &str = "delivery_report";

/// Classification of asynchronous broker errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerErrorCode {
    /// Socket level failure
    Io,
    /// Broker refused the connection
    Refused,
    /// Network or flush timeout
    Timeout,
    /// Unexpected packet or client state violation
    Protocol,
    /// Broker rejected a request (e.g. a subscription)
    Rejected,
    /// Client request channel closed
    Closed,
    Other,
}

impl BrokerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerErrorCode::Io => "io",
            BrokerErrorCode::Refused => "refused",
            BrokerErrorCode::Timeout => "timeout",
            BrokerErrorCode::Protocol => "protocol",
            BrokerErrorCode::Rejected => "rejected",
            BrokerErrorCode::Closed => "closed",
            BrokerErrorCode::Other => "other",
        }
    }
}

/// Event kinds, for handlers that only need to branch on the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerEventKind {
    Error,
    Stats,
    Log,
    Other,
}

/// Asynchronous event surfaced by the broker connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Error { code: BrokerErrorCode, message: String },
    /// Delivery statistics snapshot (JSON)
    Stats(String),
    Log(String),
    Other { tag: &'static str, text: String },
}

impl BrokerEvent {
    pub fn kind(&self) -> BrokerEventKind {
        match self {
            BrokerEvent::Error { .. } => BrokerEventKind::Error,
            BrokerEvent::Stats(_) => BrokerEventKind::Stats,
            BrokerEvent::Log(_) => BrokerEventKind::Log,
            BrokerEvent::Other { .. } => BrokerEventKind::Other,
        }
    }

    /// Human-readable detail text
    pub fn detail(&self) -> String {
        match self {
            BrokerEvent::Error { code, message } => format!("{}: {}", code.as_str(), message),
            BrokerEvent::Stats(json) => json.clone(),
            BrokerEvent::Log(text) => text.clone(),
            BrokerEvent::Other { tag, text } => format!("{}: {}", tag, text),
        }
    }
}

/// Receiver of broker events, invoked from the delivery poll task
pub trait BrokerEventHandler: Send + 'static {
    fn on_event(&mut self, event: BrokerEvent);
}

impl<F> BrokerEventHandler for F
where
    F: FnMut(BrokerEvent) + Send + 'static,
{
    fn on_event(&mut self, event: BrokerEvent) {
        self(event)
    }
}

/// Handler that writes every event to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventHandler;

impl BrokerEventHandler for LogEventHandler {
    fn on_event(&mut self, event: BrokerEvent) {
        match &event {
            BrokerEvent::Error { code, message } => {
                warn!(code = %code.as_str(), error = %message, "broker_error")
            }
            BrokerEvent::Stats(json) => info!(stats = %json, "broker_stats"),
            BrokerEvent::Log(text) => info!(message = %text, "broker_log"),
            BrokerEvent::Other { tag, text } => debug!(tag = %tag, detail = %text, "broker_event"),
        }
    }
}

/// Classify a client event; `None` for events that are not forwarded
pub fn classify_event(event: &Event) -> Option<BrokerEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => Some(BrokerEvent::Log(format!(
            "connected to broker (session_present={})",
            ack.session_present
        ))),
        Event::Incoming(Packet::PubAck(ack)) => {
            Some(BrokerEvent::Other { tag: TAG_DELIVERY_REPORT, text: format!("pkid={}", ack.pkid) })
        }
        Event::Incoming(Packet::SubAck(ack)) => {
            if ack.return_codes.iter().any(|c| matches!(c, SubscribeReasonCode::Failure)) {
                Some(BrokerEvent::Error {
                    code: BrokerErrorCode::Rejected,
                    message: format!("subscription {} rejected by broker", ack.pkid),
                })
            } else {
                Some(BrokerEvent::Other { tag: "suback", text: format!("pkid={}", ack.pkid) })
            }
        }
        Event::Incoming(Packet::Disconnect) => Some(BrokerEvent::Log("broker closed the session".to_string())),
        Event::Incoming(Packet::PingReq) | Event::Incoming(Packet::PingResp) => None,
        Event::Incoming(packet) => {
            Some(BrokerEvent::Other { tag: packet_name(packet), text: format!("{:?}", packet) })
        }
        Event::Outgoing(Outgoing::Disconnect) => Some(BrokerEvent::Log("disconnect sent".to_string())),
        Event::Outgoing(_) => None,
    }
}

/// Classify a transport error surfaced by the poll loop
pub fn classify_error(error: &ConnectionError) -> BrokerEvent {
    let code = match error {
        ConnectionError::Io(_) => BrokerErrorCode::Io,
        ConnectionError::ConnectionRefused(_) => BrokerErrorCode::Refused,
        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => BrokerErrorCode::Timeout,
        ConnectionError::MqttState(_) | ConnectionError::NotConnAck(_) => BrokerErrorCode::Protocol,
        ConnectionError::RequestsDone => BrokerErrorCode::Closed,
        #[allow(unreachable_patterns)]
        _ => BrokerErrorCode::Other,
    };
    BrokerEvent::Error { code, message: error.to_string() }
}

fn packet_name(packet: &Packet) -> &'static str {
    match packet {
        Packet::Connect(_) => "connect",
        Packet::ConnAck(_) => "connack",
        Packet::Publish(_) => "publish",
        Packet::PubAck(_) => "puback",
        Packet::PubRec(_) => "pubrec",
        Packet::PubRel(_) => "pubrel",
        Packet::PubComp(_) => "pubcomp",
        Packet::Subscribe(_) => "subscribe",
        Packet::SubAck(_) => "suback",
        Packet::Unsubscribe(_) => "unsubscribe",
        Packet::UnsubAck(_) => "unsuback",
        Packet::PingReq => "pingreq",
        Packet::PingResp => "pingresp",
        Packet::Disconnect => "disconnect",
        #[allow(unreachable_patterns)]
        _ => "packet",
    }
}

/// Forwards classified events to the handler and keeps delivery counters
pub struct EventBridge<H> {
    handler: H,
    metrics: Arc<DeliveryMetrics>,
}

impl<H: BrokerEventHandler> EventBridge<H> {
    pub fn new(handler: H, metrics: Arc<DeliveryMetrics>) -> Self {
        Self { handler, metrics }
    }

    /// Handle one event from the client event loop
    pub fn dispatch(&mut self, event: &Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => self.metrics.record_connect(),
            Event::Incoming(Packet::PubAck(_)) => self.metrics.record_delivered(),
            Event::Outgoing(Outgoing::Publish(_)) => self.metrics.record_sent(),
            _ => {}
        }

        if let Some(broker_event) = classify_event(event) {
            if broker_event.kind() == BrokerEventKind::Error {
                self.metrics.record_error();
            }
            self.handler.on_event(broker_event);
        }
    }

    /// Handle a transport error from the client event loop
    pub fn dispatch_error(&mut self, error: &ConnectionError) {
        self.metrics.record_error();
        self.handler.on_event(classify_error(error));
    }

    /// Emit a statistics snapshot
    pub fn emit_stats(&mut self) {
        let stats = self.metrics.snapshot();
        self.handler.on_event(BrokerEvent::Stats(stats.to_json()));
    }
}
