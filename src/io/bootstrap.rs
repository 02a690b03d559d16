//! Topic bootstrap
//!
//! MQTT brokers have no topic admin API, so a topic is materialised by a
//! retained marker message on `<topic>/_bootstrap`:
//! 1. subscribe to the marker topic and wait for the SubAck
//! 2. a retained marker arriving within the grace window means the topic
//!    already exists
//! 3. otherwise publish a retained marker (QoS 1); its PubAck means created
//!
//! The classification lives in `TopicBootstrap`, a plain state machine fed
//! with client events; `bootstrap_topic` drives it against a live event loop.

use crate::error::PublisherError;
use crate::infra::metrics::epoch_ms;
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS, SubscribeReasonCode};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Marker topic level appended to the bootstrapped topic
pub const MARKER_LEVEL: &str = "_bootstrap";

/// Successful bootstrap outcomes; both let `open` proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyExists,
}

impl BootstrapOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapOutcome::Created => "created",
            BootstrapOutcome::AlreadyExists => "already_exists",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    AwaitingSubAck,
    AwaitingRetained,
    AwaitingPubAck,
}

/// Result of feeding one event to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStep {
    Pending,
    Done(BootstrapOutcome),
    /// Creation failed; fatal for `open`
    Failed(String),
}

/// Ensure-exists state machine for one topic
#[derive(Debug, Clone)]
pub struct TopicBootstrap {
    topic: String,
    marker: String,
    phase: BootstrapPhase,
}

impl TopicBootstrap {
    /// Validate the topic name and prepare the marker topic
    pub fn new(topic: &str) -> Result<Self, String> {
        if topic.is_empty() {
            return Err("topic name is empty".to_string());
        }
        if topic.contains(['+', '#']) {
            return Err(format!("topic name '{}' contains wildcards", topic));
        }
        if topic.contains('\0') {
            return Err("topic name contains a NUL character".to_string());
        }
        // Topics differing only by a trailing '/' are distinct, so are their markers
        let marker = format!("{}/{}", topic, MARKER_LEVEL);
        if marker.len() > u16::MAX as usize {
            return Err("topic name is too long".to_string());
        }

        Ok(Self { topic: topic.to_string(), marker, phase: BootstrapPhase::AwaitingSubAck })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn marker_topic(&self) -> &str {
        &self.marker
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    /// Feed one client event
    pub fn on_event(&mut self, event: &Event) -> BootstrapStep {
        let Event::Incoming(packet) = event else {
            return BootstrapStep::Pending;
        };

        match (self.phase, packet) {
            (BootstrapPhase::AwaitingSubAck | BootstrapPhase::AwaitingRetained, Packet::Publish(publish))
                if publish.topic == self.marker =>
            {
                BootstrapStep::Done(BootstrapOutcome::AlreadyExists)
            }
            (BootstrapPhase::AwaitingSubAck, Packet::SubAck(ack)) => {
                if ack.return_codes.iter().any(|c| matches!(c, SubscribeReasonCode::Failure)) {
                    BootstrapStep::Failed(format!("broker rejected subscription to '{}'", self.marker))
                } else {
                    self.phase = BootstrapPhase::AwaitingRetained;
                    BootstrapStep::Pending
                }
            }
            (BootstrapPhase::AwaitingPubAck, Packet::PubAck(_)) => BootstrapStep::Done(BootstrapOutcome::Created),
            _ => BootstrapStep::Pending,
        }
    }

    /// No retained marker arrived in time. Returns true when the caller must
    /// now publish the marker.
    pub fn on_grace_elapsed(&mut self) -> bool {
        if self.phase == BootstrapPhase::AwaitingRetained {
            self.phase = BootstrapPhase::AwaitingPubAck;
            true
        } else {
            false
        }
    }

    /// Retained marker payload
    pub fn marker_payload(&self) -> Vec<u8> {
        serde_json::json!({ "topic": self.topic, "created_at": epoch_ms() }).to_string().into_bytes()
    }
}

/// Ensure `topic` exists, driving the event loop directly
///
/// Runs before the delivery poll loop starts; the whole exchange is bounded
/// by `timeout`.
pub(crate) async fn bootstrap_topic(
    client: &AsyncClient,
    eventloop: &mut EventLoop,
    topic: &str,
    grace: Duration,
    timeout: Duration,
) -> Result<BootstrapOutcome, PublisherError> {
    let mut state = TopicBootstrap::new(topic).map_err(|reason| PublisherError::topic(topic, reason))?;
    let marker = state.marker_topic().to_string();

    let exchange = run_exchange(client, eventloop, &mut state, grace);
    let outcome = match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(reason)) => return Err(PublisherError::topic(topic, reason)),
        Err(_) => return Err(PublisherError::topic(topic, format!("bootstrap timed out after {:?}", timeout))),
    };

    // Sent later by the delivery poll loop
    if let Err(e) = client.try_unsubscribe(marker.as_str()) {
        debug!(error = %e, "bootstrap_unsubscribe_failed");
    }

    Ok(outcome)
}

async fn run_exchange(
    client: &AsyncClient,
    eventloop: &mut EventLoop,
    state: &mut TopicBootstrap,
    grace: Duration,
) -> Result<BootstrapOutcome, String> {
    let marker = state.marker_topic().to_string();
    client.subscribe(marker.as_str(), QoS::AtLeastOnce).await.map_err(|e| e.to_string())?;
    let mut grace_deadline: Option<Instant> = None;

    loop {
        let polled = if state.phase() == BootstrapPhase::AwaitingRetained {
            let deadline = *grace_deadline.get_or_insert_with(|| Instant::now() + grace);
            match tokio::time::timeout_at(deadline, eventloop.poll()).await {
                Ok(polled) => polled,
                Err(_) => {
                    if state.on_grace_elapsed() {
                        debug!(marker = %marker, "bootstrap_marker_publish");
                        client
                            .publish(marker.as_str(), QoS::AtLeastOnce, true, state.marker_payload())
                            .await
                            .map_err(|e| e.to_string())?;
                    }
                    continue;
                }
            }
        } else {
            eventloop.poll().await
        };

        let event = polled.map_err(|e| e.to_string())?;
        match state.on_event(&event) {
            BootstrapStep::Pending => {}
            BootstrapStep::Done(outcome) => return Ok(outcome),
            BootstrapStep::Failed(reason) => return Err(reason),
        }
    }
}
