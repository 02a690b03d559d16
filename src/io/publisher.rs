//! Telemetry publisher
//!
//! Owns one broker connection and its destination topic:
//! - `open` builds the client, waits for the broker ConnAck, bootstraps the
//!   topic, then spawns the delivery poll loop
//! - `publish` hands a payload to the client send queue without blocking
//! - `close` stops the poll loop after flushing what the client already accepted
//!
//! The client event loop is only ever driven by the poll loop once `open`
//! returns; broker events reach the caller's handler from that task.

use crate::error::{ErrorKind, PublisherError};
use crate::infra::metrics::{DeliveryMetrics, DeliveryStats};
use crate::io::bootstrap::{bootstrap_topic, BootstrapOutcome};
use crate::io::broker_event::{BrokerEventHandler, EventBridge};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default MQTT port when the endpoint omits one
pub const DEFAULT_BROKER_PORT: u16 = 1883;
/// Cadence of the delivery poll loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Distinguishes publishers opened by the same process
static NEXT_CLIENT_SEQ: AtomicU32 = AtomicU32::new(0);

/// Connection and delivery settings for one publisher
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// `host:port`, optionally prefixed with `mqtt://` or `tcp://`. For a
    /// comma-separated list only the first entry is used.
    pub endpoint: String,
    pub topic: String,
    /// Generated from the process id when unset
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    /// Capacity of the client send queue; `publish` fails when it is full
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub bootstrap_timeout: Duration,
    /// How long to wait for a retained bootstrap marker after subscribing
    pub bootstrap_grace: Duration,
    /// Period of `Stats` events; `None` disables them
    pub stats_interval: Option<Duration>,
    /// Upper bound on flushing accepted messages during `close`
    pub flush_timeout: Duration,
}

impl PublisherConfig {
    pub fn new(endpoint: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            topic: topic.into(),
            client_id: None,
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
            queue_capacity: 1000,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: Duration::from_secs(5),
            bootstrap_timeout: Duration::from_secs(5),
            bootstrap_grace: Duration::from_millis(250),
            stats_interval: Some(Duration::from_secs(60)),
            flush_timeout: Duration::from_secs(2),
        }
    }

    /// Build client options, rejecting settings the client would not accept
    pub fn mqtt_options(&self) -> Result<MqttOptions, PublisherError> {
        let (host, port) = parse_endpoint(&self.endpoint)?;

        if self.queue_capacity == 0 {
            return Err(PublisherError::config("queue capacity must be at least 1"));
        }
        for (name, value) in [
            ("poll interval", self.poll_interval),
            ("connect timeout", self.connect_timeout),
            ("bootstrap timeout", self.bootstrap_timeout),
        ] {
            if value.is_zero() {
                return Err(PublisherError::config(format!("{} must be non-zero", name)));
            }
        }
        if !self.keep_alive.is_zero() && self.keep_alive < Duration::from_secs(1) {
            return Err(PublisherError::config("keep alive must be zero or at least one second"));
        }

        let client_id = match &self.client_id {
            Some(id) => id.clone(),
            None => format!(
                "vehicle-transit-{}-{}",
                std::process::id(),
                NEXT_CLIENT_SEQ.fetch_add(1, Ordering::Relaxed)
            ),
        };
        if client_id.is_empty() || client_id.starts_with(' ') {
            return Err(PublisherError::config(format!("invalid client id '{}'", client_id)));
        }

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                options.set_credentials(username.clone(), password.clone());
            }
            (None, None) => {}
            _ => return Err(PublisherError::config("username and password must be set together")),
        }

        Ok(options)
    }
}

/// Split an endpoint into host and port
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16), PublisherError> {
    let first = endpoint.split(',').next().unwrap_or_default().trim();
    if first.is_empty() {
        return Err(PublisherError::config("broker endpoint is empty"));
    }

    let address = match first.split_once("://") {
        Some(("mqtt" | "tcp", rest)) => rest,
        Some((scheme, _)) => {
            return Err(PublisherError::config(format!("unsupported endpoint scheme '{}'", scheme)))
        }
        None => first,
    };

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        // Bracketed IPv6 literal
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| PublisherError::config(format!("malformed endpoint '{}'", first)))?;
        (host, tail.strip_prefix(':'))
    } else {
        match address.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        }
    };

    if host.is_empty() {
        return Err(PublisherError::config(format!("endpoint '{}' has no host", first)));
    }

    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|e| PublisherError::config(format!("invalid port in endpoint '{}': {}", first, e)))?,
        None => DEFAULT_BROKER_PORT,
    };

    Ok((host.to_string(), port))
}

/// Cloneable, non-blocking enqueue handle for a publisher's topic
///
/// Publishing through a sender after its publisher closed returns `false`.
#[derive(Clone)]
pub struct TelemetrySender {
    client: AsyncClient,
    topic: Arc<str>,
    metrics: Arc<DeliveryMetrics>,
}

impl TelemetrySender {
    /// Enqueue a copy of `payload` for at-least-once delivery
    ///
    /// Returns `false` when the send queue is full or the connection is
    /// closed. No retry is attempted.
    pub fn publish(&self, payload: &[u8]) -> bool {
        match self.client.try_publish(&*self.topic, QoS::AtLeastOnce, false, payload.to_vec()) {
            Ok(()) => {
                self.metrics.record_enqueued(payload.len());
                true
            }
            Err(e) => {
                self.metrics.record_enqueue_failed();
                debug!(
                    topic = %self.topic,
                    kind = %ErrorKind::Enqueue.as_str(),
                    error = %e,
                    "publish_enqueue_failed"
                );
                false
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Delivery counters shared with the owning publisher
    pub fn stats(&self) -> DeliveryStats {
        self.metrics.snapshot()
    }
}

/// Broker telemetry publisher with a background delivery poll loop
pub struct TelemetryPublisher {
    sender: TelemetrySender,
    endpoint: String,
    outcome: BootstrapOutcome,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TelemetryPublisher {
    /// Open a publisher with default settings
    pub async fn open<H: BrokerEventHandler>(
        endpoint: &str,
        topic: &str,
        handler: H,
    ) -> Result<Self, PublisherError> {
        Self::open_with(PublisherConfig::new(endpoint, topic), handler).await
    }

    /// Connect, bootstrap the topic and start the delivery poll loop
    ///
    /// Fails with `Config`, `Connect` or `Topic`; on failure no background
    /// task is left running.
    pub async fn open_with<H: BrokerEventHandler>(
        config: PublisherConfig,
        handler: H,
    ) -> Result<Self, PublisherError> {
        let options = config.mqtt_options()?;
        let (client, mut eventloop) = AsyncClient::new(options, config.queue_capacity);
        let metrics = Arc::new(DeliveryMetrics::new());

        await_connack(&mut eventloop, &config.endpoint, config.connect_timeout).await?;
        metrics.record_connect();
        info!(endpoint = %config.endpoint, "publisher_connected");

        let outcome = bootstrap_topic(
            &client,
            &mut eventloop,
            &config.topic,
            config.bootstrap_grace,
            config.bootstrap_timeout,
        )
        .await?;
        info!(topic = %config.topic, outcome = %outcome.as_str(), "topic_bootstrapped");

        let shutdown = Arc::new(AtomicBool::new(false));
        let poller = DeliveryPoller {
            eventloop,
            client: client.clone(),
            bridge: EventBridge::new(handler, metrics.clone()),
            shutdown: shutdown.clone(),
            poll_interval: config.poll_interval,
            stats_interval: config.stats_interval.filter(|d| !d.is_zero()),
            flush_timeout: config.flush_timeout,
        };
        let worker = tokio::spawn(poller.run());

        Ok(Self {
            sender: TelemetrySender { client, topic: Arc::from(config.topic.as_str()), metrics },
            endpoint: config.endpoint,
            outcome,
            shutdown,
            worker: Some(worker),
        })
    }

    /// Enqueue a copy of `payload`; `false` on enqueue failure
    pub fn publish(&self, payload: &[u8]) -> bool {
        self.sender.publish(payload)
    }

    /// Handle for publishing from other tasks
    pub fn sender(&self) -> TelemetrySender {
        self.sender.clone()
    }

    pub fn topic(&self) -> &str {
        self.sender.topic()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn bootstrap_outcome(&self) -> BootstrapOutcome {
        self.outcome
    }

    pub fn stats(&self) -> DeliveryStats {
        self.sender.stats()
    }

    /// Stop the poll loop and release the connection
    ///
    /// Waits for the poll loop to observe the shutdown flag (at most one poll
    /// interval) and to flush messages already accepted by the client.
    pub async fn close(mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "delivery_poller_join_failed");
            }
        }
        info!(topic = %self.topic(), "publisher_closed");
    }
}

impl Drop for TelemetryPublisher {
    fn drop(&mut self) {
        // The poll loop exits on its own once it sees the flag
        self.shutdown.store(true, Ordering::Release);
    }
}

/// Poll the event loop until the broker acknowledges the connection
async fn await_connack(
    eventloop: &mut EventLoop,
    endpoint: &str,
    timeout: Duration,
) -> Result<(), PublisherError> {
    let handshake = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return if ack.code == ConnectReturnCode::Success {
                        Ok(())
                    } else {
                        Err(format!("connection refused: {:?}", ack.code))
                    };
                }
                Ok(_) => {}
                Err(e) => return Err(e.to_string()),
            }
        }
    };

    match tokio::time::timeout(timeout, handshake).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(PublisherError::connect(endpoint, reason)),
        Err(_) => Err(PublisherError::connect(endpoint, format!("no connack within {:?}", timeout))),
    }
}

/// Background task driving the client event loop
struct DeliveryPoller<H> {
    eventloop: EventLoop,
    client: AsyncClient,
    bridge: EventBridge<H>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
    stats_interval: Option<Duration>,
    flush_timeout: Duration,
}

impl<H: BrokerEventHandler> DeliveryPoller<H> {
    async fn run(mut self) {
        info!(poll_interval_ms = %self.poll_interval.as_millis(), "delivery_poller_started");
        let mut last_stats = Instant::now();

        'pump: loop {
            // One poll future per event; interval ticks only check the flag so
            // an in-progress network write is never cancelled mid-loop
            let polled = {
                let poll = self.eventloop.poll();
                tokio::pin!(poll);
                loop {
                    tokio::select! {
                        result = &mut poll => break result,
                        _ = tokio::time::sleep(self.poll_interval) => {
                            if self.shutdown.load(Ordering::Acquire) {
                                break 'pump;
                            }
                            emit_stats_if_due(&mut self.bridge, self.stats_interval, &mut last_stats);
                        }
                    }
                }
            };

            match polled {
                Ok(event) => self.bridge.dispatch(&event),
                Err(e) => {
                    self.bridge.dispatch_error(&e);
                    // Reconnect is attempted by the next poll
                    tokio::time::sleep(self.poll_interval).await;
                }
            }

            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            emit_stats_if_due(&mut self.bridge, self.stats_interval, &mut last_stats);
        }

        self.flush().await;
        info!("delivery_poller_stopped");
    }

    /// Queue a disconnect behind every accepted request and pump until it is
    /// written, the connection drops, or the flush timeout expires
    async fn flush(&mut self) {
        let deadline = Instant::now() + self.flush_timeout;
        let mut disconnect_queued = false;

        loop {
            if !disconnect_queued {
                disconnect_queued = self.client.try_disconnect().is_ok();
            }

            match tokio::time::timeout_at(deadline, self.eventloop.poll()).await {
                Ok(Ok(event)) => {
                    let written = matches!(event, Event::Outgoing(Outgoing::Disconnect));
                    self.bridge.dispatch(&event);
                    if written {
                        debug!("delivery_flush_complete");
                        return;
                    }
                }
                Ok(Err(e)) => {
                    self.bridge.dispatch_error(&e);
                    return;
                }
                Err(_) => {
                    warn!(timeout_ms = %self.flush_timeout.as_millis(), "delivery_flush_timeout");
                    return;
                }
            }
        }
    }
}

fn emit_stats_if_due<H: BrokerEventHandler>(
    bridge: &mut EventBridge<H>,
    interval: Option<Duration>,
    last_stats: &mut Instant,
) {
    if let Some(interval) = interval {
        if last_stats.elapsed() >= interval {
            bridge.emit_stats();
            *last_stats = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::broker_event::BrokerEvent;

    #[test]
    fn test_parse_endpoint_forms() {
        assert_eq!(parse_endpoint("localhost:1883").unwrap(), ("localhost".to_string(), 1883));
        assert_eq!(parse_endpoint("broker.local").unwrap(), ("broker.local".to_string(), DEFAULT_BROKER_PORT));
        assert_eq!(parse_endpoint("mqtt://10.0.0.5:1884").unwrap(), ("10.0.0.5".to_string(), 1884));
        assert_eq!(parse_endpoint("tcp://host:9000").unwrap(), ("host".to_string(), 9000));
        assert_eq!(parse_endpoint("[::1]:1885").unwrap(), ("::1".to_string(), 1885));
        assert_eq!(parse_endpoint(" a:1, b:2 ").unwrap(), ("a".to_string(), 1));
    }

    #[test]
    fn test_parse_endpoint_rejects_bad_input() {
        for bad in ["", "  ", ":1883", "host:notaport", "host:70000", "http://host:80", "[::1"] {
            let err = parse_endpoint(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "endpoint {:?}", bad);
        }
    }

    #[test]
    fn test_mqtt_options_validation() {
        let config = PublisherConfig::new("localhost:1883", "vehicletraffic");
        assert!(config.mqtt_options().is_ok());

        let mut config = PublisherConfig::new("localhost:1883", "vehicletraffic");
        config.queue_capacity = 0;
        assert_eq!(config.mqtt_options().unwrap_err().kind(), ErrorKind::Config);

        let mut config = PublisherConfig::new("localhost:1883", "vehicletraffic");
        config.poll_interval = Duration::ZERO;
        assert_eq!(config.mqtt_options().unwrap_err().kind(), ErrorKind::Config);

        let mut config = PublisherConfig::new("localhost:1883", "vehicletraffic");
        config.keep_alive = Duration::from_millis(500);
        assert!(config.mqtt_options().is_err());

        let mut config = PublisherConfig::new("localhost:1883", "vehicletraffic");
        config.username = Some("user".to_string());
        assert!(config.mqtt_options().is_err());

        let mut config = PublisherConfig::new("localhost:1883", "vehicletraffic");
        config.client_id = Some(String::new());
        assert!(config.mqtt_options().is_err());
    }

    #[test]
    fn test_generated_client_ids_are_unique() {
        let config = PublisherConfig::new("localhost:1883", "vehicletraffic");
        let a = config.mqtt_options().unwrap();
        let b = config.mqtt_options().unwrap();
        assert_ne!(a.client_id(), b.client_id());
    }

    #[test]
    fn test_publish_without_event_loop_is_enqueue_failure() {
        let options = PublisherConfig::new("localhost:1883", "vehicletraffic").mqtt_options().unwrap();
        let (client, eventloop) = AsyncClient::new(options, 1);
        drop(eventloop);

        let sender = TelemetrySender {
            client,
            topic: Arc::from("vehicletraffic"),
            metrics: Arc::new(DeliveryMetrics::new()),
        };
        assert!(!sender.publish(b"lost"));

        let stats = sender.stats();
        assert_eq!(stats.enqueued, 0);
        assert_eq!(stats.enqueue_failed, 1);
    }

    #[tokio::test]
    async fn test_open_with_bad_config_fails_before_connecting() {
        let result = TelemetryPublisher::open("", "vehicletraffic", |_: BrokerEvent| {}).await;
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Config));
    }
}
