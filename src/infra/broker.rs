//! Embedded MQTT broker using rumqttd
//!
//! Used for local runs without an external broker and by the integration
//! tests. Retained messages are kept by the router, so topic bootstrap markers
//! behave as on a standalone broker.

use anyhow::Context;
use rumqttd::{Broker, Config, ConnectionSettings, RouterConfig, ServerSettings};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::thread;
use tracing::{info, warn};

/// Start the embedded broker on a background thread
///
/// Returns the listen address once the broker thread is spawned; the listener
/// may take a few milliseconds more to accept connections.
pub fn start_embedded_broker(bind_address: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let addr_str = format!("{}:{}", bind_address, port);
    let listen_addr: SocketAddr =
        addr_str.parse().with_context(|| format!("invalid broker bind address {}", addr_str))?;

    let router_config = RouterConfig {
        max_segment_size: 104857600,
        max_segment_count: 10,
        max_connections: 1010,
        max_outgoing_packet_count: 200,
        initialized_filters: None,
        ..Default::default()
    };

    let mut servers = HashMap::new();
    servers.insert(
        "v4".to_string(),
        ServerSettings {
            name: "v4".to_string(),
            listen: listen_addr,
            tls: None,
            next_connection_delay_ms: 1,
            connections: ConnectionSettings {
                connection_timeout_ms: 5000,
                max_payload_size: 262144,
                max_inflight_count: 200,
                auth: None,
                // Topics are created on first publish
                dynamic_filters: true,
                external_auth: None,
            },
        },
    );

    let config = Config {
        id: 0,
        router: router_config,
        v4: Some(servers),
        v5: None,
        ws: None,
        prometheus: None,
        metrics: None,
        bridge: None,
        console: None,
        cluster: None,
    };

    thread::Builder::new()
        .name("embedded-broker".to_string())
        .spawn(move || {
            let mut broker = Broker::new(config);
            // start() blocks for the lifetime of the broker
            if let Err(e) = broker.start() {
                warn!(error = %e, "broker_start_failed");
            }
        })
        .context("failed to spawn broker thread")?;

    info!(bind_address = %bind_address, port = %port, "broker_started");
    Ok(listen_addr)
}
