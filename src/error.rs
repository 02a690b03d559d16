//! Error taxonomy
//!
//! Construction-time publisher failures (`Config`, `Connect`, `Topic`) are
//! fatal for that publisher instance. Steady-state failures are local:
//! enqueue failures surface as `publish` returning `false`, unknown zone
//! labels as a recoverable [`TransitError`].

/// Coarse classification shared by every error in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Broker client configuration rejected, or zone catalog invalid
    Config,
    /// Connection to the broker endpoint could not be established
    Connect,
    /// Topic bootstrap failed or timed out
    Topic,
    /// A message could not be handed to the send queue; tags the
    /// `publish_enqueue_failed` log, never returned as an error value
    Enqueue,
    /// A crossing label prefix did not match the zone catalog
    UnknownZoneLabel,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Connect => "connect",
            ErrorKind::Topic => "topic",
            ErrorKind::Enqueue => "enqueue",
            ErrorKind::UnknownZoneLabel => "unknown_zone_label",
        }
    }
}

/// Failures raised while opening a telemetry publisher
#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    #[error("Unable to initialize broker config: {0}")]
    Config(String),

    #[error("Unable to connect to broker at {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Unable to bootstrap topic '{topic}': {reason}")]
    Topic { topic: String, reason: String },
}

impl PublisherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublisherError::Config(_) => ErrorKind::Config,
            PublisherError::Connect { .. } => ErrorKind::Connect,
            PublisherError::Topic { .. } => ErrorKind::Topic,
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        PublisherError::Config(reason.into())
    }

    pub(crate) fn connect(endpoint: &str, reason: impl ToString) -> Self {
        PublisherError::Connect { endpoint: endpoint.to_string(), reason: reason.to_string() }
    }

    pub(crate) fn topic(topic: &str, reason: impl ToString) -> Self {
        PublisherError::Topic { topic: topic.to_string(), reason: reason.to_string() }
    }
}

/// Failures raised by the zone-transit aggregator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitError {
    #[error("Unknown zone label '{label}'")]
    UnknownZoneLabel { label: String },

    #[error("Invalid zone catalog: {reason}")]
    InvalidCatalog { reason: String },
}

impl TransitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransitError::UnknownZoneLabel { .. } => ErrorKind::UnknownZoneLabel,
            TransitError::InvalidCatalog { .. } => ErrorKind::Config,
        }
    }

    pub(crate) fn invalid_catalog(reason: impl Into<String>) -> Self {
        TransitError::InvalidCatalog { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_error_kinds() {
        assert_eq!(PublisherError::config("bad").kind(), ErrorKind::Config);
        assert_eq!(PublisherError::connect("localhost:1883", "refused").kind(), ErrorKind::Connect);
        assert_eq!(PublisherError::topic("vehicletraffic", "timeout").kind(), ErrorKind::Topic);
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = PublisherError::topic("vehicletraffic", "subscription rejected");
        let msg = err.to_string();
        assert!(msg.contains("vehicletraffic"));
        assert!(msg.contains("subscription rejected"));

        let err = TransitError::UnknownZoneLabel { label: "XX-exit".to_string() };
        assert_eq!(err.to_string(), "Unknown zone label 'XX-exit'");
        assert_eq!(err.kind().as_str(), "unknown_zone_label");
    }
}
