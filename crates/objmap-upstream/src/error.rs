use std::time::Duration;

/// Failures of the upstream connection or a subscription stream.
///
/// None of these are fatal to the bridge: every variant ends the current
/// subscription and hands control to the reconnect policy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("io error: {0}")]
    Io(String),

    #[error("upstream closed the stream")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Io(_) => "io",
            Self::Closed => "closed",
            Self::Protocol(_) => "protocol",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl From<std::io::Error> for UpstreamError {
    fn from(e: std::io::Error) -> Self {
        UpstreamError::Io(e.to_string())
    }
}

/// Failures talking to the node server at startup or shutdown.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("node server {addr} unreachable: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("node server rejected registration: {0}")]
    Rejected(String),

    #[error("node server protocol error: {0}")]
    Protocol(String),

    #[error("node server did not answer within {0:?}")]
    Timeout(Duration),
}

impl From<prost::DecodeError> for RegistrationError {
    fn from(e: prost::DecodeError) -> Self {
        RegistrationError::Protocol(e.to_string())
    }
}
