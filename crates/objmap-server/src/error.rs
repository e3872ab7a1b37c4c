use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("listener address unavailable: {0}")]
    LocalAddr(#[source] std::io::Error),
    #[error("server on {addr} stopped with error: {reason}")]
    Serve { addr: SocketAddr, reason: String },
}

impl ServerError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Bind { .. } => "bind",
            Self::LocalAddr(_) => "local_addr",
            Self::Serve { .. } => "serve",
        }
    }
}
