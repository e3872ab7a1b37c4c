use crate::channel::ChannelKind;

/// Why a single upstream record could not be turned into a [`crate::DomainEvent`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(String),

    #[error("malformed {message} message: {detail}")]
    Malformed { message: &'static str, detail: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {detail}")]
    InvalidValue { field: &'static str, detail: String },

    #[error("channel mismatch: expected {expected}, got type code {actual}")]
    ChannelMismatch { expected: ChannelKind, actual: u32 },
}

impl DecodeError {
    pub fn malformed(message: &'static str, detail: impl ToString) -> Self {
        Self::Malformed {
            message,
            detail: detail.to_string(),
        }
    }

    pub fn invalid(field: &'static str, detail: impl ToString) -> Self {
        Self::InvalidValue {
            field,
            detail: detail.to_string(),
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Envelope(_) => "envelope",
            Self::Malformed { .. } => "malformed",
            Self::MissingField(_) => "missing_field",
            Self::InvalidValue { .. } => "invalid_value",
            Self::ChannelMismatch { .. } => "channel_mismatch",
        }
    }
}

/// A decode failure as recorded by a subscription loop. Logged, never broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeFailure {
    pub channel: ChannelKind,
    pub raw_size: usize,
    pub cause: DecodeError,
}

impl DecodeFailure {
    pub fn new(channel: ChannelKind, raw_size: usize, cause: DecodeError) -> Self {
        Self {
            channel,
            raw_size,
            cause,
        }
    }
}

impl std::fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} record ({} bytes) rejected: {}",
            self.channel, self.raw_size, self.cause
        )
    }
}
