use std::fmt::{Display, Formatter};

/// Broad classes of transport failures reported by an admin transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection to the Admin API could not be established.
    Connect,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The remote service closed the connection before the body completed.
    PrematureClose,
    /// Any other I/O or protocol failure.
    Other,
}

impl TransportErrorKind {
    /// Returns a stable label for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::PrematureClose => "premature_close",
            Self::Other => "other",
        }
    }
}

/// Network or connection failure raised while talking to the Admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Creates a transport error of the given kind.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the failure class.
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }
}

impl Display for TransportError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} ({})", self.message, self.kind.as_str())
    }
}

impl std::error::Error for TransportError {}
