//! Queue and connect-protocol error types.

use std::fmt;
use std::io;

/// Errors raised by the named-mailbox substrate.
///
/// `AlreadyExists` at queue creation is fatal to the owning module: it
/// cannot run without its mailbox. `Empty` and `Full` are ordinary
/// flow-control outcomes of the non-blocking operations. `Disconnected`
/// means the peer endpoint is gone and will not come back for this
/// attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// A queue with this name has already been created.
    AlreadyExists {
        /// Queue name.
        name: String,
    },
    /// No queue with this name exists (or its send side was already
    /// claimed by another peer).
    NotFound {
        /// Queue name.
        name: String,
    },
    /// The bounded queue is at capacity.
    Full {
        /// Queue name.
        name: String,
    },
    /// No message is currently available.
    Empty {
        /// Queue name.
        name: String,
    },
    /// The peer endpoint has been dropped.
    Disconnected {
        /// Queue name.
        name: String,
    },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists { name } => {
                write!(f, "queue '{name}' already exists")
            }
            Self::NotFound { name } => write!(f, "queue '{name}' not found"),
            Self::Full { name } => write!(f, "queue '{name}' is full"),
            Self::Empty { name } => write!(f, "queue '{name}' is empty"),
            Self::Disconnected { name } => {
                write!(f, "queue '{name}' peer disconnected")
            }
        }
    }
}

impl std::error::Error for QueueError {}

/// Errors raised by the in-situ connect handshake.
#[derive(Debug)]
pub enum HandshakeError {
    /// Socket-level failure.
    Io {
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The peer answered the token line with something other than
    /// `success`.
    Rejected {
        /// The peer's response line.
        reason: String,
    },
    /// The byte stream violated the line-oriented wire format.
    Protocol {
        /// What was malformed.
        reason: String,
    },
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { source } => write!(f, "handshake i/o failure: {source}"),
            Self::Rejected { reason } => write!(f, "handshake rejected: {reason}"),
            Self::Protocol { reason } => write!(f, "handshake protocol violation: {reason}"),
        }
    }
}

impl std::error::Error for HandshakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for HandshakeError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}
