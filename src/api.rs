use crate::attributes::Attributes;
use crate::remoteconfig::InstrumentationLibraryConfig;
use crate::state::Phase;
use std::{error::Error, fmt};

/// `pub trait AgentCallbacks` is implemented by the host that embeds the OpAMP client. It is
/// how configuration pushed by the server leaves this crate: the client never renders or
/// persists anything itself.
///
/// Both methods have empty default bodies so a host only implements what it consumes.
/// Callbacks run on the client's own task and should return quickly.
pub trait AgentCallbacks: Send + Sync {
    /// Called at most once per client: by `start()`, with the server supplied resource
    /// attributes or the fallback when bootstrap gives up, or by `shutdown()` of a client that
    /// was never started, with the fallback. Dropping an unstarted client only resolves the
    /// attribute hook.
    fn on_resource_attributes_resolved(&self, attributes: &Attributes) {
        let _ = attributes;
    }

    /// Called every time a server response carries a parseable instrumentation libraries
    /// section.
    fn on_instrumentation_libraries_config(&self, configs: &[InstrumentationLibraryConfig]) {
        let _ = configs;
    }
}

/// Callbacks that ignore everything. Useful when only the resource attribute future is needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl AgentCallbacks for NoopCallbacks {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The outbound message could not be framed
    Encode,
    /// No HTTP response was received
    Connect,
    /// The exchange did not complete within the per call timeout
    Timeout,
    /// The server answered with a non success status
    Status,
    /// The response body could not be read or unpacked
    Body,
    /// The response body is not a valid ServerToAgent message
    Decode,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Encode => "encode",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Status => "status",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Decode => "decode",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
/// The TransportError reports the failure of a single OpAMP exchange.
///
/// Properties:
///
/// * `kind`: which step of the exchange failed.
/// * `target`: the URL (or other carrier address) the message was meant for.
/// * `status`: HTTP status code, when the server answered at all.
/// * `reason`: free form detail from the underlying library or server.
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub target: String,
    pub status: Option<u16>,
    pub reason: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, target: &str, reason: &str) -> TransportError {
        TransportError {
            kind,
            target: target.to_string(),
            status: None,
            reason: reason.to_string(),
        }
    }

    pub fn with_status(mut self, status: u16) -> TransportError {
        self.status = Some(status);
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "OpAMP {} error <{}> from {}: {}",
                self.kind, status, self.target, self.reason
            ),
            None => write!(
                f,
                "OpAMP {} error talking to {}: {}",
                self.kind, self.target, self.reason
            ),
        }
    }
}

impl Error for TransportError {}

/// Everything that can go wrong inside the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("remote config section {0:?} is missing or empty")]
    MissingSection(String),

    #[error("remote config section {section:?} is malformed: {source}")]
    MalformedSection {
        section: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("attribute {key:?} holds an unsupported {kind} value")]
    UnsupportedAttributeType { key: String, kind: &'static str },

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("cannot {operation} a client that is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },
}

impl ClientError {
    pub fn missing_section(section: &str) -> ClientError {
        ClientError::MissingSection(section.to_string())
    }

    pub fn malformed_section(section: &str, source: serde_json::Error) -> ClientError {
        ClientError::MalformedSection {
            section: section.to_string(),
            source,
        }
    }

    /// Section name for the two remote config variants
    pub fn section(&self) -> Option<&str> {
        match self {
            ClientError::MissingSection(section) => Some(section),
            ClientError::MalformedSection { section, .. } => Some(section),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}
