//! Common error types for the Skiff harness.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::id::ContainerId;

/// Result type alias using [`SkiffError`].
pub type SkiffResult<T> = Result<T, SkiffError>;

/// Category of a failure reported by the container engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    /// The referenced object (container, network, image) does not exist.
    NotFound,
    /// The request conflicts with existing engine state.
    Conflict,
    /// The engine could not be reached.
    Unavailable,
    /// The engine rejected the request.
    Api,
    /// A streamed response failed mid-read.
    Stream,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Unavailable => write!(f, "engine unavailable"),
            Self::Api => write!(f, "engine api error"),
            Self::Stream => write!(f, "stream error"),
        }
    }
}

/// A failure reported by an engine backend.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
#[diagnostic(code(skiff::engine))]
pub struct EngineError {
    /// Failure category, preserved through every wrapping layer.
    pub kind: EngineErrorKind,
    /// Backend message.
    pub message: String,
}

impl EngineError {
    /// Create a new engine error.
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for [`EngineErrorKind::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::NotFound, message)
    }

    /// Shorthand for [`EngineErrorKind::Api`].
    pub fn api(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Api, message)
    }

    /// Shorthand for [`EngineErrorKind::Stream`].
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Stream, message)
    }
}

/// Errors raised by the lifecycle controller and the network layer.
#[derive(Error, Diagnostic, Debug)]
pub enum SkiffError {
    /// The engine refused to create the container.
    #[error("create container {name}: {source}")]
    #[diagnostic(code(skiff::container::create))]
    ContainerCreate {
        /// Container name.
        name: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// The readiness probe did not resolve before the start deadline.
    #[error("container did not start: {name} ({id})")]
    #[diagnostic(
        code(skiff::container::did_not_start),
        help("Raise the start timeout or check the readiness probe of the container")
    )]
    DidNotStart {
        /// Container name.
        name: String,
        /// Short container ID.
        id: String,
    },

    /// The container process exited before readiness was observed.
    #[error("container exited before ready: {name} ({id})")]
    #[diagnostic(code(skiff::container::exited_before_ready))]
    ExitedBeforeReady {
        /// Container name.
        name: String,
        /// Short container ID.
        id: String,
    },

    /// `stop` was already requested for this container.
    #[error("container already stopped: {name} ({id})")]
    #[diagnostic(code(skiff::container::already_stopped))]
    AlreadyStopped {
        /// Container name.
        name: String,
        /// Container ID.
        id: String,
    },

    /// The container process exited with a failure status.
    #[error("container {name} exited with status {code}: {message}")]
    #[diagnostic(code(skiff::container::exited))]
    ProcessExited {
        /// Container name.
        name: String,
        /// Exit status code.
        code: i64,
        /// Status message reported by the engine.
        message: String,
    },

    /// A lifecycle operation was requested before `create_container`.
    #[error("container not created: {name}")]
    #[diagnostic(
        code(skiff::container::not_created),
        help("Call create_container before starting or stopping the container")
    )]
    NotCreated {
        /// Container name.
        name: String,
    },

    /// The subnet allocator has no free block left.
    #[error("no free subnet left in {supernet}")]
    #[diagnostic(
        code(skiff::network::exhausted),
        help("Remove unused networks or shrink the RESERVED_NETWORKS list")
    )]
    SubnetsExhausted {
        /// The supernet that was scanned.
        supernet: String,
    },

    /// Engine transport failure with operation context.
    #[error("{operation} {name}{}: {source}", id_suffix(.id))]
    #[diagnostic(code(skiff::engine::operation))]
    Engine {
        /// The failed operation.
        operation: &'static str,
        /// Container or network name.
        name: String,
        /// Short object ID (may be empty).
        id: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// Unparsable CIDR notation.
    #[error("Invalid network range: {value}")]
    #[diagnostic(
        code(skiff::network::invalid_cidr),
        help("Use IPv4 CIDR notation such as '172.16.0.0/12'")
    )]
    InvalidCidr {
        /// The rejected value.
        value: String,
    },

    /// Unparsable container port.
    #[error("Invalid port: {value}")]
    #[diagnostic(
        code(skiff::port::invalid),
        help("Use formats like '80', '80/tcp' or '53/udp'")
    )]
    InvalidPort {
        /// The rejected value.
        value: String,
    },

    /// Registry type identifier outside the bucket range.
    #[error("Invalid type id: {value} (maximum is {max})")]
    #[diagnostic(code(skiff::registry::invalid_type_id))]
    InvalidTypeId {
        /// The rejected value.
        value: u8,
        /// Number of buckets.
        max: u8,
    },

    /// Two symbolic port names resolve to the same port value.
    #[error("Port {port} is bound by both '{first}' and '{second}'")]
    #[diagnostic(code(skiff::port::name_conflict))]
    PortNameConflict {
        /// The contested port.
        port: String,
        /// The first symbolic name.
        first: String,
        /// The second symbolic name.
        second: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(skiff::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    #[diagnostic(code(skiff::internal))]
    Internal {
        /// The error message.
        message: String,
    },
}

fn id_suffix(id: &str) -> String {
    if id.is_empty() {
        String::new()
    } else {
        format!(" ({id})")
    }
}

impl SkiffError {
    /// Wrap an engine failure with the operation and the container it concerns.
    pub fn engine(operation: &'static str, name: &str, id: &ContainerId, source: EngineError) -> Self {
        Self::Engine {
            operation,
            name: name.to_string(),
            id: id.short().to_string(),
            source,
        }
    }

    /// The engine failure category, if this error wraps one.
    #[must_use]
    pub fn engine_kind(&self) -> Option<EngineErrorKind> {
        match self {
            Self::ContainerCreate { source, .. } | Self::Engine { source, .. } => {
                Some(source.kind)
            }
            _ => None,
        }
    }

    /// Whether this is the benign duplicate-stop error.
    #[must_use]
    pub const fn is_already_stopped(&self) -> bool {
        matches!(self, Self::AlreadyStopped { .. })
    }
}
