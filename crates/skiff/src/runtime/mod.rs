//! Container lifecycle core.
//!
//! This module provides the [`Container`] controller and the collaborators
//! it drives: the engine API, readiness probes and output sinks.

mod config;
mod container;
mod engine;
pub mod events;
mod lifecycle;
mod log;
mod readiness;
mod spec;

pub use config::{RESERVED_NETWORKS_VAR, RuntimeConfig, START_TIMEOUT_FACTOR_VAR, parse_reserved};
pub use container::Container;
pub use engine::{
    ContainerInfo, CreateRequest, EndpointSettings, EngineClient, ExitStatus, LogChunk, LogStream,
};
pub use events::{EventBus, LifecycleEvent};
pub use lifecycle::LifecycleState;
pub use log::{ContainerOutput, OutputStream, copy_logs};
pub use readiness::{ConstantDelay, DEFAULT_READY_DELAY, HttpProbe, ReadyProbe};
pub use spec::{BASE_DEBUG_PORT, ContainerSpec, DEBUG_PORT_NAME, DEFAULT_START_TIMEOUT, DebugPort};
