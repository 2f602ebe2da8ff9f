//! # skiff-common
//!
//! Shared utilities and types for the Skiff container harness.
//!
//! This crate provides common functionality used across all Skiff crates:
//! - The error taxonomy of the lifecycle controller and subnet allocator
//! - Validated container IDs and registry type identifiers

#![warn(missing_docs)]

pub mod error;
pub mod id;

pub use error::{EngineError, EngineErrorKind, SkiffError, SkiffResult};
pub use id::{ContainerId, TypeId};
