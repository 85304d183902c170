//! Core type definitions for course content sync.
//!
//! This crate defines the node-agnostic types shared by the store, the sync
//! engine and the HTTP node:
//! - Stable (cross-node) and local identifiers
//! - Content kinds and lifecycle states
//! - Content items and their validated wire form
//! - Course structure maps
//! - Audit log entries and client registrations
//!
//! Nothing here touches storage or the network.

mod ids;
mod item;
mod kind;
mod log;
mod structure;

pub use ids::{LocalId, StableId};
pub use item::{BatchItem, ContentItem, Metadata, RawBatchItem, TaxonomyTerms, WireItem};
pub use kind::{ContentKind, LifecycleState};
pub use log::{ClientRegistration, RegistrationStatus, SyncDirection, SyncLogEntry, SyncOutcome};
pub use structure::{CourseStructure, StepEntry, StepKey, StepSections};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Reasons an inbound item is rejected before it reaches the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unknown content kind `{0}`")]
    UnknownKind(String),

    #[error("malformed item: {0}")]
    Malformed(String),
}
