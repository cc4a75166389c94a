//! Error taxonomy for the permission system.
//!
//! Authorization decisions are never errors: "denied" is a normal result.
//! Errors cover registry misuse, invalid override construction, and backing
//! store unavailability. On any error, callers deny rather than grant.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the permission engine and registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    /// An unregistered permission node was queried. Callers must treat this
    /// as denial rather than propagating a crash.
    #[error("unknown permission node: {0}")]
    UnknownNode(String),

    /// A node was re-registered with a definition that differs from the
    /// existing one. Identical re-registration is not an error.
    #[error("permission node '{0}' already registered with a different definition")]
    DuplicateNode(String),

    /// An override failed validation at creation time (scope mismatch or
    /// expiry already in the past).
    #[error("invalid override: {0}")]
    InvalidOverride(String),

    /// The backing store timed out or rejected the operation. Queries fall
    /// back to last-known-good cached state when available; mutations are
    /// rejected, never silently dropped.
    #[error("permission store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for PermissionError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
