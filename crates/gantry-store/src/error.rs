//! Error types for gantry-store

use thiserror::Error;

use crate::records::{CiId, DeploymentId, EnvId, RelationId, ReleaseId};

/// Errors that can occur in the store interface layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Environment configuration item does not exist
    #[error("environment not found: {0}")]
    EnvironmentNotFound(EnvId),

    /// Configuration item does not exist
    #[error("configuration item not found: {0}")]
    CiNotFound(CiId),

    /// Relation does not exist
    #[error("relation not found: {0}")]
    RelationNotFound(RelationId),

    /// Release does not exist
    #[error("release not found: {0}")]
    ReleaseNotFound(ReleaseId),

    /// Deployment does not exist
    #[error("deployment not found: {0}")]
    DeploymentNotFound(DeploymentId),

    /// Namespace does not exist
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Environment lock is already held by another operation
    #[error("environment {0} is already locked")]
    LockHeld(EnvId),

    /// Lock release attempted with a token that does not own the lock
    #[error("lock token mismatch for environment {0}")]
    LockTokenMismatch(EnvId),

    /// Backend query or connection error
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
