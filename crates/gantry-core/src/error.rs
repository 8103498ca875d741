//! Engine-level error taxonomy for Gantry.

use gantry_store::{CiId, EnvId, StoreError};

/// Gantry engine errors.
#[derive(Debug, thiserror::Error)]
pub enum GantryError {
    /// An open deployment already exists for the target namespace.
    #[error("active deployment conflict: {0}")]
    DeploymentConflict(String),

    /// The computed deployment targets are exclusively secondary clouds.
    #[error("secondary-cloud validation failed: {0}")]
    AllInstancesSecondary(String),

    /// The platform LinksTo graph contains a cycle.
    #[error("dependency cycle among platforms {0:?}")]
    DependencyCycle(Vec<CiId>),

    /// Required cloud services are unavailable for one or more platforms.
    #[error("missing required cloud services: {0}")]
    MissingServices(String),

    /// The environment lock is held by another operation.
    #[error("environment {0} is locked by another operation")]
    EnvironmentLocked(EnvId),

    /// A flex/scale step failed.
    #[error("flex processing failed: {0}")]
    Flex(String),

    /// RFC synthesis failed inside the per-binding bulk processor.
    #[error("rfc generation failed: {0}")]
    RfcGeneration(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for Gantry engine operations.
pub type Result<T> = std::result::Result<T, GantryError>;
