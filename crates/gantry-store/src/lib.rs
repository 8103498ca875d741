//! Gantry Store Library
//!
//! Interface layer between the Gantry engine and its external
//! collaborators: the configuration-management store, the release and
//! deployment stores, and the per-environment lock backend.
//!
//! The engine only ever talks to the traits defined in [`traits`];
//! in-memory fakes satisfying every trait contract are provided for
//! testing via the [`fakes`] module.

pub mod error;
pub mod fakes;
pub mod records;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use records::{
    AdminStatus, CiId, CiState, CloudBinding, DeployedInstance, Deployment, DeploymentId,
    DeploymentState, EnvId, EnvLockState, Environment, NewDeployment, Platform, PlatformLink,
    Release, ReleaseId, ReleaseState, RelationId,
};
pub use traits::{CmdbStore, DeploymentStore, EnvLock, ReleaseStore};
