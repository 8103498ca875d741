//! Collaborator trait definitions for Gantry
//!
//! These traits define the external interfaces the engine consumes:
//! - `CmdbStore`: configuration-item and relation queries
//! - `ReleaseStore`: release/RFC record management
//! - `DeploymentStore`: deployment creation and open-deployment lookup
//! - `EnvLock`: per-environment mutual exclusion with owner tokens
//!
//! All traits are async and backend-agnostic. In-memory fakes are
//! provided for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::records::{
    CiId, CloudBinding, DeployedInstance, Deployment, EnvId, EnvLockState, Environment,
    NewDeployment, Platform, PlatformLink, Release, ReleaseId, ReleaseState, RelationId,
};

// ---------------------------------------------------------------------------
// CmdbStore — Configuration items & relations
// ---------------------------------------------------------------------------

/// Configuration-management store queries.
///
/// All reads reflect at least read-your-writes consistency within one
/// generation call; anything stronger is the backing store's concern.
#[async_trait]
pub trait CmdbStore: Send + Sync {
    /// Resolve an environment by id.
    async fn get_environment(&self, env: EnvId) -> StoreResult<Environment>;

    /// All platforms in an environment's manifest namespace.
    async fn get_platforms(&self, manifest_ns: &str) -> StoreResult<Vec<Platform>>;

    /// All LinksTo dependency edges between platforms of the namespace.
    async fn get_platform_links(&self, manifest_ns: &str) -> StoreResult<Vec<PlatformLink>>;

    /// Cloud bindings of one platform. Empty means the platform is
    /// effectively disabled.
    async fn get_cloud_bindings(&self, platform: CiId) -> StoreResult<Vec<CloudBinding>>;

    /// Short class name of the platform's entry-point component type,
    /// if the platform has one.
    async fn get_entry_point(&self, platform: CiId) -> StoreResult<Option<String>>;

    /// Instances currently deployed to `cloud` at the given entry-point
    /// component type under the given platform BOM namespace.
    async fn get_deployed_instances(
        &self,
        cloud: CiId,
        entry_point: &str,
        ns_path: &str,
    ) -> StoreResult<Vec<DeployedInstance>>;

    /// LinksTo relations already marked `pending_deletion` in the
    /// manifest namespace.
    async fn get_pending_deletion_links(&self, manifest_ns: &str)
        -> StoreResult<Vec<RelationId>>;

    /// Physically delete a relation.
    async fn delete_relation(&self, relation: RelationId) -> StoreResult<()>;

    /// Platform-scoped global variables left in `pending_deletion` state.
    async fn get_pending_deletion_global_vars(
        &self,
        manifest_ns: &str,
    ) -> StoreResult<Vec<CiId>>;

    /// Physically delete a configuration item, optionally cascading.
    async fn delete_ci(&self, ci: CiId, cascade: bool, user: &str) -> StoreResult<()>;

    /// Create the namespace if it does not exist yet.
    async fn ensure_namespace(&self, ns_path: &str) -> StoreResult<()>;

    /// Acquire the namespace-level write lock for the duration of a
    /// generation call.
    async fn lock_namespace(&self, ns_path: &str) -> StoreResult<()>;

    /// Names of required cloud services missing for any of the given
    /// platforms. Empty when every service is available.
    async fn missing_services(&self, platforms: &[CiId]) -> StoreResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// ReleaseStore — Releases & RFC records
// ---------------------------------------------------------------------------

/// Release and RFC record management.
///
/// Guarantees:
/// - A namespace has at most one `open` release at a time.
/// - `commit_release` is a soft commit: state transitions only, no
///   physical deletes.
/// - `brush_exec_order` compacts the exec orders of a release's RFCs
///   without reordering them.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Open releases in a namespace, newest first.
    async fn get_open_releases(&self, ns_path: &str) -> StoreResult<Vec<Release>>;

    /// The most recent release of the given state in a namespace.
    async fn get_latest_release(
        &self,
        ns_path: &str,
        state: ReleaseState,
    ) -> StoreResult<Option<Release>>;

    /// Resolve a release by id.
    async fn get_release(&self, release: ReleaseId) -> StoreResult<Release>;

    /// Persist changed release fields (state, parent link, description).
    async fn update_release(&self, release: &Release) -> StoreResult<()>;

    /// Soft-commit an open release: state becomes `closed`.
    async fn commit_release(
        &self,
        release: ReleaseId,
        user: &str,
        desc: Option<&str>,
    ) -> StoreResult<()>;

    /// Discard a release and its RFCs.
    async fn delete_release(&self, release: ReleaseId) -> StoreResult<()>;

    /// Number of RFC configuration items in a release.
    async fn rfc_ci_count(&self, release: ReleaseId) -> StoreResult<u64>;

    /// Number of RFC relations in a release.
    async fn rfc_relation_count(&self, release: ReleaseId) -> StoreResult<u64>;

    /// Normalize/compact the exec orders of a release's RFCs.
    async fn brush_exec_order(&self, release: ReleaseId) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// DeploymentStore — Deployments
// ---------------------------------------------------------------------------

/// Deployment creation and open-deployment lookup.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// The open deployment for a BOM namespace, if one exists. At most
    /// one deployment may be open per namespace at any time.
    async fn get_open_deployment(&self, ns_path: &str) -> StoreResult<Option<Deployment>>;

    /// Submit a release for deployment, returning the created record.
    async fn deploy_release(&self, new: NewDeployment) -> StoreResult<Deployment>;
}

// ---------------------------------------------------------------------------
// EnvLock — Per-environment mutual exclusion
// ---------------------------------------------------------------------------

/// Per-environment mutual exclusion.
///
/// Semantics:
/// - `acquire` fails fast with `StoreError::LockHeld` when the
///   environment is already locked; retry/queue is the caller's call.
/// - `release` only succeeds for the token that acquired the lock and
///   leaves `message` behind for pollers.
/// - `reset` is the operator escape hatch: it force-clears the lock
///   without a token check.
#[async_trait]
pub trait EnvLock: Send + Sync {
    /// Acquire the lock for `env` on behalf of `token`.
    async fn acquire(&self, env: EnvId, token: &str) -> StoreResult<()>;

    /// Release the lock, leaving `message` as the observable outcome.
    async fn release(&self, env: EnvId, message: &str, token: &str) -> StoreResult<()>;

    /// Force-clear the lock, bypassing the token check.
    async fn reset(&self, env: EnvId) -> StoreResult<()>;

    /// Current lock state, including the trailing status message.
    async fn state(&self, env: EnvId) -> StoreResult<EnvLockState>;
}
