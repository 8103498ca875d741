//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `MemoryCmdb`, `MemoryReleaseStore`, `MemoryDeploymentStore`,
//! and `MemoryEnvLock` that satisfy the trait contracts without any
//! external dependencies. Each fake exposes seeding helpers for test
//! setup and read-back helpers for asserting side effects.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{StoreError, StoreResult};
use crate::records::*;
use crate::traits::*;

// ---------------------------------------------------------------------------
// MemoryCmdb
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct DeployedRow {
    cloud_id: CiId,
    entry_point: String,
    ns_path: String,
    priority: i32,
}

#[derive(Debug, Default)]
struct CmdbInner {
    environments: HashMap<u64, Environment>,
    platforms: HashMap<String, Vec<Platform>>,
    links: HashMap<String, Vec<PlatformLink>>,
    bindings: HashMap<u64, Vec<CloudBinding>>,
    entry_points: HashMap<u64, String>,
    deployed: Vec<DeployedRow>,
    pending_links: HashMap<String, Vec<RelationId>>,
    pending_global_vars: HashMap<String, Vec<CiId>>,
    namespaces: HashSet<String>,
    locked_namespaces: HashSet<String>,
    missing_services: HashMap<u64, Vec<String>>,
    deleted_relations: Vec<RelationId>,
    deleted_cis: Vec<(CiId, bool, String)>,
}

/// In-memory configuration-management store.
#[derive(Debug, Default)]
pub struct MemoryCmdb {
    inner: Mutex<CmdbInner>,
}

impl MemoryCmdb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_environment(&self, env: Environment) {
        let mut inner = self.inner.lock().unwrap();
        inner.environments.insert(env.id.0, env);
    }

    pub fn add_platform(&self, manifest_ns: &str, platform: Platform) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .platforms
            .entry(manifest_ns.to_string())
            .or_default()
            .push(platform);
    }

    /// Record that `from` depends on `to` (a LinksTo edge).
    pub fn add_link(&self, manifest_ns: &str, from: CiId, to: CiId) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .links
            .entry(manifest_ns.to_string())
            .or_default()
            .push(PlatformLink { from, to });
    }

    pub fn add_cloud_binding(&self, binding: CloudBinding) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .bindings
            .entry(binding.platform_id.0)
            .or_default()
            .push(binding);
    }

    pub fn set_entry_point(&self, platform: CiId, class_name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.entry_points.insert(platform.0, class_name.to_string());
    }

    pub fn add_deployed_instance(
        &self,
        cloud: CiId,
        entry_point: &str,
        ns_path: &str,
        priority: i32,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.deployed.push(DeployedRow {
            cloud_id: cloud,
            entry_point: entry_point.to_string(),
            ns_path: ns_path.to_string(),
            priority,
        });
    }

    pub fn add_pending_deletion_link(&self, manifest_ns: &str, relation: RelationId) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .pending_links
            .entry(manifest_ns.to_string())
            .or_default()
            .push(relation);
    }

    pub fn add_pending_deletion_global_var(&self, manifest_ns: &str, ci: CiId) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .pending_global_vars
            .entry(manifest_ns.to_string())
            .or_default()
            .push(ci);
    }

    pub fn set_missing_services(&self, platform: CiId, services: Vec<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.missing_services.insert(platform.0, services);
    }

    /// Relations deleted through `delete_relation`, in call order.
    pub fn deleted_relations(&self) -> Vec<RelationId> {
        self.inner.lock().unwrap().deleted_relations.clone()
    }

    /// CIs deleted through `delete_ci`, in call order.
    pub fn deleted_cis(&self) -> Vec<(CiId, bool, String)> {
        self.inner.lock().unwrap().deleted_cis.clone()
    }

    pub fn namespace_exists(&self, ns_path: &str) -> bool {
        self.inner.lock().unwrap().namespaces.contains(ns_path)
    }

    pub fn namespace_locked(&self, ns_path: &str) -> bool {
        self.inner.lock().unwrap().locked_namespaces.contains(ns_path)
    }
}

#[async_trait]
impl CmdbStore for MemoryCmdb {
    async fn get_environment(&self, env: EnvId) -> StoreResult<Environment> {
        let inner = self.inner.lock().unwrap();
        inner
            .environments
            .get(&env.0)
            .cloned()
            .ok_or(StoreError::EnvironmentNotFound(env))
    }

    async fn get_platforms(&self, manifest_ns: &str) -> StoreResult<Vec<Platform>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.platforms.get(manifest_ns).cloned().unwrap_or_default())
    }

    async fn get_platform_links(&self, manifest_ns: &str) -> StoreResult<Vec<PlatformLink>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.links.get(manifest_ns).cloned().unwrap_or_default())
    }

    async fn get_cloud_bindings(&self, platform: CiId) -> StoreResult<Vec<CloudBinding>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.bindings.get(&platform.0).cloned().unwrap_or_default())
    }

    async fn get_entry_point(&self, platform: CiId) -> StoreResult<Option<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.entry_points.get(&platform.0).cloned())
    }

    async fn get_deployed_instances(
        &self,
        cloud: CiId,
        entry_point: &str,
        ns_path: &str,
    ) -> StoreResult<Vec<DeployedInstance>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .deployed
            .iter()
            .filter(|row| {
                row.cloud_id == cloud && row.entry_point == entry_point && row.ns_path == ns_path
            })
            .map(|row| DeployedInstance {
                cloud_id: row.cloud_id,
                priority: row.priority,
            })
            .collect())
    }

    async fn get_pending_deletion_links(
        &self,
        manifest_ns: &str,
    ) -> StoreResult<Vec<RelationId>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .pending_links
            .get(manifest_ns)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_relation(&self, relation: RelationId) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for rels in inner.pending_links.values_mut() {
            rels.retain(|r| *r != relation);
        }
        inner.deleted_relations.push(relation);
        Ok(())
    }

    async fn get_pending_deletion_global_vars(
        &self,
        manifest_ns: &str,
    ) -> StoreResult<Vec<CiId>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .pending_global_vars
            .get(manifest_ns)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_ci(&self, ci: CiId, cascade: bool, user: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for vars in inner.pending_global_vars.values_mut() {
            vars.retain(|v| *v != ci);
        }
        inner.deleted_cis.push((ci, cascade, user.to_string()));
        Ok(())
    }

    async fn ensure_namespace(&self, ns_path: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.namespaces.insert(ns_path.to_string());
        Ok(())
    }

    async fn lock_namespace(&self, ns_path: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.namespaces.contains(ns_path) {
            return Err(StoreError::NamespaceNotFound(ns_path.to_string()));
        }
        inner.locked_namespaces.insert(ns_path.to_string());
        Ok(())
    }

    async fn missing_services(&self, platforms: &[CiId]) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        let mut missing = Vec::new();
        for platform in platforms {
            if let Some(services) = inner.missing_services.get(&platform.0) {
                missing.extend(services.iter().cloned());
            }
        }
        Ok(missing)
    }
}

// ---------------------------------------------------------------------------
// MemoryReleaseStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ReleaseInner {
    releases: Vec<Release>,
    rfc_counts: HashMap<u64, (u64, u64)>,
    brushed: Vec<ReleaseId>,
    next_id: u64,
}

/// In-memory release store.
///
/// Ids are assigned monotonically, so "latest" is always the release
/// with the highest id among those matching the query.
#[derive(Debug, Default)]
pub struct MemoryReleaseStore {
    inner: Mutex<ReleaseInner>,
}

impl MemoryReleaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a release in the given state, returning the stored record.
    pub fn create_release(
        &self,
        ns_path: &str,
        state: ReleaseState,
        created_by: &str,
        description: Option<String>,
    ) -> Release {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let release = Release {
            id: ReleaseId(inner.next_id),
            ns_path: ns_path.to_string(),
            state,
            parent_release_id: None,
            created_by: created_by.to_string(),
            description,
            created_at: Utc::now(),
        };
        inner.releases.push(release.clone());
        release
    }

    /// Ensure an open release exists for the namespace, creating one if
    /// needed. This is how the per-binding RFC processor materializes
    /// the release it appends RFCs to.
    pub fn ensure_open_release(&self, ns_path: &str, created_by: &str) -> Release {
        {
            let inner = self.inner.lock().unwrap();
            if let Some(release) = inner
                .releases
                .iter()
                .filter(|r| r.ns_path == ns_path && r.state == ReleaseState::Open)
                .max_by_key(|r| r.id)
            {
                return release.clone();
            }
        }
        self.create_release(ns_path, ReleaseState::Open, created_by, None)
    }

    /// Add RFC CI/relation counts to a release (what the bulk processor
    /// effectively does when it writes RFCs).
    pub fn add_rfcs(&self, release: ReleaseId, ci_count: u64, relation_count: u64) {
        let mut inner = self.inner.lock().unwrap();
        let counts = inner.rfc_counts.entry(release.0).or_insert((0, 0));
        counts.0 += ci_count;
        counts.1 += relation_count;
    }

    /// Releases whose exec orders were brushed, in call order.
    pub fn brushed(&self) -> Vec<ReleaseId> {
        self.inner.lock().unwrap().brushed.clone()
    }

    /// All stored releases (deleted ones excluded).
    pub fn releases(&self) -> Vec<Release> {
        self.inner.lock().unwrap().releases.clone()
    }
}

#[async_trait]
impl ReleaseStore for MemoryReleaseStore {
    async fn get_open_releases(&self, ns_path: &str) -> StoreResult<Vec<Release>> {
        let inner = self.inner.lock().unwrap();
        let mut open: Vec<Release> = inner
            .releases
            .iter()
            .filter(|r| r.ns_path == ns_path && r.state == ReleaseState::Open)
            .cloned()
            .collect();
        open.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(open)
    }

    async fn get_latest_release(
        &self,
        ns_path: &str,
        state: ReleaseState,
    ) -> StoreResult<Option<Release>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .releases
            .iter()
            .filter(|r| r.ns_path == ns_path && r.state == state)
            .max_by_key(|r| r.id)
            .cloned())
    }

    async fn get_release(&self, release: ReleaseId) -> StoreResult<Release> {
        let inner = self.inner.lock().unwrap();
        inner
            .releases
            .iter()
            .find(|r| r.id == release)
            .cloned()
            .ok_or(StoreError::ReleaseNotFound(release))
    }

    async fn update_release(&self, release: &Release) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .releases
            .iter_mut()
            .find(|r| r.id == release.id)
            .ok_or(StoreError::ReleaseNotFound(release.id))?;
        *stored = release.clone();
        Ok(())
    }

    async fn commit_release(
        &self,
        release: ReleaseId,
        _user: &str,
        desc: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .releases
            .iter_mut()
            .find(|r| r.id == release)
            .ok_or(StoreError::ReleaseNotFound(release))?;
        stored.state = ReleaseState::Closed;
        if let Some(desc) = desc {
            stored.description = Some(desc.to_string());
        }
        Ok(())
    }

    async fn delete_release(&self, release: ReleaseId) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.releases.retain(|r| r.id != release);
        inner.rfc_counts.remove(&release.0);
        Ok(())
    }

    async fn rfc_ci_count(&self, release: ReleaseId) -> StoreResult<u64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rfc_counts.get(&release.0).map(|c| c.0).unwrap_or(0))
    }

    async fn rfc_relation_count(&self, release: ReleaseId) -> StoreResult<u64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rfc_counts.get(&release.0).map(|c| c.1).unwrap_or(0))
    }

    async fn brush_exec_order(&self, release: ReleaseId) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.brushed.push(release);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryDeploymentStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DeploymentInner {
    deployments: Vec<Deployment>,
    next_id: u64,
}

/// In-memory deployment store.
#[derive(Debug, Default)]
pub struct MemoryDeploymentStore {
    inner: Mutex<DeploymentInner>,
}

impl MemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a deployment in the given state.
    pub fn add_deployment(
        &self,
        ns_path: &str,
        release: ReleaseId,
        state: DeploymentState,
    ) -> Deployment {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let deployment = Deployment {
            id: DeploymentId(inner.next_id),
            ns_path: ns_path.to_string(),
            release_id: release,
            state,
            created_by: "seed".to_string(),
            description: None,
            created_at: Utc::now(),
        };
        inner.deployments.push(deployment.clone());
        deployment
    }

    pub fn deployments(&self) -> Vec<Deployment> {
        self.inner.lock().unwrap().deployments.clone()
    }
}

#[async_trait]
impl DeploymentStore for MemoryDeploymentStore {
    async fn get_open_deployment(&self, ns_path: &str) -> StoreResult<Option<Deployment>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .deployments
            .iter()
            .find(|d| d.ns_path == ns_path && d.state.is_open())
            .cloned())
    }

    async fn deploy_release(&self, new: NewDeployment) -> StoreResult<Deployment> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let deployment = Deployment {
            id: DeploymentId(inner.next_id),
            ns_path: new.ns_path,
            release_id: new.release_id,
            state: DeploymentState::Pending,
            created_by: new.created_by,
            description: new.description,
            created_at: Utc::now(),
        };
        inner.deployments.push(deployment.clone());
        Ok(deployment)
    }
}

// ---------------------------------------------------------------------------
// MemoryEnvLock
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LockInner {
    holders: HashMap<u64, String>,
    messages: HashMap<u64, String>,
}

/// In-memory environment lock with owner tokens and trailing messages.
#[derive(Debug, Default)]
pub struct MemoryEnvLock {
    inner: Mutex<LockInner>,
}

impl MemoryEnvLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EnvLock for MemoryEnvLock {
    async fn acquire(&self, env: EnvId, token: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.holders.contains_key(&env.0) {
            return Err(StoreError::LockHeld(env));
        }
        inner.holders.insert(env.0, token.to_string());
        inner.messages.remove(&env.0);
        Ok(())
    }

    async fn release(&self, env: EnvId, message: &str, token: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.holders.get(&env.0) {
            Some(holder) if holder == token => {
                inner.holders.remove(&env.0);
                inner.messages.insert(env.0, message.to_string());
                Ok(())
            }
            _ => Err(StoreError::LockTokenMismatch(env)),
        }
    }

    async fn reset(&self, env: EnvId) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.holders.remove(&env.0);
        inner.messages.remove(&env.0);
        Ok(())
    }

    async fn state(&self, env: EnvId) -> StoreResult<EnvLockState> {
        let inner = self.inner.lock().unwrap();
        Ok(EnvLockState {
            locked: inner.holders.contains_key(&env.0),
            token: inner.holders.get(&env.0).cloned(),
            message: inner.messages.get(&env.0).cloned(),
        })
    }
}
