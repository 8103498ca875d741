//! Release lifecycle management.
//!
//! Governs the manifest → BOM → deployment chain: guarding against
//! concurrent deployments, finding re-usable open BOM releases,
//! soft-committing manifests, and linking BOM releases to the manifest
//! release they were generated from.

use std::sync::Arc;

use gantry_store::{
    CmdbStore, DeploymentStore, Release, ReleaseId, ReleaseState, ReleaseStore,
};
use tracing::info;

use crate::error::{GantryError, Result};

/// Store-backed release lifecycle operations.
pub struct ReleaseLifecycle {
    cmdb: Arc<dyn CmdbStore>,
    releases: Arc<dyn ReleaseStore>,
    deployments: Arc<dyn DeploymentStore>,
}

impl ReleaseLifecycle {
    pub fn new(
        cmdb: Arc<dyn CmdbStore>,
        releases: Arc<dyn ReleaseStore>,
        deployments: Arc<dyn DeploymentStore>,
    ) -> Self {
        Self {
            cmdb,
            releases,
            deployments,
        }
    }

    /// Fail when an open deployment exists for the namespace: it must be
    /// completed, cancelled, or retried before another BOM is generated.
    pub async fn ensure_no_open_deployment(&self, bom_ns: &str) -> Result<()> {
        if let Some(deployment) = self.deployments.get_open_deployment(bom_ns).await? {
            return Err(GantryError::DeploymentConflict(format!(
                "deployment {} is still open in {}; cancel or retry it first",
                deployment.id, bom_ns
            )));
        }
        Ok(())
    }

    /// The still-open BOM release for a namespace, if any. Generation is
    /// idempotent: a second call while one release is open re-uses it
    /// instead of generating duplicate RFCs.
    pub async fn open_bom_release(&self, bom_ns: &str) -> Result<Option<Release>> {
        Ok(self
            .releases
            .get_open_releases(bom_ns)
            .await?
            .into_iter()
            .next())
    }

    /// Soft-commit every open manifest release (state transitions only,
    /// no physical deletes), then cancel any open BOM release generated
    /// from the now-superseded manifest.
    pub async fn commit_manifest(
        &self,
        manifest_ns: &str,
        bom_ns: &str,
        user: &str,
        desc: Option<&str>,
    ) -> Result<()> {
        let open = self.releases.get_open_releases(manifest_ns).await?;
        for release in &open {
            self.releases.commit_release(release.id, user, desc).await?;
            info!(ns_path = %manifest_ns, release = %release.id, "committed manifest release");
        }

        // LinksTo relations already marked pending_deletion are deleted
        // eagerly, outside the generated RFC set: with nothing else to
        // deploy (or a circular dependency) the deployment that would
        // process them never happens, and the link would stay forever.
        for relation in self.cmdb.get_pending_deletion_links(manifest_ns).await? {
            self.cmdb.delete_relation(relation).await?;
        }

        if !open.is_empty() {
            for mut bom_release in self.releases.get_open_releases(bom_ns).await? {
                bom_release.state = ReleaseState::Canceled;
                self.releases.update_release(&bom_release).await?;
                info!(
                    ns_path = %bom_ns,
                    release = %bom_release.id,
                    "canceled BOM release superseded by new manifest commit"
                );
            }
        }

        Ok(())
    }

    /// Point the latest release of `state` in the BOM namespace at the
    /// latest closed manifest release and return its id.
    pub async fn link_parent_release(
        &self,
        bom_ns: &str,
        manifest_ns: &str,
        state: ReleaseState,
    ) -> Result<Option<ReleaseId>> {
        let Some(mut bom_release) = self.releases.get_latest_release(bom_ns, state).await? else {
            return Ok(None);
        };

        if let Some(manifest) = self
            .releases
            .get_latest_release(manifest_ns, ReleaseState::Closed)
            .await?
        {
            bom_release.parent_release_id = Some(manifest.id);
        }
        self.releases.update_release(&bom_release).await?;

        Ok(Some(bom_release.id))
    }
}
