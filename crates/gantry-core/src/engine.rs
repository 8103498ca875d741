//! BOM generation engine.
//!
//! Turns a committed environment manifest into a BOM release: an
//! ordered set of RFCs spanning every platform and cloud binding of the
//! environment, with exec orders that honor platform dependencies and
//! cloud priorities. Optionally submits the result for deployment.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use gantry_store::{
    CiId, CmdbStore, DeploymentId, DeploymentStore, EnvId, NewDeployment, Release, ReleaseId,
    ReleaseState, ReleaseStore,
};
use tracing::{debug, info};

use crate::cloud_order;
use crate::config::EngineConfig;
use crate::context::EnvContext;
use crate::error::{GantryError, Result};
use crate::graph;
use crate::lifecycle::ReleaseLifecycle;
use crate::processor::BindingProcessor;
use crate::secondary;

/// Result of one BOM generation call.
///
/// `release_id` is `None` when there is nothing to deploy and no closed
/// BOM release exists to re-link to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomOutcome {
    pub release_id: Option<ReleaseId>,
    pub rfc_count: u64,
    pub relation_count: u64,
}

impl BomOutcome {
    /// Whether this outcome carries freshly generated, deployable work.
    pub fn has_work(&self) -> bool {
        self.release_id.is_some() && self.rfc_count > 0
    }
}

/// Result of a combined generate-and-deploy call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub bom: BomOutcome,
    /// Set when a deployment was actually submitted.
    pub deployment_id: Option<DeploymentId>,
}

/// The BOM generation and deployment-submission engine.
pub struct BomEngine {
    cmdb: Arc<dyn CmdbStore>,
    releases: Arc<dyn ReleaseStore>,
    deployments: Arc<dyn DeploymentStore>,
    processor: Arc<dyn BindingProcessor>,
    lifecycle: ReleaseLifecycle,
    config: EngineConfig,
}

impl BomEngine {
    pub fn new(
        cmdb: Arc<dyn CmdbStore>,
        releases: Arc<dyn ReleaseStore>,
        deployments: Arc<dyn DeploymentStore>,
        processor: Arc<dyn BindingProcessor>,
        config: EngineConfig,
    ) -> Self {
        let lifecycle = ReleaseLifecycle::new(
            Arc::clone(&cmdb),
            Arc::clone(&releases),
            Arc::clone(&deployments),
        );
        Self {
            cmdb,
            releases,
            deployments,
            processor,
            lifecycle,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve a release by id (for status reporting by callers).
    pub async fn release(&self, release: ReleaseId) -> Result<Release> {
        Ok(self.releases.get_release(release).await?)
    }

    /// Generate a BOM release for an environment.
    ///
    /// `excluded` platforms get delete RFCs instead of process RFCs;
    /// `commit` soft-commits the open manifest release first. Re-entrant:
    /// an already-open BOM release is returned as-is.
    pub async fn generate_bom(
        &self,
        env: EnvId,
        user: &str,
        excluded: &HashSet<CiId>,
        desc: Option<&str>,
        commit: bool,
    ) -> Result<BomOutcome> {
        let started = Instant::now();
        let context = EnvContext::load(self.cmdb.as_ref(), env, excluded, user).await?;

        self.lifecycle
            .ensure_no_open_deployment(&context.bom_ns)
            .await?;

        self.cmdb.ensure_namespace(&context.bom_ns).await?;
        self.cmdb.lock_namespace(&context.bom_ns).await?;

        if commit {
            self.lifecycle
                .commit_manifest(&context.manifest_ns, &context.bom_ns, user, desc)
                .await?;
        }

        if let Some(release) = self.lifecycle.open_bom_release(&context.bom_ns).await? {
            info!(
                ns_path = %context.bom_ns,
                release = %release.id,
                "existing open BOM release found, returning it"
            );
            return Ok(BomOutcome {
                release_id: Some(release.id),
                rfc_count: self.releases.rfc_ci_count(release.id).await?,
                relation_count: self.releases.rfc_relation_count(release.id).await?,
            });
        }

        let next_order = self.generate_for_active_clouds(&context).await?;
        self.generate_for_offline_clouds(&context, next_order)
            .await?;

        self.finalize_release(&context, started).await
    }

    /// Generate a BOM and, when it carries work, submit it for
    /// deployment.
    pub async fn generate_and_deploy_bom(
        &self,
        env: EnvId,
        user: &str,
        excluded: &HashSet<CiId>,
        desc: Option<&str>,
        commit: bool,
    ) -> Result<DeployOutcome> {
        let bom = self.generate_bom(env, user, excluded, desc, commit).await?;
        let deployment_id = match bom.release_id {
            Some(release_id) if bom.has_work() => {
                Some(self.submit_deployment(release_id, user, desc).await?)
            }
            _ => None,
        };
        Ok(DeployOutcome { bom, deployment_id })
    }

    /// Create a deployment from a BOM release.
    pub async fn submit_deployment(
        &self,
        release: ReleaseId,
        user: &str,
        desc: Option<&str>,
    ) -> Result<DeploymentId> {
        let bom_release = self.releases.get_release(release).await?;
        let deployment = self
            .deployments
            .deploy_release(NewDeployment {
                ns_path: bom_release.ns_path.clone(),
                release_id: bom_release.id,
                created_by: user.to_string(),
                description: desc.map(str::to_string),
            })
            .await?;
        info!(
            ns_path = %deployment.ns_path,
            release = %release,
            deployment = %deployment.id,
            "created new deployment"
        );
        Ok(deployment.id)
    }

    /// Process every platform across its active clouds, in dependency
    /// order. Returns the starting exec order for the offline pass.
    async fn generate_for_active_clouds(&self, context: &EnvContext) -> Result<u32> {
        info!(ns_path = %context.manifest_ns, "generating BOM for active clouds");
        let pass_started = Instant::now();

        let levels = graph::order_platforms(&context.platforms, &context.links, &context.disabled)?;

        if self.config.check_services {
            let platform_ids: Vec<CiId> = levels.values().flatten().map(|p| p.id).collect();
            let missing = self.cmdb.missing_services(&platform_ids).await?;
            if !missing.is_empty() {
                return Err(GantryError::MissingServices(missing.join(", ")));
            }
        }

        let mut starting_order: u32 = 1;
        for platforms in levels.values() {
            if starting_order > 1 {
                starting_order += 1;
            }
            let mut step_max: u32 = 0;

            for platform in platforms {
                let platform_started = Instant::now();
                let bindings = self.cmdb.get_cloud_bindings(platform.id).await?;
                if bindings.is_empty() {
                    // No cloud binding means the platform is disabled.
                    continue;
                }

                if self.config.check_secondary {
                    secondary::check_secondary(
                        self.cmdb.as_ref(),
                        &self.config,
                        platform,
                        &bindings,
                        &context.platform_bom_ns(platform),
                    )
                    .await?;
                } else {
                    debug!("secondary-cloud check disabled by configuration");
                }

                let mut platform_order = starting_order;
                let mut platform_max: u32 = 0;
                for batch in cloud_order::ordered_batches(&bindings, false) {
                    for binding in &batch {
                        if !binding.is_active() {
                            continue;
                        }
                        let max_used = if context.is_disabled(platform) {
                            self.processor
                                .delete_platform(context, platform, binding, platform_order)
                                .await?
                        } else {
                            self.processor
                                .process_platform(context, platform, binding, platform_order, true)
                                .await?
                        };
                        step_max = step_max.max(max_used);
                        platform_max = platform_max.max(max_used);
                    }
                    if platform_max > platform_order {
                        platform_order = platform_max + 1;
                    }
                }

                info!(
                    ns_path = %platform.ns_path,
                    platform = %platform.name,
                    elapsed_ms = platform_started.elapsed().as_millis() as u64,
                    "generated BOM for platform across active clouds"
                );
            }

            if step_max > 0 {
                starting_order = step_max + 1;
            }
        }

        info!(
            ns_path = %context.manifest_ns,
            elapsed_ms = pass_started.elapsed().as_millis() as u64,
            "done generating BOM for active clouds"
        );
        Ok(starting_order)
    }

    /// Synthesize teardown RFCs for clouds that went offline, in reverse
    /// priority order so secondary capacity drains before primary.
    async fn generate_for_offline_clouds(
        &self,
        context: &EnvContext,
        mut starting_order: u32,
    ) -> Result<()> {
        info!(ns_path = %context.manifest_ns, "generating BOM for offline clouds");
        let pass_started = Instant::now();

        let levels = graph::order_platforms(&context.platforms, &context.links, &context.disabled)?;

        for platforms in levels.values() {
            if starting_order > 1 {
                starting_order += 1;
            }
            let mut step_max: u32 = 0;

            for platform in platforms {
                let bindings = self.cmdb.get_cloud_bindings(platform.id).await?;
                if bindings.is_empty() {
                    continue;
                }

                let mut platform_order = starting_order;
                for batch in cloud_order::ordered_batches(&bindings, true) {
                    for binding in &batch {
                        if !binding.is_offline() {
                            continue;
                        }
                        let max_used = self
                            .processor
                            .delete_platform(context, platform, binding, platform_order)
                            .await?;
                        step_max = step_max.max(max_used);
                    }
                    if step_max > platform_order {
                        platform_order = step_max + 1;
                    }
                }
            }

            if step_max > 0 {
                starting_order = step_max + 1;
            }
        }

        info!(
            ns_path = %context.manifest_ns,
            elapsed_ms = pass_started.elapsed().as_millis() as u64,
            "done generating BOM for offline clouds"
        );
        Ok(())
    }

    /// Attach the parent manifest release, compact exec orders, and
    /// resolve the final outcome — discarding the release again when it
    /// came out empty.
    async fn finalize_release(
        &self,
        context: &EnvContext,
        started: Instant,
    ) -> Result<BomOutcome> {
        let open = self
            .lifecycle
            .link_parent_release(&context.bom_ns, &context.manifest_ns, ReleaseState::Open)
            .await?;

        if let Some(release_id) = open {
            self.releases.brush_exec_order(release_id).await?;
            let rfc_count = self.releases.rfc_ci_count(release_id).await?;
            let relation_count = self.releases.rfc_relation_count(release_id).await?;

            if rfc_count > 0 {
                info!(
                    ns_path = %context.bom_ns,
                    release = %release_id,
                    rfc_count,
                    relation_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "generated BOM release"
                );
                return Ok(BomOutcome {
                    release_id: Some(release_id),
                    rfc_count,
                    relation_count,
                });
            }

            info!(
                ns_path = %context.bom_ns,
                release = %release_id,
                "no RFCs generated, discarding empty BOM release"
            );
            self.releases.delete_release(release_id).await?;
        }

        // Nothing to deploy: sweep global variables still marked for
        // deletion (no RFC will ever process them) and point the
        // namespace back at the latest closed BOM release.
        for var in self
            .cmdb
            .get_pending_deletion_global_vars(&context.manifest_ns)
            .await?
        {
            self.cmdb.delete_ci(var, true, &context.user).await?;
        }

        let closed = self
            .lifecycle
            .link_parent_release(&context.bom_ns, &context.manifest_ns, ReleaseState::Closed)
            .await?;

        info!(
            ns_path = %context.bom_ns,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "nothing to deploy"
        );
        Ok(BomOutcome {
            release_id: closed,
            rfc_count: 0,
            relation_count: 0,
        })
    }
}
