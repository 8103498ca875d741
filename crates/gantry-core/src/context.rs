//! Per-generation environment context.

use std::collections::HashSet;

use gantry_store::{CiId, CmdbStore, EnvId, Environment, Platform, PlatformLink};

use crate::error::Result;

/// Everything one BOM generation call needs to know about its
/// environment, loaded up front so the passes over platforms and clouds
/// work from a consistent snapshot.
#[derive(Debug, Clone)]
pub struct EnvContext {
    pub env: Environment,
    pub manifest_ns: String,
    pub bom_ns: String,
    pub platforms: Vec<Platform>,
    pub links: Vec<PlatformLink>,
    /// Platforms excluded from this generation request by the caller.
    pub disabled: HashSet<CiId>,
    pub user: String,
}

impl EnvContext {
    /// Load the context for an environment from the store.
    pub async fn load(
        cmdb: &dyn CmdbStore,
        env_id: EnvId,
        excluded: &HashSet<CiId>,
        user: &str,
    ) -> Result<Self> {
        let env = cmdb.get_environment(env_id).await?;
        let manifest_ns = env.manifest_ns();
        let bom_ns = env.bom_ns();
        let platforms = cmdb.get_platforms(&manifest_ns).await?;
        let links = cmdb.get_platform_links(&manifest_ns).await?;

        Ok(Self {
            env,
            manifest_ns,
            bom_ns,
            platforms,
            links,
            disabled: excluded.clone(),
            user: user.to_string(),
        })
    }

    /// A platform is disabled when the caller excluded it or it is
    /// already marked for deletion; either way it gets delete RFCs.
    pub fn is_disabled(&self, platform: &Platform) -> bool {
        self.disabled.contains(&platform.id) || platform.is_pending_deletion()
    }

    /// BOM namespace of one platform: `{bom_ns}/{name}/{major_version}`.
    pub fn platform_bom_ns(&self, platform: &Platform) -> String {
        format!("{}/{}/{}", self.bom_ns, platform.name, platform.major_version)
    }
}
