use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use gantry_core::engine::BomEngine;
use gantry_core::{check_secondary, BindingProcessor, EngineConfig, EnvContext, GantryError, Result};
use gantry_store::fakes::{MemoryCmdb, MemoryDeploymentStore, MemoryReleaseStore};
use gantry_store::{
    AdminStatus, CiId, CiState, CloudBinding, EnvId, Environment, Platform, RelationId,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const PLAT_NS: &str = "/acme/web/prod/bom/app/1";

fn platform() -> Platform {
    Platform {
        id: CiId(1),
        name: "app".to_string(),
        major_version: "1".to_string(),
        ns_path: "/acme/web/prod/manifest".to_string(),
        state: CiState::Active,
    }
}

fn binding(cloud: u64, name: &str, priority: i32, status: AdminStatus) -> CloudBinding {
    CloudBinding::new(RelationId(cloud), CiId(1), CiId(cloud), name, priority, status)
}

async fn check(cmdb: &MemoryCmdb, bindings: &[CloudBinding]) -> Result<()> {
    check_secondary(cmdb, &EngineConfig::default(), &platform(), bindings, PLAT_NS).await
}

// ---------------------------------------------------------------------------
// Validator behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn passes_when_no_secondary_cloud_is_intended() {
    let cmdb = MemoryCmdb::new();
    let bindings = vec![binding(10, "us-east-1", 1, AdminStatus::Active)];

    check(&cmdb, &bindings).await.expect("primary-only passes");
}

#[tokio::test]
async fn passes_when_a_primary_cloud_is_also_active() {
    let cmdb = MemoryCmdb::new();
    cmdb.set_entry_point(CiId(1), "Lb");
    let bindings = vec![
        binding(10, "us-east-1", 1, AdminStatus::Active),
        binding(20, "us-west-2", 2, AdminStatus::Active),
    ];

    check(&cmdb, &bindings).await.expect("mixed passes");
}

#[tokio::test]
async fn fails_when_only_secondary_clouds_remain() {
    let cmdb = MemoryCmdb::new();
    cmdb.set_entry_point(CiId(1), "Lb");
    let bindings = vec![binding(20, "us-west-2", 2, AdminStatus::Active)];

    let err = check(&cmdb, &bindings).await.unwrap_err();
    match err {
        GantryError::AllInstancesSecondary(msg) => {
            assert!(msg.contains(PLAT_NS));
            // no primary cloud is bound at all: generic wording
            assert!(msg.contains("cloud priority"));
        }
        other => panic!("expected AllInstancesSecondary, got {other:?}"),
    }
}

#[tokio::test]
async fn existing_primary_deployment_keeps_the_check_green() {
    // the manifest only activates a secondary cloud, but a primary
    // cloud still has live instances at the entry point
    let cmdb = MemoryCmdb::new();
    cmdb.set_entry_point(CiId(1), "Lb");
    cmdb.add_deployed_instance(CiId(10), "Lb", PLAT_NS, 1);
    let bindings = vec![
        binding(10, "us-east-1", 1, AdminStatus::Inert),
        binding(20, "us-west-2", 2, AdminStatus::Active),
    ];

    check(&cmdb, &bindings).await.expect("existing primary passes");
}

#[tokio::test]
async fn offline_primary_cloud_is_not_counted_and_check_fails() {
    let cmdb = MemoryCmdb::new();
    cmdb.set_entry_point(CiId(1), "Lb");
    cmdb.add_deployed_instance(CiId(10), "Lb", PLAT_NS, 1);
    let bindings = vec![
        binding(10, "us-east-1", 1, AdminStatus::Offline),
        binding(20, "us-west-2", 2, AdminStatus::Active),
    ];

    let err = check(&cmdb, &bindings).await.unwrap_err();
    match err {
        GantryError::AllInstancesSecondary(msg) => {
            assert!(msg.contains("us-east-1"));
            assert!(msg.contains("not in active state"));
        }
        other => panic!("expected AllInstancesSecondary, got {other:?}"),
    }
}

#[tokio::test]
async fn platform_without_entry_point_is_exempt() {
    let cmdb = MemoryCmdb::new();
    // no entry point registered (schema-like platform)
    let bindings = vec![binding(20, "us-west-2", 2, AdminStatus::Active)];

    check(&cmdb, &bindings).await.expect("no entry point passes");
}

// ---------------------------------------------------------------------------
// Engine integration
// ---------------------------------------------------------------------------

struct CountingProcessor {
    releases: Arc<MemoryReleaseStore>,
}

#[async_trait]
impl BindingProcessor for CountingProcessor {
    async fn process_platform(
        &self,
        context: &EnvContext,
        _platform: &Platform,
        _binding: &CloudBinding,
        start_exec_order: u32,
        _active: bool,
    ) -> Result<u32> {
        let release = self.releases.ensure_open_release(&context.bom_ns, &context.user);
        self.releases.add_rfcs(release.id, 1, 0);
        Ok(start_exec_order)
    }

    async fn delete_platform(
        &self,
        _context: &EnvContext,
        _platform: &Platform,
        _binding: &CloudBinding,
        start_exec_order: u32,
    ) -> Result<u32> {
        Ok(start_exec_order)
    }
}

fn engine_with(config: EngineConfig) -> (Arc<MemoryCmdb>, Arc<MemoryReleaseStore>, BomEngine, Environment) {
    let cmdb = Arc::new(MemoryCmdb::new());
    let releases = Arc::new(MemoryReleaseStore::new());
    let deployments = Arc::new(MemoryDeploymentStore::new());
    let processor = Arc::new(CountingProcessor {
        releases: Arc::clone(&releases),
    });

    let env = Environment {
        id: EnvId(1),
        name: "prod".to_string(),
        ns_path: "/acme/web".to_string(),
    };
    cmdb.add_environment(env.clone());

    let engine = BomEngine::new(
        Arc::clone(&cmdb) as Arc<dyn gantry_store::CmdbStore>,
        Arc::clone(&releases) as Arc<dyn gantry_store::ReleaseStore>,
        deployments as Arc<dyn gantry_store::DeploymentStore>,
        processor as Arc<dyn BindingProcessor>,
        config,
    );
    (cmdb, releases, engine, env)
}

#[tokio::test]
async fn generation_aborts_before_any_rfc_when_targets_are_all_secondary() {
    let (cmdb, releases, engine, env) = engine_with(EngineConfig::default());
    cmdb.add_platform(
        &env.manifest_ns(),
        Platform {
            ns_path: env.manifest_ns(),
            ..platform()
        },
    );
    cmdb.set_entry_point(CiId(1), "Lb");
    cmdb.add_cloud_binding(binding(20, "us-west-2", 2, AdminStatus::Active));

    let err = engine
        .generate_bom(env.id, "alice", &HashSet::new(), None, false)
        .await
        .unwrap_err();

    assert!(matches!(err, GantryError::AllInstancesSecondary(_)));
    assert!(releases.releases().is_empty());
}

#[tokio::test]
async fn disabled_secondary_check_lets_generation_proceed() {
    let (cmdb, _releases, engine, env) =
        engine_with(EngineConfig::default().with_check_secondary(false));
    cmdb.add_platform(
        &env.manifest_ns(),
        Platform {
            ns_path: env.manifest_ns(),
            ..platform()
        },
    );
    cmdb.set_entry_point(CiId(1), "Lb");
    cmdb.add_cloud_binding(binding(20, "us-west-2", 2, AdminStatus::Active));

    let outcome = engine
        .generate_bom(env.id, "alice", &HashSet::new(), None, false)
        .await
        .expect("generate");
    assert!(outcome.has_work());
}
