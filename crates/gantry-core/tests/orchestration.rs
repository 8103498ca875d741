use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gantry_core::engine::BomEngine;
use gantry_core::{
    BindingProcessor, DeployDescriptor, EngineConfig, EnvContext, FlexProcessor, GantryError,
    Orchestrator, Result, ERROR_PREFIX, SUCCESS_PREFIX,
};
use gantry_store::fakes::{MemoryCmdb, MemoryDeploymentStore, MemoryEnvLock, MemoryReleaseStore};
use gantry_store::{
    AdminStatus, CiId, CiState, CloudBinding, DeploymentState, EnvId, EnvLockState, Environment,
    Platform, ReleaseId, RelationId,
};
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Binding processor that optionally parks on a gate before doing its
/// work, so tests can hold the environment lock open deliberately.
struct GatedProcessor {
    releases: Arc<MemoryReleaseStore>,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl BindingProcessor for GatedProcessor {
    async fn process_platform(
        &self,
        context: &EnvContext,
        _platform: &Platform,
        _binding: &CloudBinding,
        start_exec_order: u32,
        _active: bool,
    ) -> Result<u32> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
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

struct OkFlex;

#[async_trait]
impl FlexProcessor for OkFlex {
    async fn process_flex(
        &self,
        _flex_release: ReleaseId,
        _step: u32,
        _scale_up: bool,
        _env: EnvId,
    ) -> Result<()> {
        Ok(())
    }
}

struct FailingFlex;

#[async_trait]
impl FlexProcessor for FailingFlex {
    async fn process_flex(
        &self,
        _flex_release: ReleaseId,
        _step: u32,
        _scale_up: bool,
        _env: EnvId,
    ) -> Result<()> {
        Err(GantryError::Flex("scale step exploded".to_string()))
    }
}

struct Harness {
    cmdb: Arc<MemoryCmdb>,
    deployments: Arc<MemoryDeploymentStore>,
    orchestrator: Orchestrator,
    env: Environment,
}

fn harness(flex: Arc<dyn FlexProcessor>, gate: Option<Arc<Notify>>) -> Harness {
    let cmdb = Arc::new(MemoryCmdb::new());
    let releases = Arc::new(MemoryReleaseStore::new());
    let deployments = Arc::new(MemoryDeploymentStore::new());
    let lock = Arc::new(MemoryEnvLock::new());
    let processor = Arc::new(GatedProcessor {
        releases: Arc::clone(&releases),
        gate,
    });

    let env = Environment {
        id: EnvId(1),
        name: "prod".to_string(),
        ns_path: "/acme/web".to_string(),
    };
    cmdb.add_environment(env.clone());
    let platform = Platform {
        id: CiId(10),
        name: "app".to_string(),
        major_version: "1".to_string(),
        ns_path: env.manifest_ns(),
        state: CiState::Active,
    };
    cmdb.add_platform(&env.manifest_ns(), platform);
    cmdb.add_cloud_binding(CloudBinding::new(
        RelationId(100),
        CiId(10),
        CiId(100),
        "us-east-1",
        1,
        AdminStatus::Active,
    ));

    let engine = Arc::new(BomEngine::new(
        Arc::clone(&cmdb) as Arc<dyn gantry_store::CmdbStore>,
        releases as Arc<dyn gantry_store::ReleaseStore>,
        Arc::clone(&deployments) as Arc<dyn gantry_store::DeploymentStore>,
        processor as Arc<dyn BindingProcessor>,
        EngineConfig::default(),
    ));
    let orchestrator = Orchestrator::new(engine, flex, lock as Arc<dyn gantry_store::EnvLock>);

    Harness {
        cmdb,
        deployments,
        orchestrator,
        env,
    }
}

async fn wait_unlocked(orchestrator: &Orchestrator, env: EnvId) -> EnvLockState {
    for _ in 0..400 {
        let state = orchestrator.lock_state(env).await.expect("lock state");
        if !state.locked {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("environment never unlocked");
}

// ---------------------------------------------------------------------------
// compile_env
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_compile_unlocks_with_success_message() {
    let h = harness(Arc::new(OkFlex), None);

    h.orchestrator
        .compile_env(h.env.id, "alice", HashSet::new(), None, None, false)
        .await
        .expect("compile accepted");

    let state = wait_unlocked(&h.orchestrator, h.env.id).await;
    let message = state.message.expect("status message");
    assert!(message.starts_with(SUCCESS_PREFIX), "message: {message}");
    assert!(message.contains("releaseInfo="));
    assert!(message.contains("\"createdBy\":\"alice\""));
    assert!(message.contains("\"autoDeploy\":false"));
    assert!(message.contains("\"releaseId\":"));
}

#[tokio::test]
async fn failed_compile_unlocks_with_error_message() {
    let h = harness(Arc::new(OkFlex), None);
    // an open deployment makes generation refuse
    h.deployments
        .add_deployment(&h.env.bom_ns(), ReleaseId(7), DeploymentState::Active);

    h.orchestrator
        .compile_env(h.env.id, "alice", HashSet::new(), None, None, false)
        .await
        .expect("compile accepted");

    let state = wait_unlocked(&h.orchestrator, h.env.id).await;
    let message = state.message.expect("status message");
    assert!(message.starts_with(ERROR_PREFIX), "message: {message}");
    assert!(message.contains("deployment"));
}

#[tokio::test]
async fn compile_with_deploy_descriptor_submits_a_deployment() {
    let h = harness(Arc::new(OkFlex), None);

    h.orchestrator
        .compile_env(
            h.env.id,
            "alice",
            HashSet::new(),
            Some(DeployDescriptor {
                description: Some("canary rollout".to_string()),
            }),
            None,
            false,
        )
        .await
        .expect("compile accepted");

    let state = wait_unlocked(&h.orchestrator, h.env.id).await;
    let message = state.message.expect("status message");
    assert!(message.contains("\"autoDeploy\":true"));

    let deployments = h.deployments.deployments();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].description.as_deref(), Some("canary rollout"));
}

#[tokio::test]
async fn concurrent_compile_on_locked_environment_is_rejected() {
    let gate = Arc::new(Notify::new());
    let h = harness(Arc::new(OkFlex), Some(Arc::clone(&gate)));

    h.orchestrator
        .compile_env(h.env.id, "alice", HashSet::new(), None, None, false)
        .await
        .expect("first compile accepted");

    let err = h
        .orchestrator
        .compile_env(h.env.id, "bob", HashSet::new(), None, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, GantryError::EnvironmentLocked(EnvId(1))));

    // let the first task finish and verify it still unlocks cleanly
    gate.notify_one();
    let state = wait_unlocked(&h.orchestrator, h.env.id).await;
    assert!(state.message.expect("message").starts_with(SUCCESS_PREFIX));
}

#[tokio::test]
async fn compiles_on_different_environments_run_independently() {
    let h = harness(Arc::new(OkFlex), None);
    let other = Environment {
        id: EnvId(2),
        name: "qa".to_string(),
        ns_path: "/acme/web".to_string(),
    };
    h.cmdb.add_environment(other.clone());

    h.orchestrator
        .compile_env(h.env.id, "alice", HashSet::new(), None, None, false)
        .await
        .expect("env 1 accepted");
    h.orchestrator
        .compile_env(other.id, "alice", HashSet::new(), None, None, false)
        .await
        .expect("env 2 accepted");

    wait_unlocked(&h.orchestrator, h.env.id).await;
    wait_unlocked(&h.orchestrator, other.id).await;
}

// ---------------------------------------------------------------------------
// process_flex
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_flex_unlocks_with_empty_message() {
    let h = harness(Arc::new(OkFlex), None);

    h.orchestrator
        .process_flex(h.env.id, ReleaseId(42), 1, true)
        .await
        .expect("flex accepted");

    let state = wait_unlocked(&h.orchestrator, h.env.id).await;
    assert_eq!(state.message.as_deref(), Some(""));
}

#[tokio::test]
async fn failed_flex_unlocks_with_error_message() {
    let h = harness(Arc::new(FailingFlex), None);

    h.orchestrator
        .process_flex(h.env.id, ReleaseId(42), 2, false)
        .await
        .expect("flex accepted");

    let state = wait_unlocked(&h.orchestrator, h.env.id).await;
    let message = state.message.expect("status message");
    assert!(message.starts_with(ERROR_PREFIX));
    assert!(message.contains("scale step exploded"));
}

// ---------------------------------------------------------------------------
// reset_env
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reset_clears_a_held_lock_immediately() {
    let gate = Arc::new(Notify::new());
    let h = harness(Arc::new(OkFlex), Some(Arc::clone(&gate)));

    h.orchestrator
        .compile_env(h.env.id, "alice", HashSet::new(), None, None, false)
        .await
        .expect("compile accepted");
    assert!(h
        .orchestrator
        .lock_state(h.env.id)
        .await
        .expect("state")
        .locked);

    h.orchestrator.reset_env(h.env.id).await.expect("reset");
    let state = h.orchestrator.lock_state(h.env.id).await.expect("state");
    assert!(!state.locked);

    // unblock the still-running task; its release attempt fails the
    // token check and must not re-lock the environment
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let state = h.orchestrator.lock_state(h.env.id).await.expect("state");
    assert!(!state.locked);
}
