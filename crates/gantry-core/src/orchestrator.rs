//! Asynchronous per-environment orchestration.
//!
//! Wraps BOM generation, deployment submission, and flex operations in
//! environment-locked background tasks. The caller gets control back as
//! soon as the lock is acquired; the outcome is observable through the
//! status message the task leaves on the lock when it finishes.
//!
//! Each invocation carries a fresh owner token, so only the task that
//! acquired a lock can release it. Total concurrency across all
//! environments is bounded by a semaphore; serialization within one
//! environment is the lock's job.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use gantry_store::{CiId, EnvId, EnvLock, EnvLockState, ReleaseId, StoreError};
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::{BomEngine, BomOutcome};
use crate::error::{GantryError, Result};
use crate::processor::FlexProcessor;

/// Marker prefix of a successful compile's lock status message.
pub const SUCCESS_PREFIX: &str = "success: ";
/// Marker prefix of a failed operation's lock status message.
pub const ERROR_PREFIX: &str = "error: ";

/// Request to auto-deploy the generated BOM.
#[derive(Debug, Clone, Default)]
pub struct DeployDescriptor {
    pub description: Option<String>,
}

/// Environment-locked background execution of engine operations.
pub struct Orchestrator {
    engine: Arc<BomEngine>,
    flex: Arc<dyn FlexProcessor>,
    lock: Arc<dyn EnvLock>,
    permits: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(engine: Arc<BomEngine>, flex: Arc<dyn FlexProcessor>, lock: Arc<dyn EnvLock>) -> Self {
        let permits = Arc::new(Semaphore::new(engine.config().max_concurrent_ops));
        Self {
            engine,
            flex,
            lock,
            permits,
        }
    }

    /// Compile an environment in the background: generate its BOM and,
    /// when `deploy` is given, submit the result for deployment.
    ///
    /// Returns as soon as the environment lock is held and the task is
    /// spawned. Fails fast with [`GantryError::EnvironmentLocked`] when
    /// another operation holds the lock; whether to retry or queue is
    /// the caller's decision.
    pub async fn compile_env(
        &self,
        env: EnvId,
        user: &str,
        excluded: HashSet<CiId>,
        deploy: Option<DeployDescriptor>,
        desc: Option<String>,
        commit: bool,
    ) -> Result<()> {
        let token = Uuid::new_v4().to_string();
        self.acquire(env, &token).await?;

        let engine = Arc::clone(&self.engine);
        let lock = Arc::clone(&self.lock);
        let permits = Arc::clone(&self.permits);
        let user = user.to_string();

        tokio::spawn(async move {
            // The env lock is already held; the permit only bounds how
            // many tasks run at once. The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();
            let started = Instant::now();
            let auto_deploy = deploy.is_some();

            let run = async {
                let (bom, _deployment_id) = match &deploy {
                    Some(descriptor) => {
                        let desc = descriptor.description.as_deref().or(desc.as_deref());
                        let outcome = engine
                            .generate_and_deploy_bom(env, &user, &excluded, desc, commit)
                            .await?;
                        (outcome.bom, outcome.deployment_id)
                    }
                    None => {
                        let bom = engine
                            .generate_bom(env, &user, &excluded, desc.as_deref(), commit)
                            .await?;
                        (bom, None)
                    }
                };
                release_info(&engine, &bom, &user, auto_deploy).await
            };

            let message = match run.await {
                Ok(release_info) => {
                    format!(
                        "{SUCCESS_PREFIX}generation time taken: {:.3} seconds. releaseInfo={}",
                        started.elapsed().as_secs_f64(),
                        release_info
                    )
                }
                Err(err) => {
                    error!(env = %env, error = %err, "BOM generation failed");
                    format!("{ERROR_PREFIX}{err}")
                }
            };

            if let Err(err) = lock.release(env, &message, &token).await {
                error!(env = %env, error = %err, "failed to release environment lock");
            }
        });

        Ok(())
    }

    /// Run one flex (scale) step in the background under the
    /// environment lock. Success leaves an empty status message.
    pub async fn process_flex(
        &self,
        env: EnvId,
        flex_release: ReleaseId,
        step: u32,
        scale_up: bool,
    ) -> Result<()> {
        let token = Uuid::new_v4().to_string();
        self.acquire(env, &token).await?;

        let flex = Arc::clone(&self.flex);
        let lock = Arc::clone(&self.lock);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok();

            let message = match flex.process_flex(flex_release, step, scale_up, env).await {
                Ok(()) => String::new(),
                Err(err) => {
                    error!(env = %env, release = %flex_release, error = %err, "flex step failed");
                    format!("{ERROR_PREFIX}{err}")
                }
            };

            if let Err(err) = lock.release(env, &message, &token).await {
                error!(env = %env, error = %err, "failed to release environment lock");
            }
        });

        Ok(())
    }

    /// Operator escape hatch: force-clear a stuck environment lock,
    /// bypassing the owner-token check.
    pub async fn reset_env(&self, env: EnvId) -> Result<()> {
        self.lock.reset(env).await?;
        info!(env = %env, "environment lock reset");
        Ok(())
    }

    /// Observable lock state, including the last outcome message.
    pub async fn lock_state(&self, env: EnvId) -> Result<EnvLockState> {
        Ok(self.lock.state(env).await?)
    }

    async fn acquire(&self, env: EnvId, token: &str) -> Result<()> {
        match self.lock.acquire(env, token).await {
            Ok(()) => Ok(()),
            Err(StoreError::LockHeld(_)) => Err(GantryError::EnvironmentLocked(env)),
            Err(err) => Err(err.into()),
        }
    }
}

/// Build the `releaseInfo` JSON blob for the success message, merging
/// over the release's own description when it parses as a JSON object.
async fn release_info(
    engine: &BomEngine,
    bom: &BomOutcome,
    user: &str,
    auto_deploy: bool,
) -> Result<String> {
    let mut info: Map<String, Value> = match bom.release_id {
        Some(release_id) => engine
            .release(release_id)
            .await?
            .description
            .and_then(|desc| serde_json::from_str::<Map<String, Value>>(&desc).ok())
            .unwrap_or_default(),
        None => Map::new(),
    };

    info.insert("createdBy".to_string(), json!(user));
    info.insert("mode".to_string(), json!("persistent"));
    info.insert("autoDeploy".to_string(), json!(auto_deploy));
    info.insert(
        "releaseId".to_string(),
        bom.release_id.map_or(Value::Null, |id| json!(id.0)),
    );

    Ok(serde_json::to_string(&info)?)
}
