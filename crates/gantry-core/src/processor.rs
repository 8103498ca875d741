//! Consumed processor traits.
//!
//! The engine never writes RFCs itself: turning one platform+cloud
//! binding into concrete create/update/delete change records is the
//! bulk processor's job, and flex/scale steps belong to the flex
//! processor. Both are opaque collaborators supplied at construction.

use async_trait::async_trait;

use gantry_store::{CloudBinding, EnvId, Platform, ReleaseId};

use crate::context::EnvContext;
use crate::error::Result;

/// Per-binding RFC bulk generator.
///
/// Both operations append RFCs for the `(platform, binding)` pair to
/// the namespace's open release starting at `start_exec_order`, and
/// return the highest exec order they used. RFCs for the same call may
/// share exec orders (they run concurrently); the engine sequences
/// calls so that nothing depends on a higher-or-equal-ordered RFC.
#[async_trait]
pub trait BindingProcessor: Send + Sync {
    /// Generate create/update RFCs deploying the platform to the cloud.
    async fn process_platform(
        &self,
        context: &EnvContext,
        platform: &Platform,
        binding: &CloudBinding,
        start_exec_order: u32,
        active: bool,
    ) -> Result<u32>;

    /// Generate delete RFCs tearing the platform down from the cloud.
    async fn delete_platform(
        &self,
        context: &EnvContext,
        platform: &Platform,
        binding: &CloudBinding,
        start_exec_order: u32,
    ) -> Result<u32>;
}

/// Elastic scale-up/scale-down step executor.
#[async_trait]
pub trait FlexProcessor: Send + Sync {
    async fn process_flex(
        &self,
        flex_release: ReleaseId,
        step: u32,
        scale_up: bool,
        env: EnvId,
    ) -> Result<()>;
}
