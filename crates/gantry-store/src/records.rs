//! Typed records exchanged with the external stores.
//!
//! These are the wire shapes of the configuration-management store, the
//! release/deployment stores, and the environment lock as Gantry sees
//! them. Attribute bags from the backing store are flattened into typed
//! fields at the boundary; the engine never parses raw attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(
    /// Identifier of an environment configuration item.
    EnvId
);
id_newtype!(
    /// Identifier of a configuration item (platform, cloud, variable, ...).
    CiId
);
id_newtype!(
    /// Identifier of a relation between two configuration items.
    RelationId
);
id_newtype!(
    /// Identifier of a release (manifest or BOM).
    ReleaseId
);
id_newtype!(
    /// Identifier of a deployment created from a BOM release.
    DeploymentId
);

// ---------------------------------------------------------------------------
// Environment & platforms
// ---------------------------------------------------------------------------

/// An environment: owns a manifest namespace and a BOM namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: EnvId,
    pub name: String,
    /// Namespace the environment CI itself lives in.
    pub ns_path: String,
}

impl Environment {
    /// Namespace holding the environment's manifest (desired state).
    pub fn manifest_ns(&self) -> String {
        format!("{}/{}/manifest", self.ns_path, self.name)
    }

    /// Namespace holding the environment's BOM (concrete change records).
    pub fn bom_ns(&self) -> String {
        format!("{}/{}/bom", self.ns_path, self.name)
    }
}

/// Lifecycle state of a configuration item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiState {
    Active,
    PendingDeletion,
    Inactive,
}

/// A deployable platform within an environment's manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: CiId,
    pub name: String,
    /// Major version component of the platform's BOM namespace.
    pub major_version: String,
    pub ns_path: String,
    pub state: CiState,
}

impl Platform {
    pub fn is_pending_deletion(&self) -> bool {
        self.state == CiState::PendingDeletion
    }
}

/// A directed LinksTo dependency edge: `from` depends on `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformLink {
    pub from: CiId,
    pub to: CiId,
}

// ---------------------------------------------------------------------------
// Cloud bindings
// ---------------------------------------------------------------------------

/// Administrative state of a cloud for a given platform binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminStatus {
    Active,
    Inert,
    Offline,
}

/// A platform-to-cloud binding relation.
///
/// `priority` classifies the cloud (primary vs secondary capacity);
/// `dpmt_order` is the explicit tie-break sequence within one priority
/// group and defaults to 1 when the relation does not carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudBinding {
    pub relation_id: RelationId,
    pub platform_id: CiId,
    pub cloud_id: CiId,
    pub cloud_name: String,
    pub priority: i32,
    pub dpmt_order: i32,
    pub admin_status: AdminStatus,
}

impl CloudBinding {
    /// Binding with the default deployment order of 1.
    pub fn new(
        relation_id: RelationId,
        platform_id: CiId,
        cloud_id: CiId,
        cloud_name: impl Into<String>,
        priority: i32,
        admin_status: AdminStatus,
    ) -> Self {
        Self {
            relation_id,
            platform_id,
            cloud_id,
            cloud_name: cloud_name.into(),
            priority,
            dpmt_order: 1,
            admin_status,
        }
    }

    /// Override the explicit deployment order within the priority group.
    pub fn with_dpmt_order(mut self, dpmt_order: i32) -> Self {
        self.dpmt_order = dpmt_order;
        self
    }

    pub fn is_active(&self) -> bool {
        self.admin_status == AdminStatus::Active
    }

    pub fn is_offline(&self) -> bool {
        self.admin_status == AdminStatus::Offline
    }
}

/// An instance currently deployed to a cloud at a platform's entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedInstance {
    pub cloud_id: CiId,
    pub priority: i32,
}

// ---------------------------------------------------------------------------
// Releases & deployments
// ---------------------------------------------------------------------------

/// State of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    Open,
    Closed,
    Canceled,
}

/// An ordered, append-only container of RFCs scoped to a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    pub ns_path: String,
    pub state: ReleaseState,
    /// BOM releases point back at the manifest release they were
    /// generated from.
    pub parent_release_id: Option<ReleaseId>,
    pub created_by: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// State of a deployment as tracked by the deployment engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    Pending,
    Active,
    Paused,
    Failed,
    Complete,
    Canceled,
}

impl DeploymentState {
    /// An open deployment blocks BOM generation for its namespace.
    pub fn is_open(&self) -> bool {
        !matches!(self, DeploymentState::Complete | DeploymentState::Canceled)
    }
}

/// A deployment created from a BOM release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub ns_path: String,
    pub release_id: ReleaseId,
    pub state: DeploymentState,
    pub created_by: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request handed to the deployment store to create a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeployment {
    pub ns_path: String,
    pub release_id: ReleaseId,
    pub created_by: String,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Environment lock
// ---------------------------------------------------------------------------

/// Observable state of an environment lock.
///
/// `message` carries the outcome of the last completed operation (a
/// success marker, an error marker, or an empty string) and survives
/// until the next acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvLockState {
    pub locked: bool,
    pub token: Option<String>,
    pub message: Option<String>,
}
