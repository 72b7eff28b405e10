//! Managed orchestration group builder
//!
//! Produces the container-orchestration control plane, one explicitly
//! managed worker pool, the federated identity binding for the
//! block-storage CSI driver, and the default storage class. The control
//! plane and pool live in the private-egress tier; nothing in this group is
//! internet-facing.
//!
//! The storage class is declared exactly once. Re-declaring is idempotent -
//! it returns the existing declaration and never errors or duplicates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EnvironmentProfile;
use crate::iam::{PolicyStatement, RoleSpec, REMOTE_MANAGEMENT_POLICY};
use crate::network::{NetworkTopology, TierKind};
use crate::{Result, NODE_DISK_GIB, NODE_POOL_DESIRED, NODE_POOL_MAX, NODE_POOL_MIN};

/// Default orchestration platform version
pub const DEFAULT_CLUSTER_VERSION: &str = "1.28";
/// Default worker instance class
pub const DEFAULT_NODE_INSTANCE_TYPE: &str = "t3.medium";
/// Namespace the CSI driver's service account lives in
pub const CSI_NAMESPACE: &str = "kube-system";
/// Service account name for the CSI controller
pub const CSI_SERVICE_ACCOUNT: &str = "block-csi-controller";

/// Control-plane log streams - all of them are always enabled
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterLogKind {
    /// API server logs
    Api,
    /// Audit logs
    Audit,
    /// Authenticator logs
    Authenticator,
    /// Controller-manager logs
    ControllerManager,
    /// Scheduler logs
    Scheduler,
}

impl ClusterLogKind {
    /// Every control-plane log stream
    pub fn all() -> Vec<Self> {
        vec![
            Self::Api,
            Self::Audit,
            Self::Authenticator,
            Self::ControllerManager,
            Self::Scheduler,
        ]
    }
}

/// The control-plane cluster
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Deterministic cluster name
    pub name: String,
    /// Platform version
    pub version: String,
    /// Placement tier
    pub tier: TierKind,
    /// Default capacity - always zero; the pool below is the only capacity
    pub default_capacity: u32,
    /// Enabled control-plane log streams
    pub logging: Vec<ClusterLogKind>,
}

/// Capacity purchasing mode for the worker pool
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityKind {
    /// On-demand capacity
    #[default]
    OnDemand,
}

/// The explicitly managed worker pool
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolSpec {
    /// Deterministic pool name
    pub name: String,
    /// Minimum worker count
    pub min_size: u32,
    /// Desired worker count
    pub desired_size: u32,
    /// Maximum worker count
    pub max_size: u32,
    /// Worker instance class
    pub instance_type: String,
    /// Purchasing mode
    pub capacity: CapacityKind,
    /// Fixed worker disk size in GiB
    pub disk_gib: u32,
    /// Pool labels
    pub labels: BTreeMap<String, String>,
    /// Worker identity - remote management only
    pub identity: RoleSpec,
}

/// Federated identity binding for the block-storage CSI driver
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CsiDriverBinding {
    /// Bound service account name
    pub service_account: String,
    /// Namespace of the service account
    pub namespace: String,
    /// Scoped identity - volume lifecycle actions only
    pub identity: RoleSpec,
}

/// How a provisioned volume binds to its first consumer
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeBinding {
    /// Defer binding until the first consumer is scheduled
    #[default]
    WaitForFirstConsumer,
}

/// What happens to a volume when its claim is deleted
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReclaimPolicy {
    /// Delete the volume with the claim
    #[default]
    Delete,
}

/// The default storage class for the cluster
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageClassSpec {
    /// Storage class name
    pub name: String,
    /// Marked as the cluster default
    pub default_class: bool,
    /// Volume binding mode
    pub volume_binding: VolumeBinding,
    /// Reclaim policy
    pub reclaim: ReclaimPolicy,
    /// Volume expansion allowed
    pub allow_expansion: bool,
    /// Provisioner parameters
    pub parameters: BTreeMap<String, String>,
}

impl StorageClassSpec {
    /// The standard encrypted performance storage class
    pub fn standard() -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("type".to_string(), "gp3".to_string());
        parameters.insert("encrypted".to_string(), "true".to_string());
        parameters.insert("iops".to_string(), "3000".to_string());
        parameters.insert("throughput".to_string(), "125".to_string());
        Self {
            name: "block-standard".to_string(),
            default_class: true,
            volume_binding: VolumeBinding::WaitForFirstConsumer,
            reclaim: ReclaimPolicy::Delete,
            allow_expansion: true,
            parameters,
        }
    }
}

/// The orchestration group: control plane, pool, CSI binding, storage class
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationSpec {
    /// Control-plane cluster
    pub cluster: ClusterSpec,
    /// Managed worker pool
    pub pool: NodePoolSpec,
    /// Block-storage CSI driver binding
    pub csi: CsiDriverBinding,
    /// Declared default storage class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<StorageClassSpec>,
}

impl OrchestrationSpec {
    /// Declare the default storage class, idempotently
    ///
    /// The first declaration wins; later calls return the existing class
    /// without error or duplication.
    pub fn declare_storage_class(&mut self, class: StorageClassSpec) -> &StorageClassSpec {
        self.storage_class.get_or_insert(class)
    }
}

/// Builds the orchestration group for one environment
#[derive(Clone, Debug)]
pub struct OrchestrationBuilder {
    version: String,
    instance_type: String,
}

impl Default for OrchestrationBuilder {
    fn default() -> Self {
        Self {
            version: DEFAULT_CLUSTER_VERSION.to_string(),
            instance_type: DEFAULT_NODE_INSTANCE_TYPE.to_string(),
        }
    }
}

impl OrchestrationBuilder {
    /// Create a builder with the default version and sizing
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the platform version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Override the worker instance class
    pub fn instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    /// Build the orchestration group against the network topology
    pub fn build(
        &self,
        profile: &EnvironmentProfile,
        topology: &NetworkTopology,
    ) -> Result<OrchestrationSpec> {
        let tier = topology.placement_tier(TierKind::PrivateEgress)?;

        let cluster = ClusterSpec {
            name: profile.resource_name("cluster"),
            version: self.version.clone(),
            tier: tier.kind,
            default_capacity: 0,
            logging: ClusterLogKind::all(),
        };

        let pool_name = profile.resource_name("ng");
        let mut labels = BTreeMap::new();
        labels.insert(
            "environment".to_string(),
            profile.environment.to_string(),
        );
        labels.insert("role".to_string(), "general".to_string());
        let pool = NodePoolSpec {
            identity: RoleSpec::service(
                format!("{pool_name}-role"),
                "compute",
                "Worker pool identity - remote management only",
            )
            .with_managed_policy(REMOTE_MANAGEMENT_POLICY),
            name: pool_name,
            min_size: NODE_POOL_MIN,
            desired_size: NODE_POOL_DESIRED,
            max_size: NODE_POOL_MAX,
            instance_type: self.instance_type.clone(),
            capacity: CapacityKind::OnDemand,
            disk_gib: NODE_DISK_GIB,
            labels,
        };

        let csi_role_name = format!("{}-role", profile.resource_name("csi"));
        let csi = CsiDriverBinding {
            service_account: CSI_SERVICE_ACCOUNT.to_string(),
            namespace: CSI_NAMESPACE.to_string(),
            identity: RoleSpec::federated(
                csi_role_name,
                CSI_NAMESPACE,
                CSI_SERVICE_ACCOUNT,
                "Block-storage CSI driver identity - volume lifecycle only",
            )
            .with_statement(PolicyStatement::volume_lifecycle()),
        };

        let mut spec = OrchestrationSpec {
            cluster,
            pool,
            csi,
            storage_class: None,
        };
        spec.declare_storage_class(StorageClassSpec::standard());

        debug!(
            cluster = %spec.cluster.name,
            workers = spec.pool.desired_size,
            "built orchestration group"
        );
        Ok(spec)
    }
}
