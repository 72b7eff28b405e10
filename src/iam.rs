//! Least-privilege identity specifications
//!
//! Every host, function, and worker pool in the topology carries an
//! identity that grants only the minimum operational permissions its role
//! needs. Identities are declared here as data; the external provisioning
//! engine materializes them. Action identifiers use the neutral
//! `{service}:{Action}` convention of the emitted plan schema.

use serde::{Deserialize, Serialize};

/// One allow statement in an identity policy
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatement {
    /// Permitted actions
    pub actions: Vec<String>,
    /// Resources the actions apply to
    pub resources: Vec<String>,
}

impl PolicyStatement {
    /// Statement over explicit action and resource lists
    pub fn new(actions: &[&str], resources: &[&str]) -> Self {
        Self {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources: resources.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Metric and log emission, the baseline for every host identity
    pub fn metrics_and_logs() -> Self {
        Self::new(
            &[
                "metrics:PutMetricData",
                "logs:CreateLogGroup",
                "logs:CreateLogStream",
                "logs:PutLogEvents",
            ],
            &["*"],
        )
    }

    /// Item-level access to one wide-column table - no administration rights
    pub fn table_item_access(table_name: &str) -> Self {
        Self::new(
            &["table:GetItem", "table:PutItem", "table:UpdateItem"],
            &[table_name],
        )
    }

    /// Block-storage volume lifecycle for the CSI driver - a closed action
    /// set, never wildcard administration
    pub fn volume_lifecycle() -> Self {
        Self::new(
            &[
                "volume:Attach",
                "volume:Detach",
                "volume:Create",
                "volume:Delete",
                "volume:Describe",
                "volume:Modify",
                "volume:Snapshot",
                "volume:Tag",
            ],
            &["*"],
        )
    }

    /// Read-write object access scoped to one store
    pub fn object_read_write(store_name: &str) -> Self {
        Self::new(
            &["objects:Get", "objects:Put", "objects:List", "objects:Delete"],
            &[store_name],
        )
    }
}

/// Managed policy granting remote-management agent access
///
/// The only managed policy any host or worker identity attaches; broad
/// administrative policies never appear in a composed topology.
pub const REMOTE_MANAGEMENT_POLICY: &str = "remote-management-core";

/// How an identity is assumed
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrustPrincipal {
    /// A platform service (e.g., "compute", "function")
    Service(String),
    /// A federated workload identity inside the orchestration cluster
    Federated {
        /// Namespace of the bound service account
        namespace: String,
        /// Service account name
        service_account: String,
    },
}

/// A declared identity with its trust relationship and grants
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    /// Deterministic identity name
    pub name: String,
    /// Who may assume this identity
    pub assumed_by: TrustPrincipal,
    /// Identity description
    pub description: String,
    /// Attached managed policies
    pub managed_policies: Vec<String>,
    /// Inline allow statements
    pub statements: Vec<PolicyStatement>,
}

impl RoleSpec {
    /// Baseline host identity: remote management plus metric/log emission
    pub fn instance_core(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assumed_by: TrustPrincipal::Service("compute".to_string()),
            description: description.into(),
            managed_policies: vec![REMOTE_MANAGEMENT_POLICY.to_string()],
            statements: vec![PolicyStatement::metrics_and_logs()],
        }
    }

    /// Identity assumed by a platform service with no default grants
    pub fn service(
        name: impl Into<String>,
        service: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            assumed_by: TrustPrincipal::Service(service.into()),
            description: description.into(),
            managed_policies: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Federated identity bound to an in-cluster service account
    pub fn federated(
        name: impl Into<String>,
        namespace: impl Into<String>,
        service_account: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            assumed_by: TrustPrincipal::Federated {
                namespace: namespace.into(),
                service_account: service_account.into(),
            },
            description: description.into(),
            managed_policies: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Append an inline statement and return self for chaining
    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Append a managed policy and return self for chaining
    pub fn with_managed_policy(mut self, policy: impl Into<String>) -> Self {
        self.managed_policies.push(policy.into());
        self
    }

    /// All actions granted across inline statements
    pub fn granted_actions(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .flat_map(|s| s.actions.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: Host identities carry only operational permissions
    ///
    /// Remote-management agent access plus metric/log emission - no broad
    /// administrative policy is ever attached.
    #[test]
    fn story_instance_core_is_minimal() {
        let role = RoleSpec::instance_core("acme-web-dev-0-role", "web host identity");
        assert_eq!(role.managed_policies, vec![REMOTE_MANAGEMENT_POLICY]);
        assert_eq!(role.statements.len(), 1);

        let actions: Vec<&str> = role.granted_actions().collect();
        assert_eq!(
            actions,
            vec![
                "metrics:PutMetricData",
                "logs:CreateLogGroup",
                "logs:CreateLogStream",
                "logs:PutLogEvents",
            ]
        );
        assert!(actions.iter().all(|a| !a.contains('*')));
    }

    /// Story: Table access is item-level only
    #[test]
    fn story_table_access_has_no_admin_rights() {
        let statement = PolicyStatement::table_item_access("acme-table-prod");
        assert_eq!(
            statement.actions,
            vec!["table:GetItem", "table:PutItem", "table:UpdateItem"]
        );
        assert_eq!(statement.resources, vec!["acme-table-prod"]);
        assert!(!statement.actions.iter().any(|a| a.contains("Delete")));
        assert!(!statement.actions.iter().any(|a| a.contains("Create")));
    }

    /// Story: The CSI grant is a closed volume-lifecycle action set
    #[test]
    fn story_volume_lifecycle_is_a_closed_set() {
        let statement = PolicyStatement::volume_lifecycle();
        assert_eq!(statement.actions.len(), 8);
        assert!(statement.actions.iter().all(|a| a.starts_with("volume:")));
    }

    #[test]
    fn test_federated_trust_carries_binding() {
        let role = RoleSpec::federated(
            "acme-csi-prod-role",
            "kube-system",
            "block-csi-controller",
            "CSI driver identity",
        )
        .with_statement(PolicyStatement::volume_lifecycle());

        match &role.assumed_by {
            TrustPrincipal::Federated {
                namespace,
                service_account,
            } => {
                assert_eq!(namespace, "kube-system");
                assert_eq!(service_account, "block-csi-controller");
            }
            other => panic!("Expected federated trust, got {other:?}"),
        }
        assert!(role.managed_policies.is_empty());
    }

    #[test]
    fn test_builder_chaining() {
        let role = RoleSpec::service("acme-fn-dev-role", "function", "bucket consumer")
            .with_statement(PolicyStatement::object_read_write("acme-dev-bucket"))
            .with_managed_policy(REMOTE_MANAGEMENT_POLICY);
        assert_eq!(role.statements.len(), 1);
        assert_eq!(role.managed_policies.len(), 1);
    }

    #[test]
    fn test_role_serde_roundtrip() {
        let role = RoleSpec::instance_core("acme-db-prod-role", "database host identity");
        let json = serde_json::to_string(&role).unwrap();
        let parsed: RoleSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(role, parsed);
    }
}
