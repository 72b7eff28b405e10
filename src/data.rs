//! Relational and wide-column data group builder
//!
//! Produces the managed relational instance and the wide-column table.
//! Retention, deletion protection, and teardown policy come from the
//! central environment policy table; the builder itself never branches on
//! the environment. A single least-privilege identity is granted item-level
//! access to the table - no table administration rights.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EnvironmentProfile, RemovalPolicy};
use crate::iam::{PolicyStatement, RoleSpec};
use crate::network::{GroupRole, TierKind};

/// Default relational instance class
pub const RELATIONAL_INSTANCE_CLASS: &str = "db.t3.micro";

/// Kind of a key attribute
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// UTF-8 string attribute
    String,
    /// Numeric attribute
    Number,
}

/// One key attribute of the wide-column schema
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyAttribute {
    /// Attribute name
    pub name: String,
    /// Attribute kind
    pub kind: AttributeKind,
}

/// The managed relational instance
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelationalSpec {
    /// Deterministic instance name
    pub name: String,
    /// Database engine
    pub engine: String,
    /// Engine version
    pub engine_version: String,
    /// Instance class
    pub instance_class: String,
    /// Placement tier
    pub tier: TierKind,
    /// Security group binding
    pub security_group: GroupRole,
    /// Initial database name
    pub database_name: String,
    /// Backup retention in days (environment-conditional)
    pub backup_retention_days: u32,
    /// Deletion protection (environment-conditional)
    pub deletion_protection: bool,
    /// Teardown policy (environment-conditional)
    pub removal: RemovalPolicy,
    /// Monitoring granularity - fixed at one minute
    pub monitoring_interval_secs: u32,
}

/// Billing mode of the wide-column table
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BillingMode {
    /// Pay per request, no provisioned capacity
    #[default]
    OnDemand,
}

/// Encryption mode of the wide-column table
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TableEncryption {
    /// Keys held and rotated by the platform
    #[default]
    ServerManaged,
}

/// The managed wide-column table
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WideColumnSpec {
    /// Deterministic table name
    pub name: String,
    /// Partition key
    pub partition_key: KeyAttribute,
    /// Sort key - the ordering timestamp
    pub sort_key: KeyAttribute,
    /// Billing mode
    pub billing: BillingMode,
    /// Encryption mode
    pub encryption: TableEncryption,
    /// Item-expiry attribute, if item TTL is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_attribute: Option<String>,
    /// Teardown policy (environment-conditional)
    pub removal: RemovalPolicy,
}

/// The data group: relational instance, wide-column table, access identity
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataSpec {
    /// Managed relational instance
    pub relational: RelationalSpec,
    /// Managed wide-column table
    pub table: WideColumnSpec,
    /// Item-level access identity for applications
    pub access_identity: RoleSpec,
}

/// Builds the data group for one environment
#[derive(Clone, Debug, Default)]
pub struct DataBuilder {
    instance_class: Option<String>,
    database_name: Option<String>,
    table_name: Option<String>,
}

impl DataBuilder {
    /// Create a builder with the default sizing and names
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the relational instance class
    pub fn instance_class(mut self, class: impl Into<String>) -> Self {
        self.instance_class = Some(class.into());
        self
    }

    /// Override the initial database name
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Override the wide-column table name
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Build the data group spec
    pub fn build(&self, profile: &EnvironmentProfile) -> DataSpec {
        let policy = profile.policy();
        let underscored = profile
            .project
            .to_ascii_lowercase()
            .replace(' ', "_")
            .replace('-', "_");

        let relational = RelationalSpec {
            name: profile.resource_name("sql"),
            engine: "mysql".to_string(),
            engine_version: "8.0".to_string(),
            instance_class: self
                .instance_class
                .clone()
                .unwrap_or_else(|| RELATIONAL_INSTANCE_CLASS.to_string()),
            tier: TierKind::PrivateEgress,
            security_group: GroupRole::Database,
            database_name: self
                .database_name
                .clone()
                .unwrap_or_else(|| format!("{underscored}_db")),
            backup_retention_days: policy.backup_retention_days,
            deletion_protection: policy.deletion_protection,
            removal: policy.removal,
            monitoring_interval_secs: 60,
        };

        let table = WideColumnSpec {
            name: self
                .table_name
                .clone()
                .unwrap_or_else(|| format!("{underscored}_table")),
            partition_key: KeyAttribute {
                name: "id".to_string(),
                kind: AttributeKind::String,
            },
            sort_key: KeyAttribute {
                name: "timestamp".to_string(),
                kind: AttributeKind::Number,
            },
            billing: BillingMode::OnDemand,
            encryption: TableEncryption::ServerManaged,
            ttl_attribute: Some("expiry".to_string()),
            removal: policy.removal,
        };

        let access_identity = RoleSpec::service(
            format!("{}-role", profile.resource_name("data-access")),
            "compute",
            "Item-level application access to the wide-column table",
        )
        .with_statement(PolicyStatement::table_item_access(&table.name));

        debug!(
            relational = %relational.name,
            table = %table.name,
            "built data group"
        );

        DataSpec {
            relational,
            table,
            access_identity,
        }
    }
}
