//! Environment-conditional policy table
//!
//! Every data-bearing resource group (object store, relational instance,
//! wide-column table) derives its retention, protection, and teardown
//! behavior from this one table instead of branching on the environment
//! locally. The table is the single place where dev and prod diverge.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Environment;
use crate::NONCURRENT_VERSION_EXPIRY_DAYS;

/// What happens to a resource when its group is torn down
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Delete the resource with the group
    Destroy,
    /// Keep the resource after the group is deleted
    Retain,
}

impl std::fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Destroy => f.write_str("destroy"),
            Self::Retain => f.write_str("retain"),
        }
    }
}

/// Environment-conditional policy values
///
/// One typed record per environment; builders query it and never branch on
/// the environment themselves.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPolicy {
    /// Object-store versioning
    pub versioning: bool,
    /// Teardown policy for data-bearing resources
    pub removal: RemovalPolicy,
    /// Auto-purge objects when the store is torn down
    pub auto_purge_objects: bool,
    /// Expiry for noncurrent object versions, in days
    pub noncurrent_expiry_days: Option<u32>,
    /// Relational backup retention, in days
    pub backup_retention_days: u32,
    /// Deletion protection on the relational instance
    pub deletion_protection: bool,
}

impl EnvironmentPolicy {
    /// Policy values for the given environment
    pub fn for_env(env: Environment) -> Self {
        match env {
            Environment::Dev => Self {
                versioning: false,
                removal: RemovalPolicy::Destroy,
                auto_purge_objects: true,
                noncurrent_expiry_days: None,
                backup_retention_days: 1,
                deletion_protection: false,
            },
            Environment::Prod => Self {
                versioning: true,
                removal: RemovalPolicy::Retain,
                auto_purge_objects: false,
                noncurrent_expiry_days: Some(NONCURRENT_VERSION_EXPIRY_DAYS),
                backup_retention_days: 7,
                deletion_protection: true,
            },
        }
    }
}
