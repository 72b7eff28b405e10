//! Object storage group builder
//!
//! Produces the environment's object store with secure, always-on defaults
//! (server-side encryption, all public access blocked, multipart-upload
//! hygiene) and environment-conditional retention from the central policy
//! table. Store names must be globally unique yet deterministic:
//! `{prefix}-{env}-{hash8}`, where the hash is derived from the
//! construction path so reruns with the same inputs yield the same name.
//!
//! The optional consumer binding mirrors the bucket-processing function
//! that reads the store identifier from its execution environment; its
//! runtime logic lives with the function's owners, not here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{EnvironmentProfile, RemovalPolicy};
use crate::iam::{PolicyStatement, RoleSpec};
use crate::{DEFAULT_OBJECT_EXPIRY_DAYS, MULTIPART_ABORT_DAYS};

/// Fixed prefix for store access logs
pub const ACCESS_LOG_PREFIX: &str = "access-logs";

/// Environment variable the consumer function reads the store name from
pub const STORE_NAME_VARIABLE: &str = "BUCKET_NAME";

/// Lifecycle rules for the object store
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRules {
    /// Abort incomplete multipart uploads after this many days
    pub abort_incomplete_multipart_days: u32,
    /// Expire objects after this many days
    pub expiry_days: u32,
    /// Expire noncurrent versions after this many days (versioned stores)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noncurrent_expiry_days: Option<u32>,
}

/// The bucket-consumer function binding
///
/// The function exposes a single named entry point and reads one
/// configuration value - the store identifier - from its execution
/// environment. Its grant is read-write on the one store, nothing more.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionBinding {
    /// Deterministic function name
    pub name: String,
    /// Named entry point
    pub entry_point: String,
    /// Runtime identifier
    pub runtime: String,
    /// Execution-environment values
    pub environment: BTreeMap<String, String>,
    /// Function identity with its store grant
    pub identity: RoleSpec,
}

/// The object store for one environment
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStoreSpec {
    /// Globally unique deterministic name, `{prefix}-{env}-{hash8}`
    pub name: String,
    /// Object versioning (environment-conditional)
    pub versioned: bool,
    /// Server-side encryption - always on
    pub server_side_encryption: bool,
    /// All public access blocked - always on
    pub block_public_access: bool,
    /// Teardown policy (environment-conditional)
    pub removal: RemovalPolicy,
    /// Auto-purge objects on teardown (environment-conditional)
    pub auto_purge_objects: bool,
    /// Lifecycle rules
    pub lifecycle: LifecycleRules,
    /// Access logging prefix
    pub access_log_prefix: String,
    /// Optional bucket-consumer function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<FunctionBinding>,
}

/// Builds the object storage group for one environment
#[derive(Clone, Debug, Default)]
pub struct ObjectStorageBuilder {
    prefix: Option<String>,
    expiry_days: Option<u32>,
    with_consumer: bool,
}

impl ObjectStorageBuilder {
    /// Create a builder with default lifecycle and no consumer
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the store name prefix (defaults to the project name)
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Override the object expiry in days
    pub fn expiry_days(mut self, days: u32) -> Self {
        self.expiry_days = Some(days);
        self
    }

    /// Attach the bucket-consumer function binding
    pub fn with_consumer(mut self) -> Self {
        self.with_consumer = true;
        self
    }

    /// Build the object store spec
    pub fn build(&self, profile: &EnvironmentProfile) -> ObjectStoreSpec {
        let policy = profile.policy();
        let prefix = self
            .prefix
            .clone()
            .unwrap_or_else(|| profile.project.to_ascii_lowercase());
        let name = store_name(&prefix, profile);

        let consumer = self.with_consumer.then(|| {
            let fn_name = profile.resource_name("fn");
            let mut environment = BTreeMap::new();
            environment.insert(STORE_NAME_VARIABLE.to_string(), name.clone());
            FunctionBinding {
                identity: RoleSpec::service(
                    format!("{fn_name}-role"),
                    "function",
                    format!("Identity for the {} store consumer", profile.environment),
                )
                .with_statement(PolicyStatement::object_read_write(&name)),
                name: fn_name,
                entry_point: "index.handler".to_string(),
                runtime: "nodejs20.x".to_string(),
                environment,
            }
        });

        let spec = ObjectStoreSpec {
            name,
            versioned: policy.versioning,
            server_side_encryption: true,
            block_public_access: true,
            removal: policy.removal,
            auto_purge_objects: policy.auto_purge_objects,
            lifecycle: LifecycleRules {
                abort_incomplete_multipart_days: MULTIPART_ABORT_DAYS,
                expiry_days: self.expiry_days.unwrap_or(DEFAULT_OBJECT_EXPIRY_DAYS),
                noncurrent_expiry_days: policy.noncurrent_expiry_days,
            },
            access_log_prefix: ACCESS_LOG_PREFIX.to_string(),
            consumer,
        };
        debug!(store = %spec.name, versioned = spec.versioned, "built object store");
        spec
    }
}

/// Deterministic store name: `{prefix}-{env}-{hash8}`, lower-cased
///
/// The short hash covers the construction path (project, environment,
/// group), so the name is stable across reruns but distinct across
/// projects sharing a prefix.
fn store_name(prefix: &str, profile: &EnvironmentProfile) -> String {
    let path = format!(
        "{}/{}/object-storage",
        profile.project, profile.environment
    );
    let digest = Sha256::digest(path.as_bytes());
    let short = hex::encode(&digest[..4]);
    format!("{}-{}-{}", prefix, profile.environment, short).to_ascii_lowercase()
}
