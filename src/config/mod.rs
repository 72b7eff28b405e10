//! Environment configuration for the topology composer
//!
//! An [`EnvironmentProfile`] carries everything that distinguishes one
//! deployment environment from another: account and region targeting, the
//! network CIDR plan, the subnet tier layout, the tag set, and the project
//! name used for deterministic resource naming. Profiles are resolved once
//! per composition run through the [`EnvironmentRegistry`] and passed to
//! every builder by shared reference; nothing mutates a profile after
//! resolution.
//!
//! Environment-conditional policy (retention, protection, teardown) lives in
//! the [`policy`] submodule as a single lookup table so that no builder
//! carries its own ad hoc dev/prod branches.

mod policy;

pub use policy::{EnvironmentPolicy, RemovalPolicy};

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Deployment environment identity
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Dev,
    /// Production environment
    Prod,
}

impl Environment {
    /// Canonical short name used in resource and export names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    /// Returns true for the production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

impl std::str::FromStr for Environment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "prod" | "production" => Ok(Self::Prod),
            _ => Err(crate::Error::config_not_found(s)),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subnet tier descriptor from the network CIDR plan
///
/// The `tier` field is a free-form configuration string; it is mapped to a
/// concrete tier kind by the network builder, with unknown values falling
/// back to the most restrictive tier.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    /// Tier name (e.g., "public")
    pub name: String,
    /// Tier kind string (e.g., "PUBLIC", "PRIVATE_WITH_EGRESS")
    pub tier: String,
    /// Prefix length for each subnet in this tier
    pub prefix_len: u8,
}

/// Network CIDR plan for one environment
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    /// Virtual network CIDR block (e.g., "10.0.0.0/16")
    pub cidr: String,
    /// Number of availability zones to spread across
    pub max_azs: u8,
    /// Number of NAT gateways for private-egress tiers
    pub nat_gateways: u8,
    /// Ordered subnet tier descriptors
    pub subnets: Vec<SubnetSpec>,
}

/// Static attributes of one named environment
///
/// Immutable once resolved. All builders receive the same instance by
/// reference, which guarantees consistent tagging and account/region
/// targeting across every resource group.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentProfile {
    /// Environment identity
    pub environment: Environment,
    /// Human-readable environment name (e.g., "Development")
    pub display_name: String,
    /// Target account identifier
    pub account: String,
    /// Target region identifier
    pub region: String,
    /// Project name, the leading component of every deterministic name
    pub project: String,
    /// Network CIDR plan
    pub vpc: VpcConfig,
    /// Tag set applied uniformly to every resource group
    pub tags: BTreeMap<String, String>,
}

impl EnvironmentProfile {
    /// Environment-conditional policy values for this profile
    pub fn policy(&self) -> EnvironmentPolicy {
        EnvironmentPolicy::for_env(self.environment)
    }

    /// Lower-cased `{project}-{env}` prefix for resource and export names
    pub fn name_prefix(&self) -> String {
        format!("{}-{}", sanitize(&self.project), self.environment)
    }

    /// Deterministic logical name for a resource role, `{project}-{role}-{env}`
    pub fn resource_name(&self, role: &str) -> String {
        format!("{}-{}-{}", sanitize(&self.project), role, self.environment)
    }

    /// Deterministic logical name for an indexed resource,
    /// `{project}-{role}-{env}-{index}`
    pub fn indexed_resource_name(&self, role: &str, index: u32) -> String {
        format!("{}-{index}", self.resource_name(role))
    }

    /// Environment-scoped export name, `{project}-{env}-{logical}`
    ///
    /// The environment component makes collisions across concurrently
    /// deployed environments impossible by construction.
    pub fn export_name(&self, logical: &str) -> String {
        format!("{}-{}", self.name_prefix(), sanitize(logical))
    }
}

/// Lower-case a name component and collapse whitespace to hyphens
fn sanitize(raw: &str) -> String {
    raw.to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Registry of environment profiles - the config resolver
///
/// The registry is an explicitly constructed, read-only value with a defined
/// construction-time lifecycle: build it (or use [`EnvironmentRegistry::builtin`]),
/// resolve exactly once per composition run, and share the resolved profile
/// by reference.
#[derive(Clone, Debug, Default)]
pub struct EnvironmentRegistry {
    profiles: BTreeMap<String, EnvironmentProfile>,
}

impl EnvironmentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the shipped dev and prod profiles
    pub fn builtin(project: impl Into<String>) -> Self {
        let project = project.into();
        let mut registry = Self::new();
        // Registration of the two shipped profiles cannot collide.
        let _ = registry.register(builtin_dev(&project));
        let _ = registry.register(builtin_prod(&project));
        registry
    }

    /// Register a profile under its canonical environment name
    ///
    /// Fails with a naming collision if the environment already has a
    /// registered profile.
    pub fn register(&mut self, profile: EnvironmentProfile) -> crate::Result<()> {
        let key = profile.environment.as_str().to_string();
        if self.profiles.contains_key(&key) {
            return Err(crate::Error::collision(format!(
                "environment '{key}' already has a registered profile"
            )));
        }
        self.profiles.insert(key, profile);
        Ok(())
    }

    /// Resolve the named environment's profile
    ///
    /// Pure lookup with no side effects. Fails with `ConfigNotFound` if the
    /// identifier has no registered profile; long-form aliases
    /// ("development", "production") resolve to their canonical profiles.
    pub fn resolve(&self, name: &str) -> crate::Result<&EnvironmentProfile> {
        if let Some(profile) = self.profiles.get(name) {
            return Ok(profile);
        }
        let canonical: Environment = name.parse()?;
        self.profiles
            .get(canonical.as_str())
            .ok_or_else(|| crate::Error::config_not_found(name))
    }

    /// Names of all registered environments
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

fn common_tags(project: &str, profile: &str, cost_center: &str, classification: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert("Project".to_string(), project.to_string());
    tags.insert("Environment".to_string(), profile.to_string());
    tags.insert("Owner".to_string(), "Platform Engineering".to_string());
    tags.insert("SupportEmail".to_string(), "platform@acme.example".to_string());
    tags.insert("CostCenter".to_string(), cost_center.to_string());
    tags.insert("DataClassification".to_string(), classification.to_string());
    tags
}

fn builtin_dev(project: &str) -> EnvironmentProfile {
    EnvironmentProfile {
        environment: Environment::Dev,
        display_name: "Development".to_string(),
        account: "480926032159".to_string(),
        region: "us-east-1".to_string(),
        project: project.to_string(),
        vpc: VpcConfig {
            cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
            nat_gateways: 1,
            subnets: vec![
                SubnetSpec {
                    name: "public".to_string(),
                    tier: "PUBLIC".to_string(),
                    prefix_len: 24,
                },
                SubnetSpec {
                    name: "private".to_string(),
                    tier: "PRIVATE_WITH_EGRESS".to_string(),
                    prefix_len: 24,
                },
            ],
        },
        tags: common_tags(project, "Development", "DEV-123", "Internal"),
    }
}

fn builtin_prod(project: &str) -> EnvironmentProfile {
    EnvironmentProfile {
        environment: Environment::Prod,
        display_name: "Production".to_string(),
        account: "480926032159".to_string(),
        region: "ap-southeast-2".to_string(),
        project: project.to_string(),
        vpc: VpcConfig {
            cidr: "10.1.0.0/16".to_string(),
            max_azs: 3,
            nat_gateways: 2,
            subnets: vec![
                SubnetSpec {
                    name: "public".to_string(),
                    tier: "PUBLIC".to_string(),
                    prefix_len: 24,
                },
                SubnetSpec {
                    name: "private".to_string(),
                    tier: "PRIVATE_WITH_EGRESS".to_string(),
                    prefix_len: 24,
                },
                SubnetSpec {
                    name: "isolated".to_string(),
                    tier: "PRIVATE_ISOLATED".to_string(),
                    prefix_len: 24,
                },
            ],
        },
        tags: common_tags(project, "Production", "PROD-456", "Confidential"),
    }
}
