//! Compute group builder
//!
//! Produces the bastion host, the web tier, and the database host. Every
//! host binds to exactly one subnet tier and one security group, carries a
//! least-privilege identity, an encrypted performance root volume, and
//! session-bound instance metadata. Logical names are deterministic from
//! `{project, role, environment, index}` so reruns with the same inputs
//! produce the same names.
//!
//! Bootstrap content is an opaque blob handed through to the provisioning
//! engine; its contents are owned by the server teams, not this composer.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EnvironmentProfile;
use crate::iam::RoleSpec;
use crate::network::{GroupRole, NetworkTopology, TierKind};
use crate::{Result, DEFAULT_WEB_INSTANCE_COUNT};

/// Default bastion instance class
pub const BASTION_INSTANCE_TYPE: &str = "t3.micro";
/// Default web instance class
pub const WEB_INSTANCE_TYPE: &str = "t3.medium";
/// Default database instance class
pub const DATABASE_INSTANCE_TYPE: &str = "t3.medium";

/// Root volume size for bastion and web hosts, in GiB
const WEB_ROOT_GIB: u32 = 20;
/// Root volume size for the database host, in GiB
const DATABASE_ROOT_GIB: u32 = 30;

/// Role of one host in the compute group
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostRole {
    /// Administrative entry host
    Bastion,
    /// Web tier host
    Web,
    /// Database host
    Database,
}

impl HostRole {
    /// Short token used in deterministic names
    pub fn short(&self) -> &'static str {
        match self {
            Self::Bastion => "bastion",
            Self::Web => "web",
            Self::Database => "db",
        }
    }
}

impl std::fmt::Display for HostRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short())
    }
}

/// Encrypted root volume attached to every host
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockDevice {
    /// Device name
    pub device_name: String,
    /// Volume size in GiB
    pub size_gib: u32,
    /// Encryption at rest - always on
    pub encrypted: bool,
    /// The volume dies with its host
    pub delete_on_termination: bool,
    /// Performance-oriented volume type
    pub volume_type: String,
}

impl BlockDevice {
    /// The standard encrypted performance root volume
    pub fn performance_root(size_gib: u32) -> Self {
        Self {
            device_name: "/dev/xvda".to_string(),
            size_gib,
            encrypted: true,
            delete_on_termination: true,
            volume_type: "gp3".to_string(),
        }
    }
}

/// One provisioned host
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    /// Deterministic logical name
    pub name: String,
    /// Host role
    pub role: HostRole,
    /// Instance class
    pub instance_type: String,
    /// Subnet tier the host is placed in
    pub tier: TierKind,
    /// Security group the host binds to
    pub security_group: GroupRole,
    /// Encrypted root volume
    pub root_volume: BlockDevice,
    /// Instance metadata locked to the session-bound variant
    pub session_bound_metadata: bool,
    /// A static public address is associated with this host
    pub static_public_address: bool,
    /// Least-privilege host identity
    pub identity: RoleSpec,
    /// Opaque bootstrap blob for the provisioning engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

/// The compute group: bastion, web tier, and database host
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComputeSpec {
    /// Administrative entry host
    pub bastion: HostSpec,
    /// Web tier hosts
    pub web: Vec<HostSpec>,
    /// Database host
    pub database: HostSpec,
}

impl ComputeSpec {
    /// Logical names of the web hosts, in index order
    pub fn web_names(&self) -> Vec<&str> {
        self.web.iter().map(|h| h.name.as_str()).collect()
    }
}

/// Builds the compute group for one environment
///
/// Web count and instance classes default from the profile conventions but
/// are overridable per call.
#[derive(Clone, Debug)]
pub struct ComputeBuilder {
    web_count: u32,
    web_instance_type: String,
    database_instance_type: String,
    bastion_instance_type: String,
    web_user_data: Option<String>,
    database_user_data: Option<String>,
}

impl Default for ComputeBuilder {
    fn default() -> Self {
        Self {
            web_count: DEFAULT_WEB_INSTANCE_COUNT,
            web_instance_type: WEB_INSTANCE_TYPE.to_string(),
            database_instance_type: DATABASE_INSTANCE_TYPE.to_string(),
            bastion_instance_type: BASTION_INSTANCE_TYPE.to_string(),
            web_user_data: None,
            database_user_data: None,
        }
    }
}

impl ComputeBuilder {
    /// Create a builder with the default sizing
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the number of web hosts
    pub fn web_count(mut self, count: u32) -> Self {
        self.web_count = count;
        self
    }

    /// Override the web instance class
    pub fn web_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.web_instance_type = instance_type.into();
        self
    }

    /// Override the database instance class
    pub fn database_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.database_instance_type = instance_type.into();
        self
    }

    /// Attach an opaque bootstrap blob to every web host
    pub fn web_user_data(mut self, blob: impl Into<String>) -> Self {
        self.web_user_data = Some(blob.into());
        self
    }

    /// Attach an opaque bootstrap blob to the database host
    pub fn database_user_data(mut self, blob: impl Into<String>) -> Self {
        self.database_user_data = Some(blob.into());
        self
    }

    /// Build the compute group against a wired network topology
    pub fn build(
        &self,
        profile: &EnvironmentProfile,
        topology: &NetworkTopology,
    ) -> Result<ComputeSpec> {
        let public = topology.placement_tier(TierKind::Public)?;
        let web_tier = topology.placement_tier(TierKind::PrivateEgress)?;
        let database_tier = topology.placement_tier(TierKind::PrivateIsolated)?;

        let bastion_name = profile.resource_name(HostRole::Bastion.short());
        let bastion = HostSpec {
            identity: RoleSpec::instance_core(
                format!("{bastion_name}-role"),
                format!("Identity for the {} bastion host", profile.environment),
            ),
            name: bastion_name,
            role: HostRole::Bastion,
            instance_type: self.bastion_instance_type.clone(),
            tier: public.kind,
            security_group: GroupRole::Bastion,
            root_volume: BlockDevice::performance_root(WEB_ROOT_GIB),
            session_bound_metadata: true,
            static_public_address: true,
            user_data: None,
        };

        let mut web = Vec::with_capacity(self.web_count as usize);
        for index in 0..self.web_count {
            let name = profile.indexed_resource_name(HostRole::Web.short(), index);
            web.push(HostSpec {
                identity: RoleSpec::instance_core(
                    format!("{name}-role"),
                    format!(
                        "Identity for web host {index} in {}",
                        profile.environment
                    ),
                ),
                name,
                role: HostRole::Web,
                instance_type: self.web_instance_type.clone(),
                tier: web_tier.kind,
                security_group: GroupRole::Web,
                root_volume: BlockDevice::performance_root(WEB_ROOT_GIB),
                session_bound_metadata: true,
                static_public_address: false,
                user_data: self.web_user_data.clone(),
            });
        }

        let database_name = profile.resource_name(HostRole::Database.short());
        let database = HostSpec {
            identity: RoleSpec::instance_core(
                format!("{database_name}-role"),
                format!("Identity for the {} database host", profile.environment),
            ),
            name: database_name,
            role: HostRole::Database,
            instance_type: self.database_instance_type.clone(),
            tier: database_tier.kind,
            security_group: GroupRole::Database,
            root_volume: BlockDevice::performance_root(DATABASE_ROOT_GIB),
            session_bound_metadata: true,
            static_public_address: false,
            user_data: self.database_user_data.clone(),
        };

        debug!(
            web_hosts = web.len(),
            environment = %profile.environment,
            "built compute group"
        );

        Ok(ComputeSpec {
            bastion,
            web,
            database,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentRegistry;
    use crate::iam::REMOTE_MANAGEMENT_POLICY;
    use crate::network::NetworkBuilder;

    fn built(env: &str) -> ComputeSpec {
        let registry = EnvironmentRegistry::builtin("acme");
        let profile = registry.resolve(env).unwrap();
        let topology = NetworkBuilder::new().build(profile).unwrap();
        ComputeBuilder::new().build(profile, &topology).unwrap()
    }

    mod naming {
        use super::*;

        /// Story: Rerunning the builder yields identical logical names
        #[test]
        fn story_naming_is_idempotent() {
            let first = built("dev");
            let second = built("dev");
            assert_eq!(first, second);
            assert_eq!(first.web_names(), vec!["acme-web-dev-0", "acme-web-dev-1"]);
        }

        #[test]
        fn test_names_use_numeric_indices() {
            let registry = EnvironmentRegistry::builtin("acme");
            let profile = registry.resolve("prod").unwrap();
            let topology = NetworkBuilder::new().build(profile).unwrap();
            let spec = ComputeBuilder::new()
                .web_count(3)
                .build(profile, &topology)
                .unwrap();
            assert_eq!(
                spec.web_names(),
                vec!["acme-web-prod-0", "acme-web-prod-1", "acme-web-prod-2"]
            );
            assert_eq!(spec.bastion.name, "acme-bastion-prod");
            assert_eq!(spec.database.name, "acme-db-prod");
        }
    }

    mod placement {
        use super::*;

        #[test]
        fn test_roles_bind_to_their_tiers_and_groups() {
            let spec = built("prod");
            assert_eq!(spec.bastion.tier, TierKind::Public);
            assert_eq!(spec.bastion.security_group, GroupRole::Bastion);
            for host in &spec.web {
                assert_eq!(host.tier, TierKind::PrivateEgress);
                assert_eq!(host.security_group, GroupRole::Web);
            }
            assert_eq!(spec.database.tier, TierKind::PrivateIsolated);
            assert_eq!(spec.database.security_group, GroupRole::Database);
        }

        /// Story: In the two-tier dev plan the database host still lands in
        /// the most restrictive private tier available
        #[test]
        fn story_database_falls_back_in_dev() {
            let spec = built("dev");
            assert_eq!(spec.database.tier, TierKind::PrivateEgress);
            assert_eq!(spec.database.security_group, GroupRole::Database);
        }
    }

    mod hardening {
        use super::*;

        /// Story: Every host gets an encrypted performance root volume and
        /// session-bound metadata
        #[test]
        fn story_hardening_is_unconditional() {
            for env in ["dev", "prod"] {
                let spec = built(env);
                let mut hosts = vec![&spec.bastion, &spec.database];
                hosts.extend(spec.web.iter());
                for host in hosts {
                    assert!(host.session_bound_metadata, "{} metadata", host.name);
                    assert!(host.root_volume.encrypted, "{} encryption", host.name);
                    assert!(host.root_volume.delete_on_termination);
                    assert_eq!(host.root_volume.volume_type, "gp3");
                }
            }
        }

        #[test]
        fn test_database_volume_is_larger() {
            let spec = built("prod");
            assert_eq!(spec.web[0].root_volume.size_gib, 20);
            assert_eq!(spec.database.root_volume.size_gib, 30);
        }

        /// Story: Host identities carry no broad administrative permission
        #[test]
        fn story_identities_are_least_privilege() {
            let spec = built("prod");
            for host in spec.web.iter().chain([&spec.bastion, &spec.database]) {
                assert_eq!(host.identity.managed_policies, vec![REMOTE_MANAGEMENT_POLICY]);
                assert!(host
                    .identity
                    .granted_actions()
                    .all(|a| a.starts_with("metrics:") || a.starts_with("logs:")));
            }
        }

        #[test]
        fn test_only_the_bastion_gets_a_static_address() {
            let spec = built("prod");
            assert!(spec.bastion.static_public_address);
            assert!(!spec.database.static_public_address);
            assert!(spec.web.iter().all(|h| !h.static_public_address));
        }
    }

    mod overrides {
        use super::*;

        #[test]
        fn test_sizing_defaults() {
            let spec = built("dev");
            assert_eq!(spec.web.len(), 2);
            assert_eq!(spec.web[0].instance_type, WEB_INSTANCE_TYPE);
            assert_eq!(spec.bastion.instance_type, BASTION_INSTANCE_TYPE);
            assert_eq!(spec.database.instance_type, DATABASE_INSTANCE_TYPE);
        }

        #[test]
        fn test_sizing_overrides() {
            let registry = EnvironmentRegistry::builtin("acme");
            let profile = registry.resolve("prod").unwrap();
            let topology = NetworkBuilder::new().build(profile).unwrap();
            let spec = ComputeBuilder::new()
                .web_count(4)
                .web_instance_type("c5.large")
                .database_instance_type("r5.large")
                .build(profile, &topology)
                .unwrap();
            assert_eq!(spec.web.len(), 4);
            assert!(spec.web.iter().all(|h| h.instance_type == "c5.large"));
            assert_eq!(spec.database.instance_type, "r5.large");
        }

        #[test]
        fn test_user_data_is_passed_through_opaque() {
            let registry = EnvironmentRegistry::builtin("acme");
            let profile = registry.resolve("dev").unwrap();
            let topology = NetworkBuilder::new().build(profile).unwrap();
            let blob = "#!/bin/sh\nexec /usr/local/bin/bootstrap";
            let spec = ComputeBuilder::new()
                .web_user_data(blob)
                .build(profile, &topology)
                .unwrap();
            assert_eq!(spec.web[0].user_data.as_deref(), Some(blob));
            assert_eq!(spec.database.user_data, None);
        }
    }
}
