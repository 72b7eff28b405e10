//! Network topology types and builder
//!
//! The network topology is the source node of every composition: one virtual
//! network, an ordered set of subnet tiers, and the four security-group
//! nodes (bastion, load balancer, web, database). Tier placement and
//! group-to-group access edges are the two invariants this module guards:
//!
//! - Every compute, load-balancing, and orchestration resource binds to
//!   exactly one subnet tier and exactly one security group.
//! - Ingress edges into the web and database groups always name a peer
//!   *group*; CIDR-sourced ingress exists only on the bastion and
//!   load-balancer groups. The typed [`IngressPeer`] plus the guarded
//!   [`SecurityGroup::allow_from_cidr`] make the invariant hold by
//!   construction rather than by after-the-fact validation.
//!
//! Edge wiring between the groups lives in [`security`].

pub mod security;

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EnvironmentProfile;
use crate::Result;

/// Visibility class of a subnet tier
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TierKind {
    /// Routable from the internet
    Public,
    /// Private with outbound egress through NAT
    PrivateEgress,
    /// Private with no route out
    PrivateIsolated,
}

impl TierKind {
    /// Map a configuration string to a tier kind
    ///
    /// Unknown strings fall back to the most restrictive tier rather than
    /// failing; a typo in a tier name must never accidentally expose a
    /// subnet.
    pub fn from_config(raw: &str) -> Self {
        match raw.to_ascii_uppercase().replace('-', "_").as_str() {
            "PUBLIC" => Self::Public,
            "PRIVATE_WITH_EGRESS" | "PRIVATE_EGRESS" => Self::PrivateEgress,
            "PRIVATE_ISOLATED" | "ISOLATED" => Self::PrivateIsolated,
            _ => Self::PrivateIsolated,
        }
    }

    /// Canonical name used in emitted plans
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::PrivateEgress => "private-egress",
            Self::PrivateIsolated => "private-isolated",
        }
    }
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete subnet tier of the virtual network
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetTier {
    /// Tier name from the profile (e.g., "public")
    pub name: String,
    /// Visibility class
    pub kind: TierKind,
    /// Prefix length of each subnet in this tier
    pub prefix_len: u8,
}

/// The virtual network for one environment
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetwork {
    /// Deterministic network name, `{project}-{env}-vpc`
    pub name: String,
    /// CIDR block
    pub cidr: String,
    /// Availability zone spread
    pub max_azs: u8,
    /// NAT gateway count for private-egress tiers
    pub nat_gateways: u8,
    /// DNS resolution enabled
    pub dns_support: bool,
    /// DNS hostnames enabled
    pub dns_hostnames: bool,
    /// Ordered subnet tiers
    pub tiers: Vec<SubnetTier>,
}

/// The four security-group nodes of the layered access graph
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GroupRole {
    /// Administrative entry point
    Bastion,
    /// Public web entry point
    LoadBalancer,
    /// Web tier hosts
    Web,
    /// Database tier host
    Database,
}

impl GroupRole {
    /// Short token used in deterministic resource names
    pub fn short(&self) -> &'static str {
        match self {
            Self::Bastion => "bastion",
            Self::LoadBalancer => "lb",
            Self::Web => "web",
            Self::Database => "db",
        }
    }

    /// Only the environment's entry points may carry CIDR-sourced ingress
    pub fn accepts_cidr_ingress(&self) -> bool {
        matches!(self, Self::Bastion | Self::LoadBalancer)
    }
}

impl std::fmt::Display for GroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bastion => f.write_str("bastion"),
            Self::LoadBalancer => f.write_str("load-balancer"),
            Self::Web => f.write_str("web"),
            Self::Database => f.write_str("database"),
        }
    }
}

/// Transport protocol for an ingress rule
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    #[default]
    Tcp,
    /// UDP
    Udp,
}

/// Source of one ingress rule: a peer security group or a CIDR block
///
/// The variant is the enforcement point for the layering invariant - rules
/// into internal tiers are only ever constructed with the `Group` variant.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IngressPeer {
    /// A peer security group
    Group(GroupRole),
    /// A CIDR block (entry-point groups only)
    Cidr(String),
}

/// One directed access edge into a security group
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    /// Traffic source
    pub peer: IngressPeer,
    /// Destination port
    pub port: u16,
    /// Transport protocol
    pub protocol: Protocol,
    /// Human-readable rule description
    pub description: String,
}

/// A named security group with its ordered ingress edges
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    /// Which node of the access graph this group is
    pub role: GroupRole,
    /// Deterministic group name, `{project}-{role}-sg-{env}`
    pub name: String,
    /// Group description
    pub description: String,
    /// All outbound traffic is permitted
    pub allow_all_outbound: bool,
    /// Ordered ingress edges
    pub ingress: Vec<IngressRule>,
}

impl SecurityGroup {
    fn new(role: GroupRole, profile: &EnvironmentProfile, description: &str) -> Self {
        Self {
            role,
            name: profile.resource_name(&format!("{}-sg", role.short())),
            description: description.to_string(),
            allow_all_outbound: true,
            ingress: Vec::new(),
        }
    }

    /// Add an ingress edge from a peer security group
    pub fn allow_from_group(
        &mut self,
        peer: GroupRole,
        port: u16,
        description: impl Into<String>,
    ) {
        self.ingress.push(IngressRule {
            peer: IngressPeer::Group(peer),
            port,
            protocol: Protocol::Tcp,
            description: description.into(),
        });
    }

    /// Add a CIDR-sourced ingress edge
    ///
    /// Permitted only on the entry-point groups (bastion and load balancer);
    /// a CIDR edge into the web or database group is an invalid network
    /// spec, rejected here so the invariant holds by construction.
    pub fn allow_from_cidr(
        &mut self,
        cidr: impl Into<String>,
        port: u16,
        description: impl Into<String>,
    ) -> Result<()> {
        if !self.role.accepts_cidr_ingress() {
            return Err(crate::Error::invalid_network(format!(
                "CIDR ingress is not permitted on the {} group; reference a peer group instead",
                self.role
            )));
        }
        self.ingress.push(IngressRule {
            peer: IngressPeer::Cidr(cidr.into()),
            port,
            protocol: Protocol::Tcp,
            description: description.into(),
        });
        Ok(())
    }

    /// Peer groups referenced by this group's ingress edges
    pub fn group_peers(&self) -> impl Iterator<Item = GroupRole> + '_ {
        self.ingress.iter().filter_map(|rule| match rule.peer {
            IngressPeer::Group(peer) => Some(peer),
            IngressPeer::Cidr(_) => None,
        })
    }
}

/// The complete network topology for one environment
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTopology {
    /// The virtual network
    pub network: VirtualNetwork,
    /// Administrative entry-point group
    pub bastion: SecurityGroup,
    /// Public web entry-point group
    pub load_balancer: SecurityGroup,
    /// Web tier group
    pub web: SecurityGroup,
    /// Database tier group
    pub database: SecurityGroup,
}

impl NetworkTopology {
    /// The security group for the given role
    pub fn group(&self, role: GroupRole) -> &SecurityGroup {
        match role {
            GroupRole::Bastion => &self.bastion,
            GroupRole::LoadBalancer => &self.load_balancer,
            GroupRole::Web => &self.web,
            GroupRole::Database => &self.database,
        }
    }

    /// Mutable access to the security group for the given role
    pub fn group_mut(&mut self, role: GroupRole) -> &mut SecurityGroup {
        match role {
            GroupRole::Bastion => &mut self.bastion,
            GroupRole::LoadBalancer => &mut self.load_balancer,
            GroupRole::Web => &mut self.web,
            GroupRole::Database => &mut self.database,
        }
    }

    /// All four groups in layering order
    pub fn groups(&self) -> [&SecurityGroup; 4] {
        [&self.bastion, &self.load_balancer, &self.web, &self.database]
    }

    /// The tier with the given kind, if the environment configures one
    pub fn tier(&self, kind: TierKind) -> Option<&SubnetTier> {
        self.network.tiers.iter().find(|tier| tier.kind == kind)
    }

    /// Resolve a placement tier for a resource that wants `desired`
    ///
    /// Exact matches win. A public placement has no fallback - a resource
    /// that must be reachable from the internet cannot be silently buried.
    /// A private placement falls back to the most restrictive private tier
    /// the environment actually configures, so two-tier environments can
    /// still place their database host.
    pub fn placement_tier(&self, desired: TierKind) -> Result<&SubnetTier> {
        if let Some(tier) = self.tier(desired) {
            return Ok(tier);
        }
        if desired == TierKind::Public {
            return Err(crate::Error::invalid_network(
                "no public tier is configured for a public-facing resource",
            ));
        }
        [TierKind::PrivateIsolated, TierKind::PrivateEgress]
            .into_iter()
            .find_map(|kind| self.tier(kind))
            .ok_or_else(|| {
                crate::Error::invalid_network(format!(
                    "no private tier is available for a {desired} placement"
                ))
            })
    }
}

/// Builds the network topology from an environment profile
///
/// Validation is fail-fast: an invalid CIDR, an AZ count beyond region
/// capacity, or a malformed tier layout aborts here, before any resource
/// group exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct NetworkBuilder;

/// Widest virtual-network prefix accepted
const MIN_NETWORK_PREFIX: u8 = 8;
/// Narrowest subnet prefix accepted
const MAX_SUBNET_PREFIX: u8 = 28;
/// Upper bound on availability zones per region
const MAX_AZS_PER_REGION: u8 = 6;

impl NetworkBuilder {
    /// Create a network builder
    pub fn new() -> Self {
        Self
    }

    /// Build the topology for the given profile
    pub fn build(&self, profile: &EnvironmentProfile) -> Result<NetworkTopology> {
        let vpc = &profile.vpc;
        let network_prefix = validate_cidr(&vpc.cidr)?;

        if vpc.max_azs == 0 || vpc.max_azs > MAX_AZS_PER_REGION {
            return Err(crate::Error::invalid_network(format!(
                "availability zone count {} is outside 1..={MAX_AZS_PER_REGION}",
                vpc.max_azs
            )));
        }
        if vpc.nat_gateways > vpc.max_azs {
            return Err(crate::Error::invalid_network(format!(
                "{} NAT gateways cannot be spread across {} availability zones",
                vpc.nat_gateways, vpc.max_azs
            )));
        }
        if vpc.subnets.len() < 2 || vpc.subnets.len() > 3 {
            return Err(crate::Error::invalid_network(format!(
                "expected 2 or 3 subnet tiers, found {}",
                vpc.subnets.len()
            )));
        }

        let mut tiers = Vec::with_capacity(vpc.subnets.len());
        for subnet in &vpc.subnets {
            if subnet.prefix_len < network_prefix || subnet.prefix_len > MAX_SUBNET_PREFIX {
                return Err(crate::Error::invalid_network(format!(
                    "tier '{}' prefix /{} does not fit inside {}",
                    subnet.name, subnet.prefix_len, vpc.cidr
                )));
            }
            tiers.push(SubnetTier {
                name: subnet.name.clone(),
                kind: TierKind::from_config(&subnet.tier),
                prefix_len: subnet.prefix_len,
            });
        }

        let network = VirtualNetwork {
            name: format!("{}-vpc", profile.name_prefix()),
            cidr: vpc.cidr.clone(),
            max_azs: vpc.max_azs,
            nat_gateways: vpc.nat_gateways,
            dns_support: true,
            dns_hostnames: true,
            tiers,
        };

        debug!(
            network = %network.name,
            tiers = network.tiers.len(),
            "built virtual network"
        );

        Ok(NetworkTopology {
            network,
            bastion: SecurityGroup::new(
                GroupRole::Bastion,
                profile,
                "Security group for bastion access",
            ),
            load_balancer: SecurityGroup::new(
                GroupRole::LoadBalancer,
                profile,
                "Security group for the public load balancer",
            ),
            web: SecurityGroup::new(GroupRole::Web, profile, "Security group for web hosts"),
            database: SecurityGroup::new(
                GroupRole::Database,
                profile,
                "Security group for database access",
            ),
        })
    }
}

/// Validate an IPv4 CIDR block and return its prefix length
fn validate_cidr(cidr: &str) -> Result<u8> {
    let (addr, prefix) = cidr.split_once('/').ok_or_else(|| {
        crate::Error::invalid_network(format!("CIDR '{cidr}' is missing a prefix length"))
    })?;
    addr.parse::<Ipv4Addr>().map_err(|_| {
        crate::Error::invalid_network(format!("CIDR '{cidr}' has an invalid IPv4 address"))
    })?;
    let prefix: u8 = prefix.parse().map_err(|_| {
        crate::Error::invalid_network(format!("CIDR '{cidr}' has a non-numeric prefix"))
    })?;
    if !(MIN_NETWORK_PREFIX..=MAX_SUBNET_PREFIX).contains(&prefix) {
        return Err(crate::Error::invalid_network(format!(
            "CIDR '{cidr}' prefix must be within /{MIN_NETWORK_PREFIX}..=/{MAX_SUBNET_PREFIX}"
        )));
    }
    Ok(prefix)
}
