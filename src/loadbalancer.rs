//! Load-balancing group builder
//!
//! Produces the public entry point and an instance-type target pool over
//! the web hosts. The pool can only be built after the compute group
//! exists - expressing the reverse order is a fatal construction defect,
//! never a silent empty pool.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EnvironmentProfile;
use crate::graph::ResourceGraph;
use crate::network::{GroupRole, TierKind};
use crate::{Result, HTTP_PORT};

/// Fixed health-check policy for the web target pool
///
/// These values are deliberate defaults, not derived from the environment.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    /// Probe path
    pub path: String,
    /// Probe interval in seconds
    pub interval_secs: u32,
    /// Probe timeout in seconds
    pub timeout_secs: u32,
    /// Consecutive successes to flip healthy
    pub healthy_threshold: u32,
    /// Consecutive failures to flip unhealthy
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            interval_secs: 30,
            timeout_secs: 5,
            healthy_threshold: 2,
            unhealthy_threshold: 2,
        }
    }
}

/// What the target pool references
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Pool members are host instances
    #[default]
    Instance,
}

/// The pool of web hosts behind the entry point
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetPool {
    /// Deterministic pool name
    pub name: String,
    /// Traffic port on the targets
    pub port: u16,
    /// Application protocol
    pub protocol: String,
    /// Member kind
    pub target_type: TargetType,
    /// Health-check policy
    pub health_check: HealthCheck,
    /// Logical names of the registered web hosts
    pub targets: Vec<String>,
}

/// One listener forwarding unconditionally to the pool
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    /// Listening port
    pub port: u16,
    /// Application protocol
    pub protocol: String,
    /// Name of the pool all traffic forwards to
    pub forward_to: String,
}

/// The load-balancing group: public entry point, pool, listener
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    /// Deterministic entry-point name
    pub name: String,
    /// Placement tier - always the public tier
    pub tier: TierKind,
    /// Security group binding
    pub security_group: GroupRole,
    /// Reachable from the internet
    pub internet_facing: bool,
    /// Web target pool
    pub pool: TargetPool,
    /// Public web listener
    pub listener: Listener,
}

/// Builds the load-balancing group from the compute group's web hosts
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadBalancingBuilder;

impl LoadBalancingBuilder {
    /// Create a load-balancing builder
    pub fn new() -> Self {
        Self
    }

    /// Build the group against a graph that already holds network and
    /// compute groups
    ///
    /// Fails with a dependency-ordering defect if the compute group has not
    /// been built, or if it would yield an empty pool.
    pub fn build(
        &self,
        profile: &EnvironmentProfile,
        graph: &ResourceGraph,
    ) -> Result<LoadBalancerSpec> {
        let topology = graph.network_topology().ok_or_else(|| {
            crate::Error::dependency(
                "load-balancing group requires the network group to exist first",
            )
        })?;
        let compute = graph.compute_spec().ok_or_else(|| {
            crate::Error::dependency(
                "load-balancing group requires the compute group to exist first",
            )
        })?;

        let targets: Vec<String> = compute.web_names().iter().map(|n| n.to_string()).collect();
        if targets.is_empty() {
            return Err(crate::Error::dependency(
                "target pool would be empty: the compute group has no web hosts",
            ));
        }

        let public = topology.placement_tier(TierKind::Public)?;
        let pool_name = profile.resource_name("web-tg");
        let pool = TargetPool {
            name: pool_name.clone(),
            port: HTTP_PORT,
            protocol: "HTTP".to_string(),
            target_type: TargetType::Instance,
            health_check: HealthCheck::default(),
            targets,
        };

        debug!(
            targets = pool.targets.len(),
            environment = %profile.environment,
            "built load-balancing group"
        );

        Ok(LoadBalancerSpec {
            name: profile.resource_name("alb"),
            tier: public.kind,
            security_group: GroupRole::LoadBalancer,
            internet_facing: true,
            pool,
            listener: Listener {
                port: HTTP_PORT,
                protocol: "HTTP".to_string(),
                forward_to: pool_name,
            },
        })
    }
}
