//! Topology composer - the composition root
//!
//! The composer fixes the build order: resolver, network topology, security
//! graph wiring, compute, load balancing, object storage, data, and
//! orchestration. It declares explicit dependency edges mirroring that
//! partial order even where an implicit reference already exists, because
//! the downstream provisioning engine makes no ordering guarantee across
//! independently constructed groups.
//!
//! # Usage
//!
//! ```text
//! let composer = TopologyComposer::with_builtin("acme");
//! let plan = composer.compose("prod")?;
//! let yaml = plan.to_yaml()?;
//! ```
//!
//! Composition is all-or-nothing: any failure abandons the run and no
//! partial plan is ever emitted.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compute::ComputeBuilder;
use crate::config::{Environment, EnvironmentProfile, EnvironmentRegistry};
use crate::data::DataBuilder;
use crate::graph::{GroupSpec, OutputBinding, ResourceGraph, ResourceGroup};
use crate::loadbalancer::LoadBalancingBuilder;
use crate::network::{security, NetworkBuilder};
use crate::orchestration::OrchestrationBuilder;
use crate::storage::ObjectStorageBuilder;
use crate::Result;

/// The finished, immutable plan handed to the provisioning engine
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologyPlan {
    /// Project name
    pub project: String,
    /// Composed environment
    pub environment: Environment,
    /// Target account
    pub account: String,
    /// Target region
    pub region: String,
    /// The dependency-ordered resource graph
    pub graph: ResourceGraph,
}

impl TopologyPlan {
    /// Serialize the plan to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::Error::serialization(e.to_string()))
    }

    /// Serialize the plan to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| crate::Error::serialization(e.to_string()))
    }
}

/// Composes one environment's topology in dependency order
#[derive(Clone, Debug)]
pub struct TopologyComposer {
    registry: EnvironmentRegistry,
    web_count: Option<u32>,
    web_instance_type: Option<String>,
    cluster_version: Option<String>,
}

impl TopologyComposer {
    /// Create a composer over an explicit registry
    pub fn new(registry: EnvironmentRegistry) -> Self {
        Self {
            registry,
            web_count: None,
            web_instance_type: None,
            cluster_version: None,
        }
    }

    /// Create a composer over the shipped dev and prod profiles
    pub fn with_builtin(project: impl Into<String>) -> Self {
        Self::new(EnvironmentRegistry::builtin(project))
    }

    /// Override the number of web hosts
    pub fn web_count(mut self, count: u32) -> Self {
        self.web_count = Some(count);
        self
    }

    /// Override the web instance class
    pub fn web_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.web_instance_type = Some(instance_type.into());
        self
    }

    /// Override the orchestration platform version
    pub fn cluster_version(mut self, version: impl Into<String>) -> Self {
        self.cluster_version = Some(version.into());
        self
    }

    /// Compose the named environment into a finished plan
    ///
    /// Builders run in a fixed synchronous order; the profile is resolved
    /// exactly once and shared by reference. Any failure aborts the whole
    /// composition.
    pub fn compose(&self, environment: &str) -> Result<TopologyPlan> {
        let profile = self.registry.resolve(environment)?;
        info!(environment = %profile.environment, project = %profile.project, "composing topology");

        // Network first - it is the source node of the graph.
        let mut topology = NetworkBuilder::new().build(profile)?;
        security::wire_security_graph(&mut topology)?;

        let mut compute_builder = ComputeBuilder::new();
        if let Some(count) = self.web_count {
            compute_builder = compute_builder.web_count(count);
        }
        if let Some(instance_type) = &self.web_instance_type {
            compute_builder = compute_builder.web_instance_type(instance_type.clone());
        }
        let compute = compute_builder.build(profile, &topology)?;

        let mut orchestration_builder = OrchestrationBuilder::new();
        if let Some(version) = &self.cluster_version {
            orchestration_builder = orchestration_builder.version(version.clone());
        }
        let orchestration = orchestration_builder.build(profile, &topology)?;

        let names = GroupNames::for_profile(profile);
        let mut graph = ResourceGraph::new();
        graph.add_group(ResourceGroup::new(
            names.network.as_str(),
            GroupSpec::Network(topology),
        ))?;
        graph.add_group(ResourceGroup::new(
            names.compute.as_str(),
            GroupSpec::Compute(compute),
        ))?;

        // The target pool references the web hosts, so the load-balancing
        // builder reads them back out of the graph - targets before pool.
        let load_balancer = LoadBalancingBuilder::new().build(profile, &graph)?;
        graph.add_group(ResourceGroup::new(
            names.load_balancer.as_str(),
            GroupSpec::LoadBalancer(load_balancer),
        ))?;

        let store = ObjectStorageBuilder::new().with_consumer().build(profile);
        graph.add_group(ResourceGroup::new(
            names.storage.as_str(),
            GroupSpec::ObjectStorage(store),
        ))?;

        let data = DataBuilder::new().build(profile);
        graph.add_group(ResourceGroup::new(names.data.as_str(), GroupSpec::Data(data)))?;

        graph.add_group(ResourceGroup::new(
            names.orchestration.as_str(),
            GroupSpec::Orchestration(orchestration),
        ))?;

        // Explicit edges mirroring the partial order. The engine applies
        // independent subgraphs in any order it likes; these edges are the
        // only ordering contract it honors.
        graph.add_dependency(&names.compute, &names.network)?;
        graph.add_dependency(&names.load_balancer, &names.network)?;
        graph.add_dependency(&names.load_balancer, &names.compute)?;
        graph.add_dependency(&names.data, &names.network)?;
        graph.add_dependency(&names.orchestration, &names.network)?;

        self.bind_outputs(profile, &mut graph)?;

        // Tags go on last, after every group exists.
        graph.tag_all(&profile.tags);
        graph.validate()?;

        info!(
            groups = graph.groups().len(),
            outputs = graph.outputs().len(),
            "composition complete"
        );

        Ok(TopologyPlan {
            project: profile.project.clone(),
            environment: profile.environment,
            account: profile.account.clone(),
            region: profile.region.clone(),
            graph,
        })
    }

    /// Bind the named exports for every externally interesting attribute
    fn bind_outputs(&self, profile: &EnvironmentProfile, graph: &mut ResourceGraph) -> Result<()> {
        let mut outputs: Vec<OutputBinding> = Vec::new();

        if let Some(topology) = graph.network_topology() {
            outputs.push(OutputBinding::new(
                profile.export_name("network-id"),
                "Virtual network identifier",
                attribute(&topology.network.name, "id"),
            ));
        }

        if let Some(compute) = graph.compute_spec() {
            outputs.push(OutputBinding::new(
                profile.export_name("bastion-address"),
                "Static public address of the bastion host",
                attribute(&compute.bastion.name, "publicAddress"),
            ));
            for (index, host) in compute.web.iter().enumerate() {
                outputs.push(OutputBinding::new(
                    profile.export_name(&format!("web-instance-{index}-id")),
                    format!("Identifier of web host {index}"),
                    attribute(&host.name, "instanceId"),
                ));
            }
            outputs.push(OutputBinding::new(
                profile.export_name("db-instance-id"),
                "Identifier of the database host",
                attribute(&compute.database.name, "instanceId"),
            ));
        }

        for group in graph.groups() {
            match &group.spec {
                GroupSpec::LoadBalancer(lb) => {
                    outputs.push(OutputBinding::new(
                        profile.export_name("lb-endpoint"),
                        "Public endpoint of the load balancer",
                        attribute(&lb.name, "dnsName"),
                    ));
                }
                GroupSpec::ObjectStorage(store) => {
                    outputs.push(OutputBinding::new(
                        profile.export_name("store-name"),
                        "Name of the object store",
                        store.name.clone(),
                    ));
                }
                GroupSpec::Data(data) => {
                    outputs.push(OutputBinding::new(
                        profile.export_name("sql-endpoint"),
                        "Endpoint of the relational instance",
                        attribute(&data.relational.name, "endpointAddress"),
                    ));
                    outputs.push(OutputBinding::new(
                        profile.export_name("table-name"),
                        "Name of the wide-column table",
                        data.table.name.clone(),
                    ));
                    outputs.push(OutputBinding::new(
                        profile.export_name("table-arn"),
                        "Identifier of the wide-column table",
                        attribute(&data.table.name, "arn"),
                    ));
                }
                GroupSpec::Orchestration(orchestration) => {
                    outputs.push(OutputBinding::new(
                        profile.export_name("cluster-name"),
                        "Name of the orchestration cluster",
                        orchestration.cluster.name.clone(),
                    ));
                    outputs.push(OutputBinding::new(
                        profile.export_name("cluster-endpoint"),
                        "Control-plane endpoint",
                        attribute(&orchestration.cluster.name, "endpoint"),
                    ));
                    outputs.push(OutputBinding::new(
                        profile.export_name("kubeconfig-command"),
                        "Command that writes kubeconfig for the cluster",
                        format!(
                            "update-kubeconfig --name {} --region {}",
                            orchestration.cluster.name, profile.region
                        ),
                    ));
                    outputs.push(OutputBinding::new(
                        profile.export_name("csi-identity-name"),
                        "Name of the CSI driver identity",
                        orchestration.csi.identity.name.clone(),
                    ));
                }
                GroupSpec::Network(_) | GroupSpec::Compute(_) => {}
            }
        }

        for output in outputs {
            graph.add_output(output)?;
        }
        Ok(())
    }
}

/// Deterministic group names for one environment
struct GroupNames {
    network: String,
    compute: String,
    load_balancer: String,
    storage: String,
    data: String,
    orchestration: String,
}

impl GroupNames {
    fn for_profile(profile: &EnvironmentProfile) -> Self {
        let prefix = profile.name_prefix();
        Self {
            network: format!("{prefix}-network"),
            compute: format!("{prefix}-compute"),
            load_balancer: format!("{prefix}-load-balancer"),
            storage: format!("{prefix}-object-storage"),
            data: format!("{prefix}-data"),
            orchestration: format!("{prefix}-orchestration"),
        }
    }
}

/// Placeholder the provisioning engine resolves to a live attribute
fn attribute(resource: &str, attr: &str) -> String {
    format!("${{{resource}.{attr}}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GroupKind;
    use crate::Error;

    fn composed(env: &str) -> TopologyPlan {
        TopologyComposer::with_builtin("acme").compose(env).unwrap()
    }

    mod ordering {
        use super::*;

        /// Story: The realization order starts at the network
        #[test]
        fn story_network_is_realized_first() {
            let plan = composed("prod");
            let order = plan.graph.topological_order().unwrap();
            assert_eq!(order[0], "acme-prod-network");
        }

        #[test]
        fn test_graph_passes_validation() {
            for env in ["dev", "prod"] {
                composed(env).graph.validate().unwrap();
            }
        }

        #[test]
        fn test_explicit_edges_mirror_the_partial_order() {
            let plan = composed("dev");
            let group = |kind| plan.graph.group(kind).unwrap();
            assert!(group(GroupKind::Compute)
                .depends_on
                .contains(&"acme-dev-network".to_string()));
            assert_eq!(
                group(GroupKind::LoadBalancer).depends_on,
                vec!["acme-dev-network", "acme-dev-compute"]
            );
            assert_eq!(
                group(GroupKind::Orchestration).depends_on,
                vec!["acme-dev-network"]
            );
            assert!(group(GroupKind::ObjectStorage).depends_on.is_empty());
        }

        #[test]
        fn test_all_six_groups_are_built() {
            let plan = composed("prod");
            for kind in [
                GroupKind::Network,
                GroupKind::Compute,
                GroupKind::LoadBalancer,
                GroupKind::ObjectStorage,
                GroupKind::Data,
                GroupKind::Orchestration,
            ] {
                assert!(plan.graph.group(kind).is_some(), "{kind} missing");
            }
        }
    }

    mod outputs {
        use super::*;

        #[test]
        fn test_exports_are_environment_scoped_and_unique() {
            let plan = composed("dev");
            let names: Vec<&str> = plan
                .graph
                .outputs()
                .iter()
                .map(|o| o.export_name.as_str())
                .collect();
            assert!(names.iter().all(|n| n.starts_with("acme-dev-")));

            let mut deduped = names.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(deduped.len(), names.len());
        }

        #[test]
        fn test_every_interesting_attribute_is_exported() {
            let plan = composed("prod");
            let has = |logical: &str| {
                plan.graph
                    .outputs()
                    .iter()
                    .any(|o| o.export_name == format!("acme-prod-{logical}"))
            };
            for logical in [
                "network-id",
                "bastion-address",
                "lb-endpoint",
                "web-instance-0-id",
                "web-instance-1-id",
                "db-instance-id",
                "sql-endpoint",
                "table-name",
                "table-arn",
                "cluster-name",
                "cluster-endpoint",
                "kubeconfig-command",
                "csi-identity-name",
                "store-name",
            ] {
                assert!(has(logical), "missing export {logical}");
            }
        }

        #[test]
        fn test_exports_never_collide_across_environments() {
            let dev = composed("dev");
            let prod = composed("prod");
            for dev_output in dev.graph.outputs() {
                assert!(prod
                    .graph
                    .outputs()
                    .iter()
                    .all(|o| o.export_name != dev_output.export_name));
            }
        }
    }

    mod tagging {
        use super::*;

        /// Story: The profile tag set reaches every group uniformly
        #[test]
        fn story_tags_are_applied_to_every_group() {
            let plan = composed("prod");
            for group in plan.graph.groups() {
                assert_eq!(
                    group.tags.get("Project").map(String::as_str),
                    Some("acme"),
                    "{} untagged",
                    group.name
                );
                assert_eq!(
                    group.tags.get("Environment").map(String::as_str),
                    Some("Production")
                );
            }
        }
    }

    mod failure {
        use super::*;

        /// Story: An unregistered environment aborts before any group
        #[test]
        fn story_unknown_environment_composes_nothing() {
            let err = TopologyComposer::with_builtin("acme")
                .compose("staging")
                .unwrap_err();
            assert!(matches!(err, Error::ConfigNotFound(_)));
        }

        /// Story: A broken network plan aborts the whole composition
        #[test]
        fn story_invalid_network_spec_aborts_composition() {
            let mut registry = EnvironmentRegistry::new();
            let mut profile = EnvironmentRegistry::builtin("acme")
                .resolve("dev")
                .unwrap()
                .clone();
            profile.vpc.cidr = "not-a-cidr".to_string();
            registry.register(profile).unwrap();

            let err = TopologyComposer::new(registry).compose("dev").unwrap_err();
            assert!(matches!(err, Error::InvalidNetworkSpec(_)));
        }
    }

    mod overrides {
        use super::*;

        #[test]
        fn test_web_count_flows_to_pool_and_outputs() {
            let plan = TopologyComposer::with_builtin("acme")
                .web_count(3)
                .compose("dev")
                .unwrap();
            let compute = plan.graph.compute_spec().unwrap();
            assert_eq!(compute.web.len(), 3);
            assert!(plan
                .graph
                .outputs()
                .iter()
                .any(|o| o.export_name == "acme-dev-web-instance-2-id"));
        }
    }

    mod emission {
        use super::*;

        #[test]
        fn test_plan_serializes_to_json_and_yaml() {
            let plan = composed("dev");
            let json = plan.to_json().unwrap();
            assert!(json.contains("acme-dev-network"));
            let yaml = plan.to_yaml().unwrap();
            assert!(yaml.contains("acme-dev-vpc"));
        }

        #[test]
        fn test_plan_roundtrips_through_json() {
            let plan = composed("prod");
            let json = plan.to_json().unwrap();
            let parsed: TopologyPlan = serde_json::from_str(&json).unwrap();
            assert_eq!(plan, parsed);
        }

        /// Story: Composing the same environment twice emits identical plans
        #[test]
        fn story_composition_is_deterministic() {
            assert_eq!(composed("dev"), composed("dev"));
            assert_eq!(composed("prod"), composed("prod"));
        }
    }
}
