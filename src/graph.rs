//! Resource graph: groups, dependency edges, and output bindings
//!
//! The graph is what the composer hands to the external provisioning
//! engine: an ordered set of resource groups, the explicit dependency edges
//! between them, and the named outputs each environment exports. The engine
//! makes no ordering guarantee across independently constructed groups, so
//! every ordering the composition relies on is declared as an explicit edge
//! even where an implicit reference already exists.
//!
//! Invariants guarded here:
//!
//! - Group names and export names are unique within one composition
//!   (`NamingCollision` otherwise).
//! - The dependency-edge graph is acyclic and the network topology group is
//!   a source node (`DependencyCycle` otherwise).
//! - The load-balancing group depends on the compute group, and the
//!   orchestration group depends on the network group only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compute::ComputeSpec;
use crate::data::DataSpec;
use crate::loadbalancer::LoadBalancerSpec;
use crate::network::NetworkTopology;
use crate::orchestration::OrchestrationSpec;
use crate::storage::ObjectStoreSpec;
use crate::Result;

/// Kind of a resource group
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    /// Virtual network and security groups
    Network,
    /// Bastion, web, and database hosts
    Compute,
    /// Public entry point and target pool
    LoadBalancer,
    /// Object store
    ObjectStorage,
    /// Relational instance and wide-column table
    Data,
    /// Managed orchestration cluster and worker pool
    Orchestration,
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Compute => f.write_str("compute"),
            Self::LoadBalancer => f.write_str("load-balancer"),
            Self::ObjectStorage => f.write_str("object-storage"),
            Self::Data => f.write_str("data"),
            Self::Orchestration => f.write_str("orchestration"),
        }
    }
}

/// Typed payload of a resource group
///
/// Builders pattern-match on the variant only where the emitted shape
/// differs, never for control flow during composition.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GroupSpec {
    /// Network topology payload
    Network(NetworkTopology),
    /// Compute payload
    Compute(ComputeSpec),
    /// Load-balancing payload
    LoadBalancer(LoadBalancerSpec),
    /// Object-storage payload
    ObjectStorage(ObjectStoreSpec),
    /// Data payload
    Data(DataSpec),
    /// Orchestration payload
    Orchestration(OrchestrationSpec),
}

impl GroupSpec {
    /// The kind tag for this payload
    pub fn kind(&self) -> GroupKind {
        match self {
            Self::Network(_) => GroupKind::Network,
            Self::Compute(_) => GroupKind::Compute,
            Self::LoadBalancer(_) => GroupKind::LoadBalancer,
            Self::ObjectStorage(_) => GroupKind::ObjectStorage,
            Self::Data(_) => GroupKind::Data,
            Self::Orchestration(_) => GroupKind::Orchestration,
        }
    }
}

/// One resource group in the graph
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    /// Unique group name, `{project}-{env}-{kind}`
    pub name: String,
    /// Typed payload
    pub spec: GroupSpec,
    /// Names of groups that must be realized before this one
    pub depends_on: Vec<String>,
    /// Tags applied by the composer as the final step
    pub tags: BTreeMap<String, String>,
}

impl ResourceGroup {
    /// Create a group with no dependencies and no tags yet
    pub fn new(name: impl Into<String>, spec: GroupSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            depends_on: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    /// The kind tag of this group's payload
    pub fn kind(&self) -> GroupKind {
        self.spec.kind()
    }
}

/// A named export of one resolved attribute
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutputBinding {
    /// Environment-scoped export name, `{project}-{env}-{logical}`
    pub export_name: String,
    /// What the value is
    pub description: String,
    /// The exported value or a placeholder the engine resolves
    pub value: String,
}

impl OutputBinding {
    /// Create an output binding
    pub fn new(
        export_name: impl Into<String>,
        description: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            export_name: export_name.into(),
            description: description.into(),
            value: value.into(),
        }
    }
}

/// The dependency-ordered resource graph for one environment
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGraph {
    groups: Vec<ResourceGroup>,
    outputs: Vec<OutputBinding>,
}

impl ResourceGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource group
    ///
    /// Group names are unique within one composition; a duplicate is a
    /// naming collision surfaced before emission.
    pub fn add_group(&mut self, group: ResourceGroup) -> Result<()> {
        if self.groups.iter().any(|g| g.name == group.name) {
            return Err(crate::Error::collision(format!(
                "resource group '{}' already exists",
                group.name
            )));
        }
        self.groups.push(group);
        Ok(())
    }

    /// Declare that `from` must be realized after `to`
    ///
    /// Both endpoints must already exist; referencing a group that has not
    /// been built yet is an out-of-order construction defect.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Err(crate::Error::dependency(format!(
                "group '{from}' cannot depend on itself"
            )));
        }
        if !self.groups.iter().any(|g| g.name == to) {
            return Err(crate::Error::dependency(format!(
                "group '{from}' depends on '{to}', which has not been built"
            )));
        }
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.name == from)
            .ok_or_else(|| {
                crate::Error::dependency(format!("dependency declared for unknown group '{from}'"))
            })?;
        if !group.depends_on.iter().any(|d| d == to) {
            group.depends_on.push(to.to_string());
        }
        Ok(())
    }

    /// Bind a named output
    ///
    /// Export names embed the environment, so collisions across
    /// environments are impossible; a collision within one composition is a
    /// construction defect.
    pub fn add_output(&mut self, output: OutputBinding) -> Result<()> {
        if self.outputs.iter().any(|o| o.export_name == output.export_name) {
            return Err(crate::Error::collision(format!(
                "export '{}' already bound",
                output.export_name
            )));
        }
        self.outputs.push(output);
        Ok(())
    }

    /// All groups in insertion order
    pub fn groups(&self) -> &[ResourceGroup] {
        &self.groups
    }

    /// All output bindings in insertion order
    pub fn outputs(&self) -> &[OutputBinding] {
        &self.outputs
    }

    /// The first group of the given kind, if present
    pub fn group(&self, kind: GroupKind) -> Option<&ResourceGroup> {
        self.groups.iter().find(|g| g.kind() == kind)
    }

    /// The compute payload, if the compute group has been built
    pub fn compute_spec(&self) -> Option<&ComputeSpec> {
        self.groups.iter().find_map(|g| match &g.spec {
            GroupSpec::Compute(spec) => Some(spec),
            _ => None,
        })
    }

    /// The network topology payload, if the network group has been built
    pub fn network_topology(&self) -> Option<&NetworkTopology> {
        self.groups.iter().find_map(|g| match &g.spec {
            GroupSpec::Network(topology) => Some(topology),
            _ => None,
        })
    }

    /// Apply the profile tag set to every group
    ///
    /// Called by the composer as the final step, after all groups exist.
    pub fn tag_all(&mut self, tags: &BTreeMap<String, String>) {
        for group in &mut self.groups {
            for (key, value) in tags {
                group.tags.insert(key.clone(), value.clone());
            }
        }
    }

    /// Realization order: every group after all of its dependencies
    ///
    /// Fails with `DependencyCycle` if the edge set admits no such order.
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for group in &self.groups {
            in_degree.insert(&group.name, group.depends_on.len());
            for dep in &group.depends_on {
                dependents.entry(dep).or_default().push(&group.name);
            }
        }

        let mut ready: Vec<&str> = self
            .groups
            .iter()
            .filter(|g| g.depends_on.is_empty())
            .map(|g| g.name.as_str())
            .collect();
        let mut order = Vec::with_capacity(self.groups.len());

        while let Some(name) = ready.first().copied() {
            ready.remove(0);
            order.push(name);
            if let Some(next) = dependents.get(name) {
                for &dependent in next {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(dependent);
                        }
                    }
                }
            }
        }

        if order.len() < self.groups.len() {
            let stuck: Vec<&str> = self
                .groups
                .iter()
                .map(|g| g.name.as_str())
                .filter(|name| !order.contains(name))
                .collect();
            return Err(crate::Error::dependency(format!(
                "cycle detected among resource groups: {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// Validate the whole graph before emission
    ///
    /// Checks acyclicity, that the network topology group is a source node,
    /// and the two fixed ordering constraints (load balancing after
    /// compute; orchestration on network only).
    pub fn validate(&self) -> Result<()> {
        self.topological_order()?;

        if let Some(network) = self.group(GroupKind::Network) {
            if !network.depends_on.is_empty() {
                return Err(crate::Error::dependency(format!(
                    "network group '{}' must be a source node",
                    network.name
                )));
            }
        }

        if let (Some(lb), Some(compute)) = (
            self.group(GroupKind::LoadBalancer),
            self.group(GroupKind::Compute),
        ) {
            if !lb.depends_on.iter().any(|d| d == &compute.name) {
                return Err(crate::Error::dependency(format!(
                    "load-balancing group '{}' must depend on compute group '{}'",
                    lb.name, compute.name
                )));
            }
        }

        if let (Some(orchestration), Some(network)) = (
            self.group(GroupKind::Orchestration),
            self.group(GroupKind::Network),
        ) {
            if orchestration.depends_on != vec![network.name.clone()] {
                return Err(crate::Error::dependency(format!(
                    "orchestration group '{}' must depend on the network group only",
                    orchestration.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentRegistry;
    use crate::data::DataBuilder;
    use crate::network::NetworkBuilder;
    use crate::storage::ObjectStorageBuilder;
    use crate::Error;

    fn network_group(name: &str) -> ResourceGroup {
        let registry = EnvironmentRegistry::builtin("acme");
        let profile = registry.resolve("dev").unwrap();
        let topology = NetworkBuilder::new().build(profile).unwrap();
        ResourceGroup::new(name, GroupSpec::Network(topology))
    }

    fn storage_group(name: &str) -> ResourceGroup {
        let registry = EnvironmentRegistry::builtin("acme");
        let profile = registry.resolve("dev").unwrap();
        let store = ObjectStorageBuilder::new().build(profile);
        ResourceGroup::new(name, GroupSpec::ObjectStorage(store))
    }

    fn data_group(name: &str) -> ResourceGroup {
        let registry = EnvironmentRegistry::builtin("acme");
        let profile = registry.resolve("dev").unwrap();
        let data = DataBuilder::new().build(profile);
        ResourceGroup::new(name, GroupSpec::Data(data))
    }

    mod groups {
        use super::*;

        #[test]
        fn test_add_group_rejects_duplicate_names() {
            let mut graph = ResourceGraph::new();
            graph.add_group(network_group("net")).unwrap();
            let err = graph.add_group(network_group("net")).unwrap_err();
            assert!(matches!(err, Error::NamingCollision(_)));
        }

        #[test]
        fn test_group_lookup_by_kind() {
            let mut graph = ResourceGraph::new();
            graph.add_group(network_group("net")).unwrap();
            graph.add_group(storage_group("store")).unwrap();
            assert_eq!(graph.group(GroupKind::Network).unwrap().name, "net");
            assert_eq!(graph.group(GroupKind::ObjectStorage).unwrap().name, "store");
            assert!(graph.group(GroupKind::Compute).is_none());
        }

        #[test]
        fn test_tag_all_reaches_every_group() {
            let mut graph = ResourceGraph::new();
            graph.add_group(network_group("net")).unwrap();
            graph.add_group(storage_group("store")).unwrap();

            let mut tags = BTreeMap::new();
            tags.insert("Project".to_string(), "acme".to_string());
            graph.tag_all(&tags);

            for group in graph.groups() {
                assert_eq!(group.tags.get("Project").map(String::as_str), Some("acme"));
            }
        }
    }

    mod dependencies {
        use super::*;

        /// Story: Depending on an unbuilt group is an ordering defect
        ///
        /// A builder that references a group which has not been constructed
        /// yet fails loudly instead of producing a dangling edge.
        #[test]
        fn story_dependency_on_unbuilt_group_fails() {
            let mut graph = ResourceGraph::new();
            graph.add_group(storage_group("store")).unwrap();
            let err = graph.add_dependency("store", "net").unwrap_err();
            assert!(matches!(err, Error::DependencyCycle(_)));
            assert!(err.to_string().contains("has not been built"));
        }

        #[test]
        fn test_self_dependency_is_rejected() {
            let mut graph = ResourceGraph::new();
            graph.add_group(network_group("net")).unwrap();
            let err = graph.add_dependency("net", "net").unwrap_err();
            assert!(matches!(err, Error::DependencyCycle(_)));
        }

        #[test]
        fn test_duplicate_edges_collapse() {
            let mut graph = ResourceGraph::new();
            graph.add_group(network_group("net")).unwrap();
            graph.add_group(storage_group("store")).unwrap();
            graph.add_dependency("store", "net").unwrap();
            graph.add_dependency("store", "net").unwrap();
            assert_eq!(graph.group(GroupKind::ObjectStorage).unwrap().depends_on.len(), 1);
        }

        /// Story: Realization order puts dependencies first
        #[test]
        fn story_topological_order_respects_edges() {
            let mut graph = ResourceGraph::new();
            graph.add_group(network_group("net")).unwrap();
            graph.add_group(storage_group("store")).unwrap();
            graph.add_group(data_group("data")).unwrap();
            graph.add_dependency("data", "net").unwrap();
            graph.add_dependency("store", "data").unwrap();

            let order = graph.topological_order().unwrap();
            let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();
            assert!(pos("net") < pos("data"));
            assert!(pos("data") < pos("store"));
        }

        /// Story: A cycle among groups is fatal and names the culprits
        #[test]
        fn story_cycle_is_detected() {
            let mut graph = ResourceGraph::new();
            graph.add_group(storage_group("store")).unwrap();
            graph.add_group(data_group("data")).unwrap();
            graph.add_dependency("store", "data").unwrap();
            graph.add_dependency("data", "store").unwrap();

            let err = graph.topological_order().unwrap_err();
            assert!(matches!(err, Error::DependencyCycle(_)));
            assert!(err.to_string().contains("store"));
            assert!(err.to_string().contains("data"));
        }

        #[test]
        fn test_validate_requires_network_as_source() {
            let mut graph = ResourceGraph::new();
            graph.add_group(storage_group("store")).unwrap();
            graph.add_group(network_group("net")).unwrap();
            graph.add_dependency("net", "store").unwrap();
            let err = graph.validate().unwrap_err();
            assert!(err.to_string().contains("source node"));
        }
    }

    mod outputs {
        use super::*;

        #[test]
        fn test_duplicate_export_is_a_collision() {
            let mut graph = ResourceGraph::new();
            graph
                .add_output(OutputBinding::new("acme-dev-network-id", "network id", "net"))
                .unwrap();
            let err = graph
                .add_output(OutputBinding::new("acme-dev-network-id", "again", "net"))
                .unwrap_err();
            assert!(matches!(err, Error::NamingCollision(_)));
        }

        #[test]
        fn test_outputs_preserve_insertion_order() {
            let mut graph = ResourceGraph::new();
            graph
                .add_output(OutputBinding::new("acme-dev-a", "first", "1"))
                .unwrap();
            graph
                .add_output(OutputBinding::new("acme-dev-b", "second", "2"))
                .unwrap();
            let names: Vec<&str> = graph.outputs().iter().map(|o| o.export_name.as_str()).collect();
            assert_eq!(names, vec!["acme-dev-a", "acme-dev-b"]);
        }
    }
}
