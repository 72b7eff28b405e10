//! Security graph wirer
//!
//! Adds the directed access edges between the four security groups - and no
//! others. The layering is fixed:
//!
//! ```text
//! any-ipv4 --22--> bastion --22--> web --3306--> database
//! any-ipv4 --80/443--> load-balancer --80--> web
//! bastion --22--> database
//! ```
//!
//! Every edge into the web and database groups names a peer group; the two
//! CIDR edges exist only at the sanctioned entry points. The wirer runs
//! after the topology is built and before any builder consumes the groups.

use std::collections::BTreeMap;

use tracing::debug;

use super::{GroupRole, NetworkTopology};
use crate::{Result, ADMIN_PORT, ANY_IPV4, DATABASE_PORT, HTTPS_PORT, HTTP_PORT};

/// Wire the layered access edges into the topology's security groups
///
/// The edge set is exact: two CIDR edges on the entry points, four
/// group-to-group edges below them. The induced group-to-group graph is
/// checked for cycles before returning; a cycle is a construction defect,
/// never handed downstream.
pub fn wire_security_graph(topology: &mut NetworkTopology) -> Result<()> {
    topology
        .group_mut(GroupRole::Bastion)
        .allow_from_cidr(ANY_IPV4, ADMIN_PORT, "Administrative access")?;

    let lb = topology.group_mut(GroupRole::LoadBalancer);
    lb.allow_from_cidr(ANY_IPV4, HTTP_PORT, "Public web traffic")?;
    lb.allow_from_cidr(ANY_IPV4, HTTPS_PORT, "Public TLS traffic")?;

    let web = topology.group_mut(GroupRole::Web);
    web.allow_from_group(
        GroupRole::LoadBalancer,
        HTTP_PORT,
        "Web traffic from the load balancer",
    );
    web.allow_from_group(
        GroupRole::Bastion,
        ADMIN_PORT,
        "Administrative access from the bastion",
    );

    let database = topology.group_mut(GroupRole::Database);
    database.allow_from_group(
        GroupRole::Web,
        DATABASE_PORT,
        "Database traffic from web hosts",
    );
    database.allow_from_group(
        GroupRole::Bastion,
        ADMIN_PORT,
        "Administrative access from the bastion",
    );

    assert_acyclic(topology)?;
    debug!("wired security graph");
    Ok(())
}

/// Check that the group-to-group reference graph has no directed cycle
///
/// The fixed edge set wired above is a DAG; this guards against later
/// edge additions turning the layering into a ring.
pub fn assert_acyclic(topology: &NetworkTopology) -> Result<()> {
    let mut successors: BTreeMap<GroupRole, Vec<GroupRole>> = BTreeMap::new();
    for group in topology.groups() {
        for peer in group.group_peers() {
            successors.entry(peer).or_default().push(group.role);
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        role: GroupRole,
        successors: &BTreeMap<GroupRole, Vec<GroupRole>>,
        marks: &mut BTreeMap<GroupRole, Mark>,
    ) -> Result<()> {
        match marks.get(&role).copied().unwrap_or(Mark::Unvisited) {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                return Err(crate::Error::dependency(format!(
                    "cycle detected in the security graph at the {role} group"
                )))
            }
            Mark::Unvisited => {}
        }
        marks.insert(role, Mark::InProgress);
        if let Some(next) = successors.get(&role) {
            for &succ in next {
                visit(succ, successors, marks)?;
            }
        }
        marks.insert(role, Mark::Done);
        Ok(())
    }

    let mut marks = BTreeMap::new();
    for group in topology.groups() {
        visit(group.role, &successors, &mut marks)?;
    }
    Ok(())
}
