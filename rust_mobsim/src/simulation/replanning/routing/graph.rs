use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network};

/// Compressed sparse row view of the network for shortest path searches. Edge slots of
/// one node are laid out in ascending link id order (inherited from the network build),
/// so equal-cost alternatives are always expanded in the same sequence and tie-breaking
/// is identical on every run.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingGraph {
    first_out: Vec<usize>,
    head: Vec<usize>,
    link_ids: Vec<Id<Link>>,
}

impl RoutingGraph {
    pub fn from_network(network: &Network) -> Self {
        let node_count = network.nodes().len();
        let mut first_out = Vec::with_capacity(node_count + 1);
        let mut head = Vec::new();
        let mut link_ids = Vec::new();

        first_out.push(0);
        for node in network.nodes() {
            for link_id in &node.out_links {
                let link = network.get_link(link_id);
                head.push(link.to.internal() as usize);
                link_ids.push(link_id.clone());
            }
            first_out.push(head.len());
        }

        RoutingGraph {
            first_out,
            head,
            link_ids,
        }
    }

    pub fn node_count(&self) -> usize {
        self.first_out.len() - 1
    }

    pub fn edge_count(&self) -> usize {
        self.head.len()
    }

    /// Edge slot range of one node's outgoing links.
    pub fn out_edges(&self, node: usize) -> std::ops::Range<usize> {
        self.first_out[node]..self.first_out[node + 1]
    }

    pub fn edge_target(&self, edge: usize) -> usize {
        self.head[edge]
    }

    pub fn edge_link(&self, edge: usize) -> &Id<Link> {
        &self.link_ids[edge]
    }
}

/// The cost/time function pair driving a search. Both are evaluated at the time the
/// search arrives at the link, which makes routes respond to congestion reported from
/// earlier parts of the run.
pub trait TravelCosts {
    fn link_cost(&self, link: &Link, time: u32) -> f64;
    fn link_time(&self, link: &Link, time: u32) -> u32;
}

/// Schedule-independent costs: free-flow traversal time, at least one second per link.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeflowTravelCosts;

impl FreeflowTravelCosts {
    pub fn freeflow_time(link: &Link) -> u32 {
        ((link.length / link.freespeed as f64).round() as u32).max(1)
    }
}

impl TravelCosts for FreeflowTravelCosts {
    fn link_cost(&self, link: &Link, time: u32) -> f64 {
        self.link_time(link, time) as f64
    }

    fn link_time(&self, link: &Link, _time: u32) -> u32 {
        Self::freeflow_time(link)
    }
}
