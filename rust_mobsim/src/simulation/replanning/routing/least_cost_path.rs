use keyed_priority_queue::{Entry, KeyedPriorityQueue};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::simulation::errors::SimulationError;
use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network, Node};
use crate::simulation::replanning::routing::graph::{RoutingGraph, TravelCosts};

/// Accumulated cost used as priority. Reversed ordering turns the max-queue into a
/// min-queue; costs are finite by construction, so total_cmp never sees a NaN.
#[derive(PartialEq)]
struct Cost(f64);

impl Eq for Cost {}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.total_cmp(&self.0)
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct LeastCostPath {
    pub links: Vec<Id<Link>>,
    pub travel_time: u32,
    pub travel_cost: f64,
}

/// Search state of one query. Owned per router value, reset before every search, so a
/// router issues thousands of queries without reallocating. Concurrent searches each
/// need their own router value; the graph itself is shared.
struct SearchBuffers {
    cost: Vec<f64>,
    arrival: Vec<u32>,
    parent_edge: Vec<usize>,
}

const NO_PARENT: usize = usize::MAX;

impl SearchBuffers {
    fn new(node_count: usize) -> Self {
        SearchBuffers {
            cost: vec![f64::INFINITY; node_count],
            arrival: vec![0; node_count],
            parent_edge: vec![NO_PARENT; node_count],
        }
    }

    fn reset(&mut self) {
        self.cost.fill(f64::INFINITY);
        self.arrival.fill(0);
        self.parent_edge.fill(NO_PARENT);
    }
}

/// Time-dependent least cost path search: label-setting Dijkstra over the CSR graph
/// with a keyed priority frontier. Edge weights are evaluated at the arrival time at
/// each link, out edges expand in ascending link id order, so repeated queries on equal
/// costs always return the same path.
pub struct LeastCostPathRouter {
    network: Arc<Network>,
    graph: RoutingGraph,
    buffers: SearchBuffers,
}

impl LeastCostPathRouter {
    pub fn new(network: Arc<Network>) -> Self {
        let graph = RoutingGraph::from_network(&network);
        let buffers = SearchBuffers::new(graph.node_count());
        LeastCostPathRouter {
            network,
            graph,
            buffers,
        }
    }

    pub fn compute_least_cost_path(
        &mut self,
        from: &Id<Node>,
        to: &Id<Node>,
        departure: u32,
        costs: &dyn TravelCosts,
    ) -> Result<LeastCostPath, SimulationError> {
        let from_idx = from.internal() as usize;
        let to_idx = to.internal() as usize;
        self.network.try_get_node(from)?;
        self.network.try_get_node(to)?;

        self.buffers.reset();
        self.buffers.cost[from_idx] = 0.0;
        self.buffers.arrival[from_idx] = departure;

        // every node starts on the frontier; improvements are decrease-key operations
        let mut queue: KeyedPriorityQueue<usize, Cost> = KeyedPriorityQueue::new();
        for node in 0..self.graph.node_count() {
            let cost = if node == from_idx { 0.0 } else { f64::INFINITY };
            queue.push(node, Cost(cost));
        }

        while let Some((current, Cost(current_cost))) = queue.pop() {
            if current_cost.is_infinite() {
                // the cheapest remaining node is unreachable, so is everything else
                break;
            }
            if current == to_idx {
                return Ok(self.unwind_path(from_idx, to_idx, departure));
            }

            let now = self.buffers.arrival[current];
            for edge in self.graph.out_edges(current) {
                let link = self.network.get_link(self.graph.edge_link(edge));
                let neighbor = self.graph.edge_target(edge);

                let candidate = current_cost + costs.link_cost(link, now);
                if candidate < self.buffers.cost[neighbor] {
                    self.buffers.cost[neighbor] = candidate;
                    self.buffers.arrival[neighbor] = now + costs.link_time(link, now);
                    self.buffers.parent_edge[neighbor] = edge;
                    // settled nodes never improve with non-negative costs, the
                    // entry is still on the frontier
                    if let Entry::Occupied(e) = queue.entry(neighbor) {
                        e.set_priority(Cost(candidate));
                    }
                }
            }
        }

        Err(SimulationError::NoPathFound {
            from: from.external().to_string(),
            to: to.external().to_string(),
            departure,
        })
    }

    fn unwind_path(&self, from: usize, to: usize, departure: u32) -> LeastCostPath {
        let mut links = Vec::new();
        let mut current = to;
        while current != from {
            let edge = self.buffers.parent_edge[current];
            assert_ne!(NO_PARENT, edge, "Settled node without a parent edge");
            links.push(self.graph.edge_link(edge).clone());
            let link = self.network.get_link(self.graph.edge_link(edge));
            current = link.from.internal() as usize;
        }
        links.reverse();

        LeastCostPath {
            links,
            travel_time: self.buffers.arrival[to] - departure,
            travel_cost: self.buffers.cost[to],
        }
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;
    use std::sync::Arc;

    use super::*;
    use crate::simulation::replanning::routing::graph::FreeflowTravelCosts;
    use crate::test_utils;

    #[integration_test]
    fn shortest_path_on_a_chain() {
        let network = Arc::new(test_utils::create_three_link_network(3600., 10.));
        let mut router = LeastCostPathRouter::new(network);

        let path = router
            .compute_least_cost_path(
                &Id::get_from_ext("n1"),
                &Id::get_from_ext("n4"),
                0,
                &FreeflowTravelCosts,
            )
            .unwrap();

        let links: Vec<&str> = path.links.iter().map(|l| l.external()).collect();
        assert_eq!(vec!["l1", "l2", "l3"], links);
        // three 100m links at 10m/s
        assert_eq!(30, path.travel_time);
        assert_eq!(30., path.travel_cost);
    }

    #[integration_test]
    fn no_path_on_disconnected_nodes() {
        let network = Arc::new(test_utils::create_three_link_network(3600., 10.));
        let mut router = LeastCostPathRouter::new(network);

        // the chain is directed, going backwards is impossible
        let result = router.compute_least_cost_path(
            &Id::get_from_ext("n4"),
            &Id::get_from_ext("n1"),
            0,
            &FreeflowTravelCosts,
        );
        assert!(matches!(
            result,
            Err(SimulationError::NoPathFound { .. })
        ));
    }

    #[integration_test]
    fn parallel_routes_choose_minimum_cost() {
        // two node-disjoint routes between o and d: a fast two-hop and a slow one-hop
        let network = Arc::new(test_utils::create_parallel_routes_network());
        let mut router = LeastCostPathRouter::new(network);

        let path = router
            .compute_least_cost_path(
                &Id::get_from_ext("o"),
                &Id::get_from_ext("d"),
                0,
                &FreeflowTravelCosts,
            )
            .unwrap();

        let links: Vec<&str> = path.links.iter().map(|l| l.external()).collect();
        assert_eq!(vec!["upper-1", "upper-2"], links);
    }

    #[integration_test]
    fn equal_cost_ties_are_stable() {
        let network = Arc::new(test_utils::create_diamond_network());
        let mut router = LeastCostPathRouter::new(network);

        let first = router
            .compute_least_cost_path(
                &Id::get_from_ext("o"),
                &Id::get_from_ext("d"),
                0,
                &FreeflowTravelCosts,
            )
            .unwrap();
        for _ in 0..10 {
            let again = router
                .compute_least_cost_path(
                    &Id::get_from_ext("o"),
                    &Id::get_from_ext("d"),
                    0,
                    &FreeflowTravelCosts,
                )
                .unwrap();
            assert_eq!(first.links, again.links);
        }
        // the smaller link id wins the tie
        assert_eq!("top-1", first.links[0].external());
    }
}
