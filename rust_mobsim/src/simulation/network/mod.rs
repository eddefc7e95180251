use nohash_hasher::IntSet;

use crate::simulation::errors::SimulationError;
use crate::simulation::id::Id;

pub mod flow_cap;
pub mod link;
pub mod sim_network;
pub mod storage_cap;
pub mod stuck_timer;

/// The static road network. Built once before a run, then shared read-only between all
/// partition threads. Nodes and links live in flat vecs indexed by their dense internal
/// ids, so runtime code can address them without hashing.
#[derive(Debug)]
pub struct Network {
    nodes: Vec<Node>,
    links: Vec<Link>,
    effective_cell_size: f32,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: Id<Node>,
    pub x: f64,
    pub y: f64,
    pub in_links: Vec<Id<Link>>,
    pub out_links: Vec<Id<Link>>,
    pub partition: u32,
}

#[derive(Debug, Clone)]
pub struct Link {
    pub id: Id<Link>,
    pub from: Id<Node>,
    pub to: Id<Node>,
    pub length: f64,
    /// flow capacity in vehicles per hour
    pub capacity: f32,
    pub freespeed: f32,
    pub permlanes: f32,
    pub modes: IntSet<Id<String>>,
    pub partition: u32,
}

impl Default for Network {
    fn default() -> Self {
        Network::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Network {
            nodes: Vec::new(),
            links: Vec::new(),
            effective_cell_size: 7.5,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn effective_cell_size(&self) -> f32 {
        self.effective_cell_size
    }

    pub fn set_effective_cell_size(&mut self, cell_size: f32) {
        self.effective_cell_size = cell_size;
    }

    pub fn add_node(&mut self, node: Node) {
        assert_eq!(
            node.id.internal() as usize,
            self.nodes.len(),
            "Internal id {} of node {} does not match its slot {}. Nodes must be added in id order.",
            node.id.internal(),
            node.id.external(),
            self.nodes.len(),
        );
        self.nodes.push(node);
    }

    /// Adds a link and wires it into the in/out lists of its end nodes. Because links must
    /// be added in id order, those lists stay sorted by ascending link id, which the
    /// engine relies on for deterministic iteration.
    pub fn add_link(&mut self, link: Link) {
        assert_eq!(
            link.id.internal() as usize,
            self.links.len(),
            "Internal id {} of link {} does not match its slot {}. Links must be added in id order.",
            link.id.internal(),
            link.id.external(),
            self.links.len(),
        );
        self.nodes
            .get_mut(link.from.internal() as usize)
            .unwrap_or_else(|| panic!("From node {} of link {} is unknown", link.from, link.id))
            .out_links
            .push(link.id.clone());
        self.nodes
            .get_mut(link.to.internal() as usize)
            .unwrap_or_else(|| panic!("To node {} of link {} is unknown", link.to, link.id))
            .in_links
            .push(link.id.clone());
        self.links.push(link);
    }

    pub fn get_node(&self, id: &Id<Node>) -> &Node {
        self.nodes.get(id.internal() as usize).unwrap()
    }

    pub fn get_link(&self, id: &Id<Link>) -> &Link {
        self.links.get(id.internal() as usize).unwrap()
    }

    pub fn try_get_node(&self, id: &Id<Node>) -> Result<&Node, SimulationError> {
        self.nodes
            .get(id.internal() as usize)
            .ok_or_else(|| SimulationError::NotFound {
                kind: "node",
                id: id.external().to_string(),
            })
    }

    pub fn try_get_link(&self, id: &Id<Link>) -> Result<&Link, SimulationError> {
        self.links
            .get(id.internal() as usize)
            .ok_or_else(|| SimulationError::NotFound {
                kind: "link",
                id: id.external().to_string(),
            })
    }

    /// True when `next` starts where `link` ends. The plan validator uses this to reject
    /// routes that skip over the graph.
    pub fn is_adjacent(&self, link: &Id<Link>, next: &Id<Link>) -> bool {
        let link = self.get_link(link);
        let next = self.get_link(next);
        link.to == next.from
    }

    /// Assigns nodes round robin to `num_parts` partitions and every link to the
    /// partition of its to-node, mirroring that a link's queue is drained by the
    /// partition that owns the downstream node.
    pub fn partition(&mut self, num_parts: u32) {
        for node in self.nodes.iter_mut() {
            node.partition = (node.id.internal() % num_parts as u64) as u32;
        }
        for link in self.links.iter_mut() {
            link.partition = self.nodes[link.to.internal() as usize].partition;
        }
    }
}

impl Node {
    pub fn new(id: Id<Node>, x: f64, y: f64) -> Self {
        Node {
            id,
            x,
            y,
            in_links: Vec::new(),
            out_links: Vec::new(),
            partition: 0,
        }
    }
}

impl Link {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Id<Link>,
        from: Id<Node>,
        to: Id<Node>,
        length: f64,
        capacity: f32,
        freespeed: f32,
        permlanes: f32,
        modes: IntSet<Id<String>>,
    ) -> Self {
        Link {
            id,
            from,
            to,
            length,
            capacity,
            freespeed,
            permlanes,
            modes,
            partition: 0,
        }
    }

    /// A unit link between two nodes, with the euclidean distance as length.
    pub fn new_with_default(id: Id<Link>, from: &Node, to: &Node) -> Self {
        let length = ((from.x - to.x).powi(2) + (from.y - to.y).powi(2)).sqrt();
        Link::new(
            id,
            from.id.clone(),
            to.id.clone(),
            length,
            1.,
            1.,
            1.,
            IntSet::default(),
        )
    }
}
