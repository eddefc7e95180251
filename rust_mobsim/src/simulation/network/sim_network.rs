use nohash_hasher::{IntMap, IntSet};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::simulation::agents::{AgentEvent, EnvironmentalEventObserver};
use crate::simulation::config;
use crate::simulation::controller::ComputationalEnvironment;
use crate::simulation::events::{EventsManager, LinkEnterEventBuilder, LinkLeaveEventBuilder};
use crate::simulation::id::Id;
use crate::simulation::network::link::LinkPosition::{QStart, Waiting};
use crate::simulation::network::link::{LocalLink, SimLink, SplitInLink, SplitOutLink};
use crate::simulation::network::{Link, Network, Node};
use crate::simulation::vehicles::InternalVehicle;

/// Storage released on a split link, reported back to the partition that feeds it.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUpdate {
    pub link_id: Id<Link>,
    pub from_part: u32,
    pub released: f32,
}

/// The runtime network of one partition. All mutable state lives here; the partition
/// owns it exclusively for the whole run, so no locking is involved. Active links and
/// nodes are kept in ordered sets and processed in ascending id order every tick, which
/// pins down the event order independently of hash map iteration.
#[derive(Debug)]
pub struct SimNetworkPartition {
    pub nodes: IntMap<Id<Node>, SimNode>,
    pub links: IntMap<Id<Link>, SimLink>,
    active_nodes: BTreeSet<Id<Node>>,
    active_links: BTreeSet<Id<Link>>,
    veh_counter: usize,
    partition: u32,
}

#[derive(Debug)]
#[allow(unused)]
pub struct SimNode {
    id: Id<Node>,
    /// ascending link id order, inherited from the network build
    in_links: Vec<Id<Link>>,
}

pub struct MoveAllLinksResult {
    pub vehicles_exit_partition: Vec<InternalVehicle>,
    pub vehicles_end_leg: Vec<InternalVehicle>,
    pub storage_cap_updates: Vec<StorageUpdate>,
}

impl SimNetworkPartition {
    pub fn from_network(
        global_network: &Network,
        partition: u32,
        config: &config::Simulation,
    ) -> Self {
        let nodes: Vec<&Node> = global_network
            .nodes()
            .iter()
            .filter(|n| n.partition == partition)
            .collect();

        let mut link_ids: BTreeSet<Id<Link>> = BTreeSet::new();
        for node in &nodes {
            link_ids.extend(node.in_links.iter().cloned());
            link_ids.extend(node.out_links.iter().cloned());
        }

        let sim_links: IntMap<Id<Link>, SimLink> = link_ids
            .into_iter()
            .map(|id| {
                let link = global_network.get_link(&id);
                (
                    id,
                    Self::create_sim_link(
                        link,
                        partition,
                        global_network.effective_cell_size(),
                        config,
                        global_network,
                    ),
                )
            })
            .collect();

        let sim_nodes: IntMap<Id<Node>, SimNode> = nodes
            .into_iter()
            .map(|n| {
                (
                    n.id.clone(),
                    SimNode {
                        id: n.id.clone(),
                        in_links: n.in_links.clone(),
                    },
                )
            })
            .collect();

        Self {
            nodes: sim_nodes,
            links: sim_links,
            active_nodes: BTreeSet::new(),
            active_links: BTreeSet::new(),
            veh_counter: 0,
            partition,
        }
    }

    fn create_sim_link(
        link: &Link,
        partition: u32,
        effective_cell_size: f32,
        config: &config::Simulation,
        global_network: &Network,
    ) -> SimLink {
        let from_part = global_network.get_node(&link.from).partition;
        let to_part = global_network.get_node(&link.to).partition;

        if from_part == to_part {
            SimLink::Local(LocalLink::from_link(link, effective_cell_size, config))
        } else if to_part == partition {
            let local = LocalLink::from_link(link, effective_cell_size, config);
            SimLink::In(SplitInLink::new(from_part, local))
        } else {
            SimLink::Out(SplitOutLink::new(
                link,
                effective_cell_size,
                config.sample_size,
                to_part,
            ))
        }
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Ranks of all partitions this one shares split links with.
    pub fn neighbors(&self) -> IntSet<u32> {
        self.links
            .values()
            .filter(|link| matches!(link, SimLink::In(_) | SimLink::Out(_)))
            .map(|link| link.neighbor_part())
            .collect()
    }

    pub fn active_nodes(&self) -> usize {
        self.active_nodes.len()
    }

    pub fn active_links(&self) -> usize {
        self.active_links.len()
    }

    pub fn veh_on_net(&self) -> usize {
        self.veh_counter
    }

    pub fn storage_available(&self, link_id: &Id<Link>) -> bool {
        self.links
            .get(link_id)
            .map(|l| l.is_available())
            .unwrap_or_else(|| panic!("Link {} is not part of this partition", link_id.external()))
    }

    /// Puts a vehicle onto its current link. With an events publisher the vehicle is en
    /// route and crossing a partition boundary, so a LinkEnter is emitted; without one
    /// the leg just started on this link and the vehicle joins the waiting list, where
    /// no LinkEnter is published.
    pub fn send_veh_en_route(
        &mut self,
        vehicle: InternalVehicle,
        events_publisher: Option<Rc<RefCell<EventsManager>>>,
        now: u32,
    ) {
        let link_id = vehicle
            .curr_link_id()
            .unwrap_or_else(|| {
                panic!(
                    "Vehicle {} has no current link and cannot be sent en route.",
                    vehicle.id.external()
                )
            })
            .clone();
        let link = self.links.get_mut(&link_id).unwrap_or_else(|| {
            panic!(
                "#{} Link {} is not part of this partition. Vehicle: {}",
                self.partition,
                link_id.external(),
                vehicle.id.external()
            )
        });

        let is_route_begin = events_publisher.is_none();
        // split out links are silent, the owning partition publishes the enter event
        if !matches!(link, SimLink::Out(_)) {
            if let Some(publisher) = events_publisher {
                publisher.borrow_mut().publish_event(
                    &LinkEnterEventBuilder::default()
                        .time(now)
                        .link(link_id.clone())
                        .vehicle(vehicle.id.clone())
                        .build()
                        .unwrap(),
                );
            }
        }

        let position = if is_route_begin { Waiting } else { QStart };
        link.push_veh(vehicle, position, now);
        self.veh_counter += 1;
        self.active_links.insert(link_id);
    }

    pub fn apply_storage_cap_updates(&mut self, updates: Vec<StorageUpdate>) {
        for update in updates {
            match self.links.get_mut(&update.link_id) {
                Some(SimLink::Out(link)) => link.apply_storage_cap_update(update.released),
                _ => panic!("Storage updates must address split out links."),
            }
        }
    }

    /// Step 2 of a tick: for every active node, in ascending node id order, move vehicles
    /// from the buffers of its in links onto their next links. In links are visited in
    /// ascending link id order; a vehicle moves when the downstream link has storage
    /// left, or unconditionally once its stuck timer has expired.
    pub fn move_nodes(&mut self, comp_env: &mut ComputationalEnvironment, now: u32) {
        let active: Vec<Id<Node>> = self.active_nodes.iter().cloned().collect();
        let mut deactivate = Vec::new();

        for node_id in active {
            let node = self.nodes.get(&node_id).unwrap();
            let still_active = Self::move_node(
                node,
                &mut self.links,
                &mut self.active_links,
                comp_env,
                now,
            );
            if !still_active {
                deactivate.push(node_id);
            }
        }

        for node_id in deactivate {
            self.active_nodes.remove(&node_id);
        }
    }

    fn move_node(
        node: &SimNode,
        links: &mut IntMap<Id<Link>, SimLink>,
        active_links: &mut BTreeSet<Id<Link>>,
        comp_env: &mut ComputationalEnvironment,
        now: u32,
    ) -> bool {
        for link_id in &node.in_links {
            if !active_links.contains(link_id) {
                continue;
            }

            loop {
                let offer = {
                    let in_link = links.get(link_id).unwrap();
                    in_link.offers_veh(now).map(|veh| {
                        let next = veh
                            .peek_next_route_element()
                            .unwrap_or_else(|| {
                                panic!(
                                    "Vehicle {} is offered by link {} but has no next link. Leg ends are handled in move_links.",
                                    veh.id.external(),
                                    link_id.external()
                                )
                            })
                            .clone();
                        (next, in_link.is_veh_stuck(now))
                    })
                };
                let Some((next_id, is_stuck)) = offer else {
                    break;
                };

                let next_available = links
                    .get(&next_id)
                    .unwrap_or_else(|| {
                        panic!("Link {} is not part of this partition.", next_id.external())
                    })
                    .is_available();

                if is_stuck || next_available {
                    let veh = links
                        .get_mut(link_id)
                        .unwrap()
                        .pop_veh()
                        .expect("Link offered a vehicle but had none to pop");
                    Self::move_vehicle(veh, links, active_links, comp_env, now);
                } else {
                    break;
                }
            }
        }

        // the node stays active while any in link can offer next tick
        node.in_links
            .iter()
            .filter(|id| active_links.contains(*id))
            .filter_map(|id| links.get(id))
            .any(|link| !matches!(link, SimLink::Out(_)) && link.offers_veh(now + 1).is_some())
    }

    fn move_vehicle(
        mut vehicle: InternalVehicle,
        links: &mut IntMap<Id<Link>, SimLink>,
        active_links: &mut BTreeSet<Id<Link>>,
        comp_env: &mut ComputationalEnvironment,
        now: u32,
    ) {
        let old_link_id = vehicle.curr_link_id().unwrap().clone();
        comp_env.events_publisher_borrow_mut().publish_event(
            &LinkLeaveEventBuilder::default()
                .time(now)
                .link(old_link_id.clone())
                .vehicle(vehicle.id.clone())
                .build()
                .unwrap(),
        );

        vehicle.driver_mut().notify_event(&mut AgentEvent::LeftLink, now);
        let new_link_id = vehicle.curr_link_id().unwrap().clone();
        let new_link = links.get_mut(&new_link_id).unwrap();

        // for split out links the owning partition publishes the enter event
        if let SimLink::Local(_) = new_link {
            comp_env.events_publisher_borrow_mut().publish_event(
                &LinkEnterEventBuilder::default()
                    .time(now)
                    .link(new_link_id.clone())
                    .vehicle(vehicle.id.clone())
                    .build()
                    .unwrap(),
            );
        }

        new_link.push_veh(vehicle, QStart, now);
        active_links.insert(new_link_id);

        if !links.get(&old_link_id).unwrap().is_active() {
            active_links.remove(&old_link_id);
        }
    }

    /// Step 3 of a tick: every active link, in ascending link id order, runs its
    /// queue step. Returns vehicles ending their leg here, vehicles that crossed onto
    /// another partition, and the storage those vehicles freed on split links.
    pub fn move_links(&mut self, now: u32) -> MoveAllLinksResult {
        let mut storage_cap_updates = Vec::new();
        let mut vehicles_exit_partition = Vec::new();
        let mut vehicles_end_leg = Vec::new();
        let mut deactivate = Vec::new();

        let active: Vec<Id<Link>> = self.active_links.iter().cloned().collect();
        for link_id in active {
            let link = self.links.get_mut(&link_id).unwrap();
            let is_active = match link {
                SimLink::Local(ll) => {
                    let mut ended = ll.do_sim_step(now);
                    if ll.to_node_active(now) {
                        self.active_nodes.insert(ll.to.clone());
                    }
                    vehicles_end_leg.append(&mut ended);
                    ll.is_active()
                }
                SimLink::In(il) => {
                    let before = il.occupied_storage();
                    let mut ended = il.local_link.do_sim_step(now);
                    if il.local_link.to_node_active(now) {
                        self.active_nodes.insert(il.local_link.to.clone());
                    }
                    vehicles_end_leg.append(&mut ended);

                    let released = before - il.occupied_storage();
                    assert!(
                        released >= 0.0,
                        "Occupied storage on link {} must not grow while moving vehicles out.",
                        il.local_link.id
                    );
                    if released > 0. {
                        storage_cap_updates.push(StorageUpdate {
                            link_id: il.local_link.id.clone(),
                            from_part: il.from_part,
                            released,
                        });
                    }
                    il.local_link.is_active()
                }
                SimLink::Out(ol) => {
                    vehicles_exit_partition.extend(ol.take_veh());
                    false
                }
            };

            if !is_active {
                deactivate.push(link_id);
            }
        }

        for link_id in deactivate {
            self.active_links.remove(&link_id);
        }

        self.veh_counter -= vehicles_exit_partition.len();
        self.veh_counter -= vehicles_end_leg.len();

        MoveAllLinksResult {
            vehicles_exit_partition,
            vehicles_end_leg,
            storage_cap_updates,
        }
    }

    /// Rips all remaining vehicles out of the network, in ascending link id order. Used
    /// once at the end of a run to flush agents that never completed.
    pub fn drain_vehicles(&mut self) -> Vec<InternalVehicle> {
        let mut vehicles = Vec::new();
        let ids: Vec<Id<Link>> = self.active_links.iter().cloned().collect();
        for link_id in ids {
            match self.links.get_mut(&link_id).unwrap() {
                SimLink::Local(ll) => vehicles.extend(ll.drain()),
                SimLink::In(il) => vehicles.extend(il.local_link.drain()),
                SimLink::Out(ol) => vehicles.extend(ol.take_veh()),
            }
        }
        self.active_links.clear();
        self.active_nodes.clear();
        self.veh_counter -= vehicles.len();
        vehicles
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;

    use super::*;
    use crate::test_utils;

    fn three_link_partition() -> (Network, SimNetworkPartition) {
        let network = test_utils::create_three_link_network(36000., 10.);
        let partition =
            SimNetworkPartition::from_network(&network, 0, &test_utils::config().simulation);
        (network, partition)
    }

    #[integration_test]
    fn vehicle_travels_across_links() {
        let (_network, mut partition) = three_link_partition();
        let mut comp_env = ComputationalEnvironment::default();

        let vehicle =
            test_utils::create_vehicle("veh-1", "agent-1", 10., 1., &["l1", "l2", "l3"]);
        partition.send_veh_en_route(vehicle, None, 0);
        assert_eq!(1, partition.veh_on_net());

        let mut end_leg_time = None;
        for now in 0..30 {
            partition.move_nodes(&mut comp_env, now);
            let result = partition.move_links(now);
            if !result.vehicles_end_leg.is_empty() {
                end_leg_time = Some(now);
                break;
            }
        }

        // waits on l1 at t=0, drives l2 from t=1, l3 from t=12, arrives at 22
        assert_eq!(Some(22), end_leg_time);
        assert_eq!(0, partition.veh_on_net());
        assert_eq!(0, partition.active_links());
    }

    #[integration_test]
    fn spillback_blocks_upstream() {
        // l2 can hold two vehicles, 1 veh/s flow everywhere
        let network = test_utils::create_three_link_network_with_storage(3600., 10., 15.);
        let mut partition =
            SimNetworkPartition::from_network(&network, 0, &test_utils::config().simulation);
        let mut comp_env = ComputationalEnvironment::default();

        for i in 0..5 {
            let vehicle = test_utils::create_vehicle(
                &format!("veh-{i}"),
                &format!("agent-{i}"),
                10.,
                1.,
                &["l1", "l2", "l3"],
            );
            partition.send_veh_en_route(vehicle, None, 0);
        }

        let l2: Id<Link> = Id::get_from_ext("l2");
        let mut max_on_l2: f32 = 0.;
        for now in 0..100 {
            partition.move_nodes(&mut comp_env, now);
            partition.move_links(now);
            max_on_l2 = max_on_l2.max(partition.links.get(&l2).unwrap().used_storage());
        }

        // storage bound: occupancy never exceeds the two cells of l2
        assert!(max_on_l2 <= 2.0, "storage bound violated: {max_on_l2}");
        // nothing was lost
        assert_eq!(0, partition.veh_on_net());
    }

    #[integration_test]
    fn split_links_between_partitions() {
        let mut network = test_utils::create_three_link_network(3600., 10.);
        network.partition(2);

        let config = test_utils::config().simulation;
        let net0 = SimNetworkPartition::from_network(&network, 0, &config);
        let net1 = SimNetworkPartition::from_network(&network, 1, &config);

        // nodes alternate between partitions, so every link is split
        let split_in = |net: &SimNetworkPartition| {
            net.links
                .values()
                .filter(|l| matches!(l, SimLink::In(_)))
                .count()
        };
        let split_out = |net: &SimNetworkPartition| {
            net.links
                .values()
                .filter(|l| matches!(l, SimLink::Out(_)))
                .count()
        };
        assert_eq!(2, net0.nodes.len());
        assert_eq!(2, net1.nodes.len());
        assert_eq!(split_in(&net0) + split_in(&net1), 3);
        assert_eq!(split_out(&net0) + split_out(&net1), 3);
        assert!(net0.neighbors().contains(&1));
        assert!(net1.neighbors().contains(&0));
    }

    #[integration_test]
    fn exiting_vehicles_are_collected() {
        let mut network = test_utils::create_three_link_network(3600., 10.);
        network.partition(2);
        let config = test_utils::config().simulation;
        let mut net1 = SimNetworkPartition::from_network(&network, 1, &config);
        let mut comp_env = ComputationalEnvironment::default();

        // l1 ends at n2 which belongs to partition 1; l2 leads back to partition 0, so
        // the vehicle leaves this partition after crossing n2
        let vehicle = test_utils::create_vehicle("veh-1", "agent-1", 10., 1., &["l1", "l2", "l3"]);
        net1.send_veh_en_route(vehicle, None, 0);

        let mut exited = 0;
        for now in 0..30 {
            net1.move_nodes(&mut comp_env, now);
            let res = net1.move_links(now);
            exited += res.vehicles_exit_partition.len();
        }
        assert_eq!(1, exited);
    }

    #[integration_test]
    fn drain_removes_everything() {
        let (_network, mut partition) = three_link_partition();
        for i in 0..3 {
            let vehicle = test_utils::create_vehicle(
                &format!("veh-{i}"),
                &format!("agent-{i}"),
                10.,
                1.,
                &["l1", "l2", "l3"],
            );
            partition.send_veh_en_route(vehicle, None, 0);
        }

        let drained = partition.drain_vehicles();
        assert_eq!(3, drained.len());
        assert_eq!(0, partition.veh_on_net());
        assert_eq!(0, partition.active_links());
    }
}
