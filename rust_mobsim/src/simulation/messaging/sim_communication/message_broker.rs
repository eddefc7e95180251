use nohash_hasher::IntMap;
use std::collections::HashMap;
use std::rc::Rc;

use crate::simulation::agents::agent::SimulationAgent;
use crate::simulation::agents::SimulationAgentLogic;
use crate::simulation::id::Id;
use crate::simulation::messaging::messages::SyncMessage;
use crate::simulation::messaging::sim_communication::SimCommunicator;
use crate::simulation::network::sim_network::StorageUpdate;
use crate::simulation::network::{Link, Network};
use crate::simulation::vehicles::InternalVehicle;

/// Stages outgoing traffic for the end-of-tick exchange and knows which partition owns
/// which link. All staged items address the partition owning the traveler's current
/// link; storage updates go back to the partition feeding the split link.
pub struct NetMessageBroker<C: SimCommunicator> {
    communicator: Rc<C>,
    out_messages: HashMap<u32, SyncMessage>,
    /// link internal id to owning partition, for the whole network
    link_mapping: IntMap<u64, u32>,
}

impl<C: SimCommunicator> NetMessageBroker<C> {
    pub fn new(communicator: Rc<C>, global_network: &Network) -> Self {
        let link_mapping = global_network
            .links()
            .iter()
            .map(|link| (link.id.internal(), link.partition))
            .collect();

        Self {
            communicator,
            out_messages: HashMap::new(),
            link_mapping,
        }
    }

    pub fn rank(&self) -> u32 {
        self.communicator.rank()
    }

    pub fn size(&self) -> u32 {
        self.communicator.size()
    }

    pub fn rank_for_link(&self, link_id: &Id<Link>) -> u32 {
        *self
            .link_mapping
            .get(&link_id.internal())
            .unwrap_or_else(|| panic!("Link {} is not mapped to a partition.", link_id.external()))
    }

    pub fn add_veh(&mut self, vehicle: InternalVehicle, now: u32) {
        let link_id = vehicle
            .curr_link_id()
            .expect("A vehicle crossing partitions must have a current link.")
            .clone();
        let target = self.rank_for_link(&link_id);
        self.out_message(target, now).add_veh(vehicle);
    }

    pub fn add_teleported(&mut self, agent: SimulationAgent, now: u32) {
        let link_id = agent
            .curr_link_id()
            .expect("A teleporting agent must have a current link.")
            .clone();
        let target = self.rank_for_link(&link_id);
        self.out_message(target, now).add_teleported(agent);
    }

    pub fn add_cap_update(&mut self, update: StorageUpdate, now: u32) {
        let target = update.from_part;
        self.out_message(target, now).add_storage_cap(update);
    }

    fn out_message(&mut self, target: u32, now: u32) -> &mut SyncMessage {
        let rank = self.rank();
        assert_ne!(rank, target, "Local traffic must not be staged as a message.");
        self.out_messages
            .entry(target)
            .or_insert_with(|| SyncMessage::new(now, rank, target))
    }

    /// Exchanges the staged messages with all peers. Every peer gets exactly one
    /// message carrying `local_active` for the termination decision; the returned
    /// messages are ordered by sender rank.
    pub fn send_recv(&mut self, now: u32, local_active: i64) -> Vec<SyncMessage> {
        let rank = self.rank();
        let mut staged = std::mem::take(&mut self.out_messages);

        let mut out = Vec::with_capacity(self.size() as usize - 1);
        for target in 0..self.size() {
            if target == rank {
                continue;
            }
            let mut message = staged
                .remove(&target)
                .unwrap_or_else(|| SyncMessage::new(now, rank, target));
            message.time = now;
            message.active_agents = local_active;
            out.push(message);
        }
        assert!(
            staged.is_empty(),
            "Staged messages for unknown partitions: {:?}",
            staged.keys()
        );

        self.communicator.send_receive(out, now)
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;
    use std::rc::Rc;

    use super::*;
    use crate::simulation::messaging::sim_communication::DummySimCommunicator;
    use crate::test_utils;

    #[integration_test]
    fn maps_links_to_partitions() {
        let mut network = test_utils::create_three_link_network(3600., 10.);
        network.partition(2);
        let broker = NetMessageBroker::new(Rc::new(DummySimCommunicator), &network);

        // link partition follows the to-node: l1 ends at n2 (rank 1), l2 at n3 (rank 0)
        assert_eq!(1, broker.rank_for_link(&Id::get_from_ext("l1")));
        assert_eq!(0, broker.rank_for_link(&Id::get_from_ext("l2")));
        assert_eq!(1, broker.rank_for_link(&Id::get_from_ext("l3")));
    }

    #[integration_test]
    fn single_partition_exchanges_nothing() {
        let network = test_utils::create_three_link_network(3600., 10.);
        let mut broker = NetMessageBroker::new(Rc::new(DummySimCommunicator), &network);

        let received = broker.send_recv(0, 5);
        assert!(received.is_empty());
    }
}
