use tracing::instrument;

use crate::simulation::controller::ComputationalEnvironment;
use crate::simulation::network::sim_network::{MoveAllLinksResult, SimNetworkPartition};
use crate::simulation::vehicles::InternalVehicle;

/// Drives the partition's link queues. Thin layer that wires the events publisher into
/// the network steps and hides when link enter events are published: a vehicle starting
/// its route gets none, a vehicle already en route does.
pub struct NetworkEngine {
    pub(crate) network: SimNetworkPartition,
    comp_env: ComputationalEnvironment,
}

impl NetworkEngine {
    pub fn new(network: SimNetworkPartition, comp_env: ComputationalEnvironment) -> Self {
        NetworkEngine { network, comp_env }
    }

    pub fn receive_vehicle(&mut self, now: u32, vehicle: InternalVehicle, route_begin: bool) {
        let events = if route_begin {
            None
        } else {
            Some(self.comp_env.events_publisher())
        };
        self.network.send_veh_en_route(vehicle, events, now)
    }

    #[instrument(level = "trace", skip(self), fields(rank = self.network.partition()))]
    pub(super) fn move_nodes(&mut self, now: u32) {
        self.network.move_nodes(&mut self.comp_env, now)
    }

    #[instrument(level = "trace", skip(self), fields(rank = self.network.partition()))]
    pub(super) fn move_links(&mut self, now: u32) -> MoveAllLinksResult {
        self.network.move_links(now)
    }

    pub fn network(&self) -> &SimNetworkPartition {
        &self.network
    }
}
