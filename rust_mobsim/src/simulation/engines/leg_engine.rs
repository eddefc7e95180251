use nohash_hasher::IntSet;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::simulation::agents::agent::SimulationAgent;
use crate::simulation::agents::mode_behavior::{
    ArrivalAction, ModeCapability, RoutingProfile, BEELINE_FACTOR,
};
use crate::simulation::agents::{AgentEvent, EnvironmentalEventObserver, SimulationAgentLogic};
use crate::simulation::config;
use crate::simulation::controller::ComputationalEnvironment;
use crate::simulation::engines::network_engine::NetworkEngine;
use crate::simulation::engines::teleportation_engine::TeleportationEngine;
use crate::simulation::errors::SimulationError;
use crate::simulation::events::{
    LinkLeaveEventBuilder, PersonArrivalEventBuilder, PersonDepartureEventBuilder,
    StuckAgentEventBuilder,
};
use crate::simulation::id::Id;
use crate::simulation::messaging::messages::MessageEntry;
use crate::simulation::messaging::sim_communication::message_broker::NetMessageBroker;
use crate::simulation::messaging::sim_communication::SimCommunicator;
use crate::simulation::network::sim_network::SimNetworkPartition;
use crate::simulation::network::Network;
use crate::simulation::population::{
    InternalGenericRoute, InternalNetworkRoute, InternalRoute,
};
use crate::simulation::replanning::routing::graph::FreeflowTravelCosts;
use crate::simulation::replanning::routing::least_cost_path::LeastCostPathRouter;
use crate::simulation::replanning::routing::travel_time_collector::{
    CollectedTravelCosts, TravelTimeCollector,
};
use crate::simulation::time_queue::Identifiable;
use crate::simulation::vehicles::parking::ParkingRegistry;
use crate::simulation::vehicles::{Garage, InternalVehicle};

pub struct LegStepResult {
    /// agents that completed a leg this tick, cursor already on the next activity
    pub arrived: Vec<SimulationAgent>,
    /// agents dropped at departure because no route exists
    pub stuck: usize,
    /// active agents over all partitions, as exchanged this tick
    pub global_active: i64,
}

/// Owns everything a leg touches between its departure and its arrival: the network
/// queues, the teleportation queue, the garage, the router and the partition exchange.
pub struct LegEngine<C: SimCommunicator> {
    network_engine: NetworkEngine,
    teleportation_engine: TeleportationEngine,
    garage: Garage,
    net_message_broker: NetMessageBroker<C>,
    router: LeastCostPathRouter,
    travel_time_collector: Rc<RefCell<TravelTimeCollector>>,
    parking: ParkingRegistry,
    main_modes: IntSet<Id<String>>,
    comp_env: ComputationalEnvironment,
    global_network: Arc<Network>,
}

impl<C: SimCommunicator> LegEngine<C> {
    pub fn new(
        network_partition: SimNetworkPartition,
        global_network: Arc<Network>,
        garage: Garage,
        net_message_broker: NetMessageBroker<C>,
        config: &config::Simulation,
        mut comp_env: ComputationalEnvironment,
    ) -> Self {
        let main_modes: IntSet<Id<String>> = config
            .main_modes
            .iter()
            .map(|m| Id::<String>::create(m))
            .collect();

        let travel_time_collector =
            TravelTimeCollector::install(&mut comp_env.events_publisher_borrow_mut());
        let router = LeastCostPathRouter::new(global_network.clone());
        let parking = ParkingRegistry::new(global_network.clone());

        LegEngine {
            network_engine: NetworkEngine::new(network_partition, comp_env.clone()),
            teleportation_engine: TeleportationEngine::new(),
            garage,
            net_message_broker,
            router,
            travel_time_collector,
            parking,
            main_modes,
            comp_env,
            global_network,
        }
    }

    /// Steps 2 to 4 of a tick: take over the departing agents, advance teleportation
    /// and the network queues, then exchange boundary traffic with the other
    /// partitions. Everything that completed a leg comes back out, ordered
    /// deterministically: local teleport arrivals, then network arrivals in ascending
    /// link id order, then remote arrivals in ascending sender rank order.
    #[instrument(level = "trace", skip(self, departing), fields(rank = self.net_message_broker.rank()))]
    pub fn do_step(
        &mut self,
        now: u32,
        departing: Vec<SimulationAgent>,
        local_active: i64,
    ) -> LegStepResult {
        let mut stuck = 0;
        for agent in departing {
            if !self.receive_agent(now, agent) {
                stuck += 1;
            }
        }

        let mut arrived = Vec::new();

        for agent in self.teleportation_engine.do_step(now) {
            let link = agent.curr_link_id().expect("Teleporting agent without a link");
            if self.net_message_broker.rank_for_link(link) == self.net_message_broker.rank() {
                arrived.push(self.finish_teleport(now, agent));
            } else {
                self.net_message_broker.add_teleported(agent, now);
            }
        }

        self.network_engine.move_nodes(now);
        let move_result = self.network_engine.move_links(now);
        for vehicle in move_result.vehicles_exit_partition {
            self.net_message_broker.add_veh(vehicle, now);
        }
        for update in move_result.storage_cap_updates {
            self.net_message_broker.add_cap_update(update, now);
        }
        for vehicle in move_result.vehicles_end_leg {
            if let Some(agent) = self.handle_network_arrival(now, vehicle) {
                arrived.push(agent);
            }
        }

        let local_after_stuck = local_active - stuck as i64;
        let mut global_active = local_after_stuck;
        let messages = self.net_message_broker.send_recv(now, local_after_stuck);
        for mut message in messages {
            global_active += message.active_agents;
            self.network_engine
                .network
                .apply_storage_cap_updates(message.take_storage_capacities());
            for entry in message.take_entries() {
                match entry {
                    MessageEntry::NetworkVehicle(vehicle) => {
                        self.network_engine.receive_vehicle(now, vehicle, false);
                    }
                    MessageEntry::TeleportedAgent(agent) => {
                        arrived.push(self.finish_teleport(now, agent));
                    }
                }
            }
        }

        LegStepResult {
            arrived,
            stuck,
            global_active,
        }
    }

    /// Handles one departure. Returns false when the agent could not be routed and was
    /// removed as stuck.
    fn receive_agent(&mut self, now: u32, mut agent: SimulationAgent) -> bool {
        if agent.curr_leg().route.is_none() {
            match self.compute_route(&agent, now) {
                Ok(route) => agent.set_route(route),
                Err(e) => {
                    warn!(
                        "Removing agent {} at departure: {e}",
                        agent.id().external()
                    );
                    self.comp_env.events_publisher_borrow_mut().publish_event(
                        &StuckAgentEventBuilder::default()
                            .time(now)
                            .person(agent.id().clone())
                            .link(agent.prev_act().link_id.clone())
                            .build()
                            .unwrap(),
                    );
                    return false;
                }
            }
        }

        let leg = agent.curr_leg();
        let route = leg.route.as_ref().unwrap();
        self.comp_env.events_publisher_borrow_mut().publish_event(
            &PersonDepartureEventBuilder::default()
                .time(now)
                .person(agent.id().clone())
                .link(route.start_link().clone())
                .leg_mode(leg.mode.clone())
                .build()
                .unwrap(),
        );

        let on_network = leg.capability.is_vehicular()
            && self.main_modes.contains(&leg.mode)
            && route.as_network().is_some();

        if on_network {
            let veh_id = route
                .as_generic()
                .vehicle()
                .clone()
                .unwrap_or_else(|| {
                    Id::get_from_ext(&format!(
                        "{}_{}",
                        agent.id().external(),
                        agent.curr_leg().mode.external()
                    ))
                });
            let vehicle = self.garage.unpark_veh(agent, &veh_id);
            let start_link = vehicle
                .curr_link_id()
                .expect("Departing vehicle without a link")
                .clone();
            self.parking.unpark(&start_link, vehicle.pce);
            self.network_engine.receive_vehicle(now, vehicle, true);
        } else {
            self.teleportation_engine.receive_agent(now, agent);
        }
        true
    }

    fn compute_route(
        &mut self,
        agent: &SimulationAgent,
        now: u32,
    ) -> Result<InternalRoute, SimulationError> {
        let leg = agent.curr_leg();
        let capability = leg.capability;
        let from_act = agent.prev_act();
        let to_act = agent
            .next_act()
            .expect("A leg must be followed by an activity");
        let from_link = from_act.link_id.clone();
        let to_link = to_act.link_id.clone();

        let on_network = capability.is_vehicular() && self.main_modes.contains(&leg.mode);
        if !on_network {
            let beeline = ((from_act.x - to_act.x).powi(2) + (from_act.y - to_act.y).powi(2))
                .sqrt()
                * BEELINE_FACTOR;
            let trav_time = (beeline / capability.teleport_speed()).ceil() as u32;
            return Ok(InternalRoute::Generic(InternalGenericRoute::new(
                from_link,
                to_link,
                Some(trav_time),
                Some(beeline),
                None,
            )));
        }

        let (links, travel_time) = if from_link == to_link {
            // a stay leg: departure and destination share the link, no driving involved
            (vec![from_link.clone()], 0)
        } else {
            let from_node = self.global_network.get_link(&from_link).to.clone();
            let to_node = self.global_network.get_link(&to_link).from.clone();
            let path = match capability.routing_profile() {
                RoutingProfile::Congested => {
                    let costs = CollectedTravelCosts::new(self.travel_time_collector.clone());
                    self.router
                        .compute_least_cost_path(&from_node, &to_node, now, &costs)?
                }
                RoutingProfile::Freeflow => self.router.compute_least_cost_path(
                    &from_node,
                    &to_node,
                    now,
                    &FreeflowTravelCosts,
                )?,
            };
            let mut links = Vec::with_capacity(path.links.len() + 2);
            links.push(from_link.clone());
            links.extend(path.links);
            links.push(to_link.clone());
            (links, path.travel_time)
        };

        let veh_id = Id::get_from_ext(&format!(
            "{}_{}",
            agent.id().external(),
            leg.mode.external()
        ));
        Ok(InternalRoute::Network(InternalNetworkRoute::new(
            InternalGenericRoute::new(
                from_link,
                to_link,
                Some(travel_time),
                None,
                Some(veh_id),
            ),
            links,
        )))
    }

    /// Completes or extends a network leg that ended on a link of this partition.
    /// Returns None when parking search decided to keep driving.
    fn handle_network_arrival(
        &mut self,
        now: u32,
        mut vehicle: InternalVehicle,
    ) -> Option<SimulationAgent> {
        let capability = vehicle.driver().curr_leg().capability;
        let link_id = vehicle
            .curr_link_id()
            .expect("Arriving vehicle without a link")
            .clone();

        let mut action = {
            let parking = &self.parking;
            let parking_available =
                |link: &Id<crate::simulation::network::Link>| parking.has_space(link);
            capability.on_arrival(
                &link_id,
                vehicle.driver().next_act(),
                &self.global_network,
                &parking_available,
                now,
            )
        };

        // a search can only move on when the next link's driving storage takes the
        // vehicle, otherwise the agent gives up and parks where it is
        let next_is_blocked = matches!(
            &action,
            ArrivalAction::ContinueSearch(next)
                if !self.network_engine.network().storage_available(next)
        );
        if next_is_blocked {
            let destination = vehicle
                .driver()
                .next_act()
                .expect("A parking search leg must be followed by an activity.");
            action =
                ModeCapability::forced_parking(&link_id, destination, &self.global_network, now);
        }

        match action {
            ArrivalAction::Complete => Some(self.complete_vehicle_arrival(now, vehicle)),
            ArrivalAction::ContinueSearch(next) => {
                self.comp_env.events_publisher_borrow_mut().publish_event(
                    &LinkLeaveEventBuilder::default()
                        .time(now)
                        .link(link_id)
                        .vehicle(vehicle.id.clone())
                        .build()
                        .unwrap(),
                );
                vehicle
                    .driver_mut()
                    .notify_event(&mut AgentEvent::RouteExtended(next), now);
                vehicle.driver_mut().notify_event(&mut AgentEvent::LeftLink, now);
                self.network_engine.receive_vehicle(now, vehicle, false);
                None
            }
            ArrivalAction::ParkAndWalk { parking, walk } => {
                vehicle
                    .driver_mut()
                    .notify_event(&mut AgentEvent::ParkedAway(Some((parking, walk))), now);
                Some(self.complete_vehicle_arrival(now, vehicle))
            }
        }
    }

    fn complete_vehicle_arrival(&mut self, now: u32, vehicle: InternalVehicle) -> SimulationAgent {
        let link_id = vehicle.curr_link_id().unwrap().clone();
        let leg = vehicle.driver().curr_leg();
        self.comp_env.events_publisher_borrow_mut().publish_event(
            &PersonArrivalEventBuilder::default()
                .time(now)
                .person(vehicle.driver().id().clone())
                .link(link_id.clone())
                .leg_mode(leg.mode.clone())
                .build()
                .unwrap(),
        );
        self.parking.park(&link_id, vehicle.pce);
        let mut agent = self.garage.park_veh(vehicle);
        agent.advance_plan();
        agent
    }

    fn finish_teleport(&mut self, now: u32, mut agent: SimulationAgent) -> SimulationAgent {
        let leg = agent.curr_leg();
        self.comp_env.events_publisher_borrow_mut().publish_event(
            &PersonArrivalEventBuilder::default()
                .time(now)
                .person(agent.id().clone())
                .link(agent.curr_link_id().unwrap().clone())
                .leg_mode(leg.mode.clone())
                .build()
                .unwrap(),
        );
        agent.advance_plan();
        agent
    }

    /// Agents still traveling at the end of the run: teleporting agents plus the
    /// drivers of all vehicles left on the network.
    pub fn drain_remaining(&mut self) -> Vec<SimulationAgent> {
        let mut agents = self.teleportation_engine.drain();
        for vehicle in self.network_engine.network.drain_vehicles() {
            agents.push(self.garage.park_veh(vehicle));
        }
        agents
    }

    pub fn network(&self) -> &SimNetworkPartition {
        self.network_engine.network()
    }

    pub fn rank(&self) -> u32 {
        self.net_message_broker.rank()
    }
}
