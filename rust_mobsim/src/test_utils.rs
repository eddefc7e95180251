use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;

use crate::simulation::agents::agent::SimulationAgent;
use crate::simulation::agents::SimulationAgentLogic;
use crate::simulation::config::Config;
use crate::simulation::controller::local_controller::LocalControllerBuilder;
use crate::simulation::controller::try_join;
use crate::simulation::events::writer::event_2_string;
use crate::simulation::events::{EventsManager, OnEventFnBuilder};
use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network, Node};
use crate::simulation::population::{
    InternalActivity, InternalGenericRoute, InternalLeg, InternalNetworkRoute, InternalPerson,
    InternalPlan, InternalRoute, Population,
};
use crate::simulation::scenario::GlobalScenario;
use crate::simulation::vehicles::{InternalVehicle, InternalVehicleType};

pub fn config() -> Config {
    let mut config = Config::default();
    config.simulation.start_time = 0;
    config.simulation.end_time = 86400;
    config
}

/// A directed chain n1 -l1-> n2 -l2-> n3 -l3-> n4 with 100m links.
pub fn create_three_link_network(capacity_h: f32, freespeed: f32) -> Network {
    create_three_link_network_with_storage(capacity_h, freespeed, 100.)
}

pub fn create_three_link_network_with_storage(
    capacity_h: f32,
    freespeed: f32,
    length: f64,
) -> Network {
    let mut network = Network::new();
    let nodes: Vec<Node> = (1..=4)
        .map(|i| Node::new(Id::create(&format!("n{i}")), (i - 1) as f64 * length, 0.))
        .collect();
    for node in &nodes {
        network.add_node(node.clone());
    }
    for (i, pair) in nodes.windows(2).enumerate() {
        let mut link = Link::new_with_default(Id::create(&format!("l{}", i + 1)), &pair[0], &pair[1]);
        link.capacity = capacity_h;
        link.freespeed = freespeed;
        link.length = length;
        network.add_link(link);
    }
    network
}

/// Scenario network for routing: a shared origin and destination connected by two
/// node-disjoint routes, a fast two-hop one and a slow three-hop one, plus access and
/// egress links. Seven links overall.
pub fn create_parallel_routes_network() -> Network {
    let mut network = Network::new();

    let s = Node::new(Id::create("s"), -100., 0.);
    let o = Node::new(Id::create("o"), 0., 0.);
    let u1 = Node::new(Id::create("u1"), 100., 100.);
    let w1 = Node::new(Id::create("w1"), 70., -100.);
    let w2 = Node::new(Id::create("w2"), 140., -100.);
    let d = Node::new(Id::create("d"), 200., 0.);
    let e = Node::new(Id::create("e"), 300., 0.);

    let add_link = |network: &mut Network, name: &str, from: &Node, to: &Node, freespeed: f32| {
        let mut link = Link::new_with_default(Id::create(name), from, to);
        link.capacity = 3600.;
        link.freespeed = freespeed;
        link.length = 100.;
        network.add_link(link);
    };

    for node in [&s, &o, &u1, &w1, &w2, &d, &e] {
        network.add_node(node.clone());
    }

    add_link(&mut network, "access", &s, &o, 10.);
    // the upper route: two hops at 20 m/s, 10 seconds in total
    add_link(&mut network, "upper-1", &o, &u1, 20.);
    add_link(&mut network, "upper-2", &u1, &d, 20.);
    // the lower route: three hops at 10 m/s, 30 seconds in total
    add_link(&mut network, "lower-1", &o, &w1, 10.);
    add_link(&mut network, "lower-2", &w1, &w2, 10.);
    add_link(&mut network, "lower-3", &w2, &d, 10.);
    add_link(&mut network, "egress", &d, &e, 10.);

    network
}

/// Two equal-cost routes o -> d, for tie-breaking tests.
pub fn create_diamond_network() -> Network {
    let mut network = Network::new();

    let o = Node::new(Id::create("o"), 0., 0.);
    let a = Node::new(Id::create("a"), 100., 100.);
    let b = Node::new(Id::create("b"), 100., -100.);
    let d = Node::new(Id::create("d"), 200., 0.);

    for node in [&o, &a, &b, &d] {
        network.add_node(node.clone());
    }

    let add_link = |network: &mut Network, name: &str, from: &Node, to: &Node| {
        let mut link = Link::new_with_default(Id::create(name), from, to);
        link.capacity = 3600.;
        link.freespeed = 10.;
        link.length = 100.;
        network.add_link(link);
    };
    add_link(&mut network, "top-1", &o, &a);
    add_link(&mut network, "top-2", &a, &d);
    add_link(&mut network, "bottom-1", &o, &b);
    add_link(&mut network, "bottom-2", &b, &d);

    network
}

fn network_route_leg(mode: &str, links: &[&str]) -> InternalLeg {
    let ids: Vec<Id<Link>> = links.iter().map(|l| Id::create(l)).collect();
    let generic = InternalGenericRoute::new(
        ids.first().unwrap().clone(),
        ids.last().unwrap().clone(),
        None,
        None,
        None,
    );
    InternalLeg::new(
        InternalRoute::Network(InternalNetworkRoute::new(generic, ids)),
        mode,
        0,
        None,
    )
}

/// A person with the plan: activity on the first link until `end_time`, one car leg
/// over `links`, final activity on the last link.
pub fn create_person_with_plan(id: &str, links: &[&str], end_time: u32) -> InternalPerson {
    let mut plan = InternalPlan::default();
    plan.add_act(InternalActivity::new(
        0.,
        0.,
        "home",
        Id::create(links.first().unwrap()),
        None,
        Some(end_time),
        None,
    ));
    plan.add_leg(network_route_leg("car", links));
    plan.add_act(InternalActivity::new(
        0.,
        0.,
        "work",
        Id::create(links.last().unwrap()),
        None,
        None,
        None,
    ));
    InternalPerson::new(Id::create(id), plan)
}

pub fn create_agent_with_plan(id: &str, links: &[&str], end_time: u32) -> SimulationAgent {
    SimulationAgent::new_plan_based(create_person_with_plan(id, links, end_time))
}

/// An agent with one teleported leg between two links, already carrying its route.
pub fn create_agent_with_teleported_leg(
    id: &str,
    from: &str,
    to: &str,
    trav_time: u32,
) -> SimulationAgent {
    let mut plan = InternalPlan::default();
    plan.add_act(InternalActivity::new(
        0.,
        0.,
        "home",
        Id::create(from),
        None,
        Some(0),
        None,
    ));
    plan.add_leg(InternalLeg::new(
        InternalRoute::Generic(InternalGenericRoute::new(
            Id::create(from),
            Id::create(to),
            Some(trav_time),
            None,
            None,
        )),
        "walk",
        trav_time,
        None,
    ));
    plan.add_act(InternalActivity::new(
        0.,
        0.,
        "work",
        Id::create(to),
        None,
        None,
        None,
    ));
    SimulationAgent::new_plan_based(InternalPerson::new(Id::create(id), plan))
}

/// A vehicle whose driver is on a car leg over `route_links`, cursor at the first link.
pub fn create_vehicle(
    veh_id: &str,
    agent_id: &str,
    max_v: f32,
    pce: f32,
    route_links: &[&str],
) -> InternalVehicle {
    let mut agent = create_agent_with_plan(agent_id, route_links, 0);
    agent.advance_plan();

    let type_id: Id<InternalVehicleType> = Id::create("default");
    InternalVehicle::new(Id::create(veh_id), type_id, max_v, pce, Some(agent))
}

/// Builds the scenario, runs it with the local controller and returns the canonical
/// event lines tagged with the rank that published them, in publish order per rank.
pub fn execute_scenario(
    config: Arc<Config>,
    network: Network,
    population: Population,
) -> Vec<(u32, String)> {
    let num_parts = config.partitioning.num_parts;
    let scenario =
        GlobalScenario::build(config, network, population).expect("Failed to build scenario");

    let (tx, rx) = mpsc::channel::<(u32, String)>();
    let mut subscribers: HashMap<u32, Vec<Box<OnEventFnBuilder>>> = HashMap::new();
    for rank in 0..num_parts {
        let tx = tx.clone();
        let builder: Box<OnEventFnBuilder> = Box::new(move |events: &mut EventsManager| {
            events.on_any(move |_seq, e| {
                tx.send((rank, event_2_string(e)))
                    .expect("Event receiver hung up");
            });
        });
        subscribers.insert(rank, vec![builder]);
    }
    drop(tx);

    let handles = LocalControllerBuilder::default()
        .global_scenario(scenario)
        .events_subscriber_per_partition(subscribers)
        .build()
        .unwrap()
        .run();
    try_join(handles);

    rx.into_iter().collect()
}
