use clap::Parser;
use std::sync::Arc;
use tracing::info;

use rust_mobsim::simulation::config::{CommandLineArgs, Config};
use rust_mobsim::simulation::controller::local_controller::LocalControllerBuilder;
use rust_mobsim::simulation::controller::try_join;
use rust_mobsim::simulation::id::Id;
use rust_mobsim::simulation::logging;
use rust_mobsim::simulation::network::{Link, Network, Node};
use rust_mobsim::simulation::population::{
    InternalActivity, InternalGenericRoute, InternalLeg, InternalNetworkRoute, InternalPerson,
    InternalPlan, InternalRoute, Population,
};
use rust_mobsim::simulation::scenario::GlobalScenario;

/// Runs a synthetic corridor scenario: a chain of links with agents departing one
/// second apart. Useful as a smoke test of the whole engine and as a template for
/// wiring real scenario builders against the library.
fn main() {
    let _guard = logging::init_std_out_logging();
    let args = CommandLineArgs::parse();
    let config = Arc::new(Config::from(args));
    info!("Loaded config: {config:?}");

    let link_count = 10;
    let agent_count = 100;

    let network = build_corridor_network(link_count);
    let population = build_population(agent_count, link_count);

    let scenario = GlobalScenario::build(config, network, population)
        .unwrap_or_else(|e| panic!("Scenario rejected: {e}"));

    let handles = LocalControllerBuilder::default()
        .global_scenario(scenario)
        .build()
        .unwrap()
        .run();
    try_join(handles);

    info!("Done.");
}

fn build_corridor_network(link_count: usize) -> Network {
    let mut network = Network::new();
    let nodes: Vec<Node> = (0..=link_count)
        .map(|i| Node::new(Id::create(&format!("node-{i}")), i as f64 * 100., 0.))
        .collect();
    for node in &nodes {
        network.add_node(node.clone());
    }
    for (i, pair) in nodes.windows(2).enumerate() {
        let mut link = Link::new_with_default(Id::create(&format!("link-{i}")), &pair[0], &pair[1]);
        link.capacity = 1800.;
        link.freespeed = 13.9;
        link.length = 100.;
        network.add_link(link);
    }
    network
}

fn build_population(agent_count: usize, link_count: usize) -> Population {
    let first_link: Id<Link> = Id::get_from_ext("link-0");
    let last_link: Id<Link> = Id::get_from_ext(&format!("link-{}", link_count - 1));
    let route_links: Vec<Id<Link>> = (0..link_count)
        .map(|i| Id::get_from_ext(&format!("link-{i}")))
        .collect();

    let mut population = Population::new();
    for i in 0..agent_count {
        let mut plan = InternalPlan::default();
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "home",
            first_link.clone(),
            None,
            Some(8 * 3600 + i as u32),
            None,
        ));
        let generic = InternalGenericRoute::new(
            first_link.clone(),
            last_link.clone(),
            None,
            None,
            None,
        );
        plan.add_leg(InternalLeg::new(
            InternalRoute::Network(InternalNetworkRoute::new(generic, route_links.clone())),
            "car",
            0,
            None,
        ));
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "work",
            last_link.clone(),
            None,
            None,
            None,
        ));
        population.add_person(InternalPerson::new(
            Id::create(&format!("agent-{i}")),
            plan,
        ));
    }
    population
}
