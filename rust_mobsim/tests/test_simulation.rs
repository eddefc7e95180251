use macros::integration_test;
use std::rc::Rc;
use std::sync::Arc;

use rust_mobsim::simulation::controller::ComputationalEnvironment;
use rust_mobsim::simulation::id::Id;
use rust_mobsim::simulation::messaging::sim_communication::message_broker::NetMessageBroker;
use rust_mobsim::simulation::messaging::sim_communication::DummySimCommunicator;
use rust_mobsim::simulation::population::{
    InternalActivity, InternalGenericRoute, InternalLeg, InternalPerson, InternalPlan,
    InternalRoute, Population,
};
use rust_mobsim::simulation::scenario::GlobalScenario;
use rust_mobsim::simulation::simulation::Simulation;
use rust_mobsim::test_utils;

/// Drives a single-partition simulation directly, without the controller, and checks
/// the conservation invariant on the engine's own counters: active + finished + stuck
/// equals the population size.
#[integration_test(rust_mobsim)]
fn counters_conserve_the_population() {
    let mut config = test_utils::config();
    config.simulation.end_time = 600;
    let network = test_utils::create_three_link_network(3600., 10.);

    let mut population = Population::new();
    for i in 0..3 {
        population.add_person(test_utils::create_person_with_plan(
            &format!("driver-{i}"),
            &["l1", "l2", "l3"],
            i * 10,
        ));
    }
    // this one walks for two hours and gets flushed at the 600s time limit
    let mut plan = InternalPlan::default();
    plan.add_act(InternalActivity::new(
        0.,
        0.,
        "home",
        Id::get_from_ext("l1"),
        None,
        Some(0),
        None,
    ));
    plan.add_leg(InternalLeg::new(
        InternalRoute::Generic(InternalGenericRoute::new(
            Id::get_from_ext("l1"),
            Id::get_from_ext("l3"),
            Some(7200),
            None,
            None,
        )),
        "walk",
        7200,
        None,
    ));
    plan.add_act(InternalActivity::new(
        200.,
        0.,
        "work",
        Id::get_from_ext("l3"),
        None,
        None,
        None,
    ));
    population.add_person(InternalPerson::new(Id::create("walker"), plan));

    let scenario =
        GlobalScenario::build(Arc::new(config), network, population).expect("scenario invalid");
    let mut partitions = scenario.into_partitions();
    let partition = partitions.remove(0);

    let broker = NetMessageBroker::new(Rc::new(DummySimCommunicator), &partition.network);
    let mut simulation = Simulation::new(partition, broker, ComputationalEnvironment::default());
    simulation.run();

    let (active, finished, stuck, population_size) = simulation.agent_counts();
    assert_eq!(4, population_size);
    assert_eq!(0, active);
    assert_eq!(3, finished);
    assert_eq!(1, stuck);
}

/// A run with no traveling agents terminates right away instead of ticking to the end
/// of its time window.
#[integration_test(rust_mobsim)]
fn empty_population_terminates_early() {
    let mut config = test_utils::config();
    config.simulation.end_time = u32::MAX - 1;
    let network = test_utils::create_three_link_network(3600., 10.);

    let scenario = GlobalScenario::build(Arc::new(config), network, Population::new())
        .expect("scenario invalid");
    let mut partitions = scenario.into_partitions();
    let partition = partitions.remove(0);

    let broker = NetMessageBroker::new(Rc::new(DummySimCommunicator), &partition.network);
    let mut simulation = Simulation::new(partition, broker, ComputationalEnvironment::default());
    // would effectively never return if the loop ran the whole time window
    simulation.run();

    let (active, finished, stuck, population_size) = simulation.agent_counts();
    assert_eq!((0, 0, 0, 0), (active, finished, stuck, population_size));
}
