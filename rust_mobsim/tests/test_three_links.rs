use macros::integration_test;
use std::sync::Arc;

use rust_mobsim::simulation::population::Population;
use rust_mobsim::test_utils;

/// One agent drives a three link chain. The expected lines pin down the engine's whole
/// behavior: departure handling, link crossings one tick after the earliest exit time,
/// and same-tick arrival plus activity start.
#[integration_test(rust_mobsim)]
fn single_agent_drives_the_chain() {
    let config = Arc::new(test_utils::config());
    let network = test_utils::create_three_link_network(3600., 10.);

    let mut population = Population::new();
    population.add_person(test_utils::create_person_with_plan("p1", &["l1", "l2", "l3"], 10));

    let events = test_utils::execute_scenario(config, network, population);
    let lines: Vec<String> = events.into_iter().map(|(_, line)| line).collect();

    let expected = vec![
        "<event time=\"10\" type=\"actend\" person=\"p1\" link=\"l1\" actType=\"home\"/>\n",
        "<event time=\"10\" type=\"departure\" person=\"p1\" link=\"l1\" legMode=\"car\"/>\n",
        "<event time=\"11\" type=\"left link\" link=\"l1\" vehicle=\"p1_car\"/>\n",
        "<event time=\"11\" type=\"entered link\" link=\"l2\" vehicle=\"p1_car\"/>\n",
        "<event time=\"22\" type=\"left link\" link=\"l2\" vehicle=\"p1_car\"/>\n",
        "<event time=\"22\" type=\"entered link\" link=\"l3\" vehicle=\"p1_car\"/>\n",
        "<event time=\"32\" type=\"arrival\" person=\"p1\" link=\"l3\" legMode=\"car\"/>\n",
        "<event time=\"32\" type=\"actstart\" person=\"p1\" link=\"l3\" actType=\"work\"/>\n",
    ];
    assert_eq!(expected, lines);
}

/// The same scenario split over two partitions must produce the same events. Their
/// interleaving differs between ranks, so the comparison is over the sorted streams.
#[integration_test(rust_mobsim)]
fn two_partitions_produce_the_same_events() {
    let mut config = test_utils::config();
    config.partitioning.num_parts = 2;
    let network = test_utils::create_three_link_network(3600., 10.);

    let mut population = Population::new();
    population.add_person(test_utils::create_person_with_plan("p1", &["l1", "l2", "l3"], 10));

    let events = test_utils::execute_scenario(Arc::new(config), network, population);
    let mut lines: Vec<String> = events.into_iter().map(|(_, line)| line).collect();
    lines.sort();

    let mut expected: Vec<String> = vec![
        "<event time=\"10\" type=\"actend\" person=\"p1\" link=\"l1\" actType=\"home\"/>\n",
        "<event time=\"10\" type=\"departure\" person=\"p1\" link=\"l1\" legMode=\"car\"/>\n",
        "<event time=\"11\" type=\"left link\" link=\"l1\" vehicle=\"p1_car\"/>\n",
        "<event time=\"11\" type=\"entered link\" link=\"l2\" vehicle=\"p1_car\"/>\n",
        "<event time=\"22\" type=\"left link\" link=\"l2\" vehicle=\"p1_car\"/>\n",
        "<event time=\"22\" type=\"entered link\" link=\"l3\" vehicle=\"p1_car\"/>\n",
        "<event time=\"32\" type=\"arrival\" person=\"p1\" link=\"l3\" legMode=\"car\"/>\n",
        "<event time=\"32\" type=\"actstart\" person=\"p1\" link=\"l3\" actType=\"work\"/>\n",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    expected.sort();

    assert_eq!(expected, lines);
}
