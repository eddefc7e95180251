use itertools::Itertools;

use crate::simulation::errors::{RoutingViolation, SimulationError};
use crate::simulation::network::Network;
use crate::simulation::population::{
    InternalLeg, InternalPerson, InternalPlanElement, InternalRoute, Population,
};

/// Validates every selected plan against the network before the run starts. A run never
/// starts on a population that fails here, which is why neither failure kind can
/// surface mid-run. Two kinds of failure are distinguished: a non-final activity whose
/// end condition cannot be resolved fails right away with [`SimulationError::IncompletePlan`],
/// while route inconsistencies are collected over the whole population, in ascending
/// person-id order, and reported as one [`SimulationError::RoutingConsistency`] batch so
/// a single broken plan does not mask the rest.
pub fn validate(population: &Population, network: &Network) -> Result<(), SimulationError> {
    let mut violations = Vec::new();

    let mut persons: Vec<&InternalPerson> = population.persons.values().collect();
    persons.sort_by(|a, b| a.id().cmp(b.id()));

    for person in persons {
        validate_person(person, network, &mut violations)?;
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SimulationError::RoutingConsistency(violations))
    }
}

fn validate_person(
    person: &InternalPerson,
    network: &Network,
    violations: &mut Vec<RoutingViolation>,
) -> Result<(), SimulationError> {
    let agent = person.id().external();
    let Some(plan) = person.selected_plan() else {
        violations.push(RoutingViolation::new(agent, "no selected plan"));
        return Ok(());
    };
    if plan.elements.is_empty() {
        violations.push(RoutingViolation::new(agent, "plan is empty"));
        return Ok(());
    }

    for (index, element) in plan.elements.iter().enumerate() {
        let expect_activity = index % 2 == 0;
        match element {
            InternalPlanElement::Activity(_) if !expect_activity => {
                violations.push(RoutingViolation::new(
                    agent,
                    format!("element #{index} is an activity where a leg was expected"),
                ));
            }
            InternalPlanElement::Leg(_) if expect_activity => {
                violations.push(RoutingViolation::new(
                    agent,
                    format!("element #{index} is a leg where an activity was expected"),
                ));
            }
            _ => {}
        }
    }
    if plan.elements.len() % 2 == 0 {
        violations.push(RoutingViolation::new(agent, "plan does not end with an activity"));
    }

    for (index, element) in plan.elements.iter().enumerate() {
        match element {
            InternalPlanElement::Activity(act) => {
                if network.try_get_link(&act.link_id).is_err() {
                    violations.push(RoutingViolation::new(
                        agent,
                        format!(
                            "activity #{index} references unknown link '{}'",
                            act.link_id.external()
                        ),
                    ));
                }
                // not a routing issue: an agent that can never leave this activity has
                // an incomplete plan, which is its own failure kind
                let is_last = index == plan.elements.len() - 1;
                if !is_last && !act.has_end_condition() {
                    return Err(SimulationError::IncompletePlan {
                        agent: agent.to_string(),
                        index,
                    });
                }
            }
            InternalPlanElement::Leg(leg) => {
                // a leg at index 0 was already reported by the alternation check
                let prev_act = index
                    .checked_sub(1)
                    .and_then(|i| plan.elements[i].as_activity());
                let next_act = plan.elements.get(index + 1).and_then(|e| e.as_activity());
                validate_leg(agent, index, leg, prev_act, next_act, network, violations);
            }
        }
    }

    Ok(())
}

fn validate_leg(
    agent: &str,
    index: usize,
    leg: &InternalLeg,
    prev_act: Option<&crate::simulation::population::InternalActivity>,
    next_act: Option<&crate::simulation::population::InternalActivity>,
    network: &Network,
    violations: &mut Vec<RoutingViolation>,
) {
    // a missing route is fine, the mode capability computes one at departure
    let Some(route) = leg.route.as_ref() else {
        return;
    };

    if let Some(prev) = prev_act {
        if route.start_link() != &prev.link_id {
            violations.push(RoutingViolation::new(
                agent,
                format!(
                    "leg #{index} starts on link '{}' but the preceding activity is on '{}'",
                    route.start_link().external(),
                    prev.link_id.external()
                ),
            ));
        }
    }
    if let Some(next) = next_act {
        if route.end_link() != &next.link_id {
            violations.push(RoutingViolation::new(
                agent,
                format!(
                    "leg #{index} ends on link '{}' but the following activity is on '{}'",
                    route.end_link().external(),
                    next.link_id.external()
                ),
            ));
        }
    }

    let Some(net_route) = route.as_network() else {
        return;
    };
    if net_route.route().is_empty() {
        violations.push(RoutingViolation::new(
            agent,
            format!("leg #{index} has an empty network route"),
        ));
        return;
    }

    for link_id in net_route.route() {
        if network.try_get_link(link_id).is_err() {
            violations.push(RoutingViolation::new(
                agent,
                format!(
                    "leg #{index} route references unknown link '{}'",
                    link_id.external()
                ),
            ));
            return;
        }
        let link = network.get_link(link_id);
        if !link.modes.is_empty() && !link.modes.contains(&leg.mode) {
            violations.push(RoutingViolation::new(
                agent,
                format!(
                    "leg #{index} uses link '{}' which does not allow mode '{}'",
                    link_id.external(),
                    leg.mode.external()
                ),
            ));
        }
    }

    for (from, to) in net_route.route().iter().tuple_windows() {
        if !network.is_adjacent(from, to) {
            violations.push(RoutingViolation::new(
                agent,
                format!(
                    "leg #{index} route jumps from link '{}' to non-adjacent link '{}'",
                    from.external(),
                    to.external()
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;

    use super::validate;
    use crate::simulation::errors::SimulationError;
    use crate::simulation::id::Id;
    use crate::simulation::network::{Link, Network, Node};
    use crate::simulation::population::{
        InternalActivity, InternalGenericRoute, InternalLeg, InternalNetworkRoute, InternalPerson,
        InternalPlan, InternalRoute, Population,
    };

    fn three_link_network() -> Network {
        let mut network = Network::new();
        let n1 = Node::new(Id::create("n1"), 0., 0.);
        let n2 = Node::new(Id::create("n2"), 100., 0.);
        let n3 = Node::new(Id::create("n3"), 200., 0.);
        let n4 = Node::new(Id::create("n4"), 300., 0.);
        let l1 = Link::new_with_default(Id::create("l1"), &n1, &n2);
        let l2 = Link::new_with_default(Id::create("l2"), &n2, &n3);
        let l3 = Link::new_with_default(Id::create("l3"), &n3, &n4);
        network.add_node(n1);
        network.add_node(n2);
        network.add_node(n3);
        network.add_node(n4);
        network.add_link(l1);
        network.add_link(l2);
        network.add_link(l3);
        network
    }

    fn person_with_route(id: &str, links: &[&str]) -> InternalPerson {
        let ids: Vec<Id<Link>> = links.iter().map(|l| Id::create(l)).collect();
        let generic = InternalGenericRoute::new(
            ids.first().unwrap().clone(),
            ids.last().unwrap().clone(),
            None,
            None,
            None,
        );
        let mut plan = InternalPlan::default();
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "home",
            ids.first().unwrap().clone(),
            None,
            Some(3600),
            None,
        ));
        plan.add_leg(InternalLeg::new(
            InternalRoute::Network(InternalNetworkRoute::new(generic, ids.clone())),
            "car",
            600,
            None,
        ));
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "work",
            ids.last().unwrap().clone(),
            None,
            None,
            None,
        ));
        InternalPerson::new(Id::create(id), plan)
    }

    #[integration_test]
    fn valid_plan_passes() {
        let network = three_link_network();
        let mut population = Population::new();
        population.add_person(person_with_route("p1", &["l1", "l2", "l3"]));

        assert!(validate(&population, &network).is_ok());
    }

    #[integration_test]
    fn non_adjacent_route_fails() {
        let network = three_link_network();
        let mut population = Population::new();
        // l1 ends at n2, l3 starts at n3
        population.add_person(person_with_route("p1", &["l1", "l3"]));

        let err = validate(&population, &network).unwrap_err();
        let SimulationError::RoutingConsistency(violations) = err else {
            panic!("expected a routing consistency batch")
        };
        assert_eq!(1, violations.len());
        assert!(violations[0].message.contains("non-adjacent"));
    }

    #[integration_test]
    fn violations_are_batched_over_the_population() {
        let network = three_link_network();
        let mut population = Population::new();
        population.add_person(person_with_route("p1", &["l1", "l3"]));
        population.add_person(person_with_route("p2", &["l1", "l3"]));

        let err = validate(&population, &network).unwrap_err();
        let SimulationError::RoutingConsistency(violations) = err else {
            panic!("expected a routing consistency batch")
        };
        assert_eq!(2, violations.len());
        // batch is ordered by person id
        assert_eq!("p1", violations[0].agent);
        assert_eq!("p2", violations[1].agent);
    }

    #[integration_test]
    fn missing_end_condition_is_an_incomplete_plan() {
        let network = three_link_network();
        let mut plan = InternalPlan::default();
        // neither end_time nor max_dur on a non-final activity
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "home",
            Id::create("l1"),
            None,
            None,
            None,
        ));
        plan.add_leg(InternalLeg::new_unrouted("car", None));
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "work",
            Id::create("l3"),
            None,
            None,
            None,
        ));
        let mut population = Population::new();
        population.add_person(InternalPerson::new(Id::create("p1"), plan));

        let err = validate(&population, &network).unwrap_err();
        let SimulationError::IncompletePlan { agent, index } = err else {
            panic!("expected an incomplete plan error")
        };
        assert_eq!("p1", agent);
        assert_eq!(0, index);
    }

    #[integration_test]
    fn final_activity_needs_no_end_condition() {
        let network = three_link_network();
        let mut population = Population::new();
        // the factory plan ends with an open-ended activity
        population.add_person(person_with_route("p1", &["l1", "l2", "l3"]));

        assert!(validate(&population, &network).is_ok());
    }

    #[integration_test]
    fn unknown_activity_link_fails() {
        let network = three_link_network();
        let mut population = Population::new();
        let mut plan = InternalPlan::default();
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "home",
            Id::create("no-such-link"),
            None,
            Some(3600),
            None,
        ));
        population.add_person(InternalPerson::new(Id::create("p1"), plan));

        assert!(validate(&population, &network).is_err());
    }
}
