use std::collections::HashSet;

use crate::simulation::agents::agent::SimulationAgent;
use crate::simulation::id::Id;
use crate::simulation::population::InternalPerson;
use crate::simulation::vehicles::Garage;

/// Turns persons into simulation agents and registers one vehicle per (person, vehicular
/// mode) in the garage. Callers pass the persons sorted by id, so all partitions create
/// their agents and vehicle ids in the same order.
pub fn create_agents(persons: Vec<InternalPerson>, garage: &mut Garage) -> Vec<SimulationAgent> {
    let mut agents = Vec::with_capacity(persons.len());

    for person in persons {
        let mut registered: HashSet<Id<String>> = HashSet::new();
        if let Some(plan) = person.selected_plan() {
            for leg in plan.legs() {
                if !leg.capability.is_vehicular() || registered.contains(&leg.mode) {
                    continue;
                }
                let type_id = garage.veh_type_for_mode(&leg.mode);
                garage.add_veh_by_type(person.id(), &type_id);
                registered.insert(leg.mode.clone());
            }
        }
        agents.push(SimulationAgent::new_plan_based(person));
    }

    agents
}

#[cfg(test)]
mod tests {
    use macros::integration_test;

    use super::create_agents;
    use crate::simulation::id::Id;
    use crate::simulation::population::{
        InternalActivity, InternalGenericRoute, InternalLeg, InternalPerson, InternalPlan,
        InternalRoute,
    };
    use crate::simulation::vehicles::Garage;

    #[integration_test]
    fn registers_one_vehicle_per_vehicular_mode() {
        let mut plan = InternalPlan::default();
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "home",
            Id::create("l1"),
            None,
            Some(3600),
            None,
        ));
        plan.add_leg(InternalLeg::new(
            InternalRoute::Generic(InternalGenericRoute::new(
                Id::create("l1"),
                Id::create("l2"),
                Some(60),
                None,
                None,
            )),
            "car",
            60,
            None,
        ));
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "shop",
            Id::create("l2"),
            None,
            Some(7200),
            None,
        ));
        // walking back needs no vehicle
        plan.add_leg(InternalLeg::new(
            InternalRoute::Generic(InternalGenericRoute::new(
                Id::create("l2"),
                Id::create("l1"),
                Some(600),
                None,
                None,
            )),
            "walk",
            600,
            None,
        ));
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "home",
            Id::create("l1"),
            None,
            None,
            None,
        ));

        let person = InternalPerson::new(Id::create("p1"), plan);
        let mut garage = Garage::new();
        let agents = create_agents(vec![person], &mut garage);

        assert_eq!(1, agents.len());
        assert_eq!(1, garage.vehicles.len());
        assert!(garage
            .vehicles
            .contains_key(&Id::get_from_ext("p1_car")));
    }
}
