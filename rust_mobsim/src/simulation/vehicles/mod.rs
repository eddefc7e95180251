pub mod parking;

use nohash_hasher::IntMap;

use crate::simulation::agents::agent::SimulationAgent;
use crate::simulation::agents::SimulationAgentLogic;
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::InternalPerson;
use crate::simulation::time_queue::{EndTime, Identifiable};

#[derive(Debug, PartialEq, Clone)]
pub struct InternalVehicleType {
    pub id: Id<InternalVehicleType>,
    pub max_v: f32,
    pub pce: f32,
    pub net_mode: Id<String>,
}

impl InternalVehicleType {
    pub fn new(id: Id<InternalVehicleType>, net_mode: Id<String>) -> Self {
        InternalVehicleType {
            id,
            max_v: f32::INFINITY,
            pce: 1.0,
            net_mode,
        }
    }
}

/// A vehicle and, while it is en route, its driver. Vehicles reference their position
/// only through the driver's route cursor, never through link references, so they can be
/// moved between partitions as plain values.
#[derive(Debug)]
pub struct InternalVehicle {
    pub id: Id<InternalVehicle>,
    pub max_v: f32,
    pub pce: f32,
    pub vehicle_type: Id<InternalVehicleType>,
    pub driver: Option<SimulationAgent>,
}

impl InternalVehicle {
    pub fn new(
        id: Id<InternalVehicle>,
        vehicle_type: Id<InternalVehicleType>,
        max_v: f32,
        pce: f32,
        driver: Option<SimulationAgent>,
    ) -> Self {
        InternalVehicle {
            id,
            max_v,
            pce,
            vehicle_type,
            driver,
        }
    }

    pub fn id(&self) -> &Id<InternalVehicle> {
        &self.id
    }

    pub fn driver(&self) -> &SimulationAgent {
        self.driver.as_ref().expect("Vehicle has no driver")
    }

    pub fn driver_mut(&mut self) -> &mut SimulationAgent {
        self.driver.as_mut().expect("Vehicle has no driver")
    }

    pub fn curr_link_id(&self) -> Option<&Id<Link>> {
        self.driver().curr_link_id()
    }

    pub fn peek_next_route_element(&self) -> Option<&Id<Link>> {
        self.driver().peek_next_link_id()
    }
}

impl EndTime for InternalVehicle {
    fn end_time(&self, now: u32) -> u32 {
        self.driver().end_time(now)
    }
}

impl Identifiable<InternalPerson> for InternalVehicle {
    fn id(&self) -> &Id<InternalPerson> {
        Identifiable::id(self.driver())
    }
}

/// Parked vehicles plus the vehicle types of the scenario. Agents pick their vehicle up
/// at departure and hand it back on arrival; the garage is partition local, vehicles of
/// agents that cross a partition boundary travel inside the sync messages.
#[derive(Debug, Default)]
pub struct Garage {
    pub vehicles: IntMap<Id<InternalVehicle>, InternalVehicle>,
    pub vehicle_types: IntMap<Id<InternalVehicleType>, InternalVehicleType>,
}

impl Garage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_veh_type(&mut self, veh_type: InternalVehicleType) {
        assert!(
            !self.vehicle_types.contains_key(&veh_type.id),
            "Vehicle type {} already exists.",
            veh_type.id.external()
        );
        self.vehicle_types.insert(veh_type.id.clone(), veh_type);
    }

    /// Returns the type for `mode`, creating a default one on first use.
    pub fn veh_type_for_mode(&mut self, mode: &Id<String>) -> Id<InternalVehicleType> {
        let type_id: Id<InternalVehicleType> = Id::create(mode.external());
        if !self.vehicle_types.contains_key(&type_id) {
            self.add_veh_type(InternalVehicleType::new(type_id.clone(), mode.clone()));
        }
        type_id
    }

    /// Creates and parks a vehicle of `type_id` for one person. The external id follows
    /// the `person_mode` convention.
    pub fn add_veh_by_type(
        &mut self,
        person_id: &Id<InternalPerson>,
        type_id: &Id<InternalVehicleType>,
    ) -> Id<InternalVehicle> {
        let veh_type = self
            .vehicle_types
            .get(type_id)
            .unwrap_or_else(|| panic!("Unknown vehicle type {}", type_id.external()));
        let external = format!("{}_{}", person_id.external(), veh_type.net_mode.external());
        let veh_id: Id<InternalVehicle> = Id::create(&external);

        let vehicle = InternalVehicle::new(
            veh_id.clone(),
            type_id.clone(),
            veh_type.max_v,
            veh_type.pce,
            None,
        );
        self.vehicles.insert(veh_id.clone(), vehicle);
        veh_id
    }

    /// Hands the vehicle to a departing agent. Panics when the vehicle is not parked
    /// here, which would mean the plan uses one vehicle in two places at once.
    pub fn unpark_veh(&mut self, agent: SimulationAgent, id: &Id<InternalVehicle>) -> InternalVehicle {
        let mut vehicle = self
            .vehicles
            .remove(id)
            .unwrap_or_else(|| panic!("Vehicle {} is not parked in this garage.", id.external()));
        vehicle.driver = Some(agent);
        vehicle
    }

    /// Takes the driver out and parks the vehicle again.
    pub fn park_veh(&mut self, mut vehicle: InternalVehicle) -> SimulationAgent {
        let agent = vehicle.driver.take().expect("Vehicle has no driver.");
        self.vehicles.insert(vehicle.id.clone(), vehicle);
        agent
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;

    use super::*;
    use crate::simulation::population::{InternalPerson, InternalPlan};
    use crate::simulation::population::InternalActivity;

    fn dummy_agent(id: &str) -> SimulationAgent {
        let mut plan = InternalPlan::default();
        plan.add_act(InternalActivity::new(
            0.,
            0.,
            "home",
            Id::create("link"),
            None,
            Some(3600),
            None,
        ));
        SimulationAgent::new_plan_based(InternalPerson::new(Id::create(id), plan))
    }

    #[integration_test]
    fn default_type_per_mode() {
        let mut garage = Garage::new();
        let mode: Id<String> = Id::create("car");

        let type_id = garage.veh_type_for_mode(&mode);
        let again = garage.veh_type_for_mode(&mode);

        assert_eq!(type_id, again);
        assert_eq!(1, garage.vehicle_types.len());
    }

    #[integration_test]
    fn vehicle_naming_convention() {
        let mut garage = Garage::new();
        let mode: Id<String> = Id::create("car");
        let type_id = garage.veh_type_for_mode(&mode);

        let veh_id = garage.add_veh_by_type(&Id::create("agent-1"), &type_id);
        assert_eq!("agent-1_car", veh_id.external());
    }

    #[integration_test]
    fn unpark_and_park_round_trip() {
        let mut garage = Garage::new();
        let mode: Id<String> = Id::create("car");
        let type_id = garage.veh_type_for_mode(&mode);
        let veh_id = garage.add_veh_by_type(&Id::create("agent-1"), &type_id);

        let vehicle = garage.unpark_veh(dummy_agent("agent-1"), &veh_id);
        assert!(vehicle.driver.is_some());
        assert!(garage.vehicles.is_empty());

        garage.park_veh(vehicle);
        assert_eq!(1, garage.vehicles.len());
        assert!(garage.vehicles.get(&veh_id).unwrap().driver.is_none());
    }

    #[integration_test]
    #[should_panic]
    fn unpark_unknown_vehicle_panics() {
        let mut garage = Garage::new();
        let veh_id: Id<InternalVehicle> = Id::create("ghost");
        garage.unpark_veh(dummy_agent("agent-1"), &veh_id);
    }
}
