use std::collections::HashMap;

use crate::simulation::agents::mode_behavior::ModeCapability;
use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network};
use crate::simulation::vehicles::InternalVehicle;
use crate::simulation::InternalAttributes;

pub mod agent_source;
pub mod validation;

/// A stay at a location. The end condition is resolved in this order: explicit end time,
/// otherwise begin time plus maximum duration, otherwise unbounded (only legal for the
/// final activity of a plan, enforced by pre-run validation).
#[derive(Debug, PartialEq, Clone)]
pub struct InternalActivity {
    pub act_type: Id<String>,
    pub link_id: Id<Link>,
    pub x: f64,
    pub y: f64,
    pub start_time: Option<u32>,
    pub end_time: Option<u32>,
    pub max_dur: Option<u32>,
    pub attributes: InternalAttributes,
}

impl InternalActivity {
    pub fn new(
        x: f64,
        y: f64,
        act_type: &str,
        link_id: Id<Link>,
        start_time: Option<u32>,
        end_time: Option<u32>,
        max_dur: Option<u32>,
    ) -> Self {
        InternalActivity {
            x,
            y,
            act_type: Id::create(act_type),
            link_id,
            start_time,
            end_time,
            max_dur,
            attributes: InternalAttributes::default(),
        }
    }

    pub(crate) fn cmp_end_time(&self, begin: u32) -> u32 {
        if let Some(end_time) = self.end_time {
            end_time
        } else if let Some(max_dur) = self.max_dur {
            begin + max_dur
        } else {
            u32::MAX
        }
    }

    pub(crate) fn has_end_condition(&self) -> bool {
        self.end_time.is_some() || self.max_dur.is_some()
    }
}

/// One mode-specific movement between two activities. The mode capability is resolved
/// once when the leg is created, so the engine never inspects mode strings at runtime.
#[derive(Debug, PartialEq, Clone)]
pub struct InternalLeg {
    pub mode: Id<String>,
    pub capability: ModeCapability,
    pub dep_time: Option<u32>,
    pub trav_time: Option<u32>,
    pub route: Option<InternalRoute>,
    pub attributes: InternalAttributes,
}

impl InternalLeg {
    pub fn new(route: InternalRoute, mode: &str, trav_time: u32, dep_time: Option<u32>) -> Self {
        let mode = Id::create(mode);
        Self {
            capability: ModeCapability::from_mode(&mode),
            mode,
            trav_time: Some(trav_time),
            dep_time,
            route: Some(route),
            attributes: InternalAttributes::default(),
        }
    }

    /// A leg without a route. The capability computes one when the leg departs.
    pub fn new_unrouted(mode: &str, dep_time: Option<u32>) -> Self {
        let mode = Id::create(mode);
        Self {
            capability: ModeCapability::from_mode(&mode),
            mode,
            trav_time: None,
            dep_time,
            route: None,
            attributes: InternalAttributes::default(),
        }
    }

    pub fn travel_time(&self) -> u32 {
        self.trav_time
            .or_else(|| self.route.as_ref().and_then(|r| r.as_generic().trav_time))
            .unwrap_or(0)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum InternalRoute {
    Generic(InternalGenericRoute),
    Network(InternalNetworkRoute),
}

#[derive(Debug, PartialEq, Clone)]
pub struct InternalGenericRoute {
    start_link: Id<Link>,
    end_link: Id<Link>,
    pub trav_time: Option<u32>,
    pub distance: Option<f64>,
    vehicle: Option<Id<InternalVehicle>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct InternalNetworkRoute {
    generic_delegate: InternalGenericRoute,
    route: Vec<Id<Link>>,
}

impl InternalRoute {
    pub fn as_generic(&self) -> &InternalGenericRoute {
        match self {
            InternalRoute::Generic(g) => g,
            InternalRoute::Network(n) => &n.generic_delegate,
        }
    }

    pub fn as_network(&self) -> Option<&InternalNetworkRoute> {
        match self {
            InternalRoute::Network(n) => Some(n),
            _ => None,
        }
    }

    pub fn start_link(&self) -> &Id<Link> {
        self.as_generic().start_link()
    }

    pub fn end_link(&self) -> &Id<Link> {
        self.as_generic().end_link()
    }
}

impl InternalGenericRoute {
    pub fn new(
        start_link: Id<Link>,
        end_link: Id<Link>,
        trav_time: Option<u32>,
        distance: Option<f64>,
        vehicle: Option<Id<InternalVehicle>>,
    ) -> Self {
        Self {
            start_link,
            end_link,
            trav_time,
            distance,
            vehicle,
        }
    }

    pub fn start_link(&self) -> &Id<Link> {
        &self.start_link
    }

    pub fn end_link(&self) -> &Id<Link> {
        &self.end_link
    }

    pub fn vehicle(&self) -> &Option<Id<InternalVehicle>> {
        &self.vehicle
    }
}

impl InternalNetworkRoute {
    pub fn new(generic_delegate: InternalGenericRoute, route: Vec<Id<Link>>) -> Self {
        Self {
            generic_delegate,
            route,
        }
    }

    pub fn route(&self) -> &Vec<Id<Link>> {
        &self.route
    }

    pub fn route_element_at(&self, index: usize) -> Option<&Id<Link>> {
        self.route.get(index)
    }

    /// Parking search extends its route while it hunts for space. All other modes treat
    /// routes as immutable once the leg has started.
    pub(crate) fn push_link(&mut self, link: Id<Link>) {
        self.route.push(link);
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum InternalPlanElement {
    Activity(InternalActivity),
    Leg(InternalLeg),
}

impl InternalPlanElement {
    pub fn as_activity(&self) -> Option<&InternalActivity> {
        match self {
            InternalPlanElement::Activity(act) => Some(act),
            _ => None,
        }
    }

    pub fn as_leg(&self) -> Option<&InternalLeg> {
        match self {
            InternalPlanElement::Leg(leg) => Some(leg),
            _ => None,
        }
    }
}

/// The ordered alternation of activities and legs. Immutable during a run, with the one
/// documented exception of the parking-search splice.
#[derive(Debug, PartialEq, Clone)]
pub struct InternalPlan {
    pub selected: bool,
    pub elements: Vec<InternalPlanElement>,
}

impl Default for InternalPlan {
    fn default() -> Self {
        Self {
            selected: true,
            elements: Vec::new(),
        }
    }
}

impl InternalPlan {
    pub fn add_act(&mut self, activity: InternalActivity) {
        self.elements.push(InternalPlanElement::Activity(activity));
    }

    pub fn add_leg(&mut self, leg: InternalLeg) {
        self.elements.push(InternalPlanElement::Leg(leg));
    }

    pub fn acts(&self) -> Vec<&InternalActivity> {
        self.elements
            .iter()
            .filter_map(InternalPlanElement::as_activity)
            .collect()
    }

    pub fn legs(&self) -> Vec<&InternalLeg> {
        self.elements
            .iter()
            .filter_map(InternalPlanElement::as_leg)
            .collect()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct InternalPerson {
    id: Id<InternalPerson>,
    plans: Vec<InternalPlan>,
    attributes: InternalAttributes,
}

impl InternalPerson {
    pub fn new(id: Id<InternalPerson>, plan: InternalPlan) -> Self {
        InternalPerson {
            id,
            plans: vec![plan],
            attributes: InternalAttributes::default(),
        }
    }

    pub fn id(&self) -> &Id<InternalPerson> {
        &self.id
    }

    pub fn selected_plan(&self) -> Option<&InternalPlan> {
        self.plans.iter().find(|plan| plan.selected)
    }

    pub(crate) fn selected_plan_mut(&mut self) -> &mut InternalPlan {
        self.plans
            .iter_mut()
            .find(|plan| plan.selected)
            .expect("No selected plan found")
    }

    pub fn plan_element_at(&self, index: usize) -> Option<&InternalPlanElement> {
        self.selected_plan()
            .expect("No selected plan found")
            .elements
            .get(index)
    }

    pub fn total_elements(&self) -> usize {
        self.selected_plan()
            .expect("No selected plan found")
            .elements
            .len()
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Population {
    pub persons: HashMap<Id<InternalPerson>, InternalPerson>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_person(&mut self, person: InternalPerson) {
        let previous = self.persons.insert(person.id().clone(), person);
        assert!(
            previous.is_none(),
            "A person with this id was already added."
        );
    }

    /// Removes and returns the persons whose plan begins on a link owned by `part`,
    /// sorted by person id so that all partitions build their agents in the same order.
    pub fn take_part(&mut self, network: &Network, part: u32) -> Vec<InternalPerson> {
        let ids: Vec<_> = self
            .persons
            .iter()
            .filter(|(_, p)| {
                let act = p
                    .plan_element_at(0)
                    .and_then(InternalPlanElement::as_activity)
                    .expect("Plans must start with an activity");
                network.get_link(&act.link_id).partition == part
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut taken: Vec<_> = ids
            .into_iter()
            .map(|id| self.persons.remove(&id).unwrap())
            .collect();
        taken.sort_by(|a, b| a.id().cmp(b.id()));
        taken
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;

    use super::*;

    #[integration_test]
    fn activity_end_condition_precedence() {
        let mut act = InternalActivity::new(0., 0., "home", Id::create("l1"), None, None, None);
        assert_eq!(u32::MAX, act.cmp_end_time(100));
        assert!(!act.has_end_condition());

        act.max_dur = Some(600);
        assert_eq!(700, act.cmp_end_time(100));

        // an explicit end time wins over the duration
        act.end_time = Some(400);
        assert_eq!(400, act.cmp_end_time(100));
    }

    #[integration_test]
    fn leg_travel_time_falls_back_to_route() {
        let route = InternalRoute::Generic(InternalGenericRoute::new(
            Id::create("l1"),
            Id::create("l2"),
            Some(300),
            None,
            None,
        ));
        let mut leg = InternalLeg::new(route, "walk", 120, None);
        assert_eq!(120, leg.travel_time());

        leg.trav_time = None;
        assert_eq!(300, leg.travel_time());
    }

    #[integration_test]
    fn population_rejects_duplicate_person() {
        let mut population = Population::new();
        let plan = InternalPlan::default();
        population.add_person(InternalPerson::new(Id::create("p"), plan.clone()));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            population.add_person(InternalPerson::new(Id::create("p"), plan));
        }));
        assert!(result.is_err());
    }
}
