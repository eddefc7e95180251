use crate::simulation::agents::{
    AgentEvent, EnvironmentalEventObserver, SimulationAgentLogic, SimulationAgentState,
};
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::{
    InternalActivity, InternalLeg, InternalPerson, InternalPlanElement, InternalRoute,
};
use crate::simulation::time_queue::{EndTime, Identifiable};

/// Cursor over the selected plan. Even cursor positions are activities, odd positions
/// legs; `curr_route_element` walks the link sequence of the current network route.
#[derive(Debug, PartialEq, Clone)]
pub struct PlanBasedSimulationLogic {
    person: InternalPerson,
    curr_plan_element: usize,
    curr_route_element: usize,
}

impl PlanBasedSimulationLogic {
    pub fn new(person: InternalPerson) -> Self {
        assert!(
            person.total_elements() > 0,
            "Agent {} has an empty plan.",
            person.id().external()
        );
        Self {
            person,
            curr_plan_element: 0,
            curr_route_element: 0,
        }
    }

    fn curr_element(&self) -> &InternalPlanElement {
        self.person
            .plan_element_at(self.curr_plan_element)
            .expect("Plan cursor points past the plan")
    }

    /// Teleported legs skip their route in one hop. Pointing at the last element keeps
    /// the arrival bookkeeping identical for generic and network routes.
    fn set_curr_route_element_to_last(&mut self) {
        let route = self.curr_leg().route.as_ref().unwrap();
        match route.as_network() {
            Some(n) => self.curr_route_element = n.route().len() - 1,
            None => self.curr_route_element = 1,
        }
    }

    /// Splices the parking interaction and the walk leg home behind the current leg, so
    /// that the agent continues with them after arrival.
    fn splice_parking_trip(&mut self, parking: InternalActivity, walk: InternalLeg) {
        let index = self.curr_plan_element + 1;
        let plan = self.person.selected_plan_mut();
        plan.elements
            .insert(index, InternalPlanElement::Leg(walk));
        plan.elements
            .insert(index, InternalPlanElement::Activity(parking));
    }

    fn extend_route(&mut self, link: Id<Link>) {
        let element = self
            .person
            .selected_plan_mut()
            .elements
            .get_mut(self.curr_plan_element)
            .unwrap();
        let InternalPlanElement::Leg(leg) = element else {
            panic!("Cannot extend a route while performing an activity.")
        };
        match leg.route.as_mut() {
            Some(InternalRoute::Network(n)) => n.push_link(link),
            _ => panic!("Cannot extend a non-network route."),
        }
    }
}

impl Identifiable<InternalPerson> for PlanBasedSimulationLogic {
    fn id(&self) -> &Id<InternalPerson> {
        self.person.id()
    }
}

impl EnvironmentalEventObserver for PlanBasedSimulationLogic {
    fn notify_event(&mut self, event: &mut AgentEvent, _now: u32) {
        match event {
            AgentEvent::TeleportationStarted => self.set_curr_route_element_to_last(),
            AgentEvent::LeftLink => self.curr_route_element += 1,
            AgentEvent::ParkedAway(elements) => {
                let (parking, walk) = elements
                    .take()
                    .expect("ParkedAway was delivered without its plan elements");
                self.splice_parking_trip(parking, walk);
            }
            AgentEvent::RouteExtended(link) => self.extend_route(link.clone()),
            _ => {}
        }
    }
}

impl SimulationAgentLogic for PlanBasedSimulationLogic {
    fn curr_act(&self) -> &InternalActivity {
        self.curr_element()
            .as_activity()
            .expect("Current plan element is not an activity")
    }

    fn curr_leg(&self) -> &InternalLeg {
        self.curr_element()
            .as_leg()
            .expect("Current plan element is not a leg")
    }

    fn next_act(&self) -> Option<&InternalActivity> {
        // from an activity the next activity is two elements ahead, from a leg one
        let add = if self.curr_plan_element % 2 == 0 { 2 } else { 1 };
        self.person
            .plan_element_at(self.curr_plan_element + add)
            .and_then(InternalPlanElement::as_activity)
    }

    fn prev_act(&self) -> &InternalActivity {
        assert!(
            self.curr_plan_element % 2 == 1,
            "prev_act is only defined while on a leg"
        );
        self.person
            .plan_element_at(self.curr_plan_element - 1)
            .and_then(InternalPlanElement::as_activity)
            .expect("The element before a leg must be an activity")
    }

    fn advance_plan(&mut self) {
        self.curr_plan_element += 1;
        self.curr_route_element = 0;
        assert!(
            self.curr_plan_element < self.person.total_elements(),
            "Cannot advance the plan of agent {} beyond its last element.",
            self.person.id().external()
        );
    }

    fn state(&self) -> SimulationAgentState {
        match self.curr_plan_element % 2 {
            0 => SimulationAgentState::Activity,
            _ => SimulationAgentState::Leg,
        }
    }

    fn is_finished(&self) -> bool {
        self.curr_plan_element == self.person.total_elements() - 1
    }

    fn is_wanting_to_arrive_on_current_link(&self) -> bool {
        self.peek_next_link_id().is_none()
    }

    fn curr_link_id(&self) -> Option<&Id<Link>> {
        if self.state() != SimulationAgentState::Leg {
            return Some(&self.curr_act().link_id);
        }

        match self.curr_leg().route.as_ref()? {
            InternalRoute::Generic(g) => match self.curr_route_element {
                0 => Some(g.start_link()),
                _ => Some(g.end_link()),
            },
            InternalRoute::Network(n) => n.route_element_at(self.curr_route_element),
        }
    }

    fn peek_next_link_id(&self) -> Option<&Id<Link>> {
        let route = self.curr_leg().route.as_ref()?;
        route
            .as_network()?
            .route_element_at(self.curr_route_element + 1)
    }

    fn set_route(&mut self, route: InternalRoute) {
        let element = self
            .person
            .selected_plan_mut()
            .elements
            .get_mut(self.curr_plan_element)
            .unwrap();
        let InternalPlanElement::Leg(leg) = element else {
            panic!("Cannot set a route while performing an activity.")
        };
        assert!(
            leg.route.is_none(),
            "Routes are immutable once a leg has one."
        );
        leg.route = Some(route);
    }
}

impl EndTime for PlanBasedSimulationLogic {
    fn end_time(&self, now: u32) -> u32 {
        match self.curr_element() {
            InternalPlanElement::Activity(a) => a.cmp_end_time(now),
            InternalPlanElement::Leg(l) => now + l.travel_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;

    use super::*;
    use crate::simulation::agents::agent::SimulationAgent;
    use crate::simulation::population::{InternalGenericRoute, InternalNetworkRoute, InternalPlan};

    fn act(act_type: &str, link: &str) -> InternalActivity {
        InternalActivity::new(0., 0., act_type, Id::create(link), None, Some(8 * 3600), None)
    }

    fn network_leg(links: &[&str]) -> InternalLeg {
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
            "car",
            600,
            None,
        )
    }

    fn two_trip_person() -> InternalPerson {
        let mut plan = InternalPlan::default();
        plan.add_act(act("home", "l1"));
        plan.add_leg(network_leg(&["l1", "l2", "l3"]));
        plan.add_act(act("work", "l3"));
        InternalPerson::new(Id::create("agent"), plan)
    }

    #[integration_test]
    fn cursor_walks_plan_and_route() {
        let mut agent = SimulationAgent::new_plan_based(two_trip_person());

        assert_eq!(SimulationAgentState::Activity, agent.state());
        assert_eq!("home", agent.curr_act().act_type.external());
        assert_eq!("l1", agent.curr_link_id().unwrap().external());

        agent.advance_plan();
        assert_eq!(SimulationAgentState::Leg, agent.state());
        assert_eq!("l1", agent.curr_link_id().unwrap().external());
        assert_eq!("l2", agent.peek_next_link_id().unwrap().external());
        assert!(!agent.is_wanting_to_arrive_on_current_link());

        agent.notify_event(&mut AgentEvent::LeftLink, 0);
        agent.notify_event(&mut AgentEvent::LeftLink, 0);
        assert_eq!("l3", agent.curr_link_id().unwrap().external());
        assert!(agent.is_wanting_to_arrive_on_current_link());

        agent.advance_plan();
        assert_eq!("work", agent.curr_act().act_type.external());
        assert!(agent.is_finished());
    }

    #[integration_test]
    fn teleportation_jumps_to_route_end() {
        let mut agent = SimulationAgent::new_plan_based(two_trip_person());
        agent.advance_plan();

        agent.notify_event(&mut AgentEvent::TeleportationStarted, 0);
        assert_eq!("l3", agent.curr_link_id().unwrap().external());
        assert!(agent.is_wanting_to_arrive_on_current_link());
    }

    #[integration_test]
    fn parked_away_splices_interaction_and_walk() {
        let mut agent = SimulationAgent::new_plan_based(two_trip_person());
        agent.advance_plan();

        let parking = InternalActivity::new(
            0.,
            0.,
            "car interaction",
            Id::create("l2"),
            None,
            None,
            Some(0),
        );
        let walk = InternalLeg::new(
            InternalRoute::Generic(InternalGenericRoute::new(
                Id::create("l2"),
                Id::create("l3"),
                Some(60),
                Some(72.0),
                None,
            )),
            "walk",
            60,
            None,
        );
        agent.notify_event(&mut AgentEvent::ParkedAway(Some((parking, walk))), 0);

        agent.advance_plan();
        assert_eq!("car interaction", agent.curr_act().act_type.external());
        agent.advance_plan();
        assert_eq!("walk", agent.curr_leg().mode.external());
        agent.advance_plan();
        assert_eq!("work", agent.curr_act().act_type.external());
        assert!(agent.is_finished());
    }

    #[integration_test]
    fn route_extension_appends_link() {
        let mut agent = SimulationAgent::new_plan_based(two_trip_person());
        agent.advance_plan();
        agent.notify_event(&mut AgentEvent::LeftLink, 0);
        agent.notify_event(&mut AgentEvent::LeftLink, 0);
        assert!(agent.is_wanting_to_arrive_on_current_link());

        agent.notify_event(&mut AgentEvent::RouteExtended(Id::create("l4")), 0);
        assert!(!agent.is_wanting_to_arrive_on_current_link());
        assert_eq!("l4", agent.peek_next_link_id().unwrap().external());
    }
}
