pub mod agent;
pub mod agent_logic;
pub mod mode_behavior;

use std::fmt::Debug;

use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::{InternalActivity, InternalLeg, InternalPerson};
use crate::simulation::time_queue::{EndTime, Identifiable};

/// The behavior of one traveler, driven by notifications from the engines. The plan-based
/// implementation is a cursor over the selected plan; the trait seam exists so that
/// collaborators can plug agents that compute their plan on the fly.
pub trait SimulationAgentLogic:
    EndTime + Identifiable<InternalPerson> + EnvironmentalEventObserver + Send
{
    fn curr_act(&self) -> &InternalActivity;
    fn curr_leg(&self) -> &InternalLeg;
    fn next_act(&self) -> Option<&InternalActivity>;
    /// The activity the current leg departed from. Only valid while on a leg.
    fn prev_act(&self) -> &InternalActivity;
    fn advance_plan(&mut self);
    fn state(&self) -> SimulationAgentState;
    /// True once the plan cursor sits on the last element.
    fn is_finished(&self) -> bool;

    fn is_wanting_to_arrive_on_current_link(&self) -> bool;
    fn curr_link_id(&self) -> Option<&Id<Link>>;
    fn peek_next_link_id(&self) -> Option<&Id<Link>>;

    /// Replaces the current leg's missing route. Called once at departure.
    fn set_route(&mut self, route: crate::simulation::population::InternalRoute);
}

pub trait EnvironmentalEventObserver {
    fn notify_event(&mut self, event: &mut AgentEvent, now: u32);
}

/// Notifications the engines push into an agent. Variants carrying data hold it in an
/// Option so the receiving logic can take ownership.
#[non_exhaustive]
pub enum AgentEvent {
    ActivityFinished,
    TeleportationStarted,
    LeftLink,
    /// Parking search parked away from the destination: an interaction activity on the
    /// parking link plus a walk leg home get spliced into the plan behind the current leg.
    ParkedAway(Option<(InternalActivity, InternalLeg)>),
    /// Parking search found the destination full and continues on one more link.
    RouteExtended(Id<Link>),
}

impl Debug for dyn SimulationAgentLogic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimulationAgentLogic for agent {}", self.id().external())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SimulationAgentState {
    Leg,
    Activity,
}
