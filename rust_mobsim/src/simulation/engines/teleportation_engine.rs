use tracing::instrument;

use crate::simulation::agents::agent::SimulationAgent;
use crate::simulation::agents::{AgentEvent, EnvironmentalEventObserver};
use crate::simulation::time_queue::TimeQueue;

/// Carries agents on non-network legs. A teleported agent disappears at its departure
/// link and pops up at the leg's end link once the leg's travel time has passed; the
/// network is not touched in between.
#[derive(Default)]
pub struct TeleportationEngine {
    q: TimeQueue<SimulationAgent>,
}

impl TeleportationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive_agent(&mut self, now: u32, mut agent: SimulationAgent) {
        // jumps the route cursor to the end link, so arrival bookkeeping sees the
        // destination as the agent's position
        agent.notify_event(&mut AgentEvent::TeleportationStarted, now);
        self.q.add(agent, now);
    }

    /// Agents whose travel time has elapsed. Their arrival completes this tick.
    #[instrument(level = "trace", skip(self))]
    pub fn do_step(&mut self, now: u32) -> Vec<SimulationAgent> {
        self.q.pop(now)
    }

    pub fn drain(&mut self) -> Vec<SimulationAgent> {
        self.q.drain()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.q.len()
    }
}
