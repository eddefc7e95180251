use tracing::instrument;

use crate::simulation::agents::agent::SimulationAgent;
use crate::simulation::agents::{AgentEvent, EnvironmentalEventObserver, SimulationAgentLogic};
use crate::simulation::controller::ComputationalEnvironment;
use crate::simulation::events::{ActivityEndEventBuilder, ActivityStartEventBuilder};
use crate::simulation::time_queue::{Identifiable, TimeQueue};

/// Holds every agent currently performing an activity, keyed by the activity's end
/// time. Waking an agent ends its activity and hands it over as departing; receiving an
/// agent starts its next activity. Initial activities get no start event, mirroring
/// that the run begins in the middle of them.
pub struct ActivityEngine {
    q: TimeQueue<SimulationAgent>,
    comp_env: ComputationalEnvironment,
}

impl ActivityEngine {
    pub fn new(agents: Vec<SimulationAgent>, now: u32, comp_env: ComputationalEnvironment) -> Self {
        let mut q = TimeQueue::new();
        for agent in agents {
            q.add(agent, now);
        }
        ActivityEngine { q, comp_env }
    }

    /// Step 1 of a tick: agents whose activity end condition is met leave, with their
    /// plan cursor advanced onto the following leg.
    #[instrument(level = "trace", skip(self))]
    pub fn do_step(&mut self, now: u32) -> Vec<SimulationAgent> {
        let mut departing = self.q.pop(now);

        for agent in departing.iter_mut() {
            let act = agent.curr_act();
            self.comp_env.events_publisher_borrow_mut().publish_event(
                &ActivityEndEventBuilder::default()
                    .time(now)
                    .person(agent.id().clone())
                    .link(act.link_id.clone())
                    .act_type(act.act_type.clone())
                    .build()
                    .unwrap(),
            );
            agent.notify_event(&mut AgentEvent::ActivityFinished, now);
            agent.advance_plan();
        }

        departing
    }

    /// Takes an agent that just arrived. Returns it when the plan is exhausted, so the
    /// caller can account it as finished.
    pub fn receive_agent(&mut self, now: u32, agent: SimulationAgent) -> Option<SimulationAgent> {
        let act = agent.curr_act();
        self.comp_env.events_publisher_borrow_mut().publish_event(
            &ActivityStartEventBuilder::default()
                .time(now)
                .person(agent.id().clone())
                .link(act.link_id.clone())
                .act_type(act.act_type.clone())
                .build()
                .unwrap(),
        );

        if agent.is_finished() {
            return Some(agent);
        }
        self.q.add(agent, now);
        None
    }

    /// Remaining agents at the end of a run. They never completed their plan.
    pub fn drain(&mut self) -> Vec<SimulationAgent> {
        self.q.drain()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.q.len()
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;

    use super::*;
    use crate::simulation::events::writer::EventsCollector;
    use crate::test_utils;

    #[integration_test]
    fn wakes_agents_at_activity_end() {
        let comp_env = ComputationalEnvironment::default();
        let agent = test_utils::create_agent_with_plan("agent-1", &["l1", "l2", "l3"], 10);
        let mut engine = ActivityEngine::new(vec![agent], 0, comp_env);

        assert!(engine.do_step(9).is_empty());
        let departing = engine.do_step(10);
        assert_eq!(1, departing.len());
        // the cursor moved onto the leg
        assert_eq!(
            crate::simulation::agents::SimulationAgentState::Leg,
            departing[0].state()
        );
    }

    #[integration_test]
    fn publishes_end_and_start_events() {
        let mut comp_env = ComputationalEnvironment::default();
        let lines = EventsCollector::install(&mut comp_env.events_publisher_borrow_mut());

        let agent = test_utils::create_agent_with_plan("agent-1", &["l1", "l2", "l3"], 10);
        let mut engine = ActivityEngine::new(vec![agent], 0, comp_env);

        let mut departing = engine.do_step(10);
        let mut agent = departing.pop().unwrap();
        // pretend the leg is done and the agent arrived at work
        agent.advance_plan();
        let finished = engine.receive_agent(30, agent);
        // work is the last activity of the plan
        assert!(finished.is_some());

        let lines = lines.borrow();
        assert_eq!(2, lines.len());
        assert!(lines[0].contains("type=\"actend\""));
        assert!(lines[0].contains("time=\"10\""));
        assert!(lines[1].contains("type=\"actstart\""));
        assert!(lines[1].contains("time=\"30\""));
    }
}
