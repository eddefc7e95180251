use tracing::info;

use crate::simulation::agents::SimulationAgentLogic;
use crate::simulation::config;
use crate::simulation::controller::ComputationalEnvironment;
use crate::simulation::engines::activity_engine::ActivityEngine;
use crate::simulation::engines::leg_engine::LegEngine;
use crate::simulation::events::StuckAgentEventBuilder;
use crate::simulation::messaging::sim_communication::message_broker::NetMessageBroker;
use crate::simulation::messaging::sim_communication::SimCommunicator;
use crate::simulation::scenario::ScenarioPartition;
use crate::simulation::time_queue::Identifiable;

/// The tick loop of one partition. Every tick runs the same fixed order: wake agents
/// whose activity ends, drive legs (teleportation, node moves, link moves, partition
/// exchange), then start the activities of agents that arrived. The clock advances in
/// `time_step` increments until either every partition reports zero active agents or
/// the configured end time is reached; whoever is still traveling then is flushed with
/// a stuck event.
pub struct Simulation<C: SimCommunicator> {
    activity_engine: ActivityEngine,
    leg_engine: LegEngine<C>,
    config: config::Simulation,
    comp_env: ComputationalEnvironment,
    /// Signed ledger: +1 for every agent created here, -1 when an agent finishes or
    /// gets stuck here. Agents may finish on another partition, so a single
    /// partition's value can go negative; the sum over all partitions is the number
    /// of agents still traveling.
    active_agents: i64,
    finished_agents: usize,
    stuck_agents: usize,
    global_active: i64,
    population_size: usize,
}

impl<C: SimCommunicator> Simulation<C> {
    pub fn new(
        scenario: ScenarioPartition,
        net_message_broker: NetMessageBroker<C>,
        comp_env: ComputationalEnvironment,
    ) -> Self {
        let config = scenario.config.simulation.clone();
        let population_size = scenario.agents.len();

        // agents whose plan is a single activity are done before the first tick
        let mut finished_agents = 0;
        let mut starting = Vec::with_capacity(scenario.agents.len());
        for agent in scenario.agents {
            if agent.is_finished() {
                finished_agents += 1;
            } else {
                starting.push(agent);
            }
        }
        let active_agents = starting.len() as i64;

        let activity_engine = ActivityEngine::new(starting, config.start_time, comp_env.clone());
        let leg_engine = LegEngine::new(
            scenario.network_partition,
            scenario.network,
            scenario.garage,
            net_message_broker,
            &config,
            comp_env.clone(),
        );

        Simulation {
            activity_engine,
            leg_engine,
            config,
            comp_env,
            active_agents,
            finished_agents,
            stuck_agents: 0,
            global_active: active_agents,
            population_size,
        }
    }

    pub fn run(&mut self) {
        let mut now = self.config.start_time;
        info!(
            "Starting partition #{}. Neighbors: {:?}, start {}, end {}",
            self.leg_engine.rank(),
            self.leg_engine.network().neighbors(),
            self.config.start_time,
            self.config.end_time,
        );

        while now <= self.config.end_time {
            if self.leg_engine.rank() == 0 && now % 3600 == 0 {
                info!("Simulated time {}:{:02}", now / 3600, (now % 3600) / 60);
            }

            self.do_sim_step(now);

            // every partition computes the same global count from the same exchange, so
            // they all leave the loop at the same tick
            if self.global_active == 0 {
                break;
            }
            now += self.config.time_step;
        }

        self.flush_stuck(self.config.end_time.min(now));
        self.comp_env.events_publisher_borrow_mut().finish();

        info!(
            "Finished partition #{}: {} finished, {} stuck.",
            self.leg_engine.rank(),
            self.finished_agents,
            self.stuck_agents
        );
    }

    fn do_sim_step(&mut self, now: u32) {
        let departing = self.activity_engine.do_step(now);
        let result = self.leg_engine.do_step(now, departing, self.active_agents);

        self.active_agents -= result.stuck as i64;
        self.stuck_agents += result.stuck;
        self.global_active = result.global_active;

        for agent in result.arrived {
            if self.activity_engine.receive_agent(now, agent).is_some() {
                self.active_agents -= 1;
                self.finished_agents += 1;
            }
        }
    }

    /// Force-removes every agent still active, in ascending agent id order, emitting a
    /// stuck event per agent. Models agents that can never complete, e.g. because the
    /// network is disconnected or hopelessly congested.
    fn flush_stuck(&mut self, now: u32) {
        let mut remaining = self.activity_engine.drain();
        remaining.extend(self.leg_engine.drain_remaining());
        if remaining.is_empty() {
            return;
        }

        remaining.sort_by(|a, b| a.id().cmp(b.id()));
        for agent in remaining {
            let link = agent
                .curr_link_id()
                .expect("A stuck agent must have a position")
                .clone();
            self.comp_env.events_publisher_borrow_mut().publish_event(
                &StuckAgentEventBuilder::default()
                    .time(now)
                    .person(agent.id().clone())
                    .link(link)
                    .build()
                    .unwrap(),
            );
            self.active_agents -= 1;
            self.stuck_agents += 1;
        }
    }

    /// Conservation counters: active + finished + stuck equals the partition's
    /// population at all times (summed over partitions for multi-partition runs).
    pub fn agent_counts(&self) -> (i64, usize, usize, usize) {
        (
            self.active_agents,
            self.finished_agents,
            self.stuck_agents,
            self.population_size,
        )
    }
}
