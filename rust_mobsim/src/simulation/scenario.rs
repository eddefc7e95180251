use std::sync::Arc;
use tracing::info;

use crate::simulation::agents::agent::SimulationAgent;
use crate::simulation::config::Config;
use crate::simulation::errors::SimulationError;
use crate::simulation::network::sim_network::SimNetworkPartition;
use crate::simulation::network::Network;
use crate::simulation::population::{agent_source, validation, Population};
use crate::simulation::vehicles::Garage;

/// The validated scenario before it is split into partitions. Building it is the fail
/// point for configuration and plan errors; once a scenario exists, the run starts.
pub struct GlobalScenario {
    pub network: Arc<Network>,
    pub population: Population,
    pub config: Arc<Config>,
}

impl GlobalScenario {
    pub fn build(
        config: Arc<Config>,
        mut network: Network,
        population: Population,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        network.partition(config.partitioning.num_parts);
        validation::validate(&population, &network)?;

        info!(
            "Scenario ready: {} nodes, {} links, {} persons, {} partition(s).",
            network.nodes().len(),
            network.links().len(),
            population.persons.len(),
            config.partitioning.num_parts
        );

        Ok(GlobalScenario {
            network: Arc::new(network),
            population,
            config,
        })
    }

    /// Splits the scenario into one partition per rank. Agents follow the link their
    /// plan starts on; each partition gets its own garage.
    pub fn into_partitions(mut self) -> Vec<ScenarioPartition> {
        let mut partitions = Vec::new();
        for rank in 0..self.config.partitioning.num_parts {
            let network_partition =
                SimNetworkPartition::from_network(&self.network, rank, &self.config.simulation);

            let persons = self.population.take_part(&self.network, rank);
            let mut garage = Garage::new();
            let agents = agent_source::create_agents(persons, &mut garage);

            info!(
                "Partition #{rank}: {} nodes, {} links, {} agents.",
                network_partition.nodes.len(),
                network_partition.links.len(),
                agents.len()
            );

            partitions.push(ScenarioPartition {
                network: self.network.clone(),
                garage,
                agents,
                network_partition,
                config: self.config.clone(),
            });
        }

        assert!(
            self.population.persons.is_empty(),
            "All persons must be assigned to a partition."
        );
        partitions
    }
}

/// Everything one partition thread owns for a run.
pub struct ScenarioPartition {
    pub network: Arc<Network>,
    pub garage: Garage,
    pub agents: Vec<SimulationAgent>,
    pub network_partition: SimNetworkPartition,
    pub config: Arc<Config>,
}
