use derive_builder::Builder;
use nohash_hasher::IntMap;
use std::collections::HashMap;
use std::thread;
use std::thread::JoinHandle;
use tracing::info;

use crate::simulation::controller::{execute_partition, PartitionArguments};
use crate::simulation::events::OnEventFnBuilder;
use crate::simulation::messaging::sim_communication::local_communicator::ChannelSimCommunicator;
use crate::simulation::messaging::sim_communication::SimCommunicator;
use crate::simulation::scenario::GlobalScenario;

/// Runs all partitions of a scenario as threads of this process, connected through a
/// channel mesh. Event subscribers are passed as builder closures per partition because
/// the managers only exist on their threads.
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct LocalController {
    global_scenario: GlobalScenario,
    #[builder(default)]
    events_subscriber_per_partition: HashMap<u32, Vec<Box<OnEventFnBuilder>>>,
}

impl LocalController {
    /// Spawns one named thread per partition and returns their handles. Use
    /// [`crate::simulation::controller::try_join`] to wait for the run.
    pub fn run(mut self) -> IntMap<u32, JoinHandle<()>> {
        let num_parts = self.global_scenario.config.partitioning.num_parts;
        info!("Starting simulation with {num_parts} partition(s).");

        let comms = ChannelSimCommunicator::create_n_2_n(num_parts);
        let mut partitions: Vec<Option<_>> = self
            .global_scenario
            .into_partitions()
            .into_iter()
            .map(Some)
            .collect();

        comms
            .into_iter()
            .map(|comm| {
                let rank = comm.rank();
                let scenario_partition = partitions[rank as usize]
                    .take()
                    .expect("Partition was already taken");
                let events_subscribers = self
                    .events_subscriber_per_partition
                    .remove(&rank)
                    .unwrap_or_default();

                let arguments = PartitionArguments {
                    communicator: comm,
                    scenario_partition,
                    events_subscribers,
                };

                (
                    rank,
                    thread::Builder::new()
                        .name(format!("mobsim-{rank}"))
                        .spawn(move || execute_partition(arguments))
                        .unwrap(),
                )
            })
            .collect()
    }
}
