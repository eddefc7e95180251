use crate::simulation::agents::agent::SimulationAgent;
use crate::simulation::network::sim_network::StorageUpdate;
use crate::simulation::vehicles::InternalVehicle;

/// One traveler crossing a partition boundary.
#[derive(Debug)]
pub enum MessageEntry {
    /// A vehicle that drove onto a link owned by the receiving partition. It enters that
    /// link's queue in the same tick.
    NetworkVehicle(InternalVehicle),
    /// A teleported agent whose leg ends on a link owned by the receiving partition. Its
    /// arrival completes there in the same tick.
    TeleportedAgent(SimulationAgent),
}

/// The per-tick exchange between two partitions: travelers, storage released on split
/// links, and the sender's active agent ledger for the global termination decision.
/// The ledger is signed because agents may finish on a different partition than the
/// one that created them; only the sum over all partitions is meaningful. Every
/// partition sends exactly one sync message to every other partition per tick, empty
/// or not, which keeps the exchange free of timing races.
#[derive(Debug)]
pub struct SyncMessage {
    pub time: u32,
    pub from_process: u32,
    pub to_process: u32,
    pub entries: Vec<MessageEntry>,
    pub storage_capacities: Vec<StorageUpdate>,
    pub active_agents: i64,
}

impl SyncMessage {
    pub fn new(time: u32, from_process: u32, to_process: u32) -> Self {
        SyncMessage {
            time,
            from_process,
            to_process,
            entries: Vec::new(),
            storage_capacities: Vec::new(),
            active_agents: 0,
        }
    }

    pub fn add_veh(&mut self, vehicle: InternalVehicle) {
        self.entries.push(MessageEntry::NetworkVehicle(vehicle));
    }

    pub fn add_teleported(&mut self, agent: SimulationAgent) {
        self.entries.push(MessageEntry::TeleportedAgent(agent));
    }

    pub fn add_storage_cap(&mut self, update: StorageUpdate) {
        self.storage_capacities.push(update);
    }

    pub fn take_entries(&mut self) -> Vec<MessageEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn take_storage_capacities(&mut self) -> Vec<StorageUpdate> {
        std::mem::take(&mut self.storage_capacities)
    }
}
