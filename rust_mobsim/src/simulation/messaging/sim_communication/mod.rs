pub mod local_communicator;
pub mod message_broker;

use crate::simulation::messaging::messages::SyncMessage;

/// The seam between a partition and its peers. One implementation runs partitions on
/// threads connected by channels; a multi-process backend would implement the same
/// trait. The exchange is tick-synchronous: `send_receive` delivers exactly one message
/// to every other rank and blocks until one message from every other rank has arrived,
/// so a tick never observes another partition's partial state.
pub trait SimCommunicator: Send + 'static {
    fn rank(&self) -> u32;

    fn size(&self) -> u32;

    /// Sends `out` (one message per other rank) and returns the received messages
    /// sorted by sender rank.
    fn send_receive(&self, out: Vec<SyncMessage>, now: u32) -> Vec<SyncMessage>;
}

/// Communicator of a single-partition run: there is nobody to talk to.
pub struct DummySimCommunicator;

impl SimCommunicator for DummySimCommunicator {
    fn rank(&self) -> u32 {
        0
    }

    fn size(&self) -> u32 {
        1
    }

    fn send_receive(&self, out: Vec<SyncMessage>, _now: u32) -> Vec<SyncMessage> {
        assert!(
            out.is_empty(),
            "A single partition run must not produce messages to other partitions."
        );
        Vec::new()
    }
}
