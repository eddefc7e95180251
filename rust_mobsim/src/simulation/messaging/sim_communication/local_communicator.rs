use std::sync::mpsc::{channel, Receiver, Sender};

use crate::simulation::messaging::messages::SyncMessage;
use crate::simulation::messaging::sim_communication::SimCommunicator;

/// Connects the partition threads of one process with mpsc channels, all-to-all. Each
/// rank owns its receiver and a sender to every peer. Because every rank sends exactly
/// one message per peer per tick, receiving `size - 1` messages is a full barrier for
/// the tick and no additional synchronization is needed.
pub struct ChannelSimCommunicator {
    rank: u32,
    senders: Vec<Sender<SyncMessage>>,
    receiver: Receiver<SyncMessage>,
}

impl ChannelSimCommunicator {
    /// Creates the connected mesh for `num_parts` partitions.
    pub fn create_n_2_n(num_parts: u32) -> Vec<ChannelSimCommunicator> {
        let mut senders: Vec<Sender<SyncMessage>> = Vec::new();
        let mut comms: Vec<ChannelSimCommunicator> = Vec::new();

        for rank in 0..num_parts {
            let (sender, receiver) = channel();
            comms.push(ChannelSimCommunicator {
                rank,
                senders: Vec::new(),
                receiver,
            });
            senders.push(sender);
        }

        for comm in &mut comms {
            comm.senders = senders.clone();
        }

        comms
    }
}

impl SimCommunicator for ChannelSimCommunicator {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn size(&self) -> u32 {
        self.senders.len() as u32
    }

    fn send_receive(&self, out: Vec<SyncMessage>, now: u32) -> Vec<SyncMessage> {
        assert_eq!(
            out.len() as u32,
            self.size() - 1,
            "Expected one message per other rank."
        );

        for message in out {
            assert_ne!(message.to_process, self.rank, "Messages to self are not allowed.");
            self.senders[message.to_process as usize]
                .send(message)
                .expect("Failed to send sync message, receiver thread is gone.");
        }

        let mut received = Vec::with_capacity(self.size() as usize - 1);
        for _ in 1..self.size() {
            let message = self
                .receiver
                .recv()
                .expect("Failed to receive sync message, sender thread is gone.");
            assert_eq!(
                now, message.time,
                "Received a sync message of another tick. Partitions are out of step."
            );
            received.push(message);
        }

        received.sort_by_key(|m| m.from_process);
        received
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;
    use std::thread;

    use super::*;

    #[integration_test]
    fn messages_are_exchanged_and_ordered() {
        let mut comms = ChannelSimCommunicator::create_n_2_n(3);
        let handles: Vec<_> = comms
            .drain(..)
            .map(|comm| {
                thread::spawn(move || {
                    let rank = comm.rank();
                    let out: Vec<SyncMessage> = (0..3)
                        .filter(|to| *to != rank)
                        .map(|to| SyncMessage::new(42, rank, to))
                        .collect();
                    let received = comm.send_receive(out, 42);

                    let froms: Vec<u32> = received.iter().map(|m| m.from_process).collect();
                    let expected: Vec<u32> = (0..3).filter(|from| *from != rank).collect();
                    assert_eq!(expected, froms);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
