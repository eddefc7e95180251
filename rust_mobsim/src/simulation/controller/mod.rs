pub mod local_controller;

use nohash_hasher::IntMap;
use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use std::thread::JoinHandle;
use tracing::info;

use crate::simulation::config::{Config, WriteEvents};
use crate::simulation::events::writer::TextEventsWriter;
use crate::simulation::events::{EventsManager, OnEventFnBuilder};
use crate::simulation::logging;
use crate::simulation::messaging::sim_communication::message_broker::NetMessageBroker;
use crate::simulation::messaging::sim_communication::SimCommunicator;
use crate::simulation::scenario::ScenarioPartition;
use crate::simulation::simulation::Simulation;

/// Objects local to the thread running one partition. The events manager is shared
/// between the engines of that partition through this handle; it never crosses threads.
#[derive(Clone, Debug)]
pub struct ComputationalEnvironment {
    events_publisher: Rc<RefCell<EventsManager>>,
}

impl Default for ComputationalEnvironment {
    fn default() -> Self {
        ComputationalEnvironment {
            events_publisher: Rc::new(RefCell::new(EventsManager::new())),
        }
    }
}

impl ComputationalEnvironment {
    pub fn new(events_publisher: Rc<RefCell<EventsManager>>) -> Self {
        ComputationalEnvironment { events_publisher }
    }

    pub fn events_publisher(&self) -> Rc<RefCell<EventsManager>> {
        self.events_publisher.clone()
    }

    pub fn events_publisher_borrow_mut(&mut self) -> RefMut<'_, EventsManager> {
        self.events_publisher.borrow_mut()
    }
}

/// Everything a partition thread needs to run.
pub struct PartitionArguments<C: SimCommunicator> {
    pub communicator: C,
    pub scenario_partition: ScenarioPartition,
    pub events_subscribers: Vec<Box<OnEventFnBuilder>>,
}

pub(crate) fn execute_partition<C: SimCommunicator>(arguments: PartitionArguments<C>) {
    let config = arguments.scenario_partition.config.clone();
    let rank = arguments.communicator.rank();
    let _guards = logging::init_logging(&config, rank);

    let events = create_events(&config, rank, arguments.events_subscribers);
    let comp_env = ComputationalEnvironment::new(events);

    let broker = NetMessageBroker::new(
        Rc::new(arguments.communicator),
        &arguments.scenario_partition.network,
    );

    let mut simulation = Simulation::new(arguments.scenario_partition, broker, comp_env);
    simulation.run();

    // dropping the guards flushes logging before the thread ends
    drop(_guards);
}

fn create_events(
    config: &Config,
    rank: u32,
    subscribers: Vec<Box<OnEventFnBuilder>>,
) -> Rc<RefCell<EventsManager>> {
    let mut events = EventsManager::new();

    match config.output.write_events {
        WriteEvents::None => {}
        WriteEvents::Text => {
            let path = config.output.output_dir.join(format!("events.{rank}.xml"));
            info!("Adding events writer with path: {path:?}");
            TextEventsWriter::register(path)(&mut events);
        }
        WriteEvents::TextGz => {
            let path = config.output.output_dir.join(format!("events.{rank}.xml.gz"));
            info!("Adding events writer with path: {path:?}");
            TextEventsWriter::register(path)(&mut events);
        }
    }

    for subscriber in subscribers {
        subscriber(&mut events);
    }

    Rc::new(RefCell::new(events))
}

/// Joins all partition threads, panicking with the thread's name when one failed.
pub fn try_join(handles: IntMap<u32, JoinHandle<()>>) {
    for (_, handle) in handles {
        let name = handle
            .thread()
            .name()
            .unwrap_or("unnamed-thread")
            .to_string();
        handle
            .join()
            .unwrap_or_else(|_| panic!("Error in partition thread {name}"));
    }
}
