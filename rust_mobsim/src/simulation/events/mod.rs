pub mod writer;

use derive_builder::Builder;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::InternalPerson;
use crate::simulation::vehicles::InternalVehicle;

pub trait EventTrait: Debug + Any {
    // can't be a const, traits with const fields are not dyn compatible
    fn type_(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn time(&self) -> u32;
}

type OnEventFn = dyn Fn(&dyn EventTrait) + 'static;
type OnAnyEventFn = dyn Fn(u64, &dyn EventTrait) + 'static;

/// Builder closures let callers describe subscriptions before the manager exists on its
/// partition thread; the controller applies them once the thread owns the manager.
pub type OnEventFnBuilder = dyn FnOnce(&mut EventsManager) + Send;

/// Synchronous event distribution. Handlers are callbacks per concrete event type plus
/// catch-all handlers which additionally receive the event's sequence number. Every
/// published event gets a monotonically increasing sequence number, which breaks ties
/// between events of the same timestamp when streams are compared or merged. Handlers
/// run in registration order and must not mutate engine state.
#[derive(Default)]
pub struct EventsManager {
    per_type: HashMap<TypeId, Vec<Rc<OnEventFn>>>,
    catch_all: Vec<Box<OnAnyEventFn>>,
    finish: Vec<Box<dyn Fn() + 'static>>,
    sequence: u64,
}

impl Debug for EventsManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EventsManager {{ per_type: {}, catch_all: {}, finish: {}, sequence: {} }}",
            self.per_type.len(),
            self.catch_all.len(),
            self.finish.len(),
            self.sequence
        )
    }
}

impl EventsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_event(&mut self, event: &dyn EventTrait) {
        let seq = self.sequence;
        self.sequence += 1;

        let tid = event.as_any().type_id();
        if let Some(handlers) = self.per_type.get(&tid).cloned() {
            for h in handlers {
                h(event);
            }
        }
        for h in &self.catch_all {
            h(seq, event);
        }
    }

    /// Number of events published so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn finish(&mut self) {
        for f in self.finish.iter() {
            f()
        }
    }

    /// Registers a callback for one concrete event type.
    pub fn on<E, F>(&mut self, f: F)
    where
        E: EventTrait,
        F: Fn(&E) + 'static,
    {
        let entry = self.per_type.entry(TypeId::of::<E>()).or_default();
        entry.push(Rc::new(move |ev: &dyn EventTrait| {
            if let Some(e) = ev.as_any().downcast_ref::<E>() {
                f(e);
            }
        }));
    }

    /// Registers a callback for all event types.
    pub fn on_any<F>(&mut self, f: F)
    where
        F: Fn(u64, &dyn EventTrait) + 'static,
    {
        self.catch_all.push(Box::new(f));
    }

    pub fn on_finish<F>(&mut self, f: F)
    where
        F: Fn() + 'static,
    {
        self.finish.push(Box::new(f));
    }
}

macro_rules! impl_event_trait {
    ($event:ty) => {
        impl EventTrait for $event {
            fn type_(&self) -> &'static str {
                Self::TYPE
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn time(&self) -> u32 {
                self.time
            }
        }
    };
}

#[derive(Builder, Debug)]
pub struct ActivityStartEvent {
    pub time: u32,
    pub person: Id<InternalPerson>,
    pub link: Id<Link>,
    pub act_type: Id<String>,
}

impl ActivityStartEvent {
    pub const TYPE: &'static str = "actstart";
}
impl_event_trait!(ActivityStartEvent);

#[derive(Builder, Debug)]
pub struct ActivityEndEvent {
    pub time: u32,
    pub person: Id<InternalPerson>,
    pub link: Id<Link>,
    pub act_type: Id<String>,
}

impl ActivityEndEvent {
    pub const TYPE: &'static str = "actend";
}
impl_event_trait!(ActivityEndEvent);

#[derive(Builder, Debug)]
pub struct PersonDepartureEvent {
    pub time: u32,
    pub person: Id<InternalPerson>,
    pub link: Id<Link>,
    pub leg_mode: Id<String>,
}

impl PersonDepartureEvent {
    pub const TYPE: &'static str = "departure";
}
impl_event_trait!(PersonDepartureEvent);

#[derive(Builder, Debug)]
pub struct LinkEnterEvent {
    pub time: u32,
    pub link: Id<Link>,
    pub vehicle: Id<InternalVehicle>,
}

impl LinkEnterEvent {
    pub const TYPE: &'static str = "entered link";
}
impl_event_trait!(LinkEnterEvent);

#[derive(Builder, Debug)]
pub struct LinkLeaveEvent {
    pub time: u32,
    pub link: Id<Link>,
    pub vehicle: Id<InternalVehicle>,
}

impl LinkLeaveEvent {
    pub const TYPE: &'static str = "left link";
}
impl_event_trait!(LinkLeaveEvent);

#[derive(Builder, Debug)]
pub struct PersonArrivalEvent {
    pub time: u32,
    pub person: Id<InternalPerson>,
    pub link: Id<Link>,
    pub leg_mode: Id<String>,
}

impl PersonArrivalEvent {
    pub const TYPE: &'static str = "arrival";
}
impl_event_trait!(PersonArrivalEvent);

/// Diagnostic event for an agent that was force-removed because it could not finish its
/// plan before the run's time limit, e.g. on a disconnected network.
#[derive(Builder, Debug)]
pub struct StuckAgentEvent {
    pub time: u32,
    pub person: Id<InternalPerson>,
    pub link: Id<Link>,
}

impl StuckAgentEvent {
    pub const TYPE: &'static str = "stuck";
}
impl_event_trait!(StuckAgentEvent);
