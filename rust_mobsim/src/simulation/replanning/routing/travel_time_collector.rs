use nohash_hasher::IntMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::simulation::events::{EventsManager, LinkEnterEvent, LinkLeaveEvent};
use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::replanning::routing::graph::{FreeflowTravelCosts, TravelCosts};
use crate::simulation::vehicles::InternalVehicle;

/// Collects link travel times from the event stream. A travel time is one
/// LinkEnter/LinkLeave pair of the same vehicle on the same link; the first link of a
/// leg produces no enter event and is skipped. The congested cost function reads the
/// averages, `flush` starts a new observation window.
#[derive(Default)]
pub struct TravelTimeCollector {
    travel_times_by_link: HashMap<Id<Link>, Vec<u32>>,
    cache_enter: IntMap<Id<InternalVehicle>, (Id<Link>, u32)>,
}

impl TravelTimeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a collector to the manager and returns the shared handle.
    pub fn install(events: &mut EventsManager) -> Rc<RefCell<TravelTimeCollector>> {
        let collector = Rc::new(RefCell::new(TravelTimeCollector::new()));

        let on_enter = collector.clone();
        events.on::<LinkEnterEvent, _>(move |e| {
            on_enter.borrow_mut().process_link_enter(e);
        });
        let on_leave = collector.clone();
        events.on::<LinkLeaveEvent, _>(move |e| {
            on_leave.borrow_mut().process_link_leave(e);
        });

        collector
    }

    fn process_link_enter(&mut self, event: &LinkEnterEvent) {
        self.cache_enter
            .insert(event.vehicle.clone(), (event.link.clone(), event.time));
    }

    fn process_link_leave(&mut self, event: &LinkLeaveEvent) {
        if let Some((link, entered)) = self.cache_enter.remove(&event.vehicle) {
            if link == event.link {
                self.travel_times_by_link
                    .entry(link)
                    .or_default()
                    .push(event.time - entered);
            }
        }
    }

    pub fn get_travel_time_of_link(&self, link: &Id<Link>) -> Option<u32> {
        self.travel_times_by_link.get(link).map(|times| {
            let sum: u32 = times.iter().sum();
            sum / times.len() as u32
        })
    }

    /// Drops the collected averages. Enter times of vehicles still on their link stay
    /// cached, their travel time belongs to the next window.
    pub fn flush(&mut self) {
        self.travel_times_by_link.clear();
    }
}

/// Congested cost/time pair: observed average travel times where available, free-flow
/// otherwise. Cost equals time, i.e. routes minimize expected travel time.
pub struct CollectedTravelCosts {
    collector: Rc<RefCell<TravelTimeCollector>>,
}

impl CollectedTravelCosts {
    pub fn new(collector: Rc<RefCell<TravelTimeCollector>>) -> Self {
        CollectedTravelCosts { collector }
    }
}

impl TravelCosts for CollectedTravelCosts {
    fn link_cost(&self, link: &Link, time: u32) -> f64 {
        self.link_time(link, time) as f64
    }

    fn link_time(&self, link: &Link, _time: u32) -> u32 {
        let freeflow = FreeflowTravelCosts::freeflow_time(link);
        self.collector
            .borrow()
            .get_travel_time_of_link(&link.id)
            // congestion can only make a link slower than free flow
            .map(|observed| observed.max(freeflow))
            .unwrap_or(freeflow)
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;

    use super::*;
    use crate::simulation::events::{LinkEnterEventBuilder, LinkLeaveEventBuilder};

    fn enter(events: &mut EventsManager, time: u32, link: &str, vehicle: &str) {
        events.publish_event(
            &LinkEnterEventBuilder::default()
                .time(time)
                .link(Id::create(link))
                .vehicle(Id::create(vehicle))
                .build()
                .unwrap(),
        );
    }

    fn leave(events: &mut EventsManager, time: u32, link: &str, vehicle: &str) {
        events.publish_event(
            &LinkLeaveEventBuilder::default()
                .time(time)
                .link(Id::create(link))
                .vehicle(Id::create(vehicle))
                .build()
                .unwrap(),
        );
    }

    #[integration_test]
    fn one_vehicle() {
        let mut events = EventsManager::new();
        let collector = TravelTimeCollector::install(&mut events);

        // the leave on link 1 is a leg start and must not count
        leave(&mut events, 1, "link-1", "veh-1");
        enter(&mut events, 2, "link-2", "veh-1");
        leave(&mut events, 4, "link-2", "veh-1");

        let collector = collector.borrow();
        assert_eq!(Some(2), collector.get_travel_time_of_link(&Id::create("link-2")));
        assert_eq!(None, collector.get_travel_time_of_link(&Id::create("link-1")));
    }

    #[integration_test]
    fn averages_over_vehicles() {
        let mut events = EventsManager::new();
        let collector = TravelTimeCollector::install(&mut events);

        enter(&mut events, 0, "link", "veh-1");
        enter(&mut events, 1, "link", "veh-2");
        leave(&mut events, 2, "link", "veh-1");
        leave(&mut events, 5, "link", "veh-2");

        // travel times 2 and 4 average to 3
        assert_eq!(
            Some(3),
            collector.borrow().get_travel_time_of_link(&Id::create("link"))
        );
    }

    #[integration_test]
    fn flush_clears_averages_but_keeps_open_trips() {
        let mut events = EventsManager::new();
        let collector = TravelTimeCollector::install(&mut events);

        enter(&mut events, 0, "link", "veh-1");
        leave(&mut events, 5, "link", "veh-1");
        enter(&mut events, 6, "link", "veh-2");

        collector.borrow_mut().flush();
        assert_eq!(
            None,
            collector.borrow().get_travel_time_of_link(&Id::create("link"))
        );

        leave(&mut events, 16, "link", "veh-2");
        assert_eq!(
            Some(10),
            collector.borrow().get_travel_time_of_link(&Id::create("link"))
        );
    }
}
