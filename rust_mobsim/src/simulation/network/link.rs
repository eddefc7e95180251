use std::collections::VecDeque;

use crate::simulation::agents::SimulationAgentLogic;
use crate::simulation::config;
use crate::simulation::id::Id;
use crate::simulation::network::flow_cap::Flowcap;
use crate::simulation::network::storage_cap::StorageCap;
use crate::simulation::network::stuck_timer::StuckTimer;
use crate::simulation::network::{Link, Node};
use crate::simulation::vehicles::InternalVehicle;

/// Where an incoming vehicle is placed. Vehicles crossing a node enter the queue and
/// traverse the link; vehicles departing from an activity on this link wait in front of
/// the queue's exit without consuming storage.
pub enum LinkPosition {
    QStart,
    Waiting,
}

/// Runtime state of one link within a partition. Links whose end nodes live on different
/// partitions exist twice: as an `Out` stub on the upstream partition and as an `In` link
/// wrapping the real queue on the downstream one.
#[derive(Debug)]
pub enum SimLink {
    Local(LocalLink),
    In(SplitInLink),
    Out(SplitOutLink),
}

impl SimLink {
    pub fn id(&self) -> &Id<Link> {
        match self {
            SimLink::Local(ll) => &ll.id,
            SimLink::In(il) => &il.local_link.id,
            SimLink::Out(ol) => &ol.id,
        }
    }

    pub fn neighbor_part(&self) -> u32 {
        match self {
            SimLink::Local(_) => panic!("local links have no neighbor partition"),
            SimLink::In(il) => il.from_part,
            SimLink::Out(ol) => ol.to_part,
        }
    }

    pub fn offers_veh(&self, now: u32) -> Option<&InternalVehicle> {
        match self {
            SimLink::Local(ll) => ll.offers_veh(now),
            SimLink::In(il) => il.local_link.offers_veh(now),
            SimLink::Out(_) => panic!("out links can't offer vehicles"),
        }
    }

    pub fn is_veh_stuck(&self, now: u32) -> bool {
        match self {
            SimLink::Local(ll) => ll.stuck_timer.is_stuck(now),
            SimLink::In(il) => il.local_link.stuck_timer.is_stuck(now),
            SimLink::Out(_) => panic!("out links don't hold vehicles"),
        }
    }

    /// Whether the link accepts inflow. This is the spillback gate: a full link rejects
    /// and the vehicle stays on its upstream link until space frees up.
    pub fn is_available(&self) -> bool {
        match self {
            SimLink::Local(ll) => ll.is_available(),
            SimLink::In(_) => panic!("in links accept vehicles through their local link"),
            SimLink::Out(ol) => ol.storage_cap.is_available(),
        }
    }

    pub(super) fn is_active(&self) -> bool {
        match self {
            SimLink::Local(ll) => ll.is_active(),
            SimLink::In(il) => il.local_link.is_active(),
            SimLink::Out(ol) => !ol.q.is_empty(),
        }
    }

    pub fn used_storage(&self) -> f32 {
        match self {
            SimLink::Local(ll) => ll.storage_cap.used(),
            SimLink::In(il) => il.local_link.storage_cap.used(),
            SimLink::Out(ol) => ol.storage_cap.used(),
        }
    }

    pub(super) fn push_veh(&mut self, vehicle: InternalVehicle, position: LinkPosition, now: u32) {
        match self {
            SimLink::Local(ll) => ll.push_veh(vehicle, position, now),
            SimLink::In(il) => il.local_link.push_veh(vehicle, position, now),
            SimLink::Out(ol) => ol.push_veh(vehicle, position),
        }
    }

    pub fn pop_veh(&mut self) -> Option<InternalVehicle> {
        match self {
            SimLink::Local(ll) => ll.pop_veh(),
            SimLink::In(il) => il.local_link.pop_veh(),
            SimLink::Out(_) => panic!("can't pop vehicles from an out link"),
        }
    }
}

#[derive(Debug)]
struct VehicleQEntry {
    vehicle: InternalVehicle,
    earliest_exit_time: u32,
}

#[derive(Debug)]
pub struct LocalLink {
    pub id: Id<Link>,
    q: VecDeque<VehicleQEntry>,
    buffer: VecDeque<InternalVehicle>,
    waiting_list: VecDeque<InternalVehicle>,
    length: f64,
    free_speed: f32,
    storage_cap: StorageCap,
    flow_cap: Flowcap,
    stuck_timer: StuckTimer,
    pub from: Id<Node>,
    pub to: Id<Node>,
}

impl LocalLink {
    pub fn from_link(link: &Link, effective_cell_size: f32, config: &config::Simulation) -> Self {
        let storage_cap = StorageCap::build(
            link.length,
            link.permlanes,
            link.capacity,
            config.sample_size,
            effective_cell_size,
        );

        LocalLink {
            id: link.id.clone(),
            q: VecDeque::new(),
            buffer: VecDeque::new(),
            waiting_list: VecDeque::new(),
            length: link.length,
            free_speed: link.freespeed,
            storage_cap,
            flow_cap: Flowcap::new(link.capacity, config.sample_size, config.time_step),
            stuck_timer: StuckTimer::new(config.stuck_threshold),
            from: link.from.clone(),
            to: link.to.clone(),
        }
    }

    pub fn push_veh(&mut self, vehicle: InternalVehicle, position: LinkPosition, now: u32) {
        match position {
            LinkPosition::QStart => self.push_veh_to_queue(vehicle, now),
            LinkPosition::Waiting => self.waiting_list.push_back(vehicle),
        }
    }

    fn push_veh_to_queue(&mut self, vehicle: InternalVehicle, now: u32) {
        let speed = self.free_speed.min(vehicle.max_v);
        let duration = 1.max((self.length / speed as f64) as u32); // at least one second per link
        let earliest_exit_time = now + duration;

        self.storage_cap.consume(vehicle.pce);
        self.q.push_back(VehicleQEntry {
            vehicle,
            earliest_exit_time,
        });
    }

    /// One tick of this link: refill the flow capacity, then move vehicles from the
    /// waiting list and from the queue into the buffer as far as the capacity allows.
    /// Vehicles whose leg ends here are released instead and returned.
    pub fn do_sim_step(&mut self, now: u32) -> Vec<InternalVehicle> {
        self.flow_cap.update_capacity(now);
        let mut ending = self.move_waiting_to_buffer();
        ending.append(&mut self.move_q_to_buffer(now));
        ending
    }

    fn move_q_to_buffer(&mut self, now: u32) -> Vec<InternalVehicle> {
        let mut released = Vec::new();

        while let Some(entry) = self.q.front() {
            // strict FIFO, the head of the queue blocks everything behind it
            if entry.earliest_exit_time > now {
                break;
            }

            if entry.vehicle.driver().is_wanting_to_arrive_on_current_link() {
                let veh = self.q.pop_front().unwrap().vehicle;
                self.storage_cap.release(veh.pce);
                released.push(veh);
                continue;
            }

            if self.has_flow_capacity_left() {
                let veh = self.q.pop_front().unwrap().vehicle;
                self.storage_cap.release(veh.pce);
                self.buffer.push_back(veh);
            } else {
                break;
            }
        }

        released
    }

    fn move_waiting_to_buffer(&mut self) -> Vec<InternalVehicle> {
        let mut released = Vec::new();

        while let Some(veh) = self.waiting_list.front() {
            // a stay leg ends on its departure link without ever entering the queue
            if veh.driver().is_wanting_to_arrive_on_current_link() {
                released.push(self.waiting_list.pop_front().unwrap());
                continue;
            }

            if self.has_flow_capacity_left() {
                let veh = self.waiting_list.pop_front().unwrap();
                self.buffer.push_back(veh);
            } else {
                break;
            }
        }

        released
    }

    /// Buffered vehicles count against the accumulator before they actually pop, so one
    /// tick can never over-commit the capacity.
    fn has_flow_capacity_left(&self) -> bool {
        let buffered: f32 = self.buffer.iter().map(|v| v.pce).sum();
        self.flow_cap.value() - buffered > 0.0
    }

    /// The head of the buffer, if flow capacity allows a departure this tick. Querying
    /// starts the stuck timer, popping resets it.
    fn offers_veh(&self, now: u32) -> Option<&InternalVehicle> {
        let entry = self.buffer.front()?;
        if self.flow_cap.has_capacity_left() {
            self.stuck_timer.start(now);
            return Some(entry);
        }
        None
    }

    fn pop_veh(&mut self) -> Option<InternalVehicle> {
        let veh = self.buffer.pop_front()?;
        self.flow_cap.consume(veh.pce);
        self.stuck_timer.reset();
        Some(veh)
    }

    pub fn is_available(&self) -> bool {
        self.storage_cap.is_available()
    }

    pub(super) fn is_active(&self) -> bool {
        !self.q.is_empty() || !self.waiting_list.is_empty() || !self.buffer.is_empty()
    }

    pub fn veh_count(&self) -> usize {
        self.q.len() + self.waiting_list.len() + self.buffer.len()
    }

    /// Whether the downstream node has to look at this link in the next tick.
    pub fn to_node_active(&self, now: u32) -> bool {
        self.offers_veh(now + 1).is_some()
    }

    pub(super) fn drain(&mut self) -> Vec<InternalVehicle> {
        let mut vehicles: Vec<_> = self.q.drain(..).map(|e| e.vehicle).collect();
        vehicles.extend(self.buffer.drain(..));
        vehicles.extend(self.waiting_list.drain(..));
        let used = self.storage_cap.used();
        self.storage_cap.release(used);
        vehicles
    }
}

/// Upstream stub of a link whose queue lives on another partition. Vehicles pushed here
/// are collected into the next sync message; the mirrored storage capacity throttles
/// inflow until the owning partition reports space again.
#[derive(Debug)]
pub struct SplitOutLink {
    pub id: Id<Link>,
    pub to_part: u32,
    q: VecDeque<InternalVehicle>,
    storage_cap: StorageCap,
}

impl SplitOutLink {
    pub fn new(
        link: &Link,
        effective_cell_size: f32,
        sample_size: f32,
        to_part: u32,
    ) -> SplitOutLink {
        let storage_cap = StorageCap::build(
            link.length,
            link.permlanes,
            link.capacity,
            sample_size,
            effective_cell_size,
        );

        SplitOutLink {
            id: link.id.clone(),
            to_part,
            q: VecDeque::default(),
            storage_cap,
        }
    }

    pub fn apply_storage_cap_update(&mut self, released: f32) {
        self.storage_cap.release(released);
    }

    pub fn take_veh(&mut self) -> VecDeque<InternalVehicle> {
        std::mem::take(&mut self.q)
    }

    pub fn push_veh(&mut self, veh: InternalVehicle, position: LinkPosition) {
        if matches!(position, LinkPosition::Waiting) {
            panic!(
                "SplitOutLink {} cannot take a waiting vehicle, departures happen on local links.",
                self.id
            );
        }
        // consumed here, released only when the owning partition reports it
        self.storage_cap.consume(veh.pce);
        self.q.push_back(veh);
    }
}

/// Downstream twin of a split link: the real queue, plus the rank of the partition that
/// feeds it and needs to hear about released storage.
#[derive(Debug)]
pub struct SplitInLink {
    pub from_part: u32,
    pub local_link: LocalLink,
}

impl SplitInLink {
    pub(super) fn new(from_part: u32, local_link: LocalLink) -> Self {
        SplitInLink {
            from_part,
            local_link,
        }
    }

    pub(super) fn occupied_storage(&self) -> f32 {
        self.local_link.storage_cap.used()
    }
}
