use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network};
use crate::simulation::population::{InternalActivity, InternalGenericRoute, InternalLeg, InternalRoute};

/// Beeline detour factor and mode speeds for teleported movement, in m/s.
pub const BEELINE_FACTOR: f64 = 1.3;
pub const WALK_SPEED: f64 = 1.2;
pub const BIKE_SPEED: f64 = 4.17;
pub const TELEPORT_SPEED: f64 = 8.33;

/// Per-mode behavior of a leg. The variant is selected once when the leg is created, so
/// the engines dispatch on plain enum matches instead of inspecting mode strings or
/// route types at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCapability {
    Car,
    Bike,
    Walk,
    Teleported,
    ParkingSearch,
    Undefined,
}

/// Which cost configuration a missing route is computed with. Congested costs feed back
/// the travel times observed in the current run, freeflow costs are schedule independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingProfile {
    Congested,
    Freeflow,
}

/// What happens when a network leg wants to complete on a link.
pub enum ArrivalAction {
    Complete,
    /// The destination is full, keep driving over this link.
    ContinueSearch(Id<Link>),
    /// Park here and splice an interaction activity plus a walk leg to the destination.
    ParkAndWalk {
        parking: InternalActivity,
        walk: InternalLeg,
    },
}

impl ModeCapability {
    pub fn from_mode(mode: &Id<String>) -> Self {
        match mode.external() {
            "car" => ModeCapability::Car,
            "bike" => ModeCapability::Bike,
            "walk" => ModeCapability::Walk,
            "parking_search" => ModeCapability::ParkingSearch,
            "teleported" => ModeCapability::Teleported,
            _ => ModeCapability::Undefined,
        }
    }

    /// Vehicular legs can run on the network, all others teleport.
    pub fn is_vehicular(&self) -> bool {
        matches!(
            self,
            ModeCapability::Car | ModeCapability::Bike | ModeCapability::ParkingSearch
        )
    }

    pub fn routing_profile(&self) -> RoutingProfile {
        match self {
            ModeCapability::Car | ModeCapability::ParkingSearch => RoutingProfile::Congested,
            _ => RoutingProfile::Freeflow,
        }
    }

    /// Speed used for teleported movement of this mode.
    pub fn teleport_speed(&self) -> f64 {
        match self {
            ModeCapability::Walk => WALK_SPEED,
            ModeCapability::Bike => BIKE_SPEED,
            _ => TELEPORT_SPEED,
        }
    }

    /// Decides how a completed network leg on `vehicle_link` ends. Everything except
    /// parking search arrives unconditionally; parking search keeps driving while its
    /// link has no parking left and walks home when it parked away from the
    /// destination. `parking_available` answers whether a link can take one more
    /// parked vehicle.
    pub fn on_arrival(
        &self,
        vehicle_link: &Id<Link>,
        destination: Option<&InternalActivity>,
        network: &Network,
        parking_available: &dyn Fn(&Id<Link>) -> bool,
        now: u32,
    ) -> ArrivalAction {
        if *self != ModeCapability::ParkingSearch {
            return ArrivalAction::Complete;
        }
        let destination =
            destination.expect("A parking search leg must be followed by an activity.");
        let at_destination = vehicle_link == &destination.link_id;

        if parking_available(vehicle_link) {
            if at_destination {
                return ArrivalAction::Complete;
            }
            return Self::forced_parking(vehicle_link, destination, network, now);
        }

        // full here. Continue over the smallest-id out link with space; when everything
        // around is packed too, the search gives up and parks on this link.
        let to_node = network.get_node(&network.get_link(vehicle_link).to);
        let next = to_node.out_links.iter().find(|l| parking_available(l));
        match next {
            Some(next) => ArrivalAction::ContinueSearch(next.clone()),
            None if at_destination => ArrivalAction::Complete,
            None => Self::forced_parking(vehicle_link, destination, network, now),
        }
    }

    /// Ends a search on `vehicle_link`: park here and walk to the destination. Also the
    /// fallback when the search cannot move on because the next link's driving storage
    /// is exhausted.
    pub fn forced_parking(
        vehicle_link: &Id<Link>,
        destination: &InternalActivity,
        network: &Network,
        now: u32,
    ) -> ArrivalAction {
        ArrivalAction::ParkAndWalk {
            parking: Self::parking_interaction(vehicle_link, network),
            walk: Self::walk_home(vehicle_link, destination, network, now),
        }
    }

    fn parking_interaction(link: &Id<Link>, network: &Network) -> InternalActivity {
        let node = network.get_node(&network.get_link(link).to);
        InternalActivity::new(
            node.x,
            node.y,
            "parking interaction",
            link.clone(),
            None,
            None,
            Some(0),
        )
    }

    fn walk_home(
        parking_link: &Id<Link>,
        destination: &InternalActivity,
        network: &Network,
        now: u32,
    ) -> InternalLeg {
        let node = network.get_node(&network.get_link(parking_link).to);
        let beeline =
            ((node.x - destination.x).powi(2) + (node.y - destination.y).powi(2)).sqrt();
        let distance = beeline * BEELINE_FACTOR;
        let trav_time = (distance / WALK_SPEED).ceil() as u32;
        InternalLeg::new(
            InternalRoute::Generic(InternalGenericRoute::new(
                parking_link.clone(),
                destination.link_id.clone(),
                Some(trav_time),
                Some(distance),
                None,
            )),
            "walk",
            trav_time,
            Some(now),
        )
    }
}
