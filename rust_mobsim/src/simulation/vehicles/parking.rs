use nohash_hasher::IntMap;
use std::sync::Arc;

use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network};

/// Occupancy of parked vehicles per link, separate from the driving storage of the link
/// queues: a parked vehicle is off the network but still claims curb space. Capacity
/// derives from the link geometry the same way driving storage does. Vehicles parked
/// before the run starts are not tracked; the registry counts what arrives and leaves
/// during the run.
pub struct ParkingRegistry {
    network: Arc<Network>,
    effective_cell_size: f32,
    parked: IntMap<Id<Link>, f32>,
}

impl ParkingRegistry {
    pub fn new(network: Arc<Network>) -> Self {
        let effective_cell_size = network.effective_cell_size();
        ParkingRegistry {
            network,
            effective_cell_size,
            parked: IntMap::default(),
        }
    }

    fn capacity(&self, link_id: &Id<Link>) -> f32 {
        let link = self.network.get_link(link_id);
        let cells = link.length * link.permlanes as f64 / self.effective_cell_size as f64;
        (cells as f32).max(1.0)
    }

    pub fn has_space(&self, link_id: &Id<Link>) -> bool {
        let used = self.parked.get(link_id).copied().unwrap_or(0.0);
        self.capacity(link_id) - used > 0.0
    }

    pub fn park(&mut self, link_id: &Id<Link>, pce: f32) {
        *self.parked.entry(link_id.clone()).or_insert(0.0) += pce;
    }

    /// Saturating: vehicles parked before the run started were never counted.
    pub fn unpark(&mut self, link_id: &Id<Link>, pce: f32) {
        if let Some(used) = self.parked.get_mut(link_id) {
            *used = (*used - pce).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;
    use std::sync::Arc;

    use super::ParkingRegistry;
    use crate::simulation::id::Id;
    use crate::test_utils;

    #[integration_test]
    fn tracks_occupancy_per_link() {
        // 100m links: 13 cells of parking each
        let network = Arc::new(test_utils::create_three_link_network(3600., 10.));
        let mut registry = ParkingRegistry::new(network);
        let link = Id::get_from_ext("l1");

        assert!(registry.has_space(&link));
        for _ in 0..13 {
            registry.park(&link, 1.0);
        }
        assert!(!registry.has_space(&link));

        registry.unpark(&link, 1.0);
        assert!(registry.has_space(&link));
    }

    #[integration_test]
    fn unpark_never_goes_negative() {
        let network = Arc::new(test_utils::create_three_link_network(3600., 10.));
        let mut registry = ParkingRegistry::new(network);
        let link = Id::get_from_ext("l1");

        registry.unpark(&link, 5.0);
        registry.park(&link, 1.0);
        assert!(registry.has_space(&link));
    }
}
