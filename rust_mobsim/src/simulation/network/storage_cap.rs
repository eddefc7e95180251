/// Storage bookkeeping of one link: how much of the link's physical space is occupied,
/// in PCE. Space is consumed the moment a vehicle enters and released the moment it
/// leaves; the inflow gate in the node step keeps `used <= max` at all times.
#[derive(Debug, Clone)]
pub struct StorageCap {
    max: f32,
    used: f32,
}

impl StorageCap {
    pub fn build(
        length: f64,
        perm_lanes: f32,
        capacity_h: f32,
        sample_size: f32,
        effective_cell_size: f32,
    ) -> Self {
        let flow_cap_s = capacity_h * sample_size / 3600.;
        let cell_count = length * perm_lanes as f64 * sample_size as f64 / effective_cell_size as f64;
        // a link must at least hold what it can discharge in one second, otherwise the
        // flow capacity could never be reached
        let max = flow_cap_s.max(cell_count as f32);

        Self { max, used: 0.0 }
    }

    pub fn used(&self) -> f32 {
        self.used
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn consume(&mut self, value: f32) {
        self.used += value;
    }

    pub fn release(&mut self, value: f32) {
        self.used -= value;
    }

    pub fn is_available(&self) -> bool {
        self.max - self.used > 0.0
    }
}
