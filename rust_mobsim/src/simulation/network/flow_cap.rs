/// Fractional flow-capacity accumulator of one link. Each tick credits the per-tick
/// capacity; a departure is only allowed while the accumulator is positive and debits it
/// by the vehicle's PCE. Because credit is capped at one tick's worth, the long-run
/// discharge rate converges to the configured capacity without systematic bias.
#[derive(Debug, Clone)]
pub struct Flowcap {
    last_update_time: u32,
    time_step: u32,
    value: f32,
    capacity_per_time_step: f32,
}

impl Flowcap {
    pub(super) fn new(capacity_h: f32, sample_size: f32, time_step: u32) -> Flowcap {
        let capacity_per_time_step = capacity_h * sample_size / 3600. * time_step as f32;
        Flowcap {
            last_update_time: 0,
            time_step,
            value: capacity_per_time_step,
            capacity_per_time_step,
        }
    }

    pub(super) fn update_capacity(&mut self, now: u32) {
        if self.last_update_time < now {
            let steps = ((now - self.last_update_time) / self.time_step) as f32;
            let accumulated = steps * self.capacity_per_time_step + self.value;
            self.value = f32::min(accumulated, self.capacity_per_time_step);
            self.last_update_time = now;
        }
    }

    pub(super) fn has_capacity_left(&self) -> bool {
        self.value > 1e-10
    }

    pub(super) fn value(&self) -> f32 {
        self.value
    }

    pub(super) fn consume(&mut self, by: f32) {
        self.value -= by;
    }

    pub(super) fn capacity_per_time_step(&self) -> f32 {
        self.capacity_per_time_step
    }
}
