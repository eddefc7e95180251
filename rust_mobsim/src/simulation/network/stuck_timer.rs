use std::cell::Cell;

/// Tracks how long the vehicle at the head of a link's buffer has been blocked by a full
/// downstream link. Once the threshold is reached the node step pushes the vehicle
/// regardless of storage, so a gridlocked loop cannot freeze the whole run.
#[derive(Debug, Clone)]
pub struct StuckTimer {
    started: Cell<Option<u32>>,
    threshold: u32,
}

impl StuckTimer {
    pub fn new(threshold: u32) -> Self {
        StuckTimer {
            started: Cell::new(None),
            threshold,
        }
    }

    /// Starts the timer if it is not already running. Called every time the head vehicle
    /// is offered, so the first blocked tick wins.
    pub fn start(&self, now: u32) {
        if self.started.get().is_none() {
            self.started.replace(Some(now));
        }
    }

    pub fn reset(&self) {
        self.started.replace(None);
    }

    pub fn is_stuck(&self, now: u32) -> bool {
        match self.started.get() {
            Some(since) => now - since >= self.threshold,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StuckTimer;

    #[test]
    fn first_start_wins() {
        let timer = StuckTimer::new(10);
        timer.start(5);
        timer.start(7);

        assert!(!timer.is_stuck(14));
        assert!(timer.is_stuck(15));
    }

    #[test]
    fn reset_clears_state() {
        let timer = StuckTimer::new(10);
        timer.start(0);
        assert!(timer.is_stuck(10));

        timer.reset();
        assert!(!timer.is_stuck(100));
    }

    #[test]
    fn never_stuck_without_start() {
        let timer = StuckTimer::new(0);
        assert!(!timer.is_stuck(u32::MAX));
    }
}
