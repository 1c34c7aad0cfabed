//! Deterministic deferred work.
//!
//! The engine defers three activities: post-render decoration, decorated
//! node cleanup, and (inside the gesture crate) drop polling. Each runs off
//! a [`TimerSlot`]: a single pending deadline on a logical millisecond
//! clock. Arming a slot always replaces whatever was pending, so a burst of
//! triggers yields exactly one fire.

#[derive(Clone, Copy, Debug, Default)]
pub struct TimerSlot {
    deadline: Option<u64>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a fire at `now + delay`, clearing any pending deadline.
    pub fn arm(&mut self, now: u64, delay: u64) {
        self.deadline = Some(now.saturating_add(delay));
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Consume the deadline if it is due. Returns `true` at most once per
    /// arm.
    pub fn fire(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_when_due() {
        let mut t = TimerSlot::new();
        t.arm(100, 50);
        assert!(!t.fire(149));
        assert!(t.fire(150));
        assert!(!t.fire(151));
        assert!(!t.is_armed());
    }

    #[test]
    fn rearming_replaces_pending_deadline() {
        let mut t = TimerSlot::new();
        t.arm(0, 10);
        t.arm(5, 10);
        assert!(!t.fire(10));
        assert!(t.fire(15));
    }

    #[test]
    fn disarm_cancels() {
        let mut t = TimerSlot::new();
        t.arm(0, 10);
        t.disarm();
        assert!(!t.fire(100));
    }
}
