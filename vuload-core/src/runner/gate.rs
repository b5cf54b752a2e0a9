use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Soft run deadline shared by every VU loop.
///
/// The deadline is computed once; a loop checks it before each cycle, so an in-flight cycle
/// always completes.
#[derive(Debug)]
pub struct DeadlineGate {
    duration: Duration,
    deadline: OnceLock<Instant>,
}

impl DeadlineGate {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            deadline: OnceLock::new(),
        }
    }

    pub fn start_at(&self, started: Instant) {
        let _ = self.deadline.set(started + self.duration);
    }

    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    pub fn is_open_at(&self, now: Instant) -> bool {
        // If the runner didn't set a start time, lazily start from the first check.
        let deadline = *self.deadline.get_or_init(|| now + self.duration);
        now < deadline
    }
}
