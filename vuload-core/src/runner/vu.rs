use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Started/active VU gauges read by the progress ticker.
#[derive(Debug, Default)]
pub struct VuCounters {
    started: AtomicU64,
    active: AtomicU64,
}

impl VuCounters {
    /// Marks a VU as started and active until the returned guard drops.
    pub fn enter(self: &Arc<Self>) -> ActiveVuGuard {
        self.started.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveVuGuard {
            counters: self.clone(),
        }
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }
}

pub struct ActiveVuGuard {
    counters: Arc<VuCounters>,
}

impl Drop for ActiveVuGuard {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_tracks_active_vus() {
        let counters = Arc::new(VuCounters::default());
        let a = counters.enter();
        let b = counters.enter();
        assert_eq!((counters.started(), counters.active()), (2, 2));

        drop(a);
        assert_eq!((counters.started(), counters.active()), (2, 1));
        drop(b);
        assert_eq!((counters.started(), counters.active()), (2, 0));
    }
}
