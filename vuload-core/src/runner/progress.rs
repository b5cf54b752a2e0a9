use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    /// Configured run duration.
    pub duration: Duration,
    pub scenario: String,
    pub vus: u64,
    /// VUs past their ramp-up delay.
    pub started_vus: u64,
    /// VUs currently inside their request loop.
    pub active_vus: u64,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
