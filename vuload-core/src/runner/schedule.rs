use std::time::Duration;

/// Start delay of VU `index` (1-based) when `vus` VUs are spread evenly across `ramp_up`.
///
/// The first VU starts immediately and the last one at `ramp_up`.
pub fn ramp_offset(ramp_up: Duration, vus: u64, index: u64) -> Duration {
    if ramp_up.is_zero() || vus <= 1 {
        return Duration::ZERO;
    }

    let step = ramp_up.as_secs_f64() / (vus - 1) as f64;
    Duration::from_secs_f64(step * index.saturating_sub(1).min(vus - 1) as f64)
}

pub fn ramp_offsets(ramp_up: Duration, vus: u64) -> Vec<Duration> {
    (1..=vus).map(|i| ramp_offset(ramp_up, vus, i)).collect()
}
