/// Linear-interpolated percentile of `samples` for `p` in `[0, 100]`.
///
/// `p <= 0` yields the minimum, `p >= 100` the maximum and an empty sample yields `0.0`.
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

/// Same as [`percentile`] for input already sorted ascending.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return 0.0;
    };
    if p <= 0.0 {
        return *first;
    }
    if p >= 100.0 {
        return *last;
    }

    let rank = (sorted.len() - 1) as f64 * p / 100.0;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        return sorted[low];
    }

    sorted[low] + (sorted[high] - sorted[low]) * (rank - low as f64)
}
