use std::time::Duration;

pub(crate) fn format_duration_single(d: Duration) -> String {
    // Single rounded component in one of: ms, s. Keeps progress lines short.
    let total_ms = d.as_millis();
    if total_ms >= 1_000 {
        return format!("{}s", (total_ms + 500) / 1_000);
    }
    format!("{total_ms}ms")
}

pub(crate) fn format_ms(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2} ms")
    } else {
        "n/a".to_string()
    }
}

pub(crate) fn format_percent(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}%")
    } else {
        "0.00%".to_string()
    }
}
