use std::fmt::Write as _;

use vuload_core::Report;

use super::format::{format_ms, format_percent};

/// Shown and written at most this many rows per ranked section.
const MAX_ROWS: usize = 10;

pub(crate) fn render(report: &Report) -> String {
    let mut out = String::new();
    let s = &report.summary;
    let l = &report.latency_ms;

    out.push_str("=== summary ===\n");
    writeln!(out, "run id: {}", report.run_id).ok();
    writeln!(
        out,
        "scenario: {} | base url: {}",
        report.scenario, report.base_url
    )
    .ok();
    writeln!(
        out,
        "started: {} | finished: {}",
        report.started_at_utc.to_rfc3339(),
        report.finished_at_utc.to_rfc3339()
    )
    .ok();
    writeln!(out, "duration: {} s", report.duration_seconds).ok();

    out.push_str("\n-- requests --\n");
    writeln!(out, "total: {}", s.total_requests).ok();
    writeln!(out, "success: {}", s.successful_requests).ok();
    writeln!(
        out,
        "failed: {} ({})",
        s.failed_requests,
        format_percent(s.error_rate_percent)
    )
    .ok();
    writeln!(out, "rps avg: {} | rps peak: {}", s.rps_avg, s.rps_peak).ok();

    out.push_str("\n-- latency --\n");
    writeln!(
        out,
        "min/avg/max: {} / {} / {}",
        format_ms(l.min),
        format_ms(l.avg),
        format_ms(l.max)
    )
    .ok();
    writeln!(
        out,
        "p50/p95/p99: {} / {} / {}",
        format_ms(l.p50),
        format_ms(l.p95),
        format_ms(l.p99)
    )
    .ok();

    out.push_str("\n-- status codes --\n");
    if report.status_codes.is_empty() {
        out.push_str("(none)\n");
    }
    for item in &report.status_codes {
        writeln!(
            out,
            "{}: {} ({})",
            item.status_code,
            item.count,
            format_percent(item.percentage)
        )
        .ok();
    }

    if !report.exceptions.is_empty() {
        out.push_str("\n-- error kinds --\n");
        for item in &report.exceptions {
            writeln!(out, "{}: {}", item.kind, item.count).ok();
        }
    }

    out.push_str("\n-- top endpoints by hits --\n");
    if report.top_endpoints_by_hits.is_empty() {
        out.push_str("(none)\n");
    }
    for item in report.top_endpoints_by_hits.iter().take(MAX_ROWS) {
        writeln!(
            out,
            "{}: hits={} p95={} errors={}",
            item.endpoint,
            item.hits,
            format_ms(item.p95_latency_ms),
            format_percent(item.error_rate_percent)
        )
        .ok();
    }

    out.push_str("\n-- top endpoints by p95 --\n");
    if report.top_endpoints_by_p95.is_empty() {
        out.push_str("(none)\n");
    }
    for item in report.top_endpoints_by_p95.iter().take(MAX_ROWS) {
        writeln!(
            out,
            "{}: p95={} hits={} errors={}",
            item.endpoint,
            format_ms(item.p95_latency_ms),
            item.hits,
            format_percent(item.error_rate_percent)
        )
        .ok();
    }

    out.push_str("\n-- top errors --\n");
    if report.top_errors.is_empty() {
        out.push_str("(none)\n");
    }
    for item in &report.top_errors {
        writeln!(
            out,
            "{}x {} | endpoints: {}",
            item.count,
            item.message,
            item.endpoints.join(", ")
        )
        .ok();
    }

    out.push_str("\n-- failure samples --\n");
    if report.failure_samples.is_empty() {
        out.push_str("(none)\n");
    }
    for sample in report.failure_samples.iter().take(MAX_ROWS) {
        let status = sample
            .status_code
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        writeln!(
            out,
            "[{}] {} {} status={} corr={} error={}",
            sample.timestamp_utc.to_rfc3339(),
            sample.method,
            sample.path,
            status,
            sample.correlation_id,
            sample.error_message
        )
        .ok();
    }

    out
}
