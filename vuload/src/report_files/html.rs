use anyhow::Context as _;
use askama::Template;
use vuload_core::{Report, truncate_text};

const FAILURE_MESSAGE_MAX_CHARS: usize = 140;

struct Card {
    title: &'static str,
    value: String,
}

struct Table {
    title: &'static str,
    headers: &'static [&'static str],
    rows: Vec<Vec<String>>,
}

#[derive(askama::Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    report: &'a Report,
    started: String,
    finished: String,
    cards: Vec<Card>,
    tables: Vec<Table>,
}

/// Self-contained HTML page for one report.
pub(crate) fn render(report: &Report) -> anyhow::Result<String> {
    let tpl = ReportTemplate {
        report,
        started: report.started_at_utc.to_rfc3339(),
        finished: report.finished_at_utc.to_rfc3339(),
        cards: cards(report),
        tables: tables(report),
    };
    tpl.render().context("render html report")
}

fn cards(report: &Report) -> Vec<Card> {
    let s = &report.summary;
    let l = &report.latency_ms;
    vec![
        Card {
            title: "Total requests",
            value: s.total_requests.to_string(),
        },
        Card {
            title: "Successful",
            value: s.successful_requests.to_string(),
        },
        Card {
            title: "Failed",
            value: format!("{} ({}%)", s.failed_requests, s.error_rate_percent),
        },
        Card {
            title: "RPS avg / peak",
            value: format!("{} / {}", s.rps_avg, s.rps_peak),
        },
        Card {
            title: "Latency p50",
            value: format!("{} ms", l.p50),
        },
        Card {
            title: "Latency p95 / p99",
            value: format!("{} / {} ms", l.p95, l.p99),
        },
    ]
}

fn tables(report: &Report) -> Vec<Table> {
    vec![
        Table {
            title: "Status codes",
            headers: &["Status", "Count", "%"],
            rows: report
                .status_codes
                .iter()
                .map(|c| {
                    vec![
                        c.status_code.to_string(),
                        c.count.to_string(),
                        format!("{}%", c.percentage),
                    ]
                })
                .collect(),
        },
        Table {
            title: "Error kinds",
            headers: &["Kind", "Count"],
            rows: report
                .exceptions
                .iter()
                .map(|e| vec![e.kind.clone(), e.count.to_string()])
                .collect(),
        },
        Table {
            title: "Top endpoints by hits",
            headers: &["Endpoint", "Hits", "P95", "Error rate", "Average"],
            rows: report
                .top_endpoints_by_hits
                .iter()
                .map(|e| {
                    vec![
                        e.endpoint.clone(),
                        e.hits.to_string(),
                        format!("{} ms", e.p95_latency_ms),
                        format!("{}%", e.error_rate_percent),
                        format!("{} ms", e.avg_latency_ms),
                    ]
                })
                .collect(),
        },
        Table {
            title: "Top errors",
            headers: &["Normalized message", "Count", "Endpoints"],
            rows: report
                .top_errors
                .iter()
                .map(|e| vec![e.message.clone(), e.count.to_string(), e.endpoints.join(", ")])
                .collect(),
        },
        Table {
            title: "Failure samples",
            headers: &[
                "Timestamp",
                "Method",
                "Path",
                "Status",
                "Correlation id",
                "Kind",
                "Error",
            ],
            rows: report
                .failure_samples
                .iter()
                .map(|f| {
                    vec![
                        f.timestamp_utc.to_rfc3339(),
                        f.method.clone(),
                        f.path.clone(),
                        f.status_code.map_or_else(|| "-".to_string(), |c| c.to_string()),
                        f.correlation_id.to_string(),
                        f.error_type.clone(),
                        truncate_text(&f.error_message, FAILURE_MESSAGE_MAX_CHARS),
                    ]
                })
                .collect(),
        },
    ]
}
