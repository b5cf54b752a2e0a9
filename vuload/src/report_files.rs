use std::path::{Path, PathBuf};

use anyhow::Context as _;
use vuload_core::Report;

mod html;

use html::render as render_html;

const LATEST: &str = "latest";

/// Paths of every file written for one run.
#[derive(Debug, Clone)]
pub(crate) struct WrittenReports {
    pub json: PathBuf,
    pub summary: PathBuf,
    pub html: PathBuf,
    pub latest_json: PathBuf,
    pub latest_summary: PathBuf,
    pub latest_html: PathBuf,
}

impl WrittenReports {
    fn new(dir: &Path, id: &str) -> Self {
        Self {
            json: dir.join(json_name(id)),
            summary: dir.join(summary_name(id)),
            html: dir.join(html_name(id)),
            latest_json: dir.join(json_name(LATEST)),
            latest_summary: dir.join(summary_name(LATEST)),
            latest_html: dir.join(html_name(LATEST)),
        }
    }

    pub(crate) fn all(&self) -> [&Path; 6] {
        [
            self.json.as_path(),
            self.summary.as_path(),
            self.html.as_path(),
            self.latest_json.as_path(),
            self.latest_summary.as_path(),
            self.latest_html.as_path(),
        ]
    }
}

fn json_name(id: &str) -> String {
    format!("loadtest-report-{id}.json")
}

fn summary_name(id: &str) -> String {
    format!("loadtest-summary-{id}.txt")
}

fn html_name(id: &str) -> String {
    format!("loadtest-report-{id}.html")
}

/// Writes the JSON report, the text summary and the HTML page for `report` into `dir`, each
/// once under the run id and once as the `-latest` copy.
pub(crate) async fn write_reports(dir: &Path, report: &Report) -> anyhow::Result<WrittenReports> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;

    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    let summary = crate::output::render_summary(report);
    let html = render_html(report)?;

    let written = WrittenReports::new(dir, &report.run_id.to_string());
    let files = [
        (&written.json, &json),
        (&written.summary, &summary),
        (&written.html, &html),
        (&written.latest_json, &json),
        (&written.latest_summary, &summary),
        (&written.latest_html, &html),
    ];
    for (path, contents) in files {
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("failed to write report file: {}", path.display()))?;
    }

    tracing::debug!(dir = %dir.display(), run_id = %report.run_id, "report files written");
    Ok(written)
}
