use std::path::Path;
use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::{format_duration_single, format_percent};
use progress::HumanProgress;

pub(crate) use summary::render as render_summary;

use crate::report_files::WrittenReports;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, config_path: &Path, plan: &vuload_core::ScenarioPlan) {
        println!("=== vuload ===");
        println!("config: {}", config_path.display());
        println!("scenario: {}", plan.scenario);
        if let Some(description) = &plan.description {
            println!("description: {description}");
        }
        println!("base url: {}", plan.base_url);
        println!(
            "vus: {} | duration: {} | ramp-up: {}",
            plan.vus,
            humantime::format_duration(plan.duration),
            humantime::format_duration(plan.ramp_up)
        );
        println!(
            "think: {}..{} ms | error injection: {}",
            plan.think_time.min_ms,
            plan.think_time.max_ms,
            format_percent(plan.error_injection_rate_percent)
        );
        println!(
            "endpoints: {} | auth: {}",
            plan.endpoints.len(),
            if plan.auth.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!();
    }

    fn progress(&self) -> Option<vuload_core::runner::ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |u| {
            let message = format!(
                "active_vus={}/{} started={} elapsed={}",
                u.active_vus,
                u.vus,
                u.started_vus,
                format_duration_single(u.elapsed)
            );
            progress.update(&u.scenario, u.duration, u.elapsed, message);
        }))
    }

    fn print_summary(&self, report: &vuload_core::Report) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", summary::render(report));
        Ok(())
    }

    fn print_report_files(&self, written: &WrittenReports) {
        println!();
        println!("reports:");
        println!("- json: {}", written.json.display());
        println!("- txt:  {}", written.summary.display());
        println!("- html: {}", written.html.display());
        println!("- latest json: {}", written.latest_json.display());
        println!("- latest html: {}", written.latest_html.display());
    }

    fn print_interrupted(&self) {
        self.progress.finish();
        eprintln!("interrupted: virtual users aborted, no report written");
    }
}
