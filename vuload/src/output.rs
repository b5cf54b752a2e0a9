use crate::cli::OutputFormat;
use crate::report_files::WrittenReports;
use std::path::Path;

mod human;
mod json;

pub(crate) use human::render_summary;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, config_path: &Path, plan: &vuload_core::ScenarioPlan);
    fn progress(&self) -> Option<vuload_core::runner::ProgressFn>;
    fn print_summary(&self, report: &vuload_core::Report) -> anyhow::Result<()>;
    fn print_report_files(&self, written: &WrittenReports);
    fn print_interrupted(&self);
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
