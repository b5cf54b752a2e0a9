use std::io::Write as _;
use std::path::Path;

use crate::report_files::WrittenReports;

use super::OutputFormatter;

/// Keeps stdout a single JSON document; everything else goes to stderr.
pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _config_path: &Path, _plan: &vuload_core::ScenarioPlan) {}

    fn progress(&self) -> Option<vuload_core::runner::ProgressFn> {
        None
    }

    fn print_summary(&self, report: &vuload_core::Report) -> anyhow::Result<()> {
        let doc = serde_json::to_string_pretty(report)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{doc}")?;
        out.flush()?;
        Ok(())
    }

    fn print_report_files(&self, written: &WrittenReports) {
        for path in written.all() {
            eprintln!("report={}", path.display());
        }
    }

    fn print_interrupted(&self) {
        eprintln!("interrupted");
    }
}
