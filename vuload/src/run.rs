use crate::cli::RunArgs;
use crate::config_file::load_config;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::report_files::write_reports;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let config = load_config(&args.config)
        .await
        .map_err(RunError::InvalidInput)?;
    let plan = vuload_core::plan_scenario(&config, &args.scenario, &args.run_config())
        .map_err(RunError::from_core)?;

    out.print_header(&args.config, &plan);

    let report = match vuload_core::runner::run_scenario_until(plan, out.progress(), ctrl_c()).await
    {
        Ok(report) => report,
        Err(vuload_core::Error::Interrupted) => {
            out.print_interrupted();
            return Err(RunError::Interrupted);
        }
        Err(err) => return Err(RunError::from_core(err)),
    };

    out.print_summary(&report)
        .map_err(RunError::RuntimeError)?;

    let written = write_reports(&args.output_dir, &report)
        .await
        .map_err(RunError::RuntimeError)?;
    out.print_report_files(&written);

    Ok(ExitCode::Success)
}

/// Resolves on the first Ctrl-C. If the handler cannot be installed the run is never interrupted.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
