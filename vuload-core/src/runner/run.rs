use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;
use vuload_http::HttpClient;

use crate::collector::MetricsCollector;
use crate::config::ScenarioPlan;
use crate::error::{Error, Result};
use crate::report::{Report, RunMetadata};
use crate::select::weighted_choice;
use crate::session::VuSession;

use super::gate::DeadlineGate;
use super::progress::{ProgressFn, ProgressUpdate};
use super::schedule::ramp_offset;
use super::vu::VuCounters;

struct VuContext {
    index: u64,
    plan: Arc<ScenarioPlan>,
    client: HttpClient,
    metrics: Arc<MetricsCollector>,
    gate: Arc<DeadlineGate>,
    counters: Arc<VuCounters>,
}

/// Runs `plan` to completion and builds its report.
pub async fn run_scenario(plan: ScenarioPlan, progress: Option<ProgressFn>) -> Result<Report> {
    run_scenario_until(plan, progress, std::future::pending()).await
}

/// Like [`run_scenario`], but aborts every VU and returns [`Error::Interrupted`] as soon as
/// `cancel` resolves. No report is built for an interrupted run.
pub async fn run_scenario_until<C>(
    plan: ScenarioPlan,
    progress: Option<ProgressFn>,
    cancel: C,
) -> Result<Report>
where
    C: Future<Output = ()>,
{
    let client = HttpClient::new(plan.client_options())?;
    let plan = Arc::new(plan);

    let started = Instant::now();
    let started_at_utc = Utc::now();
    let metrics = Arc::new(MetricsCollector::new(started, plan.failure_sample_cap)?);
    let gate = Arc::new(DeadlineGate::new(plan.duration));
    gate.start_at(started);
    let counters = Arc::new(VuCounters::default());

    tracing::info!(
        scenario = %plan.scenario,
        base_url = %plan.base_url,
        vus = plan.vus,
        duration = ?plan.duration,
        ramp_up = ?plan.ramp_up,
        "starting scenario"
    );

    let mut handles: Vec<JoinHandle<()>> =
        Vec::with_capacity(usize::try_from(plan.vus).unwrap_or(0));
    for index in 1..=plan.vus {
        let ctx = VuContext {
            index,
            plan: plan.clone(),
            client: client.clone(),
            metrics: metrics.clone(),
            gate: gate.clone(),
            counters: counters.clone(),
        };
        handles.push(tokio::spawn(run_vu(ctx)));
    }
    drop(client);

    let progress_handle = progress.map(|progress| {
        let plan = plan.clone();
        let counters = counters.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut tick_id: u64 = 0;
            loop {
                interval.tick().await;
                tick_id = tick_id.saturating_add(1);

                (progress)(ProgressUpdate {
                    tick: tick_id,
                    elapsed: started.elapsed(),
                    duration: plan.duration,
                    scenario: plan.scenario.clone(),
                    vus: plan.vus,
                    started_vus: counters.started(),
                    active_vus: counters.active(),
                });
            }
        })
    });

    let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
    let joined = async move {
        for h in handles {
            h.await?;
        }
        Ok::<(), Error>(())
    };

    let outcome = tokio::select! {
        res = joined => res,
        () = cancel => {
            tracing::warn!(scenario = %plan.scenario, "run interrupted; aborting virtual users");
            Err(Error::Interrupted)
        }
    };
    if outcome.is_err() {
        for a in &aborts {
            a.abort();
        }
    }

    if let Some(h) = progress_handle {
        h.abort();
        let _ = h.await;
    }
    outcome?;

    let elapsed = started.elapsed();
    let finished_at_utc = Utc::now();

    // Every VU task has finished, so this is the last reference.
    let metrics = Arc::try_unwrap(metrics).map_err(|_| Error::CollectorShared)?;
    let counts = metrics.counts();
    tracing::info!(
        scenario = %plan.scenario,
        total = counts.total,
        failed = counts.failed,
        elapsed = ?elapsed,
        "scenario finished"
    );

    Ok(metrics.into_report(RunMetadata {
        run_id: Uuid::new_v4(),
        scenario: plan.scenario.clone(),
        base_url: plan.base_url.clone(),
        started_at_utc,
        finished_at_utc,
        elapsed,
        scenario_config: plan.effective_settings(),
        resolved_endpoints: plan.endpoints.clone(),
    }))
}

async fn run_vu(ctx: VuContext) {
    let VuContext {
        index,
        plan,
        client,
        metrics,
        gate,
        counters,
    } = ctx;

    let mut session = VuSession::new(index, plan.clone(), client, metrics);

    let offset = ramp_offset(plan.ramp_up, plan.vus, index);
    if !offset.is_zero() {
        tokio::time::sleep(offset).await;
    }

    let _active = counters.enter();
    tracing::debug!(vu = index, client_id = session.client_id(), "virtual user started");

    let mut iterations: u64 = 0;
    while gate.is_open() {
        let Some(endpoint) = weighted_choice(&plan.endpoints, |e| e.weight, session.rng_mut())
        else {
            break;
        };
        session.execute_request(endpoint).await;
        iterations += 1;

        let think = session.think_time();
        if !think.is_zero() {
            tokio::time::sleep(think).await;
        }
    }

    tracing::debug!(vu = index, iterations, "virtual user finished");
}
