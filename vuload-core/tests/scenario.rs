#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use vuload_core::runner::{ProgressFn, ProgressUpdate, run_scenario};
use vuload_core::{LOGIN_ENDPOINT_KEY, LoadConfig, RunConfig, ScenarioPlan, plan_scenario};
use vuload_testserver::{TestServer, VALID_PASSWORD};

fn plan(base_url: &str, scenario: Value, extra: Value, cfg: RunConfig) -> ScenarioPlan {
    let mut doc = json!({
        "baseUrl": base_url,
        "scenarios": { "e2e": scenario },
    });
    if let (Some(doc), Some(extra)) = (doc.as_object_mut(), extra.as_object()) {
        doc.extend(extra.clone());
    }
    let config: LoadConfig = serde_json::from_value(doc).unwrap();
    plan_scenario(&config, "e2e", &cfg).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn constant_load_against_paced_endpoint() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let plan = plan(
        server.base_url(),
        json!({ "vus": 3, "durationSeconds": 2, "thinkTimeMinMs": 0, "thinkTimeMaxMs": 0 }),
        json!({ "endpoints": [{ "path": "/paced" }] }),
        RunConfig::default(),
    );

    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    let progress: ProgressFn = Arc::new(move |u: ProgressUpdate| {
        sink.lock().unwrap().push(u);
    });

    let report = run_scenario(plan, Some(progress)).await?;

    // Ideal is 3 VUs x 400 requests; leave room for slow CI machines.
    let total = report.summary.total_requests;
    assert!((450..=1_300).contains(&total), "total={total}");
    assert_eq!(report.summary.failed_requests, 0);
    assert_eq!(report.summary.error_rate_percent, 0.0);
    assert_eq!(server.stats().requests_total(), total);

    let lat = report.latency_ms;
    assert!(lat.p50 >= 4.5 && lat.p50 < 50.0, "{lat:?}");
    assert!(lat.p99 - lat.p50 < 10.0, "latency spread too wide: {lat:?}");
    assert!(lat.p50 <= lat.p95 && lat.p95 <= lat.p99 && lat.p99 <= lat.max);
    assert!(lat.min >= 4.5, "{lat:?}");

    assert!(report.duration_seconds >= 2.0);
    assert!(report.summary.rps_peak >= 1);
    assert_eq!(report.status_codes.len(), 1);
    assert_eq!(report.status_codes[0].status_code, 200);
    assert_eq!(report.status_codes[0].percentage, 100.0);
    assert_eq!(report.top_endpoints_by_hits[0].endpoint, "GET /paced");
    assert_eq!(report.scenario, "e2e");
    assert_eq!(report.scenario_config.vus, Some(3));
    assert_eq!(report.resolved_endpoints.len(), 1);

    let updates = updates.lock().unwrap();
    assert!(!updates.is_empty());
    let last = updates.last().unwrap();
    assert_eq!(last.vus, 3);
    assert_eq!(last.duration, Duration::from_secs(2));
    assert!(updates.iter().all(|u| u.active_vus <= 3 && u.started_vus <= 3));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_endpoint_yields_full_error_report() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let plan = plan(
        server.base_url(),
        json!({ "vus": 2, "durationSeconds": 1, "thinkTimeMinMs": 0, "thinkTimeMaxMs": 5 }),
        json!({ "endpoints": [{ "path": "/fail" }] }),
        RunConfig {
            failure_sample_cap: Some(4),
            ..RunConfig::default()
        },
    );

    let report = run_scenario(plan, None).await?;

    let total = report.summary.total_requests;
    assert!(total > 4, "total={total}");
    assert_eq!(report.summary.failed_requests, total);
    assert_eq!(report.summary.error_rate_percent, 100.0);
    assert_eq!(report.failure_samples.len(), 4);

    assert_eq!(report.top_errors.len(), 1);
    assert_eq!(
        report.top_errors[0].message,
        "request {guid} failed after {n} attempts"
    );
    assert_eq!(report.top_errors[0].count, total);
    assert_eq!(report.top_errors[0].endpoints, vec!["GET /fail"]);
    assert_eq!(report.exceptions[0].kind, "http_500");

    for sample in &report.failure_samples {
        assert_eq!(sample.status_code, Some(500));
        assert!(sample.client_id.starts_with("LT-E2E-000"));
        assert_eq!(sample.error_message, "request {guid} failed after {n} attempts");
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn authenticated_mix_with_ramp_up() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let plan = plan(
        server.base_url(),
        json!({
            "vus": 3,
            "durationSeconds": 2,
            "rampUpSeconds": 1,
            "thinkTimeMinMs": 0,
            "thinkTimeMaxMs": 20
        }),
        json!({
            "tenantIds": ["tenant-a", "tenant-b"],
            "auth": {
                "enabled": true,
                "accounts": [
                    { "email": "a@example.test", "password": "stale" },
                    { "email": "b@example.test", "password": "stale" }
                ]
            },
            "endpoints": [
                { "path": "/api/orders", "auth": "bearer", "capture": "client_order_ids", "weight": 1 },
                { "path": "/api/orders/{orderId}", "auth": "bearer", "fallbackPath": "/api/orders", "weight": 3 }
            ]
        }),
        RunConfig {
            auth_password: Some(VALID_PASSWORD.to_string()),
            ..RunConfig::default()
        },
    );

    let report = run_scenario(plan, None).await?;

    assert_eq!(report.summary.failed_requests, 0, "{:?}", report.top_errors);
    assert_eq!(server.stats().logins_ok(), 3);
    assert!(server.stats().order_lookups() > 0);

    let login = report
        .top_endpoints_by_hits
        .iter()
        .find(|e| e.endpoint == LOGIN_ENDPOINT_KEY)
        .unwrap();
    assert_eq!(login.hits, 3);
    assert_eq!(report.scenario_config.ramp_up_seconds, Some(1.0));

    server.shutdown().await;
    Ok(())
}
