#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use vuload_core::{
    EndpointDefinition, LOGIN_ENDPOINT_KEY, LOGIN_ERROR_KIND, LoadConfig, MetricsCollector,
    Report, RunConfig, RunMetadata, ScenarioPlan, TIMEOUT_ERROR_KIND, VuSession, plan_scenario,
};
use vuload_http::HttpClient;
use vuload_testserver::{OPEN_ORDER_IDS, TestServer, VALID_PASSWORD};

fn plan_for(base_url: &str, password: &str, endpoints: Value, injection: f64) -> ScenarioPlan {
    let config: LoadConfig = serde_json::from_value(json!({
        "baseUrl": base_url,
        "tenantIds": ["tenant-1"],
        "auth": {
            "enabled": true,
            "accounts": [{ "email": "vu@example.test", "password": password }]
        },
        "scenarios": { "test": { "errorInjectionRatePercent": injection } },
        "endpoints": endpoints
    }))
    .unwrap();
    plan_scenario(&config, "test", &RunConfig::default()).unwrap()
}

fn session_for(plan: ScenarioPlan) -> (VuSession, Arc<MetricsCollector>) {
    let metrics = Arc::new(MetricsCollector::new(Instant::now(), 10).unwrap());
    let client = HttpClient::new(plan.client_options()).unwrap();
    let session = VuSession::new(1, Arc::new(plan), client, metrics.clone());
    (session, metrics)
}

fn finish(session: VuSession, metrics: Arc<MetricsCollector>) -> Report {
    drop(session);
    let metrics = Arc::try_unwrap(metrics).unwrap();
    metrics.into_report(RunMetadata {
        run_id: uuid::Uuid::nil(),
        scenario: "test".to_string(),
        base_url: String::new(),
        started_at_utc: chrono::Utc::now(),
        finished_at_utc: chrono::Utc::now(),
        elapsed: std::time::Duration::from_secs(1),
        scenario_config: Default::default(),
        resolved_endpoints: Vec::new(),
    })
}

fn orders_endpoint() -> Value {
    json!([{ "path": "/api/orders", "auth": "bearer", "capture": "client_order_ids" }])
}

#[tokio::test]
async fn login_then_capture_then_lookup() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let plan = plan_for(
        server.base_url(),
        VALID_PASSWORD,
        json!([
            { "path": "/api/orders", "auth": "bearer", "capture": "client_order_ids" },
            { "path": "/api/orders/{orderId}", "auth": "bearer" }
        ]),
        0.0,
    );
    let endpoints: Vec<EndpointDefinition> = plan.endpoints.clone();
    let (mut session, metrics) = session_for(plan);

    assert!(session.ensure_login(false).await);
    assert!(session.token().is_some());
    assert_eq!(server.stats().logins_ok(), 1);

    // Already holding a token: no second login.
    assert!(session.ensure_login(false).await);
    assert_eq!(server.stats().logins_ok(), 1);

    session.execute_request(&endpoints[0]).await;
    assert_eq!(session.captured_order_ids().len(), 3);
    assert!(
        session
            .captured_order_ids()
            .contains(&OPEN_ORDER_IDS[0].to_string())
    );

    session.execute_request(&endpoints[1]).await;
    assert_eq!(server.stats().order_lookups(), 1);
    assert!(server.stats().saw_client_header() >= 3);
    assert!(server.stats().saw_tenant_header() >= 3);

    let report = finish(session, metrics);
    assert_eq!(report.summary.total_requests, 3);
    assert_eq!(report.summary.failed_requests, 0);
    let keys: Vec<&str> = report
        .top_endpoints_by_hits
        .iter()
        .map(|e| e.endpoint.as_str())
        .collect();
    assert!(keys.contains(&LOGIN_ENDPOINT_KEY));
    assert!(keys.contains(&"GET /api/orders/{orderId}"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rejected_login_is_recorded_and_not_usable() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let plan = plan_for(server.base_url(), "wrong", orders_endpoint(), 0.0);
    let endpoints = plan.endpoints.clone();
    let (mut session, metrics) = session_for(plan);

    assert!(!session.ensure_login(false).await);
    assert!(session.token().is_none());

    // The request still goes out without a token and is rejected.
    session.execute_request(&endpoints[0]).await;

    let report = finish(session, metrics);
    // Explicit login, login before the bearer request, forced login after the 401.
    assert_eq!(server.stats().logins_rejected(), 3);
    assert_eq!(report.summary.failed_requests, 4);

    let login_failure = &report.failure_samples[0];
    assert_eq!(login_failure.endpoint, LOGIN_ENDPOINT_KEY);
    assert_eq!(login_failure.error_type, LOGIN_ERROR_KIND);
    assert_eq!(login_failure.status_code, Some(401));
    assert_eq!(login_failure.method, "POST");
    let body = login_failure.request_body.as_deref().unwrap();
    assert!(body.contains("vu@example.test"));
    assert!(!body.contains("wrong"), "password leaked into report: {body}");

    let kinds: Vec<&str> = report.exceptions.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds, [LOGIN_ERROR_KIND, "http_401"]);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn revoked_token_forces_relogin_after_401() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let plan = plan_for(server.base_url(), VALID_PASSWORD, orders_endpoint(), 0.0);
    let endpoints = plan.endpoints.clone();
    let (mut session, metrics) = session_for(plan);

    session.execute_request(&endpoints[0]).await;
    let first_token = session.token().unwrap().to_string();
    assert_eq!(server.stats().logins_ok(), 1);

    server.revoke_tokens();
    session.execute_request(&endpoints[0]).await;

    // The 401 is not retried, but a fresh token is fetched for later requests.
    assert_eq!(server.stats().unauthorized(), 1);
    assert_eq!(server.stats().logins_ok(), 2);
    assert_ne!(session.token().unwrap(), first_token);

    session.execute_request(&endpoints[0]).await;

    let report = finish(session, metrics);
    assert_eq!(report.summary.failed_requests, 1);
    assert_eq!(report.status_codes.iter().find(|s| s.status_code == 401).unwrap().count, 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn injected_errors_use_invalid_path_and_body() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let plan = plan_for(
        server.base_url(),
        VALID_PASSWORD,
        json!([
            {
                "path": "/api/orders/{orderId}",
                "invalidPath": "/api/orders/not-a-guid",
                "auth": "bearer"
            },
            {
                "method": "POST",
                "path": "/api/orders",
                "auth": "bearer",
                "bodyTemplate": { "quantity": 2 },
                "invalidBodyTemplate": { "quantity": 0 }
            }
        ]),
        100.0,
    );
    let endpoints = plan.endpoints.clone();
    let (mut session, metrics) = session_for(plan);

    session.execute_request(&endpoints[0]).await;
    session.execute_request(&endpoints[1]).await;
    assert!(server.stats().saw_json_content_type() >= 1);

    let report = finish(session, metrics);
    let kinds: Vec<&str> = report.exceptions.iter().map(|e| e.kind.as_str()).collect();
    assert!(kinds.contains(&"http_404"), "{kinds:?}");
    assert!(kinds.contains(&"http_400"), "{kinds:?}");

    let lookup = report
        .failure_samples
        .iter()
        .find(|s| s.error_type == "http_404")
        .unwrap();
    assert_eq!(lookup.path, "/api/orders/not-a-guid");
    assert_eq!(lookup.endpoint, "GET /api/orders/{orderId}");
    assert_eq!(lookup.error_message, r#"{"error":"order not-a-guid not found"}"#);

    let create = report
        .failure_samples
        .iter()
        .find(|s| s.error_type == "http_400")
        .unwrap();
    assert_eq!(create.request_body.as_deref(), Some(r#"{"quantity":0}"#));
    assert!(create.response_snippet.as_deref().unwrap().contains("validation failed"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn slow_responses_are_recorded_as_timeouts() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let mut plan = plan_for(server.base_url(), VALID_PASSWORD, json!([{ "path": "/slow" }]), 0.0);
    plan.auth.enabled = false;
    plan.request_timeout = vuload_core::MIN_REQUEST_TIMEOUT;
    let endpoints = plan.endpoints.clone();
    let (mut session, metrics) = session_for(plan);

    session.execute_request(&endpoints[0]).await;

    let report = finish(session, metrics);
    assert_eq!(report.summary.failed_requests, 1);
    assert!(report.status_codes.is_empty());
    let sample = &report.failure_samples[0];
    assert_eq!(sample.error_type, TIMEOUT_ERROR_KIND);
    assert_eq!(sample.status_code, None);
    assert!(sample.error_message.starts_with("timeout:"), "{}", sample.error_message);
    assert!(sample.duration_ms >= 900.0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn refused_connections_are_transport_failures() -> anyhow::Result<()> {
    // Grab a free port, then close it again.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };
    let mut plan = plan_for(
        &format!("http://127.0.0.1:{port}"),
        VALID_PASSWORD,
        json!([{ "path": "/hello" }]),
        0.0,
    );
    plan.auth.enabled = false;
    let endpoints = plan.endpoints.clone();
    let (mut session, metrics) = session_for(plan);

    session.execute_request(&endpoints[0]).await;

    let report = finish(session, metrics);
    let sample = &report.failure_samples[0];
    assert_eq!(sample.error_type, "connect");
    assert!(
        sample.error_message.starts_with("exception: connect:"),
        "{}",
        sample.error_message
    );
    assert_eq!(report.exceptions[0].kind, "connect");
    Ok(())
}
