use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};
use uuid::Uuid;
use vuload_http::{HttpClient, HttpRequest, HttpResponse};

use crate::collector::{FailureSample, MetricsCollector, RequestSample};
use crate::config::{Account, AuthMode, CaptureMode, EndpointDefinition, ScenarioPlan};
use crate::normalize::truncate_text;

/// Endpoint key under which login attempts are aggregated.
pub const LOGIN_ENDPOINT_KEY: &str = "auth.login";
pub const LOGIN_ERROR_KIND: &str = "login_error";
pub const TIMEOUT_ERROR_KIND: &str = "timeout";

pub const ORDER_ID_PLACEHOLDER: &str = "{orderId}";
pub const NIL_ORDER_ID: &str = "00000000-0000-0000-0000-000000000000";

const LOGIN_MESSAGE_MAX_CHARS: usize = 400;
const LOGIN_SNIPPET_MAX_CHARS: usize = 260;
const RESPONSE_SNIPPET_MAX_CHARS: usize = 300;

const ORDER_LIST_FIELDS: [&str; 2] = ["openOrders", "finalizedOrders"];

/// One simulated client.
///
/// Requests of a session are strictly sequential; all randomness comes from its private,
/// seeded generator.
#[derive(Debug)]
pub struct VuSession {
    index: u64,
    client_id: String,
    tenant_id: Option<String>,
    account: Option<Account>,
    token: Option<String>,
    order_ids: Vec<String>,
    rng: StdRng,
    plan: Arc<ScenarioPlan>,
    client: HttpClient,
    metrics: Arc<MetricsCollector>,
}

/// Request identity captured before sending, shared by the success and failure paths.
struct Attempt {
    endpoint_key: String,
    method: String,
    path: String,
    correlation_id: Uuid,
    request_body: Option<String>,
    timestamp: DateTime<Utc>,
    started_at: Instant,
}

impl Attempt {
    fn success(self, status: u16, duration: Duration) -> RequestSample {
        RequestSample {
            endpoint_key: self.endpoint_key,
            status: Some(status),
            duration,
            started_at: self.started_at,
            error_kind: None,
            error_message: None,
            failure_sample: None,
        }
    }

    fn failure(
        self,
        session: &VuSession,
        status: Option<u16>,
        duration: Duration,
        kind: String,
        message: String,
        response_snippet: Option<String>,
    ) -> RequestSample {
        let sample = FailureSample {
            timestamp_utc: self.timestamp,
            client_id: session.client_id.clone(),
            correlation_id: self.correlation_id,
            endpoint: self.endpoint_key.clone(),
            method: self.method,
            path: self.path,
            status_code: status,
            duration_ms: duration.as_nanos() as f64 / 1_000_000.0,
            error_type: kind.clone(),
            error_message: session.metrics.normalizer().normalize(&message),
            request_body: self.request_body,
            response_snippet,
        };

        RequestSample {
            endpoint_key: self.endpoint_key,
            status,
            duration,
            started_at: self.started_at,
            error_kind: Some(kind),
            error_message: Some(message),
            failure_sample: Some(sample),
        }
    }
}

impl VuSession {
    /// `index` is 1-based.
    pub fn new(
        index: u64,
        plan: Arc<ScenarioPlan>,
        client: HttpClient,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let slot = index.saturating_sub(1);
        let pick = |len: usize| (slot % len.max(1) as u64) as usize;

        let tenant_id = (!plan.tenant_ids.is_empty())
            .then(|| plan.tenant_ids[pick(plan.tenant_ids.len())].clone());
        let account = (!plan.auth.accounts.is_empty())
            .then(|| plan.auth.accounts[pick(plan.auth.accounts.len())].clone());

        Self {
            index,
            client_id: client_id(&plan.scenario, index),
            tenant_id,
            account,
            token: None,
            order_ids: Vec::new(),
            rng: StdRng::seed_from_u64(plan.seed.wrapping_mul(10_000).wrapping_add(index)),
            plan,
            client,
            metrics,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Captured order ids, deduplicated and sorted.
    pub fn captured_order_ids(&self) -> &[String] {
        &self.order_ids
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform think time within the plan's bounds.
    pub fn think_time(&mut self) -> Duration {
        let think = self.plan.think_time;
        Duration::from_millis(self.rng.gen_range(think.min_ms..=think.max_ms.max(think.min_ms)))
    }

    /// Makes sure a bearer token is held, logging in when needed.
    ///
    /// Returns whether the session is usable for authenticated requests. Every attempt is
    /// recorded under [`LOGIN_ENDPOINT_KEY`]; failures never propagate.
    pub async fn ensure_login(&mut self, force: bool) -> bool {
        if !self.plan.auth.enabled {
            return true;
        }
        if self.token.is_some() && !force {
            return true;
        }
        if force {
            self.token = None;
        }
        let Some(account) = self.account.clone() else {
            return false;
        };

        let login_path = self.plan.auth.login_path.clone();
        let payload = json!({ "email": account.email, "password": account.password });
        let redacted = json!({ "email": account.email, "password": "***" });

        let correlation_id = Uuid::new_v4();
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-Client-Id".to_string(), self.client_id.clone()),
            ("X-Correlation-Id".to_string(), correlation_id.to_string()),
        ];
        if let Some(tenant) = &self.tenant_id {
            headers.push(("X-Tenant-Id".to_string(), tenant.clone()));
        }

        let mut req = HttpRequest::post(
            &format!("{}{login_path}", self.plan.base_url),
            Bytes::from(payload.to_string()),
        );
        req.headers = headers;
        req.timeout = Some(self.plan.request_timeout);

        let attempt = Attempt {
            endpoint_key: LOGIN_ENDPOINT_KEY.to_string(),
            method: "POST".to_string(),
            path: login_path,
            correlation_id,
            request_body: Some(redacted.to_string()),
            timestamp: Utc::now(),
            started_at: Instant::now(),
        };

        let res = self.client.request(req).await;
        let duration = attempt.started_at.elapsed();

        let res = match res {
            Ok(res) => res,
            Err(err) => {
                tracing::debug!(vu = self.index, error = %err, "login request failed");
                let sample = self.transport_failure(attempt, duration, &err);
                self.metrics.record(sample);
                return false;
            }
        };

        let token = (res.status < 400)
            .then(|| token_from_body(&res.body, &self.plan.auth.token_field))
            .flatten();

        match token {
            Some(token) => {
                self.token = Some(token);
                self.metrics.record(attempt.success(res.status, duration));
                true
            }
            None => {
                tracing::debug!(vu = self.index, status = res.status, "login rejected");
                let text = res.text();
                let message = if text.is_empty() {
                    "login_failed".to_string()
                } else {
                    truncate_text(&text, LOGIN_MESSAGE_MAX_CHARS)
                };
                let sample = attempt.failure(
                    self,
                    Some(res.status),
                    duration,
                    LOGIN_ERROR_KIND.to_string(),
                    message,
                    Some(truncate_text(&text, LOGIN_SNIPPET_MAX_CHARS)),
                );
                self.metrics.record(sample);
                false
            }
        }
    }

    /// Issues one request for `endpoint` and records its outcome. Never fails.
    pub async fn execute_request(&mut self, endpoint: &EndpointDefinition) {
        let inject_invalid = self.should_inject_error();
        let path = self.resolve_path(endpoint, inject_invalid);
        let body = resolve_body(endpoint, inject_invalid);

        let bearer = endpoint.auth == AuthMode::Bearer;
        if bearer && self.plan.auth.enabled {
            self.ensure_login(false).await;
        }

        let correlation_id = Uuid::new_v4();
        let headers = self.build_headers(correlation_id, endpoint, body.is_some());
        let body = body.map(|b| Value::Object(b.clone()).to_string());

        let mut req = HttpRequest::new(
            endpoint.method.clone(),
            format!("{}{path}", self.plan.base_url),
        );
        req.headers = headers;
        req.body = body.clone().map(Bytes::from).unwrap_or_default();
        req.timeout = Some(self.plan.request_timeout);

        let attempt = Attempt {
            endpoint_key: endpoint.key(),
            method: endpoint.method.to_string(),
            path,
            correlation_id,
            request_body: body,
            timestamp: Utc::now(),
            started_at: Instant::now(),
        };

        let res = self.client.request(req).await;
        let duration = attempt.started_at.elapsed();

        match res {
            Ok(res) if res.status >= 400 => {
                let status = res.status;
                let text = res.text();
                let sample = attempt.failure(
                    self,
                    Some(status),
                    duration,
                    format!("http_{status}"),
                    text.clone(),
                    Some(truncate_text(&text, RESPONSE_SNIPPET_MAX_CHARS)),
                );
                self.metrics.record(sample);

                if status == 401 && bearer && self.plan.auth.enabled {
                    self.ensure_login(true).await;
                }
            }
            Ok(res) => {
                self.metrics.record(attempt.success(res.status, duration));
                if let Some(mode) = endpoint.capture {
                    self.capture(mode, &res);
                }
            }
            Err(err) => {
                let sample = self.transport_failure(attempt, duration, &err);
                self.metrics.record(sample);
            }
        }
    }

    /// Request headers in precedence order; later entries replace earlier ones with the same
    /// (case-insensitive) name.
    pub fn build_headers(
        &self,
        correlation_id: Uuid,
        endpoint: &EndpointDefinition,
        has_body: bool,
    ) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = Vec::new();
        set_header(&mut headers, "Accept", "application/json");
        set_header(&mut headers, "X-Client-Id", &self.client_id);
        set_header(&mut headers, "X-Correlation-Id", &correlation_id.to_string());
        if has_body {
            set_header(&mut headers, "Content-Type", "application/json");
        }
        for (name, value) in &self.plan.default_headers {
            set_header(&mut headers, name, value);
        }
        if let Some(tenant) = &self.tenant_id {
            set_header(&mut headers, "X-Tenant-Id", tenant);
        }
        if endpoint.auth == AuthMode::Bearer
            && let Some(token) = &self.token
        {
            set_header(&mut headers, "Authorization", &format!("Bearer {token}"));
        }
        for (name, value) in &endpoint.headers {
            set_header(&mut headers, name, value);
        }
        headers
    }

    /// Concrete request path for `endpoint`, with `{orderId}` filled from captured state.
    pub fn resolve_path(&mut self, endpoint: &EndpointDefinition, inject_invalid: bool) -> String {
        let mut path = match &endpoint.invalid_path {
            Some(invalid) if inject_invalid && !invalid.is_empty() => invalid.clone(),
            _ => endpoint.path.clone(),
        };

        if path.contains(ORDER_ID_PLACEHOLDER) {
            path = if !self.order_ids.is_empty() {
                let pick = self.rng.gen_range(0..self.order_ids.len());
                path.replace(ORDER_ID_PLACEHOLDER, &self.order_ids[pick])
            } else if let Some(fallback) = endpoint.fallback_path.as_ref().filter(|p| !p.is_empty())
            {
                fallback.clone()
            } else {
                path.replace(ORDER_ID_PLACEHOLDER, NIL_ORDER_ID)
            };
        }

        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        path
    }

    fn should_inject_error(&mut self) -> bool {
        let rate = self.plan.error_injection_rate_percent;
        rate > 0.0 && self.rng.gen_range(0.0..=100.0) <= rate
    }

    fn capture(&mut self, mode: CaptureMode, res: &HttpResponse) {
        let Ok(body) = serde_json::from_slice::<Value>(&res.body) else {
            return;
        };
        match mode {
            CaptureMode::ClientOrderIds => self.merge_order_ids(&body),
        }
    }

    fn merge_order_ids(&mut self, body: &Value) {
        let Some(obj) = body.as_object() else {
            return;
        };

        let before = self.order_ids.len();
        for field in ORDER_LIST_FIELDS {
            let Some(items) = obj.get(field).and_then(Value::as_array) else {
                continue;
            };
            self.order_ids.extend(
                items
                    .iter()
                    .filter_map(|item| item.get("id"))
                    .filter_map(id_string),
            );
        }

        if self.order_ids.len() != before {
            self.order_ids.sort();
            self.order_ids.dedup();
        }
    }

    fn transport_failure(
        &self,
        attempt: Attempt,
        duration: Duration,
        err: &vuload_http::Error,
    ) -> RequestSample {
        let (kind, message) = if err.is_timeout() {
            (TIMEOUT_ERROR_KIND.to_string(), format!("timeout: {err}"))
        } else {
            let kind = err.transport_error_kind().to_string();
            let message = format!("exception: {kind}: {err}");
            (kind, message)
        };
        attempt.failure(self, None, duration, kind, message, None)
    }
}

/// `LT-<SCENARIO>-<index>`, e.g. `LT-SMOKE-0007`.
pub fn client_id(scenario: &str, index: u64) -> String {
    format!("LT-{}-{index:04}", scenario.to_uppercase())
}

fn resolve_body(endpoint: &EndpointDefinition, inject_invalid: bool) -> Option<&Map<String, Value>> {
    match &endpoint.invalid_body_template {
        Some(invalid) if inject_invalid => Some(invalid),
        _ => endpoint.body_template.as_ref(),
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers
        .iter_mut()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
    {
        Some(slot) => *slot = (name.to_string(), value.to_string()),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

fn token_from_body(body: &[u8], field: &str) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}
