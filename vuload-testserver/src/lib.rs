use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_LOGIN: &str = "/api/auth/login";
pub const PATH_ORDERS: &str = "/api/orders";
pub const PATH_ORDER_BY_ID: &str = "/api/orders/{id}";
pub const PATH_HELLO: &str = "/hello";
pub const PATH_PACED: &str = "/paced";
pub const PATH_FAIL: &str = "/fail";
pub const PATH_SLOW: &str = "/slow";

/// Password accepted for every account.
pub const VALID_PASSWORD: &str = "loadtest";

/// Latency of [`PATH_PACED`].
pub const PACED_DELAY: Duration = Duration::from_millis(5);

/// Latency of [`PATH_SLOW`]. Longer than the shortest request timeout a run accepts.
pub const SLOW_DELAY: Duration = Duration::from_millis(1500);

/// Ids listed by [`PATH_ORDERS`]. Only these resolve on [`PATH_ORDER_BY_ID`].
pub const OPEN_ORDER_IDS: [&str; 2] = [
    "5f0c6a52-8d0e-4a51-9b47-1f7c2d6e9a10",
    "a3d1e8b4-2c6f-4f0a-8e5d-7b9c1a2f3e40",
];
pub const FINALIZED_ORDER_IDS: [&str; 1] = ["c7e2f9a1-4b3d-4e6c-9a8f-0d1b2c3e4f50"];

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    logins_ok: Arc<AtomicU64>,
    logins_rejected: Arc<AtomicU64>,
    unauthorized: Arc<AtomicU64>,
    order_lookups: Arc<AtomicU64>,
    saw_client_header: Arc<AtomicU64>,
    saw_tenant_header: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
}

impl TestServerStats {
    fn observe(&self, headers: &HeaderMap) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if headers
            .get("x-client-id")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("LT-"))
        {
            self.saw_client_header.fetch_add(1, Ordering::Relaxed);
        }
        if headers.contains_key("x-tenant-id") {
            self.saw_tenant_header.fetch_add(1, Ordering::Relaxed);
        }
        if headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
        {
            self.saw_json_content_type.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn logins_ok(&self) -> u64 {
        self.logins_ok.load(Ordering::Relaxed)
    }

    pub fn logins_rejected(&self) -> u64 {
        self.logins_rejected.load(Ordering::Relaxed)
    }

    pub fn unauthorized(&self) -> u64 {
        self.unauthorized.load(Ordering::Relaxed)
    }

    pub fn order_lookups(&self) -> u64 {
        self.order_lookups.load(Ordering::Relaxed)
    }

    pub fn saw_client_header(&self) -> u64 {
        self.saw_client_header.load(Ordering::Relaxed)
    }

    pub fn saw_tenant_header(&self) -> u64 {
        self.saw_tenant_header.load(Ordering::Relaxed)
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }
}

/// Shared handler state: counters plus the token generation.
///
/// Tokens embed the generation they were issued in; bumping it revokes every outstanding token.
#[derive(Debug, Clone, Default)]
pub struct ServerState {
    stats: TestServerStats,
    generation: Arc<AtomicU64>,
    issued: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
}

impl ServerState {
    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    fn issue_token(&self) -> String {
        let generation = self.generation.load(Ordering::Relaxed);
        let n = self.issued.fetch_add(1, Ordering::Relaxed);
        format!("tok-{generation}-{n}")
    }

    fn token_is_current(&self, token: &str) -> bool {
        let generation = self.generation.load(Ordering::Relaxed);
        token
            .strip_prefix("tok-")
            .and_then(|rest| rest.split_once('-'))
            .and_then(|(g, _)| g.parse::<u64>().ok())
            == Some(generation)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let ok = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.token_is_current(token));
        if !ok {
            self.stats.unauthorized.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    quantity: i64,
}

async fn handle_login(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    state.stats.observe(&headers);

    let req: LoginRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            state.stats.logins_rejected.fetch_add(1, Ordering::Relaxed);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "malformed login payload" })),
            );
        }
    };

    if req.email.is_empty() || req.password != VALID_PASSWORD {
        state.stats.logins_rejected.fetch_add(1, Ordering::Relaxed);
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": format!("invalid credentials for {}", req.email) })),
        );
    }

    state.stats.logins_ok.fetch_add(1, Ordering::Relaxed);
    (
        StatusCode::OK,
        Json(json!({ "token": state.issue_token(), "email": req.email })),
    )
}

async fn handle_list_orders(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.stats.observe(&headers);
    if !state.authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "token expired" })),
        );
    }

    let open: Vec<Value> = OPEN_ORDER_IDS
        .iter()
        .map(|id| json!({ "id": id, "status": "open" }))
        .collect();
    let finalized: Vec<Value> = FINALIZED_ORDER_IDS
        .iter()
        .map(|id| json!({ "id": id, "status": "finalized" }))
        .collect();

    (
        StatusCode::OK,
        Json(json!({ "openOrders": open, "finalizedOrders": finalized })),
    )
}

async fn handle_get_order(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.stats.observe(&headers);
    state.stats.order_lookups.fetch_add(1, Ordering::Relaxed);
    if !state.authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "token expired" })),
        );
    }

    if OPEN_ORDER_IDS.contains(&id.as_str()) || FINALIZED_ORDER_IDS.contains(&id.as_str()) {
        (StatusCode::OK, Json(json!({ "id": id })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("order {id} not found") })),
        )
    }
}

async fn handle_create_order(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    state.stats.observe(&headers);
    if !state.authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "token expired" })),
        );
    }

    match serde_json::from_slice::<CreateOrderRequest>(&body) {
        Ok(req) if req.quantity > 0 => (
            StatusCode::CREATED,
            Json(json!({ "id": OPEN_ORDER_IDS[0], "quantity": req.quantity })),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "validation failed: quantity must be positive" })),
        ),
    }
}

async fn handle_hello(State(state): State<ServerState>, headers: HeaderMap) -> &'static str {
    state.stats.observe(&headers);
    "Hello World!"
}

async fn handle_paced(State(state): State<ServerState>, headers: HeaderMap) -> &'static str {
    state.stats.observe(&headers);
    sleep(PACED_DELAY).await;
    "paced"
}

async fn handle_slow(State(state): State<ServerState>, headers: HeaderMap) -> &'static str {
    state.stats.observe(&headers);
    sleep(SLOW_DELAY).await;
    "slow"
}

// Every failure message carries a fresh request number and correlation-shaped id.
async fn handle_fail(State(state): State<ServerState>, headers: HeaderMap) -> (StatusCode, String) {
    state.stats.observe(&headers);
    let n = state.failures.fetch_add(1, Ordering::Relaxed) + 100;
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("request 00000000-0000-4000-8000-{n:012} failed after {n} attempts"),
    )
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route(PATH_LOGIN, post(handle_login))
        .route(PATH_ORDERS, get(handle_list_orders).post(handle_create_order))
        .route(PATH_ORDER_BY_ID, get(handle_get_order))
        .route(PATH_HELLO, get(handle_hello))
        .route(PATH_PACED, get(handle_paced))
        .route(PATH_FAIL, get(handle_fail))
        .route(PATH_SLOW, get(handle_slow))
        .with_state(state)
}

pub struct TestServer {
    base_url: String,
    state: ServerState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = ServerState::default();

        let app = router(state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        self.state.stats()
    }

    /// Invalidates every token issued so far; the next bearer request gets a 401.
    pub fn revoke_tokens(&self) {
        self.state.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
