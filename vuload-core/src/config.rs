use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const DEFAULT_VUS: u64 = 10;
pub const DEFAULT_DURATION_SECS: u64 = 30;
pub const DEFAULT_THINK_TIME_MIN_MS: u64 = 100;
pub const DEFAULT_THINK_TIME_MAX_MS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
pub const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_FAILURE_SAMPLE_CAP: usize = 10;
pub const DEFAULT_LOGIN_PATH: &str = "/api/auth/login";
pub const DEFAULT_TOKEN_FIELD: &str = "token";
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;
pub const DEFAULT_MAX_IDLE_PER_HOST: usize = 50;

/// The scenario configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoadConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Tenants assigned round-robin to VUs.
    #[serde(default)]
    pub tenant_ids: Vec<String>,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Headers sent with every endpoint request.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,

    #[serde(default)]
    pub scenarios: BTreeMap<String, ScenarioSettings>,

    #[serde(default)]
    pub endpoints: Vec<EndpointDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Name of the login response field that carries the bearer token.
    #[serde(default = "default_token_field")]
    pub token_field: String,

    /// Accounts assigned round-robin to VUs.
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            login_path: default_login_path(),
            token_field: default_token_field(),
            accounts: Vec::new(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Account {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Shape of one named scenario. Missing values fall back to the documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScenarioSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vus: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp_up_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think_time_min_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think_time_max_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_injection_rate_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    #[serde(alias = "None", alias = "NONE")]
    None,
    #[serde(alias = "Bearer", alias = "BEARER")]
    Bearer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaptureMode {
    /// Collect `id` fields from the `openOrders` and `finalizedOrders` arrays.
    ClientOrderIds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EndpointDefinition {
    /// Parsed case-insensitively when the config is loaded.
    #[serde(default, with = "method_name")]
    pub method: http::Method,

    /// Path template; may contain the `{orderId}` placeholder.
    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_body_template: Option<Map<String, Value>>,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub auth: AuthMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureMode>,

    /// Used instead of `path` when it needs an order id and none has been captured yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl EndpointDefinition {
    pub fn new(method: http::Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            invalid_path: None,
            body_template: None,
            invalid_body_template: None,
            weight: default_weight(),
            auth: AuthMode::None,
            capture: None,
            fallback_path: None,
            headers: BTreeMap::new(),
        }
    }

    /// Aggregation key: `"<METHOD> <path template>"`.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

mod method_name {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        method: &http::Method,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<http::Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let upper = raw.trim().to_ascii_uppercase();
        http::Method::from_bytes(upper.as_bytes())
            .map_err(|_| D::Error::custom(format!("invalid HTTP method `{raw}`")))
    }
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_token_field() -> String {
    DEFAULT_TOKEN_FIELD.to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_weight() -> f64 {
    1.0
}

/// Command-line overrides. Every `Some` wins over the document value.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub base_url: Option<String>,
    pub vus: Option<u64>,
    pub duration: Option<Duration>,
    pub ramp_up: Option<Duration>,
    pub think_time_min_ms: Option<u64>,
    pub think_time_max_ms: Option<u64>,
    /// Replaces the password of every configured account.
    pub auth_password: Option<String>,
    pub request_timeout: Option<Duration>,
    pub seed: Option<u64>,
    pub failure_sample_cap: Option<usize>,
    pub insecure_tls: bool,
    pub max_connections: Option<usize>,
}

/// Inclusive think-time range between two requests of one VU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Fully resolved, validated run shape. Read-only once the run starts.
#[derive(Debug, Clone)]
pub struct ScenarioPlan {
    pub scenario: String,
    /// Without trailing slash.
    pub base_url: String,
    pub vus: u64,
    pub duration: Duration,
    pub ramp_up: Duration,
    pub think_time: ThinkTime,
    pub error_injection_rate_percent: f64,
    pub request_timeout: Duration,
    pub seed: u64,
    pub failure_sample_cap: usize,
    pub insecure_tls: bool,
    pub max_connections: usize,
    pub tenant_ids: Vec<String>,
    pub auth: AuthConfig,
    pub default_headers: BTreeMap<String, String>,
    pub endpoints: Vec<EndpointDefinition>,
    pub description: Option<String>,
}

impl ScenarioPlan {
    /// The resolved scenario shape, echoed into the report.
    pub fn effective_settings(&self) -> ScenarioSettings {
        ScenarioSettings {
            description: self.description.clone(),
            vus: Some(self.vus),
            duration_seconds: Some(self.duration.as_secs()),
            ramp_up_seconds: Some(self.ramp_up.as_secs_f64()),
            think_time_min_ms: Some(self.think_time.min_ms),
            think_time_max_ms: Some(self.think_time.max_ms),
            error_injection_rate_percent: Some(self.error_injection_rate_percent),
        }
    }

    pub fn client_options(&self) -> vuload_http::ClientOptions {
        vuload_http::ClientOptions {
            max_connections: self.max_connections,
            max_idle_per_host: DEFAULT_MAX_IDLE_PER_HOST.min(self.max_connections),
            insecure_tls: self.insecure_tls,
            ..vuload_http::ClientOptions::default()
        }
    }
}

/// Resolves scenario `name` from `config`, applying `cfg` overrides (CLI > document > default).
pub fn plan_scenario(config: &LoadConfig, name: &str, cfg: &RunConfig) -> Result<ScenarioPlan> {
    let settings = config
        .scenarios
        .get(name)
        .ok_or_else(|| Error::UnknownScenario {
            name: name.to_string(),
            available: config
                .scenarios
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let base_url = cfg
        .base_url
        .as_deref()
        .or(config.base_url.as_deref())
        .map(|u| u.trim().trim_end_matches('/'))
        .filter(|u| !u.is_empty())
        .ok_or(Error::MissingBaseUrl)?;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(Error::InvalidBaseUrl(base_url.to_string()));
    }

    if config.endpoints.is_empty() {
        return Err(Error::NoEndpoints);
    }

    let vus = cfg.vus.or(settings.vus).unwrap_or(DEFAULT_VUS);
    if vus == 0 {
        return Err(Error::InvalidVus);
    }

    if let Some(d) = cfg.duration
        && d.subsec_nanos() != 0
    {
        return Err(Error::InvalidDuration(d));
    }
    let duration_secs = cfg
        .duration
        .map(|d| d.as_secs())
        .or(settings.duration_seconds)
        .unwrap_or(DEFAULT_DURATION_SECS)
        .max(1);

    let ramp_up = match cfg.ramp_up {
        Some(d) => d,
        None => {
            let secs = settings.ramp_up_seconds.unwrap_or(0.0);
            if !secs.is_finite() {
                return Err(Error::InvalidRampUp);
            }
            Duration::try_from_secs_f64(secs.max(0.0)).map_err(|_| Error::InvalidRampUp)?
        }
    };

    let think_min = cfg
        .think_time_min_ms
        .or(settings.think_time_min_ms)
        .unwrap_or(DEFAULT_THINK_TIME_MIN_MS);
    let think_max = cfg
        .think_time_max_ms
        .or(settings.think_time_max_ms)
        .unwrap_or(DEFAULT_THINK_TIME_MAX_MS)
        .max(think_min);

    let injection = settings.error_injection_rate_percent.unwrap_or(0.0);
    if !injection.is_finite() || !(0.0..=100.0).contains(&injection) {
        return Err(Error::InvalidInjectionRate);
    }

    let endpoints = config.endpoints.clone();
    for ep in &endpoints {
        if !ep.weight.is_finite() || ep.weight < 0.0 {
            return Err(Error::InvalidWeight(ep.key()));
        }
    }

    let mut auth = config.auth.clone();
    if let Some(password) = cfg.auth_password.as_deref().filter(|p| !p.is_empty()) {
        for account in &mut auth.accounts {
            account.password = password.to_string();
        }
    }

    Ok(ScenarioPlan {
        scenario: name.to_string(),
        base_url: base_url.to_string(),
        vus,
        duration: Duration::from_secs(duration_secs),
        ramp_up,
        think_time: ThinkTime {
            min_ms: think_min,
            max_ms: think_max,
        },
        error_injection_rate_percent: injection,
        request_timeout: cfg
            .request_timeout
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
            .max(MIN_REQUEST_TIMEOUT),
        seed: cfg.seed.unwrap_or(DEFAULT_SEED),
        failure_sample_cap: cfg
            .failure_sample_cap
            .unwrap_or(DEFAULT_FAILURE_SAMPLE_CAP),
        insecure_tls: cfg.insecure_tls,
        max_connections: cfg
            .max_connections
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
            .max(1),
        tenant_ids: config.tenant_ids.clone(),
        auth,
        default_headers: config.default_headers.clone(),
        endpoints,
        description: settings.description.clone(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn sample_config() -> LoadConfig {
        serde_json::from_value(serde_json::json!({
            "baseUrl": "https://api.example.test/",
            "tenantIds": ["t-1", "t-2"],
            "auth": {
                "enabled": true,
                "accounts": [{ "email": "a@example.test", "password": "pw" }]
            },
            "scenarios": {
                "smoke": { "vus": 2, "durationSeconds": 5 },
                "soak": { "vus": 50, "thinkTimeMinMs": 900, "thinkTimeMaxMs": 100 }
            },
            "endpoints": [
                { "path": "/api/orders", "auth": "bearer", "capture": "client_order_ids" },
                { "method": "post", "path": "/api/orders", "weight": 0.5,
                  "bodyTemplate": { "quantity": 1 }, "invalidBodyTemplate": { "quantity": -1 } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn document_defaults_are_applied() {
        let config = sample_config();
        assert_eq!(config.auth.login_path, DEFAULT_LOGIN_PATH);
        assert_eq!(config.auth.token_field, DEFAULT_TOKEN_FIELD);

        let get = &config.endpoints[0];
        assert_eq!(get.method, http::Method::GET);
        assert_eq!(get.weight, 1.0);
        assert_eq!(get.auth, AuthMode::Bearer);
        assert_eq!(get.capture, Some(CaptureMode::ClientOrderIds));

        let plan = plan_scenario(&config, "smoke", &RunConfig::default()).unwrap();
        assert_eq!(plan.base_url, "https://api.example.test");
        assert_eq!(plan.vus, 2);
        assert_eq!(plan.duration, Duration::from_secs(5));
        assert_eq!(plan.ramp_up, Duration::ZERO);
        assert_eq!(
            plan.think_time,
            ThinkTime {
                min_ms: DEFAULT_THINK_TIME_MIN_MS,
                max_ms: DEFAULT_THINK_TIME_MAX_MS
            }
        );
        assert_eq!(plan.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(plan.seed, DEFAULT_SEED);
        assert_eq!(plan.failure_sample_cap, DEFAULT_FAILURE_SAMPLE_CAP);
        assert_eq!(plan.endpoints[1].method, http::Method::POST);
        assert_eq!(plan.endpoints[1].key(), "POST /api/orders");
    }

    #[test]
    fn cli_overrides_win_over_document_values() {
        let config = sample_config();
        let cfg = RunConfig {
            base_url: Some("http://127.0.0.1:9000".to_string()),
            vus: Some(7),
            duration: Some(Duration::from_secs(3)),
            ramp_up: Some(Duration::from_secs(2)),
            think_time_min_ms: Some(0),
            think_time_max_ms: Some(0),
            auth_password: Some("override".to_string()),
            request_timeout: Some(Duration::from_millis(10)),
            seed: Some(7),
            ..RunConfig::default()
        };

        let plan = plan_scenario(&config, "smoke", &cfg).unwrap();
        assert_eq!(plan.base_url, "http://127.0.0.1:9000");
        assert_eq!(plan.vus, 7);
        assert_eq!(plan.duration, Duration::from_secs(3));
        assert_eq!(plan.ramp_up, Duration::from_secs(2));
        assert_eq!(plan.think_time, ThinkTime { min_ms: 0, max_ms: 0 });
        assert_eq!(plan.auth.accounts[0].password, "override");
        // Timeouts below one second are raised to the minimum.
        assert_eq!(plan.request_timeout, MIN_REQUEST_TIMEOUT);
        assert_eq!(plan.seed, 7);
    }

    #[test]
    fn think_time_max_is_clamped_to_min() {
        let plan = plan_scenario(&sample_config(), "soak", &RunConfig::default()).unwrap();
        assert_eq!(
            plan.think_time,
            ThinkTime {
                min_ms: 900,
                max_ms: 900
            }
        );
        assert_eq!(plan.duration, Duration::from_secs(DEFAULT_DURATION_SECS));
    }

    #[test]
    fn zero_duration_is_raised_to_one_second() {
        let cfg = RunConfig {
            duration: Some(Duration::ZERO),
            ..RunConfig::default()
        };
        let plan = plan_scenario(&sample_config(), "smoke", &cfg).unwrap();
        assert_eq!(plan.duration, Duration::from_secs(1));
    }

    #[test]
    fn fractional_duration_override_is_rejected() {
        let cfg = RunConfig {
            duration: Some(Duration::from_millis(1_500)),
            ..RunConfig::default()
        };
        let err = plan_scenario(&sample_config(), "smoke", &cfg).unwrap_err();
        assert!(matches!(err, Error::InvalidDuration(d) if d == Duration::from_millis(1_500)));

        let cfg = RunConfig {
            duration: Some(Duration::from_millis(2_000)),
            ..RunConfig::default()
        };
        let plan = plan_scenario(&sample_config(), "smoke", &cfg).unwrap();
        assert_eq!(plan.duration, Duration::from_secs(2));
        assert_eq!(plan.effective_settings().duration_seconds, Some(2));
    }

    #[test]
    fn configuration_errors_are_reported() {
        let config = sample_config();

        let err = plan_scenario(&config, "missing", &RunConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownScenario { .. }));
        assert!(err.to_string().contains("smoke, soak"), "{err}");

        let mut no_url = config.clone();
        no_url.base_url = None;
        assert!(matches!(
            plan_scenario(&no_url, "smoke", &RunConfig::default()),
            Err(Error::MissingBaseUrl)
        ));

        let mut bad_url = config.clone();
        bad_url.base_url = Some("ftp://example.test".to_string());
        assert!(matches!(
            plan_scenario(&bad_url, "smoke", &RunConfig::default()),
            Err(Error::InvalidBaseUrl(_))
        ));

        let mut no_endpoints = config.clone();
        no_endpoints.endpoints.clear();
        assert!(matches!(
            plan_scenario(&no_endpoints, "smoke", &RunConfig::default()),
            Err(Error::NoEndpoints)
        ));

        let zero_vus = RunConfig {
            vus: Some(0),
            ..RunConfig::default()
        };
        assert!(matches!(
            plan_scenario(&config, "smoke", &zero_vus),
            Err(Error::InvalidVus)
        ));

        let mut negative_weight = config.clone();
        negative_weight.endpoints[0].weight = -1.0;
        assert!(matches!(
            plan_scenario(&negative_weight, "smoke", &RunConfig::default()),
            Err(Error::InvalidWeight(_))
        ));

        let mut bad_rate = config;
        if let Some(s) = bad_rate.scenarios.get_mut("smoke") {
            s.error_injection_rate_percent = Some(150.0);
        }
        assert!(matches!(
            plan_scenario(&bad_rate, "smoke", &RunConfig::default()),
            Err(Error::InvalidInjectionRate)
        ));
    }

    #[test]
    fn endpoint_methods_are_parsed_when_loading() {
        let ep: EndpointDefinition =
            serde_json::from_value(serde_json::json!({ "method": " patch ", "path": "/x" }))
                .unwrap();
        assert_eq!(ep.method, http::Method::PATCH);
        assert_eq!(ep.key(), "PATCH /x");
        assert_eq!(serde_json::to_value(&ep).unwrap()["method"], "PATCH");

        let ep: EndpointDefinition =
            serde_json::from_value(serde_json::json!({ "path": "/y" })).unwrap();
        assert_eq!(ep.method, http::Method::GET);

        let err = serde_json::from_value::<EndpointDefinition>(
            serde_json::json!({ "method": "GE T", "path": "/x" }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid HTTP method"), "{err}");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_value::<LoadConfig>(serde_json::json!({
            "baseUrl": "http://x",
            "endpoint": []
        }))
        .unwrap_err();
        assert!(err.to_string().contains("endpoint"), "{err}");

        let err = serde_json::from_value::<EndpointDefinition>(serde_json::json!({
            "path": "/x",
            "bodyTemplate": [1, 2]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("map"), "{err}");
    }

    #[test]
    fn account_debug_redacts_password() {
        let account = Account {
            email: "a@example.test".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{account:?}");
        assert!(rendered.contains("a@example.test"));
        assert!(!rendered.contains("hunter2"));
    }
}
