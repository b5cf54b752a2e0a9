#![forbid(unsafe_code)]

mod collector;
mod config;
mod error;
mod normalize;
mod percentile;
mod report;
mod select;
mod session;

pub mod runner;

pub use collector::{FailureSample, MetricsCollector, REQUEST_FAILED, RequestCounts, RequestSample};
pub use config::{
    Account, AuthConfig, AuthMode, CaptureMode, DEFAULT_FAILURE_SAMPLE_CAP, DEFAULT_LOGIN_PATH,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SEED, DEFAULT_TOKEN_FIELD, EndpointDefinition, LoadConfig,
    MIN_REQUEST_TIMEOUT, RunConfig, ScenarioPlan, ScenarioSettings, ThinkTime, plan_scenario,
};
pub use error::{Error, Result};
pub use normalize::{ErrorNormalizer, MAX_NORMALIZED_LEN, UNKNOWN_ERROR, truncate_text};
pub use percentile::{percentile, percentile_sorted};
pub use report::{
    EndpointStats, ErrorEntry, ExceptionCount, LatencyStats, Report, RunMetadata,
    StatusCodeCount, Summary,
};
pub use select::weighted_choice;
pub use session::{
    LOGIN_ENDPOINT_KEY, LOGIN_ERROR_KIND, NIL_ORDER_ID, ORDER_ID_PLACEHOLDER, TIMEOUT_ERROR_KIND,
    VuSession, client_id,
};
