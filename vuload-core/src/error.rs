pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("http client error: {0}")]
    Http(#[from] vuload_http::Error),

    #[error("invalid error pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("scenario `{name}` not found (available: {available})")]
    UnknownScenario { name: String, available: String },

    #[error("`baseUrl` is missing from the config and was not given on the command line")]
    MissingBaseUrl,

    #[error("invalid `baseUrl`: `{0}` (expected an http:// or https:// URL)")]
    InvalidBaseUrl(String),

    #[error("`endpoints` must be a non-empty list")]
    NoEndpoints,

    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`errorInjectionRatePercent` must be between 0 and 100")]
    InvalidInjectionRate,

    #[error("run duration `{0:?}` must be a whole number of seconds")]
    InvalidDuration(std::time::Duration),

    #[error("`rampUpSeconds` must be a finite, non-negative number")]
    InvalidRampUp,

    #[error("endpoint `{0}`: `weight` must be a finite, non-negative number")]
    InvalidWeight(String),

    #[error("metrics collector is still shared after all virtual users joined")]
    CollectorShared,

    #[error("run interrupted")]
    Interrupted,
}
