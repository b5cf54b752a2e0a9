use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collector::FailureSample;
use crate::config::{EndpointDefinition, ScenarioSettings};
use crate::percentile::percentile_sorted;

/// Run metadata embedded into the report next to the aggregated figures.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub scenario: String,
    pub base_url: String,
    pub started_at_utc: DateTime<Utc>,
    pub finished_at_utc: DateTime<Utc>,
    /// Measured wall-clock time, independent of the configured duration.
    pub elapsed: Duration,
    pub scenario_config: ScenarioSettings,
    pub resolved_endpoints: Vec<EndpointDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub run_id: Uuid,
    pub scenario: String,
    pub base_url: String,
    pub started_at_utc: DateTime<Utc>,
    pub finished_at_utc: DateTime<Utc>,
    pub duration_seconds: f64,
    pub summary: Summary,
    pub latency_ms: LatencyStats,
    pub status_codes: Vec<StatusCodeCount>,
    pub exceptions: Vec<ExceptionCount>,
    pub top_endpoints_by_hits: Vec<EndpointStats>,
    pub top_endpoints_by_p95: Vec<EndpointStats>,
    pub top_errors: Vec<ErrorEntry>,
    pub failure_samples: Vec<FailureSample>,
    pub scenario_config: ScenarioSettings,
    pub resolved_endpoints: Vec<EndpointDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_rate_percent: f64,
    pub rps_avg: f64,
    pub rps_peak: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencyStats {
    pub fn from_sorted(sorted_ms: &[f64]) -> Self {
        let (Some(min), Some(max)) = (sorted_ms.first(), sorted_ms.last()) else {
            return Self::default();
        };
        let avg = sorted_ms.iter().sum::<f64>() / sorted_ms.len() as f64;

        Self {
            min: round2(*min),
            avg: round2(avg),
            max: round2(*max),
            p50: round2(percentile_sorted(sorted_ms, 50.0)),
            p95: round2(percentile_sorted(sorted_ms, 95.0)),
            p99: round2(percentile_sorted(sorted_ms, 99.0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCodeCount {
    pub status_code: u16,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionCount {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub endpoint: String,
    pub hits: u64,
    pub errors: u64,
    pub error_rate_percent: f64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
}

impl EndpointStats {
    pub fn new(endpoint: String, hits: u64, errors: u64, mut latencies_ms: Vec<f64>) -> Self {
        latencies_ms.sort_by(f64::total_cmp);
        let avg = if latencies_ms.is_empty() {
            0.0
        } else {
            latencies_ms.iter().sum::<f64>() / latencies_ms.len() as f64
        };
        let error_rate = if hits == 0 {
            0.0
        } else {
            errors as f64 / hits as f64 * 100.0
        };

        Self {
            endpoint,
            hits,
            errors,
            error_rate_percent: round2(error_rate),
            avg_latency_ms: round2(avg),
            p95_latency_ms: round2(percentile_sorted(&latencies_ms, 95.0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    pub count: u64,
    /// Sorted.
    pub endpoints: Vec<String>,
}

/// Rounds to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
