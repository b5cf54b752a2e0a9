use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::normalize::ErrorNormalizer;
use crate::report::{
    EndpointStats, ErrorEntry, ExceptionCount, LatencyStats, Report, RunMetadata,
    StatusCodeCount, Summary, round2,
};

/// Message used in the error catalog when a failure carries neither a message nor a kind.
pub const REQUEST_FAILED: &str = "request_failed";

const TOP_N: usize = 10;

/// One failed request, kept verbatim in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureSample {
    pub timestamp_utc: DateTime<Utc>,
    pub client_id: String,
    pub correlation_id: Uuid,
    pub endpoint: String,
    pub method: String,
    pub path: String,
    /// `None` for transport failures.
    pub status_code: Option<u16>,
    pub duration_ms: f64,
    pub error_type: String,
    /// Normalized error message.
    pub error_message: String,
    pub request_body: Option<String>,
    pub response_snippet: Option<String>,
}

/// Everything one request contributes to the aggregate.
#[derive(Debug, Clone)]
pub struct RequestSample {
    pub endpoint_key: String,
    pub status: Option<u16>,
    pub duration: Duration,
    /// When the request was sent; selects the per-second bucket.
    pub started_at: Instant,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub failure_sample: Option<FailureSample>,
}

impl RequestSample {
    /// A request is a failure when it carries an error kind or an HTTP status of 400 or above.
    pub fn is_failure(&self) -> bool {
        self.error_kind.is_some() || self.status.is_some_and(|s| s >= 400)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct EndpointBucket {
    hits: u64,
    errors: u64,
    latencies_ms: Vec<f64>,
}

#[derive(Debug, Default)]
struct CatalogEntry {
    count: u64,
    endpoints: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct CollectorState {
    counts: RequestCounts,
    latencies_ms: Vec<f64>,
    status_codes: AHashMap<u16, u64>,
    error_kinds: AHashMap<String, u64>,
    endpoints: AHashMap<String, EndpointBucket>,
    per_second: AHashMap<u64, u64>,
    error_catalog: AHashMap<String, CatalogEntry>,
    failure_samples: Vec<FailureSample>,
}

/// Shared aggregation sink for one scenario run.
///
/// Each [`record`](Self::record) updates the global counters and one endpoint bucket under a
/// single lock, so `total == successful + failed` holds at every observation point.
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    failure_sample_cap: usize,
    normalizer: ErrorNormalizer,
    state: Mutex<CollectorState>,
}

impl MetricsCollector {
    pub fn new(started: Instant, failure_sample_cap: usize) -> Result<Self> {
        Ok(Self {
            started,
            failure_sample_cap,
            normalizer: ErrorNormalizer::new()?,
            state: Mutex::new(CollectorState::default()),
        })
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn normalizer(&self) -> &ErrorNormalizer {
        &self.normalizer
    }

    pub fn record(&self, sample: RequestSample) {
        let failed = sample.is_failure();
        let duration_ms = sample.duration.as_nanos() as f64 / 1_000_000.0;
        let bucket = sample
            .started_at
            .saturating_duration_since(self.started)
            .as_secs();

        // Regex work happens outside the lock.
        let catalog_key = failed.then(|| {
            let raw = sample
                .error_message
                .as_deref()
                .filter(|m| !m.is_empty())
                .or(sample.error_kind.as_deref())
                .unwrap_or(REQUEST_FAILED);
            self.normalizer.normalize(raw)
        });

        let mut state = self.state.lock();
        let state = &mut *state;

        state.counts.total += 1;
        state.latencies_ms.push(duration_ms);
        *state.per_second.entry(bucket).or_insert(0) += 1;
        if let Some(status) = sample.status {
            *state.status_codes.entry(status).or_insert(0) += 1;
        }

        let endpoint = state
            .endpoints
            .entry(sample.endpoint_key.clone())
            .or_default();
        endpoint.hits += 1;
        endpoint.latencies_ms.push(duration_ms);

        let Some(catalog_key) = catalog_key else {
            state.counts.successful += 1;
            return;
        };

        state.counts.failed += 1;
        endpoint.errors += 1;

        let entry = state.error_catalog.entry(catalog_key).or_default();
        entry.count += 1;
        entry.endpoints.insert(sample.endpoint_key);

        if let Some(kind) = sample.error_kind {
            *state.error_kinds.entry(kind).or_insert(0) += 1;
        }

        if let Some(failure) = sample.failure_sample
            && state.failure_samples.len() < self.failure_sample_cap
        {
            state.failure_samples.push(failure);
        }
    }

    pub fn counts(&self) -> RequestCounts {
        self.state.lock().counts
    }

    /// Builds the report from the final state. Consumes the collector, so it runs once.
    pub fn into_report(self, meta: RunMetadata) -> Report {
        let state = self.state.into_inner();
        let RequestCounts {
            total,
            successful,
            failed,
        } = state.counts;

        let elapsed_secs = meta.elapsed.as_secs_f64();
        let rps_avg = total as f64 / elapsed_secs.max(0.001);
        let rps_peak = state.per_second.values().copied().max().unwrap_or(0);

        let mut latencies = state.latencies_ms;
        latencies.sort_by(f64::total_cmp);
        let latency_ms = LatencyStats::from_sorted(&latencies);

        let pct = |count: u64| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            }
        };

        let mut status_codes: Vec<StatusCodeCount> = state
            .status_codes
            .into_iter()
            .map(|(status_code, count)| StatusCodeCount {
                status_code,
                count,
                percentage: round2(pct(count)),
            })
            .collect();
        status_codes.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.status_code.cmp(&b.status_code))
        });

        let mut exceptions: Vec<ExceptionCount> = state
            .error_kinds
            .into_iter()
            .map(|(kind, count)| ExceptionCount { kind, count })
            .collect();
        exceptions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(&b.kind)));

        let endpoint_stats: Vec<EndpointStats> = state
            .endpoints
            .into_iter()
            .map(|(endpoint, bucket)| {
                EndpointStats::new(endpoint, bucket.hits, bucket.errors, bucket.latencies_ms)
            })
            .collect();

        let mut top_endpoints_by_hits = endpoint_stats.clone();
        top_endpoints_by_hits.sort_by(|a, b| {
            b.hits
                .cmp(&a.hits)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        top_endpoints_by_hits.truncate(TOP_N);

        let mut top_endpoints_by_p95 = endpoint_stats;
        top_endpoints_by_p95.sort_by(|a, b| {
            b.p95_latency_ms
                .total_cmp(&a.p95_latency_ms)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        top_endpoints_by_p95.truncate(TOP_N);

        let mut top_errors: Vec<ErrorEntry> = state
            .error_catalog
            .into_iter()
            .map(|(message, entry)| ErrorEntry {
                message,
                count: entry.count,
                endpoints: entry.endpoints.into_iter().collect(),
            })
            .collect();
        top_errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        top_errors.truncate(TOP_N);

        let failure_samples = state
            .failure_samples
            .into_iter()
            .map(|mut s| {
                s.duration_ms = round2(s.duration_ms);
                s
            })
            .collect();

        Report {
            run_id: meta.run_id,
            scenario: meta.scenario,
            base_url: meta.base_url,
            started_at_utc: meta.started_at_utc,
            finished_at_utc: meta.finished_at_utc,
            duration_seconds: round2(elapsed_secs),
            summary: Summary {
                total_requests: total,
                successful_requests: successful,
                failed_requests: failed,
                error_rate_percent: round2(pct(failed)),
                rps_avg: round2(rps_avg),
                rps_peak,
            },
            latency_ms,
            status_codes,
            exceptions,
            top_endpoints_by_hits,
            top_endpoints_by_p95,
            top_errors,
            failure_samples,
            scenario_config: meta.scenario_config,
            resolved_endpoints: meta.resolved_endpoints,
        }
    }
}
