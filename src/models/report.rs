use serde::Serialize;

use crate::models::config_model::LoadTestConfig;
use crate::models::metrics::AggregateState;
use crate::utils::hardware::HostInfo;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub config: LoadTestConfig,
    pub results: AggregateState,
    pub summary: Summary,
    pub errors: Vec<ErrorGroup>,
    pub host: HostInfo,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub duration_seconds: f64,
    pub requests_per_second: f64,
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub percentiles: Percentiles,
    pub min_time: u64,
    pub max_time: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Percentiles {
    pub p50: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorGroup {
    pub endpoint_name: String,
    pub message: String,
    pub status_code: Option<u16>,
    pub count: u64,
}
