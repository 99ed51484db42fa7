use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::RequestError;

/// One completed request as seen by a virtual user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutcome {
    pub endpoint_name: String,
    pub url: String,
    pub response_time_ms: u64,
    pub status_code: Option<u16>,
    pub success: bool,
    pub error: Option<RequestError>,
    pub timestamp: DateTime<Utc>,
}

impl RequestOutcome {
    pub fn succeeded(endpoint_name: &str, url: &str, response_time_ms: u64, status: u16) -> Self {
        Self {
            endpoint_name: endpoint_name.to_string(),
            url: url.to_string(),
            response_time_ms,
            status_code: Some(status),
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(endpoint_name: &str, url: &str, response_time_ms: u64, error: RequestError) -> Self {
        Self {
            endpoint_name: endpoint_name.to_string(),
            url: url.to_string(),
            response_time_ms,
            status_code: error.status_code(),
            success: false,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    pub fn status_key(&self) -> String {
        match (&self.error, self.status_code) {
            (Some(error), _) => error.label(),
            (None, Some(code)) => code.to_string(),
            (None, None) => "UNKNOWN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub endpoint_name: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub error: RequestError,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct EndpointTally {
    pub requests: u64,
    pub failures: u64,
}

/// Frozen results of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateState {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub concurrent_users: u64,
    pub max_concurrent_users: u64,

    pub response_times: Vec<u64>,
    pub errors: Vec<ErrorRecord>,

    pub status_counts: BTreeMap<String, u64>,
    pub endpoints: BTreeMap<String, EndpointTally>,

    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl AggregateState {
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            concurrent_users: 0,
            max_concurrent_users: 0,
            response_times: Vec::new(),
            errors: Vec::new(),
            status_counts: BTreeMap::new(),
            endpoints: BTreeMap::new(),
            started_at,
            ended_at: started_at,
        }
    }

    pub(crate) fn apply(&mut self, outcome: RequestOutcome) {
        self.total_requests += 1;
        self.response_times.push(outcome.response_time_ms);
        *self.status_counts.entry(outcome.status_key()).or_insert(0) += 1;

        let tally = self.endpoints.entry(outcome.endpoint_name.clone()).or_default();
        tally.requests += 1;

        if outcome.success {
            self.successful_requests += 1;
            return;
        }

        self.failed_requests += 1;
        tally.failures += 1;
        if let Some(error) = outcome.error {
            self.errors.push(ErrorRecord {
                endpoint_name: outcome.endpoint_name,
                url: outcome.url,
                status_code: outcome.status_code,
                error,
                timestamp: outcome.timestamp,
            });
        }
    }
}
