use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{HarnessError, Result};

pub const MAX_CONCURRENT_USERS: usize = 100_000;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadTestConfig {
    pub base_url: String,
    pub api_url: String,
    pub concurrent: usize,
    /// Seconds.
    pub duration: u64,
    /// Seconds.
    pub ramp_up: u64,

    pub think_time_min_ms: u64,
    pub think_time_max_ms: u64,
    pub request_timeout_ms: u64,
    pub grace_period_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(skip)]
    pub verbose: bool,

    pub endpoints: Vec<EndpointSpec>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    pub path: String,
    pub weight: u32,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Frontend,
    Api,
}

impl EndpointSpec {
    pub fn new(name: &str, path: &str, weight: u32) -> Self {
        Self {
            path: path.to_string(),
            weight,
            name: name.to_string(),
            target: None,
        }
    }

    pub fn target(&self) -> Target {
        match self.target {
            Some(target) => target,
            None if self.path.starts_with("/api") => Target::Api,
            None => Target::Frontend,
        }
    }
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8787".to_string(),
            concurrent: 50,
            duration: 60,
            ramp_up: 10,
            think_time_min_ms: 500,
            think_time_max_ms: 2500,
            request_timeout_ms: 10_000,
            grace_period_ms: 12_000,
            seed: None,
            verbose: false,
            endpoints: vec![
                EndpointSpec::new("Homepage", "/", 30),
                EndpointSpec::new("Products", "/products", 25),
                EndpointSpec::new("Product Detail", "/products/1", 15),
                EndpointSpec::new("Cart", "/cart", 10),
                EndpointSpec::new("API Products", "/api/products", 15),
                EndpointSpec::new("API Categories", "/api/categories", 5),
            ],
        }
    }
}

impl LoadTestConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| HarnessError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| HarnessError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(HarnessError::Config("no endpoints configured".into()));
        }
        if let Some(endpoint) = self.endpoints.iter().find(|e| e.weight == 0) {
            return Err(HarnessError::Config(format!(
                "endpoint '{}' has a non-positive weight",
                endpoint.name
            )));
        }
        if self.concurrent == 0 || self.concurrent > MAX_CONCURRENT_USERS {
            return Err(HarnessError::Config(format!(
                "concurrent must be between 1 and {MAX_CONCURRENT_USERS}"
            )));
        }
        if self.duration == 0 {
            return Err(HarnessError::Config("duration must be at least 1 second".into()));
        }
        if self.think_time_min_ms > self.think_time_max_ms {
            return Err(HarnessError::Config(format!(
                "think time range is inverted ({}ms > {}ms)",
                self.think_time_min_ms, self.think_time_max_ms
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(HarnessError::Config("request timeout must be positive".into()));
        }
        // Every in-flight request has either finished or timed out by the drain deadline.
        if self.grace_period_ms < self.request_timeout_ms {
            return Err(HarnessError::Config(format!(
                "grace period ({}ms) must be at least the request timeout ({}ms)",
                self.grace_period_ms, self.request_timeout_ms
            )));
        }

        for base in [&self.base_url, &self.api_url] {
            let parsed = Url::parse(base)
                .map_err(|e| HarnessError::Config(format!("invalid base url '{base}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(HarnessError::Config(format!(
                    "unsupported scheme in '{base}'"
                )));
            }
        }
        for endpoint in &self.endpoints {
            let url = self.resolve_url(endpoint);
            Url::parse(&url).map_err(|e| {
                HarnessError::Config(format!(
                    "endpoint '{}' resolves to invalid url '{url}': {e}",
                    endpoint.name
                ))
            })?;
        }

        Ok(())
    }

    pub fn resolve_url(&self, endpoint: &EndpointSpec) -> String {
        let base = match endpoint.target() {
            Target::Api => &self.api_url,
            Target::Frontend => &self.base_url,
        };
        format!("{}{}", base.trim_end_matches('/'), endpoint.path)
    }

    pub fn test_duration(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    pub fn ramp_up_duration(&self) -> Duration {
        Duration::from_secs(self.ramp_up)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}
