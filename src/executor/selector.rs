use rand::Rng;

use crate::error::{HarnessError, Result};
use crate::models::config_model::EndpointSpec;

/// Weighted random choice over the configured endpoints.
#[derive(Debug, Clone)]
pub struct EndpointSelector {
    endpoints: Vec<EndpointSpec>,
    total_weight: u64,
}

impl EndpointSelector {
    pub fn new(endpoints: Vec<EndpointSpec>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(HarnessError::Config("no endpoints to select from".into()));
        }
        if let Some(endpoint) = endpoints.iter().find(|e| e.weight == 0) {
            return Err(HarnessError::Config(format!(
                "endpoint '{}' has a non-positive weight",
                endpoint.name
            )));
        }

        let total_weight = endpoints.iter().map(|e| u64::from(e.weight)).sum();
        Ok(Self {
            endpoints,
            total_weight,
        })
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn endpoints(&self) -> &[EndpointSpec] {
        &self.endpoints
    }

    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &EndpointSpec {
        let mut remaining = rng.gen_range(0..self.total_weight);
        for endpoint in &self.endpoints {
            let weight = u64::from(endpoint.weight);
            if remaining < weight {
                return endpoint;
            }
            remaining -= weight;
        }
        // remaining < total_weight, so the loop always returns
        &self.endpoints[self.endpoints.len() - 1]
    }
}
