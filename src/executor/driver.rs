use colored::*;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::client::{is_success, send_get, HttpsClient};
use crate::error::RequestError;
use crate::executor::aggregator::ResultAggregator;
use crate::executor::phase::RunSignal;
use crate::executor::selector::EndpointSelector;
use crate::models::config_model::LoadTestConfig;
use crate::models::metrics::RequestOutcome;

/// One simulated shopper issuing requests back to back with think time.
pub struct VirtualUser {
    pub id: usize,
    pub client: Arc<HttpsClient>,
    pub config: Arc<LoadTestConfig>,
    pub selector: Arc<EndpointSelector>,
    pub aggregator: Arc<ResultAggregator>,
    pub signal: Arc<RunSignal>,
    pub rng: StdRng,
}

impl VirtualUser {
    /// Returns the number of requests this user completed.
    pub async fn run(mut self) -> u64 {
        tracing::debug!(user = self.id, "virtual user started");
        let mut completed = 0;

        while self.signal.is_running() {
            let outcome = self.request_once().await;
            if self.config.verbose {
                print_outcome(&outcome);
            }
            self.aggregator.record(outcome);
            completed += 1;

            if !self.signal.is_running() {
                break;
            }
            let think = self.think_time();
            self.signal.pause(think).await;
        }

        tracing::debug!(user = self.id, completed, "virtual user stopped");
        completed
    }

    async fn request_once(&mut self) -> RequestOutcome {
        let endpoint = self.selector.select(&mut self.rng);
        let url = self.config.resolve_url(endpoint);
        let limit = self.config.request_timeout();

        let in_flight = self.aggregator.request_started();
        let request_start = Instant::now();
        let result = timeout(limit, send_get(&self.client, &url)).await;
        let elapsed = request_start.elapsed().as_millis() as u64;
        drop(in_flight);

        match result {
            Ok(Ok(status)) if is_success(status) => {
                RequestOutcome::succeeded(&endpoint.name, &url, elapsed, status.as_u16())
            }
            Ok(Ok(status)) => {
                let error = RequestError::HttpStatus {
                    code: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                };
                tracing::debug!(user = self.id, endpoint = %endpoint.name, %error, "request failed");
                RequestOutcome::failed(&endpoint.name, &url, elapsed, error)
            }
            Ok(Err(error)) => {
                tracing::debug!(user = self.id, endpoint = %endpoint.name, %error, "request failed");
                RequestOutcome::failed(&endpoint.name, &url, elapsed, error)
            }
            Err(_) => {
                let error = RequestError::Timeout(limit.as_millis() as u64);
                tracing::debug!(user = self.id, endpoint = %endpoint.name, %error, "request timed out");
                RequestOutcome::failed(&endpoint.name, &url, elapsed, error)
            }
        }
    }

    fn think_time(&mut self) -> Duration {
        let ms = self
            .rng
            .gen_range(self.config.think_time_min_ms..=self.config.think_time_max_ms);
        Duration::from_millis(ms)
    }
}

fn print_outcome(outcome: &RequestOutcome) {
    let duration = format!("{}ms", outcome.response_time_ms);
    if outcome.success {
        println!(
            "{} {} {} {} {}",
            "status :".green().bold(),
            outcome.status_key().bold(),
            "| duration :".blue().bold(),
            duration.bold(),
            outcome.endpoint_name.dimmed()
        );
    } else {
        let label = match &outcome.error {
            Some(RequestError::Timeout(_)) => "Network Error (Timeout)".to_string(),
            Some(RequestError::Network(_)) => "REQUEST_ERROR".to_string(),
            _ => outcome.status_key(),
        };
        eprintln!(
            "{} {} {} {} {}",
            "status :".red().bold(),
            label.red().bold(),
            "| duration :".blue().bold(),
            duration.bold(),
            outcome.endpoint_name.dimmed()
        );
    }
}
