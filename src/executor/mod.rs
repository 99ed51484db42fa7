pub mod aggregator;
pub mod driver;
pub mod phase;
pub mod selector;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio::time::{sleep, sleep_until, timeout_at, Instant};

use crate::client::build_client;
use crate::error::Result;
use crate::models::config_model::LoadTestConfig;
use crate::models::report::Report;
use crate::report::build_report;
use crate::utils::hardware::get_hardware_info;

use aggregator::ResultAggregator;
use driver::VirtualUser;
use phase::{HarnessPhase, PhaseTracker, RunSignal};
use selector::EndpointSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    DurationElapsed,
    Interrupted,
}

/// Runs the whole test and returns the finished report.
///
/// `shutdown` resolving has the same effect as the duration timer expiring,
/// which is how an interrupt signal is wired in.
pub async fn run_load_test<F>(config: LoadTestConfig, shutdown: F) -> Result<Report>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    let selector = Arc::new(EndpointSelector::new(config.endpoints.clone())?);

    let client = Arc::new(build_client());
    let config = Arc::new(config);
    let signal = Arc::new(RunSignal::default());
    let started_at = Utc::now();
    let aggregator = Arc::new(ResultAggregator::new(started_at));
    let mut phases = PhaseTracker::default();

    tracing::info!(
        users = config.concurrent,
        duration_secs = config.duration,
        ramp_up_secs = config.ramp_up,
        endpoints = selector.endpoints().len(),
        "starting load test"
    );

    phases.advance_to(HarnessPhase::Ramping);

    let start = Instant::now();
    let stagger = stagger_interval(config.ramp_up_duration(), config.concurrent);
    let deadline = sleep(config.test_duration());
    tokio::pin!(deadline);
    tokio::pin!(shutdown);

    let mut handles: Vec<JoinHandle<u64>> = Vec::with_capacity(config.concurrent);
    let reason = loop {
        let started = u32::try_from(handles.len()).unwrap_or(u32::MAX);
        let next_start = start + stagger.saturating_mul(started);
        let ramping = handles.len() < config.concurrent;

        tokio::select! {
            biased;
            _ = &mut shutdown => break StopReason::Interrupted,
            _ = &mut deadline => break StopReason::DurationElapsed,
            _ = sleep_until(next_start), if ramping => {
                if !signal.is_running() {
                    break StopReason::Interrupted;
                }
                let id = handles.len();
                let user = VirtualUser {
                    id,
                    client: Arc::clone(&client),
                    config: Arc::clone(&config),
                    selector: Arc::clone(&selector),
                    aggregator: Arc::clone(&aggregator),
                    signal: Arc::clone(&signal),
                    rng: user_rng(config.seed, id),
                };
                handles.push(task::spawn(user.run()));
                tracing::debug!(user = id, "spawned virtual user");

                if handles.len() == config.concurrent {
                    phases.advance_to(HarnessPhase::Running);
                }
            }
        }
    };

    signal.stop();
    let ended_at = Utc::now();
    tracing::info!(
        ?reason,
        users_started = handles.len(),
        in_flight = aggregator.in_flight(),
        "stopping load test"
    );
    phases.advance_to(HarnessPhase::Draining);

    // The grace period is at least the request timeout, so by this deadline every
    // request in flight at stop has been recorded as finished or timed out.
    let drain_deadline = Instant::now() + config.grace_period();
    let mut stragglers = 0;
    for mut handle in handles {
        match timeout_at(drain_deadline, &mut handle).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "virtual user task failed"),
            Err(_) => {
                handle.abort();
                stragglers += 1;
            }
        }
    }
    if stragglers > 0 {
        tracing::warn!(stragglers, "grace period elapsed before all users stopped");
    }

    phases.advance_to(HarnessPhase::Reporting);
    let state = aggregator.freeze(ended_at);
    let report = build_report(config.as_ref().clone(), state, get_hardware_info());
    phases.advance_to(HarnessPhase::Done);

    Ok(report)
}

/// Linear ramp: user `i` starts at `i * (ramp_up / users)`.
pub fn stagger_interval(ramp_up: Duration, users: usize) -> Duration {
    match u32::try_from(users) {
        Ok(0) => Duration::ZERO,
        Ok(users) => ramp_up / users,
        Err(_) => ramp_up.div_f64(users as f64),
    }
}

fn user_rng(seed: Option<u64>, id: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
        None => StdRng::from_entropy(),
    }
}
