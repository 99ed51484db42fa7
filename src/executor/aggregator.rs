use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::metrics::{AggregateState, RequestOutcome};

/// Shared sink every virtual user records into.
#[derive(Debug)]
pub struct ResultAggregator {
    state: Mutex<AggregateState>,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
}

impl ResultAggregator {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(AggregateState::empty(started_at)),
            in_flight: AtomicU64::new(0),
            max_in_flight: AtomicU64::new(0),
        }
    }

    /// Counts a request as in flight until the returned guard is dropped,
    /// including when the owning task is aborted.
    pub fn request_started(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight { aggregator: self }
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn record(&self, outcome: RequestOutcome) {
        self.lock().apply(outcome);
    }

    /// Copies the state out. Only meaningful once the drivers have drained.
    pub fn freeze(&self, ended_at: DateTime<Utc>) -> AggregateState {
        let mut state = self.lock().clone();
        state.concurrent_users = self.in_flight.load(Ordering::SeqCst);
        state.max_concurrent_users = self.max_in_flight.load(Ordering::SeqCst);
        state.ended_at = ended_at;
        state
    }

    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[must_use = "the request stops counting as in flight when this is dropped"]
#[derive(Debug)]
pub struct InFlight<'a> {
    aggregator: &'a ResultAggregator,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.aggregator.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_counted_exactly_once() {
        let aggregator = Arc::new(ResultAggregator::new(Utc::now()));
        let tasks = 16;
        let per_task = 250;

        let handles: Vec<_> = (0..tasks)
            .map(|t| {
                let aggregator = Arc::clone(&aggregator);
                tokio::spawn(async move {
                    for i in 0..per_task {
                        let in_flight = aggregator.request_started();
                        let outcome = if i % 5 == 0 {
                            RequestOutcome::failed("E", "/e", i, RequestError::Timeout(10))
                        } else {
                            RequestOutcome::succeeded("E", "/e", i + t, 200)
                        };
                        drop(in_flight);
                        aggregator.record(outcome);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let state = aggregator.freeze(Utc::now());
        assert_eq!(state.total_requests, tasks * per_task);
        assert_eq!(state.response_times.len() as u64, tasks * per_task);
        assert_eq!(state.failed_requests, tasks * per_task / 5);
        assert_eq!(state.errors.len() as u64, state.failed_requests);
        assert_eq!(
            state.successful_requests + state.failed_requests,
            state.total_requests
        );
        assert_eq!(state.concurrent_users, 0);
        assert!(state.max_concurrent_users >= 1 && state.max_concurrent_users <= tasks);
    }

    #[test]
    fn tracks_running_maximum() {
        let aggregator = ResultAggregator::new(Utc::now());
        let a = aggregator.request_started();
        let b = aggregator.request_started();
        let c = aggregator.request_started();
        drop(a);
        let d = aggregator.request_started();
        drop(b);
        drop(d);
        let _still_running = c;

        let state = aggregator.freeze(Utc::now());
        assert_eq!(state.concurrent_users, 1);
        assert_eq!(state.max_concurrent_users, 3);
    }

    #[tokio::test]
    async fn aborted_request_leaves_no_user_in_flight() {
        let aggregator = Arc::new(ResultAggregator::new(Utc::now()));
        let worker = Arc::clone(&aggregator);
        let handle = tokio::spawn(async move {
            let _in_flight = worker.request_started();
            std::future::pending::<()>().await;
        });

        while aggregator.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let state = aggregator.freeze(Utc::now());
        assert_eq!(state.concurrent_users, 0);
        assert_eq!(state.max_concurrent_users, 1);
    }

    #[test]
    fn breaks_down_by_status_and_endpoint() {
        let aggregator = ResultAggregator::new(Utc::now());
        aggregator.record(RequestOutcome::succeeded("Home", "/", 12, 200));
        aggregator.record(RequestOutcome::succeeded("Home", "/", 15, 304));
        aggregator.record(RequestOutcome::failed(
            "Cart",
            "/cart",
            40,
            RequestError::HttpStatus {
                code: 500,
                reason: "Internal Server Error".into(),
            },
        ));
        aggregator.record(RequestOutcome::failed(
            "Cart",
            "/cart",
            3,
            RequestError::Network("refused".into()),
        ));

        let state = aggregator.freeze(Utc::now());
        assert_eq!(state.status_counts["200"], 1);
        assert_eq!(state.status_counts["304"], 1);
        assert_eq!(state.status_counts["500"], 1);
        assert_eq!(state.status_counts["REQUEST_ERROR"], 1);
        assert_eq!(state.endpoints["Home"].requests, 2);
        assert_eq!(state.endpoints["Home"].failures, 0);
        assert_eq!(state.endpoints["Cart"].failures, 2);
        assert_eq!(state.errors[0].status_code, Some(500));
        assert_eq!(state.errors[1].status_code, None);
    }
}
