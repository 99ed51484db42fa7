use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

/// Lifecycle of one harness run. Ramping is a sub-interval of Running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HarnessPhase {
    Idle,
    Ramping,
    Running,
    Draining,
    Reporting,
    Done,
}

impl HarnessPhase {
    pub fn next(self) -> Option<HarnessPhase> {
        match self {
            HarnessPhase::Idle => Some(HarnessPhase::Ramping),
            HarnessPhase::Ramping => Some(HarnessPhase::Running),
            HarnessPhase::Running => Some(HarnessPhase::Draining),
            HarnessPhase::Draining => Some(HarnessPhase::Reporting),
            HarnessPhase::Reporting => Some(HarnessPhase::Done),
            HarnessPhase::Done => None,
        }
    }
}

impl fmt::Display for HarnessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HarnessPhase::Idle => "idle",
            HarnessPhase::Ramping => "ramping",
            HarnessPhase::Running => "running",
            HarnessPhase::Draining => "draining",
            HarnessPhase::Reporting => "reporting",
            HarnessPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct PhaseTracker {
    current: HarnessPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: HarnessPhase::Idle,
        }
    }
}

impl PhaseTracker {
    pub fn current(&self) -> HarnessPhase {
        self.current
    }

    /// Steps forward one phase at a time until `target`, so no phase is skipped.
    /// Targets at or behind the current phase are ignored.
    pub fn advance_to(&mut self, target: HarnessPhase) {
        while self.current < target {
            let Some(next) = self.current.next() else {
                break;
            };
            tracing::info!(from = %self.current, to = %next, "harness phase");
            self.current = next;
        }
    }
}

/// Run flag shared by the scheduler and every virtual user.
#[derive(Debug)]
pub struct RunSignal {
    running: AtomicBool,
    stopped: Notify,
}

impl Default for RunSignal {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(true),
            stopped: Notify::new(),
        }
    }
}

impl RunSignal {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stopped.notify_waiters();
    }

    /// Sleeps for `duration`, waking early if the run is stopped.
    pub async fn pause(&self, duration: Duration) {
        let stopped = self.stopped.notified();
        tokio::pin!(stopped);
        stopped.as_mut().enable();
        if !self.is_running() {
            return;
        }
        tokio::select! {
            _ = sleep(duration) => {}
            _ = stopped => {}
        }
    }
}
