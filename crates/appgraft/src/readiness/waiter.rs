//! The polling engine.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::checks::ReadinessCheck;
use crate::cluster::ClusterHandle;
use crate::error::{GraftError, Result};
use crate::settings::WaitSettings;

/// Polling cadence and bounds for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub interval: Duration,
    pub timeout: Duration,
    /// Converge immediately without touching the cluster.
    pub dry_run: bool,
}

impl WaitOptions {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            dry_run: false,
        }
    }

    pub fn from_settings(settings: &WaitSettings, dry_run: bool) -> Self {
        Self {
            interval: settings.interval(),
            timeout: settings.timeout(),
            dry_run,
        }
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from_settings(&WaitSettings::default(), false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Pending,
    Converged,
    TimedOut,
}

/// Summary of a converged wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    /// Ticks run, including the converging one. Zero for a dry run.
    pub ticks: u32,
    pub elapsed: Duration,
}

/// Polls a set of checks until all pass or the timeout elapses.
pub struct ReadinessWaiter<'a, C> {
    cluster: &'a C,
    pending: Vec<ReadinessCheck>,
    options: WaitOptions,
    state: WaitState,
    ticks: u32,
}

impl<'a, C: ClusterHandle> ReadinessWaiter<'a, C> {
    pub fn new(cluster: &'a C, checks: Vec<ReadinessCheck>, options: WaitOptions) -> Self {
        Self {
            cluster,
            pending: checks,
            options,
            state: WaitState::Pending,
            ticks: 0,
        }
    }

    pub fn state(&self) -> WaitState {
        self.state
    }

    /// Ids of the checks that have not passed yet, in submission order.
    pub fn pending(&self) -> Vec<String> {
        self.pending.iter().map(ReadinessCheck::id).collect()
    }

    /// Evaluates every pending check once.
    ///
    /// A check that errors is logged and stays pending. Terminal states are
    /// left untouched.
    pub async fn tick(&mut self) -> WaitState {
        if self.state != WaitState::Pending {
            return self.state;
        }

        if self.options.dry_run {
            debug!(checks = self.pending.len(), "Dry run, skipping readiness checks");
            self.pending.clear();
            self.state = WaitState::Converged;
            return self.state;
        }

        self.ticks += 1;
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for check in std::mem::take(&mut self.pending) {
            match check.evaluate(self.cluster).await {
                Ok(true) => debug!(check = %check, "Ready"),
                Ok(false) => still_pending.push(check),
                Err(e) => {
                    warn!(resource = %check.id(), error = %e, "Readiness check failed, will retry");
                    still_pending.push(check);
                }
            }
        }
        self.pending = still_pending;

        if self.pending.is_empty() {
            self.state = WaitState::Converged;
        }
        self.state
    }

    /// Ticks immediately, then every `interval`, until converged or timed out.
    pub async fn run(mut self) -> Result<WaitOutcome> {
        let started = Instant::now();
        let deadline = started + self.options.timeout;

        loop {
            if self.tick().await == WaitState::Converged {
                let outcome = WaitOutcome {
                    ticks: self.ticks,
                    elapsed: started.elapsed(),
                };
                info!(ticks = outcome.ticks, elapsed_ms = outcome.elapsed.as_millis() as u64, "Resources ready");
                return Ok(outcome);
            }

            let now = Instant::now();
            if now >= deadline {
                self.state = WaitState::TimedOut;
                return Err(GraftError::WaitTimedOut {
                    timeout: self.options.timeout,
                    pending: self.pending(),
                });
            }

            debug!(pending = ?self.pending(), "Waiting for resources");
            tokio::time::sleep(self.options.interval.min(deadline - now)).await;
        }
    }
}

/// Waits for `checks` with the given options.
pub async fn wait_for<C: ClusterHandle>(
    cluster: &C,
    checks: Vec<ReadinessCheck>,
    options: WaitOptions,
) -> Result<WaitOutcome> {
    ReadinessWaiter::new(cluster, checks, options).run().await
}
