//! Settles mobile-money payments by polling the provider.
//!
//! Each payment gets one task that walks `Scheduled -> Polling -> ... ->
//! Settled`. The first check waits for the donor to see the prompt on their
//! handset, later checks follow at a fixed interval, and the task stops at the
//! first terminal answer or when its attempts run out. Every task holds a
//! child of the poller's shutdown token, so it can be cancelled on its own
//! (the page went away) or together with all others (server shutdown).

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    config::PollingConfig,
    domain::{MobileNetwork, PaymentStatus},
    error::Result,
};

const SUCCEEDED_MESSAGE: &str = "Payment successful! Thank you for your donation.";
const FAILED_MESSAGE: &str = "Payment failed. Please try again or use manual transfer.";
const TIMED_OUT_MESSAGE: &str =
    "Payment is taking longer than expected. We will notify you once confirmed.";

/// Settled jobs stay visible this long so the page can read the outcome.
const SETTLED_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Resolves the current status of a mobile-money payment (and records it).
#[async_trait]
pub trait StatusChecker: Send + Sync {
    async fn check(&self, reference: &str, network: MobileNetwork) -> Result<PaymentStatus>;
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    Scheduled,
    Polling,
    Settled,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    pub reference: String,
    pub provider: MobileNetwork,
    pub state: PollState,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PollOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Cancels one polling job.
#[derive(Debug, Clone)]
pub struct PollHandle {
    pub reference: String,
    token: CancellationToken,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct PollJob {
    snapshot: PollSnapshot,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    settled_at: Option<Instant>,
}

type Jobs = Arc<RwLock<HashMap<String, PollJob>>>;

pub struct PaymentPoller {
    checker: Arc<dyn StatusChecker>,
    config: PollingConfig,
    jobs: Jobs,
    shutdown: CancellationToken,
}

impl PaymentPoller {
    pub fn new(checker: Arc<dyn StatusChecker>, config: PollingConfig) -> Self {
        Self {
            checker,
            config,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Starts polling `reference`. A job already running for the same
    /// reference is kept and its handle returned.
    pub async fn start(&self, reference: &str, network: MobileNetwork) -> PollHandle {
        let mut jobs = self.jobs.write().await;

        let now = Instant::now();
        jobs.retain(|_, job| match job.settled_at {
            Some(at) => now.duration_since(at) < SETTLED_RETENTION,
            None => true,
        });

        if let Some(job) = jobs.get(reference) {
            if job.snapshot.state != PollState::Settled {
                return PollHandle {
                    reference: reference.to_string(),
                    token: job.token.clone(),
                };
            }
        }

        let token = self.shutdown.child_token();
        let snapshot = PollSnapshot {
            reference: reference.to_string(),
            provider: network,
            state: PollState::Scheduled,
            attempts: 0,
            max_attempts: self.config.max_attempts,
            last_status: None,
            outcome: None,
            message: None,
        };

        let task = tokio::spawn(run_job(
            self.jobs.clone(),
            self.checker.clone(),
            self.config.clone(),
            reference.to_string(),
            network,
            token.clone(),
        ));

        jobs.insert(
            reference.to_string(),
            PollJob {
                snapshot,
                token: token.clone(),
                task: Some(task),
                settled_at: None,
            },
        );

        tracing::debug!("Scheduled status polling for {} via {}", reference, network);

        PollHandle {
            reference: reference.to_string(),
            token,
        }
    }

    pub async fn snapshot(&self, reference: &str) -> Option<PollSnapshot> {
        self.jobs.read().await.get(reference).map(|job| job.snapshot.clone())
    }

    /// Cancels the job for `reference`. Returns false when no job is running.
    pub async fn cancel(&self, reference: &str) -> bool {
        match self.jobs.read().await.get(reference) {
            Some(job) if job.snapshot.state != PollState::Settled => {
                job.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancels every job and waits for the tasks to wind down.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let tasks: Vec<JoinHandle<()>> = self
            .jobs
            .write()
            .await
            .values_mut()
            .filter_map(|job| job.task.take())
            .collect();

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Polling task ended abnormally: {}", e);
            }
        }
    }
}

async fn update(jobs: &Jobs, reference: &str, f: impl FnOnce(&mut PollJob)) {
    if let Some(job) = jobs.write().await.get_mut(reference) {
        f(job);
    }
}

async fn settle(jobs: &Jobs, reference: &str, outcome: PollOutcome, message: Option<&str>) {
    update(jobs, reference, |job| {
        job.snapshot.state = PollState::Settled;
        job.snapshot.outcome = Some(outcome);
        job.snapshot.message = message.map(str::to_string);
        job.settled_at = Some(Instant::now());
    })
    .await;

    tracing::info!("Status polling for {} settled: {:?}", reference, outcome);
}

/// Sleeps for `delay` unless cancelled first. Returns false on cancellation.
async fn wait(delay: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

async fn run_job(
    jobs: Jobs,
    checker: Arc<dyn StatusChecker>,
    config: PollingConfig,
    reference: String,
    network: MobileNetwork,
    token: CancellationToken,
) {
    if !wait(Duration::from_secs(config.initial_delay_secs), &token).await {
        settle(&jobs, &reference, PollOutcome::Cancelled, None).await;
        return;
    }

    let mut attempts = 0;
    loop {
        update(&jobs, &reference, |job| job.snapshot.state = PollState::Polling).await;

        let result = tokio::select! {
            _ = token.cancelled() => None,
            result = checker.check(&reference, network) => Some(result),
        };
        let Some(result) = result else {
            settle(&jobs, &reference, PollOutcome::Cancelled, None).await;
            return;
        };

        attempts += 1;
        let last_status = match result {
            Ok(status) => Some(status),
            Err(e) => {
                // A failed check only uses up this attempt.
                tracing::warn!(
                    "Status check {}/{} for {} failed: {}",
                    attempts,
                    config.max_attempts,
                    reference,
                    e
                );
                None
            }
        };

        update(&jobs, &reference, |job| {
            job.snapshot.attempts = attempts;
            if last_status.is_some() {
                job.snapshot.last_status = last_status;
            }
        })
        .await;

        match last_status {
            Some(PaymentStatus::Success) => {
                settle(&jobs, &reference, PollOutcome::Succeeded, Some(SUCCEEDED_MESSAGE)).await;
                return;
            }
            Some(PaymentStatus::Failed) => {
                settle(&jobs, &reference, PollOutcome::Failed, Some(FAILED_MESSAGE)).await;
                return;
            }
            _ => {}
        }

        if attempts >= config.max_attempts {
            settle(&jobs, &reference, PollOutcome::TimedOut, Some(TIMED_OUT_MESSAGE)).await;
            return;
        }

        update(&jobs, &reference, |job| job.snapshot.state = PollState::Scheduled).await;

        if !wait(Duration::from_secs(config.interval_secs), &token).await {
            settle(&jobs, &reference, PollOutcome::Cancelled, None).await;
            return;
        }
    }
}
