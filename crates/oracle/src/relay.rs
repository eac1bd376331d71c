use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::{Dispatcher, RelayMetrics, RequestPoller, SubmissionOutcome};

#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub poll_interval: Duration,
    pub shutdown_grace: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Totals reported when the relay stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub requests: u64,
    pub submissions: u64,
    pub failed_submissions: u64,
    pub failed_polls: u64,
    pub next_block: Option<u64>,
}

/// The subscription loop: poll, dispatch, commit, repeat until shutdown.
pub struct OracleRelay {
    poller: RequestPoller,
    dispatcher: Arc<Dispatcher>,
    options: RelayOptions,
    metrics: RelayMetrics,
    summary: RelaySummary,
}

impl OracleRelay {
    pub fn new(
        poller: RequestPoller,
        dispatcher: Arc<Dispatcher>,
        options: RelayOptions,
        metrics: RelayMetrics,
    ) -> Self {
        Self {
            poller,
            dispatcher,
            options,
            metrics,
            summary: RelaySummary::default(),
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> RelaySummary {
        info!(
            oracles = self.dispatcher.pool().len(),
            poll_interval = ?self.options.poll_interval,
            "Oracle relay started"
        );

        let mut ticker = interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.step().await {
                        // more history to read, skip the wait
                        ticker.reset_immediately();
                    }
                }
                _ = shutdown.recv() => {
                    info!("Oracle relay shutting down");
                    break;
                }
            }
        }

        let drained = self.dispatcher.drain(self.options.shutdown_grace).await;
        self.record(&drained);
        self.summary.next_block = self.poller.next_block();

        info!(
            requests = self.summary.requests,
            submissions = self.summary.submissions,
            failed = self.summary.failed_submissions,
            next_block = ?self.summary.next_block,
            "Oracle relay stopped"
        );
        self.summary
    }

    /// Handles one batch. Returns `true` once the cursor has reached the
    /// head or the poll failed.
    pub async fn step(&mut self) -> bool {
        let batch = match self.poller.poll().await {
            Ok(Some(batch)) => batch,
            Ok(None) => return true,
            Err(e) => {
                self.summary.failed_polls += 1;
                warn!(error = %e, "Polling for oracle requests failed, retrying");
                return true;
            }
        };

        for log in &batch.requests {
            info!(
                block = log.position.block_number,
                log_index = log.position.log_index,
                request = %log.request,
                "OracleRequest received"
            );
            self.dispatcher.dispatch(log.request.clone()).await;
            self.summary.requests += 1;
        }

        let finished = self.dispatcher.reap().await;
        self.record(&finished);

        if let Err(e) = self.poller.commit(&batch) {
            error!(error = %e, "Failed to persist block checkpoint");
        }
        self.metrics.last_processed_block.set(batch.to_block as i64);

        batch.caught_up()
    }

    fn record(&mut self, outcomes: &[SubmissionOutcome]) {
        for outcome in outcomes {
            if outcome.is_submitted() {
                self.summary.submissions += 1;
            } else {
                self.summary.failed_submissions += 1;
            }
        }
    }
}
