use flight_surety_contracts::OracleContract;
use flight_surety_types::{Address, OracleRequest, StatusCode, H256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::RelayMetrics;

/// How status codes are drawn for the oracles answering one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusStrategy {
    /// One code per request, shared by every eligible oracle.
    #[default]
    PerEvent,
    /// An independent code for each submission.
    PerOracle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Revert,
    Rpc,
    Timeout,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Revert => "revert",
            FailureKind::Rpc => "rpc",
            FailureKind::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Submitted {
        oracle: Address,
        status: StatusCode,
        tx: H256,
    },
    Failed {
        oracle: Address,
        status: StatusCode,
        kind: FailureKind,
        reason: String,
    },
}

impl SubmissionOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmissionOutcome::Submitted { .. })
    }

    pub fn oracle(&self) -> Address {
        match self {
            SubmissionOutcome::Submitted { oracle, .. } | SubmissionOutcome::Failed { oracle, .. } => {
                *oracle
            }
        }
    }
}

/// Sends `submitOracleResponse` transactions.
///
/// Never returns an error: every failure ends up as
/// [`SubmissionOutcome::Failed`], logged and counted.
pub struct Responder {
    contract: Arc<dyn OracleContract>,
    timeout: Duration,
    metrics: RelayMetrics,
}

impl Responder {
    pub fn new(contract: Arc<dyn OracleContract>, timeout: Duration, metrics: RelayMetrics) -> Self {
        Self {
            contract,
            timeout,
            metrics,
        }
    }

    pub async fn submit(
        &self,
        oracle: Address,
        request: &OracleRequest,
        status: StatusCode,
    ) -> SubmissionOutcome {
        let result = timeout(
            self.timeout,
            self.contract.submit_oracle_response(oracle, request, status),
        )
        .await;

        let outcome = match result {
            Ok(Ok(tx)) => SubmissionOutcome::Submitted { oracle, status, tx },
            Ok(Err(e)) => SubmissionOutcome::Failed {
                oracle,
                status,
                kind: if e.is_revert() {
                    FailureKind::Revert
                } else {
                    FailureKind::Rpc
                },
                reason: e.to_string(),
            },
            Err(_) => SubmissionOutcome::Failed {
                oracle,
                status,
                kind: FailureKind::Timeout,
                reason: format!("no receipt within {:?}", self.timeout),
            },
        };

        match &outcome {
            SubmissionOutcome::Submitted { tx, .. } => {
                info!(
                    oracle = %oracle,
                    flight = %request.flight,
                    status = %status,
                    tx = ?tx,
                    "Oracle response submitted"
                );
                self.metrics.responses_submitted.inc();
            }
            SubmissionOutcome::Failed { kind, reason, .. } => {
                warn!(
                    oracle = %oracle,
                    flight = %request.flight,
                    status = %status,
                    kind = kind.as_str(),
                    error = %reason,
                    "Oracle response failed"
                );
                self.metrics
                    .responses_failed
                    .with_label_values(&[kind.as_str()])
                    .inc();
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockOracleContract;
    use flight_surety_types::U256;

    fn request() -> OracleRequest {
        OracleRequest {
            index: 1,
            airline: Address::from_bytes([0xaa; 20]),
            flight: "ND1309".to_string(),
            timestamp: U256::from(1_700_000_000u64),
        }
    }

    #[tokio::test]
    async fn test_successful_submission_is_counted() {
        let mock = Arc::new(MockOracleContract::with_accounts(1));
        let oracle = mock.accounts_slice()[0];
        let metrics = RelayMetrics::unregistered().unwrap();
        let responder = Responder::new(mock.clone(), Duration::from_secs(5), metrics.clone());

        let outcome = responder.submit(oracle, &request(), StatusCode::OnTime).await;

        assert!(outcome.is_submitted());
        assert_eq!(metrics.responses_submitted.get(), 1);
        let recorded = mock.submissions();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, StatusCode::OnTime);
        assert_eq!(recorded[0].request, request());
    }

    #[tokio::test]
    async fn test_revert_is_caught() {
        let mock = Arc::new(MockOracleContract::with_accounts(1).revert_submissions(0));
        let oracle = mock.accounts_slice()[0];
        let metrics = RelayMetrics::unregistered().unwrap();
        let responder = Responder::new(mock, Duration::from_secs(5), metrics.clone());

        let outcome = responder.submit(oracle, &request(), StatusCode::LateWeather).await;

        assert!(matches!(
            outcome,
            SubmissionOutcome::Failed {
                kind: FailureKind::Revert,
                ..
            }
        ));
        assert_eq!(
            metrics.responses_failed.with_label_values(&["revert"]).get(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_submission_times_out() {
        let mock = Arc::new(
            MockOracleContract::with_accounts(1).submission_delay(Duration::from_secs(60)),
        );
        let oracle = mock.accounts_slice()[0];
        let metrics = RelayMetrics::unregistered().unwrap();
        let responder = Responder::new(mock.clone(), Duration::from_secs(1), metrics.clone());

        let outcome = responder.submit(oracle, &request(), StatusCode::Unknown).await;

        assert!(matches!(
            outcome,
            SubmissionOutcome::Failed {
                kind: FailureKind::Timeout,
                ..
            }
        ));
        assert!(mock.submissions().is_empty());
        assert_eq!(metrics.failed_total(), 1);
    }
}
