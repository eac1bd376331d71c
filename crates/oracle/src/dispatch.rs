use flight_surety_types::{Address, OracleRequest, StatusCode};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{OraclePool, RelayMetrics, Responder, StatusStrategy, SubmissionOutcome};

/// What was decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub request: OracleRequest,
    /// Eligible oracles in pool order with the code each one submits.
    pub assignments: Vec<(Address, StatusCode)>,
}

impl DispatchReport {
    pub fn eligible(&self) -> Vec<Address> {
        self.assignments.iter().map(|(address, _)| *address).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Fans each request out to the eligible oracles.
///
/// Submissions run as independent tasks. They are tracked only so that
/// shutdown can wait for them.
pub struct Dispatcher {
    pool: Arc<OraclePool>,
    responder: Arc<Responder>,
    strategy: StatusStrategy,
    rng: Mutex<StdRng>,
    tasks: tokio::sync::Mutex<JoinSet<SubmissionOutcome>>,
    metrics: RelayMetrics,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<OraclePool>,
        responder: Arc<Responder>,
        strategy: StatusStrategy,
        seed: Option<u64>,
        metrics: RelayMetrics,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            pool,
            responder,
            strategy,
            rng: Mutex::new(rng),
            tasks: tokio::sync::Mutex::new(JoinSet::new()),
            metrics,
        }
    }

    pub fn pool(&self) -> &OraclePool {
        &self.pool
    }

    fn assign(&self, request: &OracleRequest) -> Vec<(Address, StatusCode)> {
        let mut rng = self.rng.lock();
        let shared = StatusCode::random(&mut *rng);

        self.pool
            .eligible(request.index)
            .map(|oracle| {
                let status = match self.strategy {
                    StatusStrategy::PerEvent => shared,
                    StatusStrategy::PerOracle => StatusCode::random(&mut *rng),
                };
                (oracle.address, status)
            })
            .collect()
    }

    /// Spawns one submission per eligible oracle and returns immediately.
    pub async fn dispatch(&self, request: OracleRequest) -> DispatchReport {
        self.metrics.requests_total.inc();
        let assignments = self.assign(&request);
        self.metrics
            .dispatch_eligible
            .observe(assignments.len() as f64);

        if assignments.is_empty() {
            debug!(request = %request, "No oracle holds this index");
            return DispatchReport {
                request,
                assignments,
            };
        }

        info!(
            request = %request,
            eligible = assignments.len(),
            "Dispatching oracle request"
        );

        let mut tasks = self.tasks.lock().await;
        for &(oracle, status) in &assignments {
            let responder = self.responder.clone();
            let request = request.clone();
            tasks.spawn(async move { responder.submit(oracle, &request, status).await });
        }

        DispatchReport {
            request,
            assignments,
        }
    }

    /// Collects submissions that have already finished.
    pub async fn reap(&self) -> Vec<SubmissionOutcome> {
        let mut tasks = self.tasks.lock().await;
        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.try_join_next() {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Submission task failed"),
            }
        }
        outcomes
    }

    pub async fn in_flight(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Waits up to `grace` for outstanding submissions, then aborts the
    /// rest.
    pub async fn drain(&self, grace: Duration) -> Vec<SubmissionOutcome> {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().await);
        let mut outcomes = Vec::new();

        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(outcome)) => outcomes.push(outcome),
                    Some(Err(e)) => warn!(error = %e, "Submission task failed"),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(remaining = tasks.len(), "Aborting in-flight submissions");
                    tasks.abort_all();
                    break;
                }
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockOracleContract;
    use flight_surety_types::{OracleIdentity, U256};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn request(index: u8) -> OracleRequest {
        OracleRequest {
            index,
            airline: Address::from_bytes([0xaa; 20]),
            flight: "ND1309".to_string(),
            timestamp: U256::from(1_700_000_000u64),
        }
    }

    fn pool_of(indexes: &[[u8; 3]]) -> OraclePool {
        OraclePool::new(
            indexes
                .iter()
                .enumerate()
                .map(|(i, idx)| OracleIdentity::new(Address::from_bytes([i as u8 + 1; 20]), (*idx).into()))
                .collect(),
        )
    }

    fn dispatcher(
        mock: Arc<MockOracleContract>,
        pool: OraclePool,
        strategy: StatusStrategy,
    ) -> Dispatcher {
        let metrics = RelayMetrics::unregistered().unwrap();
        let responder = Arc::new(Responder::new(mock, Duration::from_secs(5), metrics.clone()));
        Dispatcher::new(Arc::new(pool), responder, strategy, Some(7), metrics)
    }

    #[tokio::test]
    async fn test_only_eligible_oracles_respond() {
        let mock = Arc::new(MockOracleContract::with_accounts(3));
        let d = dispatcher(
            mock.clone(),
            pool_of(&[[1, 2, 3], [4, 5, 6], [1, 7, 8]]),
            StatusStrategy::PerEvent,
        );

        let report = d.dispatch(request(1)).await;
        assert_eq!(
            report.eligible(),
            vec![Address::from_bytes([1; 20]), Address::from_bytes([3; 20])]
        );

        let outcomes = d.drain(Duration::from_secs(5)).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(SubmissionOutcome::is_submitted));

        let oracles: HashSet<Address> = mock.submissions().iter().map(|s| s.oracle).collect();
        assert_eq!(
            oracles,
            HashSet::from([Address::from_bytes([1; 20]), Address::from_bytes([3; 20])])
        );
    }

    #[tokio::test]
    async fn test_no_eligible_oracle_means_no_submission() {
        let mock = Arc::new(MockOracleContract::with_accounts(3));
        let d = dispatcher(mock.clone(), pool_of(&[[1, 2, 3], [4, 5, 6]]), StatusStrategy::PerEvent);

        let report = d.dispatch(request(9)).await;
        assert!(report.is_empty());
        assert_eq!(d.in_flight().await, 0);
        assert!(d.drain(Duration::from_secs(1)).await.is_empty());
        assert!(mock.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_per_event_strategy_shares_one_code() {
        let mock = Arc::new(MockOracleContract::with_accounts(5));
        let d = dispatcher(
            mock,
            pool_of(&[[2, 3, 4], [2, 5, 6], [2, 7, 8], [0, 1, 2]]),
            StatusStrategy::PerEvent,
        );

        for _ in 0..10 {
            let report = d.dispatch(request(2)).await;
            let codes: HashSet<StatusCode> = report.assignments.iter().map(|(_, s)| *s).collect();
            assert_eq!(codes.len(), 1);
        }
        d.drain(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_submitted_codes_are_valid() {
        let mock = Arc::new(MockOracleContract::with_accounts(3));
        let d = dispatcher(mock.clone(), pool_of(&[[0, 1, 2]; 3]), StatusStrategy::PerOracle);

        for _ in 0..20 {
            d.dispatch(request(0)).await;
        }
        d.drain(Duration::from_secs(5)).await;

        let valid = [0u8, 10, 20, 30, 40, 50];
        let submissions = mock.submissions();
        assert_eq!(submissions.len(), 60);
        assert!(submissions.iter().all(|s| valid.contains(&s.status.code())));
    }

    #[tokio::test]
    async fn test_revert_does_not_affect_other_submissions() {
        let mock = Arc::new(MockOracleContract::with_accounts(3).revert_submissions(0));
        let d = dispatcher(
            mock.clone(),
            pool_of(&[[1, 2, 3], [1, 5, 6], [1, 7, 8]]),
            StatusStrategy::PerEvent,
        );

        d.dispatch(request(1)).await;
        let outcomes = d.drain(Duration::from_secs(5)).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.is_submitted()).count(), 2);
        assert_eq!(mock.submissions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_aborts_after_grace() {
        let mock = Arc::new(
            MockOracleContract::with_accounts(1).submission_delay(Duration::from_secs(600)),
        );
        let metrics = RelayMetrics::unregistered().unwrap();
        let responder = Arc::new(Responder::new(
            mock.clone(),
            Duration::from_secs(3600),
            metrics.clone(),
        ));
        let d = Dispatcher::new(
            Arc::new(pool_of(&[[1, 2, 3]])),
            responder,
            StatusStrategy::PerEvent,
            None,
            metrics,
        );

        d.dispatch(request(1)).await;
        assert_eq!(d.in_flight().await, 1);

        let outcomes = d.drain(Duration::from_secs(2)).await;
        assert!(outcomes.is_empty());
        assert_eq!(d.in_flight().await, 0);
        assert!(mock.submissions().is_empty());
    }

    proptest! {
        #[test]
        fn prop_eligible_set_is_exact(
            indexes in proptest::collection::vec(proptest::array::uniform3(0u8..10), 1..20),
            index in 0u8..10,
        ) {
            let pool = pool_of(&indexes);
            let eligible: Vec<Address> = pool.eligible(index).map(|o| o.address).collect();

            // positions whose raw index triple holds `index`, in pool order
            let mut expected = Vec::new();
            for (position, triple) in indexes.iter().enumerate() {
                if triple[0] == index || triple[1] == index || triple[2] == index {
                    expected.push(Address::from_bytes([position as u8 + 1; 20]));
                }
            }
            prop_assert_eq!(eligible, expected);
        }
    }
}
