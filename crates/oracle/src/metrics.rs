use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Relay counters. Cloning shares the underlying series.
#[derive(Clone)]
pub struct RelayMetrics {
    pub oracles_registered: IntGauge,
    pub requests_total: IntCounter,
    pub dispatch_eligible: Histogram,
    pub responses_submitted: IntCounter,
    pub responses_failed: IntCounterVec,
    pub last_processed_block: IntGauge,
}

impl RelayMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let oracles_registered =
            IntGauge::new("oracles_registered", "Oracle identities in the relay pool")?;
        let requests_total =
            IntCounter::new("oracle_requests_total", "OracleRequest events handled")?;
        let dispatch_eligible = Histogram::with_opts(
            HistogramOpts::new("oracle_dispatch_eligible", "Eligible oracles per request")
                .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 20.0]),
        )?;
        let responses_submitted = IntCounter::new(
            "oracle_responses_submitted_total",
            "Oracle responses mined successfully",
        )?;
        let responses_failed = IntCounterVec::new(
            Opts::new("oracle_responses_failed_total", "Oracle responses that failed"),
            &["kind"],
        )?;
        let last_processed_block = IntGauge::new(
            "relay_last_processed_block",
            "Highest block whose OracleRequest events were dispatched",
        )?;

        registry.register(Box::new(oracles_registered.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(dispatch_eligible.clone()))?;
        registry.register(Box::new(responses_submitted.clone()))?;
        registry.register(Box::new(responses_failed.clone()))?;
        registry.register(Box::new(last_processed_block.clone()))?;

        Ok(Self {
            oracles_registered,
            requests_total,
            dispatch_eligible,
            responses_submitted,
            responses_failed,
            last_processed_block,
        })
    }

    /// Metrics bound to a throwaway registry.
    pub fn unregistered() -> Result<Self, prometheus::Error> {
        Self::new(&Registry::new())
    }

    pub fn failed_total(&self) -> u64 {
        ["revert", "rpc", "timeout"]
            .iter()
            .map(|kind| self.responses_failed.with_label_values(&[kind]).get())
            .sum()
    }
}
