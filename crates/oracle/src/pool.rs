use flight_surety_contracts::{ContractError, OracleContract};
use flight_surety_types::{Address, OracleIdentity, OracleIndexes, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{OracleError, RelayMetrics, Result};

/// What bootstrap does when one account cannot be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// Abort bootstrap on the first failure.
    #[default]
    FailFast,
    /// Log the failure and continue with the remaining accounts.
    Skip,
}

/// Registered oracle identities, immutable once bootstrap returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OraclePool {
    oracles: Vec<OracleIdentity>,
}

impl OraclePool {
    pub fn new(oracles: Vec<OracleIdentity>) -> Self {
        Self { oracles }
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }

    pub fn oracles(&self) -> &[OracleIdentity] {
        &self.oracles
    }

    /// Every oracle holding `index`, in pool order.
    pub fn eligible(&self, index: u8) -> impl Iterator<Item = &OracleIdentity> {
        self.oracles.iter().filter(move |o| o.is_eligible(index))
    }
}

/// Registers the oracle pool from the node's accounts.
#[derive(Clone)]
pub struct Bootstrap {
    pool_size: usize,
    policy: RegistrationPolicy,
    adopt_existing: bool,
    metrics: RelayMetrics,
}

impl Bootstrap {
    pub fn new(pool_size: usize, metrics: RelayMetrics) -> Self {
        Self {
            pool_size,
            policy: RegistrationPolicy::default(),
            adopt_existing: false,
            metrics,
        }
    }

    pub fn policy(mut self, policy: RegistrationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reuse accounts that already answer `getMyIndexes()` instead of
    /// paying the fee again.
    pub fn adopt_existing(mut self, adopt: bool) -> Self {
        self.adopt_existing = adopt;
        self
    }

    /// Registers the first `pool_size` accounts one after another.
    ///
    /// Each account's registration and index query finish before the next
    /// account starts.
    pub async fn run(&self, contract: &dyn OracleContract) -> Result<OraclePool> {
        let accounts = contract.accounts().await?;
        if accounts.len() < self.pool_size {
            return Err(OracleError::NotEnoughAccounts {
                needed: self.pool_size,
                available: accounts.len(),
            });
        }
        if self.pool_size == 0 {
            return Err(OracleError::EmptyPool);
        }

        let fee = contract.registration_fee(accounts[0]).await?;
        info!(pool_size = self.pool_size, fee = %fee, "Registering oracles");

        let mut oracles = Vec::with_capacity(self.pool_size);
        for &account in &accounts[..self.pool_size] {
            match self.register_one(contract, account, fee).await {
                Ok(indexes) => {
                    info!(oracle = %account, indexes = %indexes, "New oracle added");
                    oracles.push(OracleIdentity::new(account, indexes));
                    self.metrics.oracles_registered.set(oracles.len() as i64);
                }
                Err(source) => match self.policy {
                    RegistrationPolicy::FailFast => {
                        return Err(OracleError::Registration { account, source })
                    }
                    RegistrationPolicy::Skip => {
                        warn!(oracle = %account, error = %source, "Skipping oracle that failed to register");
                    }
                },
            }
        }

        if oracles.is_empty() {
            return Err(OracleError::EmptyPool);
        }

        info!(registered = oracles.len(), "Oracle pool ready");
        Ok(OraclePool::new(oracles))
    }

    async fn register_one(
        &self,
        contract: &dyn OracleContract,
        account: Address,
        fee: U256,
    ) -> std::result::Result<OracleIndexes, ContractError> {
        if self.adopt_existing {
            match contract.get_my_indexes(account).await {
                Ok(indexes) => {
                    debug!(oracle = %account, "Adopting already registered oracle");
                    return Ok(indexes);
                }
                Err(e) => debug!(oracle = %account, error = %e, "Account not registered yet"),
            }
        }

        contract.register_oracle(account, fee).await?;
        contract.get_my_indexes(account).await
    }
}
