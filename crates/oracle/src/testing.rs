//! Scriptable in-memory [`OracleContract`] for relay tests.

use async_trait::async_trait;
use flight_surety_contracts::{ContractError, OracleContract, RequestLog, Result};
use flight_surety_rpc::RpcError;
use flight_surety_types::{
    Address, LogPosition, OracleIndexes, OracleRequest, StatusCode, H256, U256,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

fn revert(reason: &str) -> ContractError {
    ContractError::Rpc(RpcError::Rpc {
        code: -32000,
        message: format!("VM Exception while processing transaction: revert {}", reason),
    })
}

/// A recorded `submitOracleResponse` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub oracle: Address,
    pub request: OracleRequest,
    pub status: StatusCode,
}

pub struct MockOracleContract {
    accounts: Vec<Address>,
    fee: U256,
    indexes: HashMap<Address, OracleIndexes>,
    failing_registrations: HashSet<Address>,
    reverting_oracles: HashSet<Address>,
    submission_delay: Option<Duration>,
    registration_delay: Option<Duration>,
    registered: Mutex<HashSet<Address>>,
    registrations: Mutex<Vec<(Address, U256)>>,
    submissions: Mutex<Vec<Submission>>,
    requests: Mutex<Vec<RequestLog>>,
    head: AtomicU64,
    failing_polls: AtomicUsize,
    log_queries: Mutex<Vec<(u64, u64)>>,
}

impl MockOracleContract {
    pub fn new(accounts: Vec<Address>) -> Self {
        Self {
            accounts,
            fee: U256::exp10(18),
            indexes: HashMap::new(),
            failing_registrations: HashSet::new(),
            reverting_oracles: HashSet::new(),
            submission_delay: None,
            registration_delay: None,
            registered: Mutex::new(HashSet::new()),
            registrations: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            head: AtomicU64::new(0),
            failing_polls: AtomicUsize::new(0),
            log_queries: Mutex::new(Vec::new()),
        }
    }

    /// `n` accounts `0x0101..`, `0x0202..` and so on.
    pub fn with_accounts(n: u8) -> Self {
        Self::new((1..=n).map(|i| Address::from_bytes([i; 20])).collect())
    }

    pub fn fee(mut self, fee: U256) -> Self {
        self.fee = fee;
        self
    }

    /// Indexes handed out when the account at `position` registers.
    pub fn indexes_for(mut self, position: usize, indexes: [u8; 3]) -> Self {
        let account = self.accounts[position];
        self.indexes.insert(account, OracleIndexes::new(indexes));
        self
    }

    pub fn fail_registration(mut self, position: usize) -> Self {
        self.failing_registrations.insert(self.accounts[position]);
        self
    }

    /// Marks the account as registered by an earlier run.
    pub fn preregistered(self, position: usize) -> Self {
        self.registered.lock().insert(self.accounts[position]);
        self
    }

    pub fn revert_submissions(mut self, position: usize) -> Self {
        self.reverting_oracles.insert(self.accounts[position]);
        self
    }

    pub fn submission_delay(mut self, delay: Duration) -> Self {
        self.submission_delay = Some(delay);
        self
    }

    /// Every `registerOracle` waits this long before it is mined.
    pub fn registration_delay(mut self, delay: Duration) -> Self {
        self.registration_delay = Some(delay);
        self
    }

    pub fn accounts_slice(&self) -> &[Address] {
        &self.accounts
    }

    /// Emits a request at `block`, moving the head forward if needed.
    pub fn push_request(&self, block: u64, log_index: u64, request: OracleRequest) {
        self.requests.lock().push(RequestLog {
            position: LogPosition {
                block_number: block,
                log_index,
                transaction_hash: Some(H256::from_low_u64_be(block * 1000 + log_index)),
            },
            request,
        });
        self.head.fetch_max(block, Ordering::SeqCst);
    }

    pub fn set_head(&self, block: u64) {
        self.head.store(block, Ordering::SeqCst);
    }

    /// The next `n` log queries fail with a transport error.
    pub fn fail_next_polls(&self, n: usize) {
        self.failing_polls.store(n, Ordering::SeqCst);
    }

    pub fn registrations(&self) -> Vec<Address> {
        self.registrations.lock().iter().map(|(a, _)| *a).collect()
    }

    pub fn paid_fees(&self) -> Vec<U256> {
        self.registrations.lock().iter().map(|(_, fee)| *fee).collect()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.log_queries.lock().clone()
    }

    fn default_indexes(&self, account: Address) -> OracleIndexes {
        let position = self
            .accounts
            .iter()
            .position(|a| *a == account)
            .unwrap_or_default() as u8;
        OracleIndexes::new([position % 10, (position + 1) % 10, (position + 2) % 10])
    }
}

#[async_trait]
impl OracleContract for MockOracleContract {
    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.accounts.clone())
    }

    async fn registration_fee(&self, _caller: Address) -> Result<U256> {
        Ok(self.fee)
    }

    async fn register_oracle(&self, oracle: Address, fee: U256) -> Result<()> {
        if let Some(delay) = self.registration_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_registrations.contains(&oracle) {
            return Err(revert("Registration fee is required"));
        }
        self.registrations.lock().push((oracle, fee));
        self.registered.lock().insert(oracle);
        Ok(())
    }

    async fn get_my_indexes(&self, oracle: Address) -> Result<OracleIndexes> {
        if !self.registered.lock().contains(&oracle) {
            return Err(revert("Not registered as an oracle"));
        }
        Ok(self
            .indexes
            .get(&oracle)
            .copied()
            .unwrap_or_else(|| self.default_indexes(oracle)))
    }

    async fn submit_oracle_response(
        &self,
        oracle: Address,
        request: &OracleRequest,
        status: StatusCode,
    ) -> Result<H256> {
        if let Some(delay) = self.submission_delay {
            tokio::time::sleep(delay).await;
        }
        if self.reverting_oracles.contains(&oracle) {
            return Err(revert("Flight or timestamp do not match oracle request"));
        }

        let mut submissions = self.submissions.lock();
        submissions.push(Submission {
            oracle,
            request: request.clone(),
            status,
        });
        Ok(H256::from_low_u64_be(submissions.len() as u64))
    }

    async fn latest_block(&self) -> Result<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn oracle_requests(&self, from_block: u64, to_block: u64) -> Result<Vec<RequestLog>> {
        self.log_queries.lock().push((from_block, to_block));

        let failing = self.failing_polls.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_polls.store(failing - 1, Ordering::SeqCst);
            return Err(ContractError::Rpc(RpcError::Transport(
                "connection refused".to_string(),
            )));
        }

        let mut logs: Vec<RequestLog> = self
            .requests
            .lock()
            .iter()
            .filter(|r| (from_block..=to_block).contains(&r.position.block_number))
            .cloned()
            .collect();
        logs.sort_by_key(|r| (r.position.block_number, r.position.log_index));
        Ok(logs)
    }
}
