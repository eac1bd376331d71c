use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Address, H256, U256};

/// The three indexes the App contract assigns to an oracle at registration.
///
/// Kept in the order the contract returned them. Only membership matters
/// for request eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OracleIndexes([u8; 3]);

impl OracleIndexes {
    pub fn new(indexes: [u8; 3]) -> Self {
        OracleIndexes(indexes)
    }

    pub fn contains(&self, index: u8) -> bool {
        self.0.contains(&index)
    }

    pub fn as_array(&self) -> [u8; 3] {
        self.0
    }
}

impl From<[u8; 3]> for OracleIndexes {
    fn from(indexes: [u8; 3]) -> Self {
        OracleIndexes(indexes)
    }
}

impl fmt::Display for OracleIndexes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

/// A registered oracle account and its assigned indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleIdentity {
    pub address: Address,
    pub indexes: OracleIndexes,
}

impl OracleIdentity {
    pub fn new(address: Address, indexes: OracleIndexes) -> Self {
        Self { address, indexes }
    }

    pub fn is_eligible(&self, index: u8) -> bool {
        self.indexes.contains(index)
    }
}

/// Payload of an `OracleRequest` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub index: u8,
    pub airline: Address,
    pub flight: String,
    pub timestamp: U256,
}

impl fmt::Display for OracleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index={} airline={} flight={} timestamp={}",
            self.index, self.airline, self.flight, self.timestamp
        )
    }
}

/// Where a log sits on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: Option<H256>,
}
