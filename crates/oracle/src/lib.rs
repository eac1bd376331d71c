//! Oracle relay for FlightSurety.
//!
//! A fixed pool of node accounts is registered as oracles at startup. The
//! relay then watches the App contract for `OracleRequest` events and has
//! every oracle whose indexes contain the request index answer with a
//! random flight status. Aggregation and payout happen on chain.

use flight_surety_contracts::ContractError;
use flight_surety_storage::StorageError;
use flight_surety_types::Address;
use thiserror::Error;

pub mod dispatch;
pub mod metrics;
pub mod pool;
pub mod relay;
pub mod responder;
pub mod subscription;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use dispatch::{DispatchReport, Dispatcher};
pub use metrics::RelayMetrics;
pub use pool::{Bootstrap, OraclePool, RegistrationPolicy};
pub use relay::{OracleRelay, RelayOptions, RelaySummary};
pub use responder::{FailureKind, Responder, StatusStrategy, SubmissionOutcome};
pub use subscription::{PollBatch, RequestPoller, StartBlock};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Not enough accounts for the oracle pool: need {needed}, node has {available}")]
    NotEnoughAccounts { needed: usize, available: usize },

    #[error("Oracle registration failed for {account}: {source}")]
    Registration {
        account: Address,
        #[source]
        source: ContractError,
    },

    #[error("No oracle could be registered")]
    EmptyPool,

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Checkpoint error: {0}")]
    Storage(#[from] StorageError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, OracleError>;
