//! Typed access to the FlightSurety contract pair.
//!
//! The App contract holds the callable business logic and emits
//! `OracleRequest`; the Data contract holds state. Everything here is a
//! thin caller: the contracts decide what succeeds.

use flight_surety_rpc::RpcError;
use flight_surety_types::TypesError;
use thiserror::Error;

pub mod abi;
pub mod artifact;
pub mod dapp;
pub mod handle;
pub mod oracle;

pub use abi::{verify_dapp_artifacts, verify_oracle_artifact, IFlightSuretyApp, IFlightSuretyData};
pub use artifact::{AbiEntry, AbiParam, ContractArtifact};
pub use dapp::{DappClient, Roles};
pub use handle::ContractHandle;
pub use oracle::{decode_request_log, FlightSuretyApp, OracleContract, RequestLog};

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("ABI error: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    #[error("Type error: {0}")]
    Types(#[from] TypesError),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("{contract} ABI is missing {entry}")]
    MissingAbiEntry { contract: String, entry: String },

    #[error("Unexpected log: {0}")]
    UnexpectedLog(String),

    #[error("Ledger exposes no accounts")]
    NoAccounts,
}

impl ContractError {
    /// Whether the ledger rejected the call as an EVM revert.
    pub fn is_revert(&self) -> bool {
        matches!(self, ContractError::Rpc(err) if err.is_revert())
    }
}

pub type Result<T> = std::result::Result<T, ContractError>;
