use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use flight_surety_rpc::{Log, RpcClient};
use flight_surety_types::{
    Address, LogPosition, OracleIndexes, OracleRequest, StatusCode, H256, U256,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::abi::{event_topic, native_address, native_u256, sol_address, sol_u256, IFlightSuretyApp};
use crate::{ContractError, ContractHandle, Result};

/// An `OracleRequest` together with where it was emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLog {
    pub position: LogPosition,
    pub request: OracleRequest,
}

/// The App contract operations the oracle relay performs.
#[async_trait]
pub trait OracleContract: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Address>>;

    /// `REGISTRATION_FEE()` as seen by `caller`.
    async fn registration_fee(&self, caller: Address) -> Result<U256>;

    async fn register_oracle(&self, oracle: Address, fee: U256) -> Result<()>;

    /// `getMyIndexes()` called from `oracle`.
    async fn get_my_indexes(&self, oracle: Address) -> Result<OracleIndexes>;

    async fn submit_oracle_response(
        &self,
        oracle: Address,
        request: &OracleRequest,
        status: StatusCode,
    ) -> Result<H256>;

    async fn latest_block(&self) -> Result<u64>;

    /// `OracleRequest` events in `[from_block, to_block]`, ordered by
    /// block then log index.
    async fn oracle_requests(&self, from_block: u64, to_block: u64) -> Result<Vec<RequestLog>>;
}

/// Decodes one raw log into an [`OracleRequest`].
pub fn decode_request_log(log: &Log) -> Result<RequestLog> {
    let topic = event_topic::<IFlightSuretyApp::OracleRequest>();
    if log.topics.first() != Some(&topic) {
        return Err(ContractError::UnexpectedLog(format!(
            "topic0 {:?} is not OracleRequest",
            log.topics.first()
        )));
    }

    let topics = log.topics.iter().map(|t| alloy_primitives::B256::from(t.0));
    let event =
        IFlightSuretyApp::OracleRequest::decode_raw_log(topics, log.data.as_slice(), true)?;

    Ok(RequestLog {
        position: LogPosition {
            block_number: log.block_number.map_or(0, |n| n.low_u64()),
            log_index: log.log_index.map_or(0, |n| n.low_u64()),
            transaction_hash: log.transaction_hash,
        },
        request: OracleRequest {
            index: event.index,
            airline: native_address(event.airline),
            flight: event.flight,
            timestamp: native_u256(event.timestamp),
        },
    })
}

/// [`OracleContract`] over a live FlightSuretyApp deployment.
pub struct FlightSuretyApp {
    handle: ContractHandle,
}

impl FlightSuretyApp {
    pub fn new(rpc: Arc<RpcClient>, address: Address, gas: u64) -> Self {
        Self {
            handle: ContractHandle::new(rpc, address, gas),
        }
    }

    pub fn address(&self) -> Address {
        self.handle.address()
    }
}

#[async_trait]
impl OracleContract for FlightSuretyApp {
    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.handle.rpc().accounts().await?)
    }

    async fn registration_fee(&self, caller: Address) -> Result<U256> {
        let fee = self
            .handle
            .call(&IFlightSuretyApp::REGISTRATION_FEECall {}, Some(caller))
            .await?;
        Ok(native_u256(fee._0))
    }

    async fn register_oracle(&self, oracle: Address, fee: U256) -> Result<()> {
        let receipt = self
            .handle
            .transact(&IFlightSuretyApp::registerOracleCall {}, oracle, Some(fee))
            .await?;
        debug!(oracle = %oracle, tx = ?receipt.transaction_hash, "Oracle registration mined");
        Ok(())
    }

    async fn get_my_indexes(&self, oracle: Address) -> Result<OracleIndexes> {
        let indexes = self
            .handle
            .call(&IFlightSuretyApp::getMyIndexesCall {}, Some(oracle))
            .await?;
        Ok(OracleIndexes::new(indexes._0))
    }

    async fn submit_oracle_response(
        &self,
        oracle: Address,
        request: &OracleRequest,
        status: StatusCode,
    ) -> Result<H256> {
        let call = IFlightSuretyApp::submitOracleResponseCall {
            index: request.index,
            airline: sol_address(request.airline),
            flight: request.flight.clone(),
            timestamp: sol_u256(request.timestamp),
            statusCode: status.code(),
        };
        let receipt = self.handle.transact(&call, oracle, None).await?;
        Ok(receipt.transaction_hash)
    }

    async fn latest_block(&self) -> Result<u64> {
        Ok(self.handle.rpc().block_number().await?)
    }

    async fn oracle_requests(&self, from_block: u64, to_block: u64) -> Result<Vec<RequestLog>> {
        let logs = self
            .handle
            .logs::<IFlightSuretyApp::OracleRequest>(from_block, to_block)
            .await?;

        let mut requests = Vec::with_capacity(logs.len());
        for log in logs {
            if log.removed {
                debug!(tx = ?log.transaction_hash, "Skipping removed log");
                continue;
            }
            match decode_request_log(&log) {
                Ok(request) => requests.push(request),
                Err(e) => {
                    warn!(tx = ?log.transaction_hash, error = %e, "Skipping undecodable OracleRequest log")
                }
            }
        }

        requests.sort_by_key(|r| (r.position.block_number, r.position.log_index));
        Ok(requests)
    }
}
