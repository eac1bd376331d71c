use alloy_sol_types::{SolCall, SolEvent};
use flight_surety_rpc::{BlockNumber, CallRequest, FilterOptions, Log, Receipt, RpcClient};
use flight_surety_types::{Address, U256};
use std::sync::Arc;
use tracing::debug;

use crate::abi::event_topic;
use crate::Result;

/// A deployed contract reachable through a shared RPC client.
#[derive(Clone)]
pub struct ContractHandle {
    rpc: Arc<RpcClient>,
    address: Address,
    gas: u64,
}

impl ContractHandle {
    pub fn new(rpc: Arc<RpcClient>, address: Address, gas: u64) -> Self {
        Self { rpc, address, gas }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    /// Read-only call against the latest block.
    pub async fn call<C: SolCall>(&self, call: &C, from: Option<Address>) -> Result<C::Return> {
        let mut request = CallRequest::new(self.address, call.abi_encode());
        if let Some(from) = from {
            request = request.sender(from);
        }

        let output = self.rpc.call(&request, BlockNumber::Latest).await?;
        Ok(C::abi_decode_returns(output.as_slice(), true)?)
    }

    /// Sends a transaction from a node-managed account and waits for it
    /// to be mined. A reverted receipt is an error.
    pub async fn transact<C: SolCall>(
        &self,
        call: &C,
        from: Address,
        value: Option<U256>,
    ) -> Result<Receipt> {
        let mut request = CallRequest::new(self.address, call.abi_encode())
            .sender(from)
            .gas(self.gas);
        if let Some(value) = value {
            request = request.value(value);
        }

        debug!(function = C::SIGNATURE, from = %from, "Sending transaction");
        Ok(self.rpc.send_and_confirm(&request).await?)
    }

    /// Logs of `E` emitted by this contract in `[from_block, to_block]`.
    pub async fn logs<E: SolEvent>(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        let filter = FilterOptions::new()
            .address(self.address)
            .topic0(event_topic::<E>())
            .range(from_block, to_block);
        Ok(self.rpc.get_logs(&filter).await?)
    }
}
