//! Solidity declarations of the FlightSurety contract surface.
//!
//! Calls and events are encoded by `alloy-sol-types`; the rest of the
//! workspace keeps its own `Address`/`U256`, converted at this boundary.

use alloy_sol_types::sol;
use flight_surety_types::{Address, H160, H256};

pub use alloy_sol_types::{SolCall, SolEvent};

use crate::{ContractArtifact, ContractError, Result};

sol! {
    interface IFlightSuretyApp {
        event OracleRequest(uint8 index, address airline, string flight, uint256 timestamp);

        function REGISTRATION_FEE() external view returns (uint256);
        function registerOracle() external payable;
        function getMyIndexes() external view returns (uint8[3]);
        function submitOracleResponse(uint8 index, address airline, string flight, uint256 timestamp, uint8 statusCode) external;

        function isOperational() external view returns (bool);
        function registerFlight(string flight, uint256 timestamp) external;
        function buyInsurance(string flight) external payable;
        function withdrawCredit() external;
        function fetchFlightStatus(address airline, string flight, uint256 timestamp) external;
        function getFlightStatus(address airline, string flight, uint256 timestamp) external view returns (uint8);
    }

    interface IFlightSuretyData {
        function isOperational() external view returns (bool);
        function GetCredit(address account) external view returns (uint256);
    }
}

pub fn sol_address(address: Address) -> alloy_primitives::Address {
    alloy_primitives::Address::from(H160::from(address).0)
}

pub fn native_address(address: alloy_primitives::Address) -> Address {
    Address::from_bytes(address.0 .0)
}

pub fn sol_u256(value: flight_surety_types::U256) -> alloy_primitives::U256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    alloy_primitives::U256::from_be_bytes(bytes)
}

pub fn native_u256(value: alloy_primitives::U256) -> flight_surety_types::U256 {
    flight_surety_types::U256::from_big_endian(&value.to_be_bytes::<32>())
}

/// Topic0 of a non-anonymous event.
pub fn event_topic<E: SolEvent>() -> H256 {
    H256::from(E::SIGNATURE_HASH.0)
}

/// Checks that a compiled App artifact exposes everything the oracle
/// relay calls, with the same input types.
pub fn verify_oracle_artifact(app: &ContractArtifact) -> Result<()> {
    use IFlightSuretyApp::*;

    app.require_function(REGISTRATION_FEECall::SIGNATURE)?;
    app.require_function(registerOracleCall::SIGNATURE)?;
    app.require_function(getMyIndexesCall::SIGNATURE)?;
    app.require_function(submitOracleResponseCall::SIGNATURE)?;

    let event = app.require_event(OracleRequest::SIGNATURE)?;
    if event.inputs.iter().any(|p| p.indexed) {
        return Err(ContractError::Artifact(format!(
            "{}: {} declares indexed parameters",
            app.contract_name,
            OracleRequest::SIGNATURE
        )));
    }
    Ok(())
}

/// Checks the App and Data artifacts against the passenger client's calls.
pub fn verify_dapp_artifacts(app: &ContractArtifact, data: &ContractArtifact) -> Result<()> {
    for signature in [
        IFlightSuretyApp::isOperationalCall::SIGNATURE,
        IFlightSuretyApp::registerFlightCall::SIGNATURE,
        IFlightSuretyApp::buyInsuranceCall::SIGNATURE,
        IFlightSuretyApp::withdrawCreditCall::SIGNATURE,
        IFlightSuretyApp::fetchFlightStatusCall::SIGNATURE,
        IFlightSuretyApp::getFlightStatusCall::SIGNATURE,
    ] {
        app.require_function(signature)?;
    }

    data.require_function(IFlightSuretyData::isOperationalCall::SIGNATURE)?;
    data.require_function(IFlightSuretyData::GetCreditCall::SIGNATURE)?;
    Ok(())
}
