use flight_surety_rpc::RpcClient;
use flight_surety_types::{Address, Flight, StatusCode, H256, U256};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::abi::{native_u256, sol_address, sol_u256, IFlightSuretyApp, IFlightSuretyData};
use crate::{ContractError, ContractHandle, Result};

/// Accounts the client acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roles {
    pub owner: Address,
    pub airlines: Vec<Address>,
    pub passengers: Vec<Address>,
}

impl Roles {
    /// Owner is the first account, then up to five airlines and five
    /// passengers. Missing roles fall back to the owner.
    pub fn from_accounts(accounts: &[Address]) -> Result<Self> {
        let owner = *accounts.first().ok_or(ContractError::NoAccounts)?;

        let mut airlines: Vec<Address> = accounts.iter().skip(1).take(5).copied().collect();
        if airlines.is_empty() {
            airlines.push(owner);
        }
        let mut passengers: Vec<Address> = accounts.iter().skip(6).take(5).copied().collect();
        if passengers.is_empty() {
            passengers.push(owner);
        }

        Ok(Self {
            owner,
            airlines,
            passengers,
        })
    }

    pub fn airline(&self) -> Address {
        self.airlines.first().copied().unwrap_or(self.owner)
    }

    pub fn passenger(&self) -> Address {
        self.passengers.first().copied().unwrap_or(self.owner)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Passenger and airline operations against FlightSuretyApp.
///
/// No input is validated locally; whatever the ledger rejects comes back
/// as the error.
pub struct DappClient {
    app: ContractHandle,
    data: ContractHandle,
    roles: Roles,
    flights: RwLock<Vec<Flight>>,
}

impl DappClient {
    pub fn new(app: ContractHandle, data: ContractHandle, roles: Roles) -> Self {
        Self {
            app,
            data,
            roles,
            flights: RwLock::new(Vec::new()),
        }
    }

    /// Builds a client and assigns roles from the node's accounts.
    pub async fn connect(
        rpc: Arc<RpcClient>,
        app_address: Address,
        data_address: Address,
        gas: u64,
    ) -> Result<Self> {
        let accounts = rpc.accounts().await?;
        let roles = Roles::from_accounts(&accounts)?;
        info!(
            owner = %roles.owner,
            airlines = roles.airlines.len(),
            passengers = roles.passengers.len(),
            "Dapp client connected"
        );

        Ok(Self::new(
            ContractHandle::new(rpc.clone(), app_address, gas),
            ContractHandle::new(rpc, data_address, gas),
            roles,
        ))
    }

    /// Seeds the flight list with flights registered earlier.
    pub fn with_flights(self, flights: Vec<Flight>) -> Self {
        *self.flights.write() = flights;
        self
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub async fn is_operational(&self) -> Result<bool> {
        let call = IFlightSuretyApp::isOperationalCall {};
        Ok(self.app.call(&call, Some(self.roles.owner)).await?._0)
    }

    pub async fn data_operational(&self) -> Result<bool> {
        let call = IFlightSuretyData::isOperationalCall {};
        Ok(self.data.call(&call, Some(self.roles.owner)).await?._0)
    }

    /// Registers `name` for the first airline, timestamped now.
    pub async fn register_flight(&self, name: &str) -> Result<Flight> {
        self.register_flight_at(name, unix_now()).await
    }

    pub async fn register_flight_at(&self, name: &str, timestamp: u64) -> Result<Flight> {
        let flight = Flight::new(self.roles.airline(), name, U256::from(timestamp));
        let call = IFlightSuretyApp::registerFlightCall {
            flight: flight.name.clone(),
            timestamp: sol_u256(flight.timestamp),
        };
        self.app.transact(&call, flight.airline, None).await?;

        info!(flight = %flight, "Flight registered");
        self.flights.write().push(flight.clone());
        Ok(flight)
    }

    /// Flights registered through this client.
    pub fn flights(&self) -> Vec<Flight> {
        self.flights.read().clone()
    }

    /// Pays `amount` wei from the passenger towards insurance on `flight`.
    pub async fn buy_insurance(&self, flight: &str, amount: U256) -> Result<H256> {
        let call = IFlightSuretyApp::buyInsuranceCall {
            flight: flight.to_string(),
        };
        let receipt = self
            .app
            .transact(&call, self.roles.passenger(), Some(amount))
            .await?;
        Ok(receipt.transaction_hash)
    }

    /// The passenger's credit as recorded by the Data contract.
    pub async fn get_credit(&self) -> Result<U256> {
        let passenger = self.roles.passenger();
        let call = IFlightSuretyData::GetCreditCall {
            account: sol_address(passenger),
        };
        let credit = self.data.call(&call, Some(passenger)).await?;
        Ok(native_u256(credit._0))
    }

    pub async fn withdraw_credit(&self) -> Result<H256> {
        let receipt = self
            .app
            .transact(
                &IFlightSuretyApp::withdrawCreditCall {},
                self.roles.passenger(),
                None,
            )
            .await?;
        Ok(receipt.transaction_hash)
    }

    /// Asks the contract to emit an `OracleRequest` for `flight`.
    pub async fn fetch_flight_status(&self, flight: &Flight) -> Result<H256> {
        let call = IFlightSuretyApp::fetchFlightStatusCall {
            airline: sol_address(flight.airline),
            flight: flight.name.clone(),
            timestamp: sol_u256(flight.timestamp),
        };
        let receipt = self.app.transact(&call, self.roles.owner, None).await?;
        Ok(receipt.transaction_hash)
    }

    pub async fn flight_status(&self, flight: &Flight) -> Result<StatusCode> {
        let call = IFlightSuretyApp::getFlightStatusCall {
            airline: sol_address(flight.airline),
            flight: flight.name.clone(),
            timestamp: sol_u256(flight.timestamp),
        };
        let code = self.app.call(&call, Some(self.roles.owner)).await?._0;
        Ok(StatusCode::from_code(code as u64)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn accounts(n: u8) -> Vec<Address> {
        (1..=n).map(|i| Address::from_bytes([i; 20])).collect()
    }

    fn word(value: u64) -> String {
        format!("0x{:064x}", value)
    }

    async fn mock_transaction(server: &mut mockito::ServerGuard, body: Matcher) -> mockito::Mock {
        let hash = format!("0x{}", "55".repeat(32));
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "eth_getTransactionReceipt"})))
            .with_header("content-type", "application/json")
            .with_body(rpc_body(json!({"transactionHash": hash.clone(), "status": "0x1"})))
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(body)
            .with_header("content-type", "application/json")
            .with_body(rpc_body(json!(hash)))
            .create_async()
            .await
    }

    fn rpc_body(result: serde_json::Value) -> String {
        json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string()
    }

    fn client(server: &mockito::ServerGuard, roles: Roles) -> DappClient {
        let rpc = Arc::new(RpcClient::new(&server.url()).unwrap());
        DappClient::new(
            ContractHandle::new(rpc.clone(), Address::from_bytes([0xa0; 20]), 3_000_000),
            ContractHandle::new(rpc, Address::from_bytes([0xd0; 20]), 3_000_000),
            roles,
        )
    }

    #[test]
    fn test_roles_from_full_account_list() {
        let roles = Roles::from_accounts(&accounts(12)).unwrap();
        assert_eq!(roles.owner, Address::from_bytes([1; 20]));
        assert_eq!(roles.airlines.len(), 5);
        assert_eq!(roles.airline(), Address::from_bytes([2; 20]));
        assert_eq!(roles.passengers.len(), 5);
        assert_eq!(roles.passenger(), Address::from_bytes([7; 20]));
    }

    #[test]
    fn test_roles_fall_back_to_owner() {
        let roles = Roles::from_accounts(&accounts(1)).unwrap();
        assert_eq!(roles.airline(), roles.owner);
        assert_eq!(roles.passenger(), roles.owner);
        assert!(matches!(
            Roles::from_accounts(&[]),
            Err(ContractError::NoAccounts)
        ));
    }

    #[tokio::test]
    async fn test_is_operational() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "eth_call"})))
            .with_header("content-type", "application/json")
            .with_body(rpc_body(json!(word(1))))
            .create_async()
            .await;

        let client = client(&server, Roles::from_accounts(&accounts(3)).unwrap());
        assert!(client.is_operational().await.unwrap());
    }

    #[tokio::test]
    async fn test_flight_status_decodes_label() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "eth_call"})))
            .with_header("content-type", "application/json")
            .with_body(rpc_body(json!(word(20))))
            .create_async()
            .await;

        let roles = Roles::from_accounts(&accounts(3)).unwrap();
        let flight = Flight::new(roles.airline(), "ND1309", U256::from(1_700_000_000u64));
        let client = client(&server, roles);
        let status = client.flight_status(&flight).await.unwrap();
        assert_eq!(status, StatusCode::LateAirline);
        assert_eq!(status.label(), "STATUS_CODE_LATE_AIRLINE");
    }

    #[tokio::test]
    async fn test_register_flight_records_flight() {
        let mut server = mockito::Server::new_async().await;
        mock_transaction(
            &mut server,
            Matcher::PartialJson(json!({"method": "eth_sendTransaction"})),
        )
        .await;

        let client = client(&server, Roles::from_accounts(&accounts(3)).unwrap());
        let flight = client.register_flight_at("F1", 1_700_000_000).await.unwrap();
        assert_eq!(flight.airline, Address::from_bytes([2; 20]));
        assert_eq!(flight.name, "F1");
        assert_eq!(client.flights(), vec![flight]);
    }

    #[tokio::test]
    async fn test_registered_flights_extend_earlier_ones() {
        let mut server = mockito::Server::new_async().await;
        mock_transaction(
            &mut server,
            Matcher::PartialJson(json!({"method": "eth_sendTransaction"})),
        )
        .await;

        let roles = Roles::from_accounts(&accounts(3)).unwrap();
        let earlier = Flight::new(roles.airline(), "F0", U256::from(1_600_000_000u64));
        let client = client(&server, roles).with_flights(vec![earlier.clone()]);

        let flight = client.register_flight_at("F1", 1_700_000_000).await.unwrap();
        assert_eq!(client.flights(), vec![earlier, flight]);
    }

    #[tokio::test]
    async fn test_buy_insurance_sends_flight_name_to_app() {
        let mut server = mockito::Server::new_async().await;
        // buyInsurance(string) from the first passenger, paying 100 wei
        let send = mock_transaction(
            &mut server,
            Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"method": "eth_sendTransaction"})),
                Matcher::Regex(format!(r#""to":"0x{}""#, "a0".repeat(20))),
                Matcher::Regex(format!(r#""from":"0x{}""#, "07".repeat(20))),
                Matcher::Regex(r#""value":"0x64""#.to_string()),
                Matcher::Regex(r#""data":"0x6ea21ad6"#.to_string()),
            ]),
        )
        .await;

        let client = client(&server, Roles::from_accounts(&accounts(12)).unwrap());
        client.buy_insurance("F1", U256::from(100)).await.unwrap();
        send.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_credit_reads_data_contract() {
        let mut server = mockito::Server::new_async().await;
        // GetCredit(address) on the Data contract for the first passenger
        let credit = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"method": "eth_call"})),
                Matcher::Regex(format!(r#""to":"0x{}""#, "d0".repeat(20))),
                Matcher::Regex(format!(r#""data":"0x71467d5f{:0>64}""#, "07".repeat(20))),
            ]))
            .with_header("content-type", "application/json")
            .with_body(rpc_body(json!(word(1_500))))
            .create_async()
            .await;

        let client = client(&server, Roles::from_accounts(&accounts(12)).unwrap());
        assert_eq!(client.get_credit().await.unwrap(), U256::from(1_500));
        credit.assert_async().await;
    }

    #[tokio::test]
    async fn test_ledger_error_is_passed_through() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {"code": -32000, "message": "VM Exception while processing transaction: revert Caller is not a registered airline"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client(&server, Roles::from_accounts(&accounts(3)).unwrap());
        let err = client.register_flight_at("F1", 1).await.unwrap_err();
        assert!(err.is_revert());
        assert!(err.to_string().contains("Caller is not a registered airline"));
        assert!(client.flights().is_empty());
    }
}
