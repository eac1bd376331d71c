use anyhow::{Context, Result};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use flight_surety_contracts::{
    verify_dapp_artifacts, verify_oracle_artifact, ContractArtifact, DappClient, FlightSuretyApp,
    OracleContract,
};
use flight_surety_oracle::{
    Bootstrap, Dispatcher, OracleRelay, RelayMetrics, RelayOptions, RelaySummary, RequestPoller,
    Responder,
};
use flight_surety_rpc::{RpcClient, RpcClientConfig};
use flight_surety_storage::{
    checkpoint_key, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
use flight_surety_types::Address;

use crate::api::ApiServer;
use crate::config::{Config, NetworkConfig};

fn rpc_config(config: &Config) -> RpcClientConfig {
    RpcClientConfig {
        request_timeout: std::time::Duration::from_secs(config.relay.request_timeout),
        receipt_timeout: std::time::Duration::from_secs(config.relay.receipt_timeout),
        user_agent: Some(crate::client_version()),
        ..Default::default()
    }
}

pub fn rpc_client(config: &Config, network: &NetworkConfig) -> Result<Arc<RpcClient>> {
    if network.url.is_empty() {
        anyhow::bail!("Network {} has no url", config.network);
    }
    let client = RpcClient::with_config(&network.url, rpc_config(config))
        .context("Failed to create JSON-RPC client")?;
    Ok(Arc::new(client))
}

fn load_artifact(path: Option<&std::path::Path>) -> Result<Option<ContractArtifact>> {
    path.map(|p| {
        ContractArtifact::load(p).with_context(|| format!("Failed to load artifact {}", p.display()))
    })
    .transpose()
}

/// Resolves a contract address from the network entry, falling back to
/// the artifact's deployment record.
fn resolve_address(
    name: &str,
    configured: Option<Address>,
    artifact: Option<&ContractArtifact>,
    network_id: Option<&str>,
) -> Result<Address> {
    if let Some(address) = configured {
        return Ok(address);
    }

    let deployed = artifact
        .zip(network_id)
        .and_then(|(artifact, id)| artifact.deployed_address(id));
    match deployed {
        Some(address) => address
            .parse()
            .with_context(|| format!("Invalid {} address in artifact: {}", name, address)),
        None => anyhow::bail!("No {} address configured", name),
    }
}

/// Live binding for the selected network's App contract.
pub fn app_contract(config: &Config) -> Result<(FlightSuretyApp, Address)> {
    let network = config.selected_network()?;
    let artifact = load_artifact(network.app_artifact.as_deref())?;
    if let Some(artifact) = &artifact {
        verify_oracle_artifact(artifact).context("App artifact does not match FlightSuretyApp")?;
    }
    let address = resolve_address(
        "app",
        network.app_address,
        artifact.as_ref(),
        network.network_id.as_deref(),
    )?;

    let rpc = rpc_client(config, network)?;
    Ok((
        FlightSuretyApp::new(rpc, address, config.relay.gas_limit),
        address,
    ))
}

/// Passenger client for the selected network.
pub async fn dapp_client(config: &Config) -> Result<DappClient> {
    let network = config.selected_network()?;
    let app_artifact = load_artifact(network.app_artifact.as_deref())?;
    let data_artifact = load_artifact(network.data_artifact.as_deref())?;

    match (&app_artifact, &data_artifact) {
        (Some(app), Some(data)) => verify_dapp_artifacts(app, data)
            .context("Artifacts do not match FlightSuretyApp and FlightSuretyData")?,
        (None, None) => {}
        _ => anyhow::bail!("Configure both app_artifact and data_artifact, or neither"),
    }
    let network_id = network.network_id.as_deref();
    let app_address = resolve_address("app", network.app_address, app_artifact.as_ref(), network_id)?;
    let data_address =
        resolve_address("data", network.data_address, data_artifact.as_ref(), network_id)?;

    let rpc = rpc_client(config, network)?;
    DappClient::connect(rpc, app_address, data_address, config.relay.gas_limit)
        .await
        .context("Failed to connect dapp client")
}

fn checkpoint_store(config: &Config) -> Result<Arc<dyn CheckpointStore>> {
    if config.storage.in_memory {
        return Ok(Arc::new(MemoryCheckpointStore::new()));
    }
    let path = config.checkpoint_path();
    info!("Checkpoint file: {}", path.display());
    Ok(Arc::new(
        FileCheckpointStore::open(&path).context("Failed to open checkpoint store")?,
    ))
}

/// Relay service: oracle bootstrap, request loop and HTTP stub.
pub struct RelayNode {
    config: Config,
    contract: Arc<dyn OracleContract>,
    contract_address: Address,
    store: Arc<dyn CheckpointStore>,
    registry: Registry,
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayNode {
    /// Connects to the configured network.
    pub fn new(config: Config) -> Result<Self> {
        let (app, address) = app_contract(&config)?;
        let store = checkpoint_store(&config)?;
        Ok(Self::with_contract(config, Arc::new(app), address, store))
    }

    pub fn with_contract(
        config: Config,
        contract: Arc<dyn OracleContract>,
        contract_address: Address,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            config,
            contract,
            contract_address,
            store,
            registry: Registry::new(),
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle for triggering shutdown from outside.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Registers the pool and builds the relay without starting it.
    pub async fn build_relay(&self) -> Result<OracleRelay> {
        let relay = &self.config.relay;
        let metrics = RelayMetrics::new(&self.registry).context("Failed to register metrics")?;

        let pool = Bootstrap::new(relay.pool_size, metrics.clone())
            .policy(relay.registration_policy)
            .adopt_existing(relay.adopt_existing)
            .run(self.contract.as_ref())
            .await
            .context("Oracle bootstrap failed")?;

        let responder = Arc::new(Responder::new(
            self.contract.clone(),
            relay.submission_timeout(),
            metrics.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(pool),
            responder,
            relay.status_strategy,
            relay.seed,
            metrics.clone(),
        ));

        let key = checkpoint_key(&self.config.network, &format!("{:x}", self.contract_address));
        let poller = RequestPoller::new(
            self.contract.clone(),
            self.store.clone(),
            key,
            relay.start_block,
            relay.batch_blocks,
        )
        .resume(relay.resume);

        Ok(OracleRelay::new(
            poller,
            dispatcher,
            RelayOptions {
                poll_interval: relay.poll_interval(),
                shutdown_grace: relay.shutdown_grace(),
            },
            metrics,
        ))
    }

    fn start_api(&self) -> Result<Option<JoinHandle<()>>> {
        if !self.config.api.enabled {
            return Ok(None);
        }

        let addr: SocketAddr = format!("{}:{}", self.config.api.host, self.config.api.port)
            .parse()
            .context("Invalid API listen address")?;
        let server = ApiServer::new(addr, self.registry.clone());
        let shutdown_rx = self.shutdown_tx.subscribe();

        Ok(Some(tokio::spawn(async move {
            if let Err(e) = server.run(shutdown_rx).await {
                error!("HTTP API error: {}", e);
            }
        })))
    }

    /// Runs until the shutdown handle fires.
    ///
    /// The HTTP API comes up first and stays up while the oracles
    /// register; it is stopped on every exit path.
    pub async fn run(self) -> Result<RelaySummary> {
        info!(
            version = %crate::client_version(),
            network = %self.config.network,
            app = %self.contract_address,
            pool_size = self.config.relay.pool_size,
            "Starting oracle relay"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let api = self.start_api()?;

        let bootstrap = tokio::select! {
            relay = self.build_relay() => relay.map(Some),
            _ = shutdown_rx.recv() => {
                info!("Shutdown requested during oracle bootstrap");
                Ok(None)
            }
        };

        let result = match bootstrap {
            Ok(Some(relay)) => Ok(relay.run(shutdown_rx).await),
            Ok(None) => Ok(RelaySummary::default()),
            Err(e) => Err(e),
        };

        self.stop_api(api).await;
        result
    }

    async fn stop_api(&self, api: Option<JoinHandle<()>>) {
        if let Some(api) = api {
            let _ = self.shutdown_tx.send(());
            if let Err(e) = api.await {
                error!("HTTP API task failed: {}", e);
            }
        }
    }

    /// Runs until Ctrl-C.
    pub async fn run_until_ctrl_c(self) -> Result<RelaySummary> {
        let shutdown = self.shutdown_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down...");
                let _ = shutdown.send(());
            }
        });
        self.run().await
    }
}
