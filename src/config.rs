use anyhow::{Context, Result};
use flight_surety_oracle::{RegistrationPolicy, StartBlock, StatusStrategy};
use flight_surety_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables that override file settings, e.g.
/// `FLIGHT_SURETY__RELAY__POOL_SIZE=10`.
pub const ENV_PREFIX: &str = "FLIGHT_SURETY";

/// Complete relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Selected entry of `networks`
    pub network: String,
    /// Deployments by network name
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Oracle relay configuration
    pub relay: RelayConfig,
    /// HTTP stub configuration
    pub api: ApiConfig,
    /// Checkpoint storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub log: LogConfig,
}

/// One FlightSurety deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint; `ws://` is rewritten to `http://`
    pub url: String,
    #[serde(alias = "appAddress")]
    pub app_address: Option<Address>,
    #[serde(alias = "dataAddress")]
    pub data_address: Option<Address>,
    /// Build artifact of FlightSuretyApp
    #[serde(alias = "appArtifact")]
    pub app_artifact: Option<PathBuf>,
    /// Build artifact of FlightSuretyData
    #[serde(alias = "dataArtifact")]
    pub data_artifact: Option<PathBuf>,
    /// Network id used to look up deployed addresses inside artifacts
    #[serde(alias = "networkId")]
    pub network_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Number of node accounts registered as oracles
    pub pool_size: usize,
    /// Gas limit for every transaction
    pub gas_limit: u64,
    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum blocks per eth_getLogs query
    pub batch_blocks: u64,
    /// "earliest", "latest" or a block number
    pub start_block: StartBlock,
    /// Continue from the stored checkpoint when one exists
    pub resume: bool,
    pub status_strategy: StatusStrategy,
    pub registration_policy: RegistrationPolicy,
    /// Reuse accounts registered by an earlier run
    pub adopt_existing: bool,
    /// Upper bound for one response submission in seconds
    pub submission_timeout: u64,
    /// Upper bound for waiting on a receipt in seconds
    pub receipt_timeout: u64,
    /// HTTP request timeout in seconds
    pub request_timeout: u64,
    /// Time allowed for in-flight submissions at shutdown in seconds
    pub shutdown_grace: u64,
    /// Fixed RNG seed for status codes
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Serve the HTTP stub next to the relay
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Checkpoint file; defaults to the platform data directory
    pub checkpoint_path: Option<PathBuf>,
    /// Keep the cursor in memory only
    pub in_memory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level or EnvFilter directive
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert("localhost".to_string(), NetworkConfig::localhost());

        Self {
            network: "localhost".to_string(),
            networks,
            relay: RelayConfig::default(),
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl NetworkConfig {
    pub fn localhost() -> Self {
        Self {
            url: "http://localhost:8545".to_string(),
            ..Default::default()
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pool_size: 20,
            gas_limit: 3_000_000,
            poll_interval_ms: 1000,
            batch_blocks: 1000,
            start_block: StartBlock::Earliest,
            resume: true,
            status_strategy: StatusStrategy::PerEvent,
            registration_policy: RegistrationPolicy::FailFast,
            adopt_existing: false,
            submission_timeout: 120,
            receipt_timeout: 60,
            request_timeout: 30,
            shutdown_grace: 10,
            seed: None,
        }
    }
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Platform data directory for relay state.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "flight-surety")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Reads a deployment file of the form
/// `{"localhost": {"url": ..., "appAddress": ..., "dataAddress": ...}}`.
pub fn load_networks<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, NetworkConfig>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read network file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse network file {}", path.display()))
}

impl Config {
    /// Builds the configuration from defaults, an optional TOML file and
    /// `FLIGHT_SURETY__*` environment variables, in increasing priority.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Configuration file {} not found", path.display());
            }
            builder = builder.add_source(
                config::File::from(path.to_path_buf()).format(config::FileFormat::Toml),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("Failed to create configuration directory")?;
            }
        }
        fs::write(path, content).context("Failed to write configuration file")?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.relay.pool_size == 0 {
            anyhow::bail!("relay.pool_size must be greater than 0");
        }

        if self.relay.poll_interval_ms == 0 {
            anyhow::bail!("relay.poll_interval_ms must be greater than 0");
        }

        if self.relay.batch_blocks == 0 {
            anyhow::bail!("relay.batch_blocks must be greater than 0");
        }

        if !self.networks.contains_key(&self.network) {
            anyhow::bail!("Unknown network: {}", self.network);
        }

        Ok(())
    }

    /// The selected deployment.
    pub fn selected_network(&self) -> Result<&NetworkConfig> {
        self.networks
            .get(&self.network)
            .with_context(|| format!("Unknown network: {}", self.network))
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.storage
            .checkpoint_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("checkpoints.json"))
    }

    /// Flights registered by the dapp commands, one file per network,
    /// next to the checkpoint file.
    pub fn flights_path(&self) -> PathBuf {
        self.checkpoint_path()
            .with_file_name(format!("flights-{}.json", self.network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network, "localhost");
        assert_eq!(config.relay.pool_size, 20);
        assert_eq!(config.relay.gas_limit, 3_000_000);
        assert_eq!(config.api.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flights_file_sits_next_to_checkpoints() {
        let mut config = Config::default();
        config.storage.checkpoint_path = Some(PathBuf::from("/var/lib/fs/checkpoints.json"));
        config.network = "sepolia".to_string();
        assert_eq!(
            config.flights_path(),
            PathBuf::from("/var/lib/fs/flights-sepolia.json")
        );
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();

        config.relay.pool_size = 0;
        assert!(config.validate().is_err());
        config.relay.pool_size = 20;

        config.relay.batch_blocks = 0;
        assert!(config.validate().is_err());
        config.relay.batch_blocks = 100;

        config.network = "sepolia".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flight-surety.toml");

        let mut config = Config::default();
        config.relay.start_block = StartBlock::Number(12);
        config.relay.status_strategy = StatusStrategy::PerOracle;
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.relay.start_block, StartBlock::Number(12));
        assert_eq!(loaded.relay.status_strategy, StatusStrategy::PerOracle);
        assert_eq!(loaded.networks["localhost"].url, "http://localhost:8545");
    }

    #[test]
    fn test_load_layers_file_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relay.toml");
        fs::write(
            &path,
            r#"
network = "ganache"

[networks.ganache]
url = "ws://127.0.0.1:7545"
app_address = "0x0707070707070707070707070707070707070707"

[relay]
pool_size = 5
start_block = "latest"
registration_policy = "skip"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.network, "ganache");
        assert_eq!(config.relay.pool_size, 5);
        assert_eq!(config.relay.gas_limit, 3_000_000);
        assert_eq!(config.relay.start_block, StartBlock::Latest);
        assert_eq!(config.relay.registration_policy, RegistrationPolicy::Skip);
        let network = config.selected_network().unwrap();
        assert_eq!(
            network.app_address,
            Some(Address::from_bytes([7; 20]))
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/flight-surety.toml"))).is_err());
    }

    #[test]
    fn test_load_original_networks_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "localhost": {
                    "url": "http://localhost:8545",
                    "dataAddress": "0x0101010101010101010101010101010101010101",
                    "appAddress": "0x0202020202020202020202020202020202020202"
                }
            }"#,
        )
        .unwrap();

        let networks = load_networks(&path).unwrap();
        let localhost = &networks["localhost"];
        assert_eq!(localhost.data_address, Some(Address::from_bytes([1; 20])));
        assert_eq!(localhost.app_address, Some(Address::from_bytes([2; 20])));
        assert!(localhost.app_artifact.is_none());
    }
}
