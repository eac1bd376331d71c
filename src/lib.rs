// Core modules
pub mod api;
pub mod config;
pub mod dapp;
pub mod node;

// Re-export commonly used types
pub use api::{router, ApiServer, ApiState, API_MESSAGE};
pub use config::{ApiConfig, Config, NetworkConfig, RelayConfig, StorageConfig};
pub use dapp::{Row, Section};
pub use node::RelayNode;

// Re-export crate modules
pub use flight_surety_contracts as contracts;
pub use flight_surety_oracle as oracle;
pub use flight_surety_rpc as rpc;
pub use flight_surety_storage as storage;
pub use flight_surety_types as types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get client version string
pub fn client_version() -> String {
    format!("flight-surety/v{}/rust", VERSION)
}
