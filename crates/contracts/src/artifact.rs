use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::{ContractError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub indexed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    pub entry_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default)]
    pub anonymous: bool,
}

fn default_entry_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkEntry {
    pub address: String,
}

/// A compiled contract description as emitted by the build toolchain.
///
/// Only `abi` is required. A bare ABI array is accepted as well.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    #[serde(default)]
    pub contract_name: String,
    pub abi: Vec<AbiEntry>,
    #[serde(default)]
    pub networks: HashMap<String, NetworkEntry>,
}

impl AbiEntry {
    /// Canonical `name(type,...)` form of the entry's inputs.
    pub fn signature(&self) -> String {
        let kinds: Vec<&str> = self.inputs.iter().map(|p| p.kind.as_str()).collect();
        format!("{}({})", self.name, kinds.join(","))
    }
}

impl ContractArtifact {
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ContractError::Artifact(format!("{}: {}", name, e)))?;

        let mut artifact: ContractArtifact = if value.is_array() {
            ContractArtifact {
                contract_name: String::new(),
                abi: serde_json::from_value(value)
                    .map_err(|e| ContractError::Artifact(format!("{}: {}", name, e)))?,
                networks: HashMap::new(),
            }
        } else {
            serde_json::from_value(value)
                .map_err(|e| ContractError::Artifact(format!("{}: {}", name, e)))?
        };

        if artifact.contract_name.is_empty() {
            artifact.contract_name = name.to_string();
        }
        Ok(artifact)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ContractError::Artifact(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_json(&name, &json)
    }

    fn missing(&self, entry: impl Into<String>) -> ContractError {
        ContractError::MissingAbiEntry {
            contract: self.contract_name.clone(),
            entry: entry.into(),
        }
    }

    fn require(&self, entry_type: &str, signature: &str) -> Result<&AbiEntry> {
        self.abi
            .iter()
            .filter(|e| e.entry_type == entry_type && !e.anonymous)
            .find(|e| e.signature() == signature)
            .ok_or_else(|| self.missing(format!("{} {}", entry_type, signature)))
    }

    /// The function whose canonical input signature is `signature`.
    ///
    /// Output types are not compared; a contract that returns something
    /// else surfaces as a decode error at call time.
    pub fn require_function(&self, signature: &str) -> Result<&AbiEntry> {
        self.require("function", signature)
    }

    pub fn require_event(&self, signature: &str) -> Result<&AbiEntry> {
        self.require("event", signature)
    }

    pub fn deployed_address(&self, network_id: &str) -> Option<&str> {
        self.networks.get(network_id).map(|n| n.address.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_ARTIFACT: &str = r#"{
        "contractName": "FlightSuretyApp",
        "abi": [
            {"type": "constructor", "inputs": [{"name": "dataContract", "type": "address"}]},
            {"type": "function", "name": "REGISTRATION_FEE", "inputs": [],
             "outputs": [{"name": "", "type": "uint256"}], "stateMutability": "view"},
            {"type": "function", "name": "getMyIndexes", "inputs": [],
             "outputs": [{"name": "", "type": "uint8[3]"}]},
            {"type": "event", "name": "OracleRequest", "anonymous": false, "inputs": [
                {"indexed": false, "name": "index", "type": "uint8"},
                {"indexed": false, "name": "airline", "type": "address"},
                {"indexed": false, "name": "flight", "type": "string"},
                {"indexed": false, "name": "timestamp", "type": "uint256"}
            ]}
        ],
        "networks": {"5777": {"address": "0x0707070707070707070707070707070707070707"}}
    }"#;

    #[test]
    fn test_finds_function_by_signature() {
        let artifact = ContractArtifact::from_json("app", APP_ARTIFACT).unwrap();
        assert_eq!(artifact.contract_name, "FlightSuretyApp");

        let found = artifact.require_function("getMyIndexes()").unwrap();
        assert_eq!(found.outputs[0].kind, "uint8[3]");
        assert_eq!(
            artifact.deployed_address("5777"),
            Some("0x0707070707070707070707070707070707070707")
        );
    }

    #[test]
    fn test_missing_function_is_reported() {
        let artifact = ContractArtifact::from_json("app", APP_ARTIFACT).unwrap();
        let err = artifact.require_function("registerOracle()").unwrap_err();
        assert!(matches!(
            err,
            ContractError::MissingAbiEntry { ref entry, .. } if entry == "function registerOracle()"
        ));

        // same name, different inputs
        assert!(artifact.require_function("getMyIndexes(address)").is_err());
        // constructors are not functions
        assert!(artifact.require_function("(address)").is_err());
    }

    #[test]
    fn test_event_keeps_indexed_flags() {
        let artifact = ContractArtifact::from_json("app", APP_ARTIFACT).unwrap();
        let found = artifact
            .require_event("OracleRequest(uint8,address,string,uint256)")
            .unwrap();
        assert_eq!(found.inputs.len(), 4);
        assert!(found.inputs.iter().all(|p| !p.indexed));
        assert!(artifact
            .require_function("OracleRequest(uint8,address,string,uint256)")
            .is_err());
    }

    #[test]
    fn test_bare_abi_array() {
        let artifact = ContractArtifact::from_json(
            "FlightSuretyData",
            r#"[{"type": "function", "name": "isOperational", "inputs": [],
                 "outputs": [{"name": "", "type": "bool"}]}]"#,
        )
        .unwrap();
        assert_eq!(artifact.contract_name, "FlightSuretyData");
        assert!(artifact.require_function("isOperational()").is_ok());
    }

    #[test]
    fn test_malformed_json_is_an_artifact_error() {
        assert!(matches!(
            ContractArtifact::from_json("app", "{\"abi\": 3}"),
            Err(ContractError::Artifact(_))
        ));
    }
}
