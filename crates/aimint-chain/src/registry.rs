use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use alloy_json_abi::{Function, JsonAbi, StateMutability};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChainError, ChainResult};

/// Where the NFT contract lives on one network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    /// Display name, e.g. `localhost`.
    #[serde(default)]
    pub name: String,
    /// Deployed address of the NFT contract.
    pub contract_address: Address,
    /// Optional contract ABI: a bare ABI array or a build artifact with an
    /// `abi` field. When set, it must expose a payable `mint(string)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi_path: Option<PathBuf>,
}

impl ChainEntry {
    pub fn new(name: impl Into<String>, contract_address: Address) -> Self {
        Self {
            name: name.into(),
            contract_address,
            abi_path: None,
        }
    }
}

/// Contract address book keyed by chain id.
///
/// Serialized as a table of decimal chain ids:
///
/// ```toml
/// [31337]
/// name = "localhost"
/// contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainRegistry {
    chains: BTreeMap<String, ChainEntry>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(s: &str) -> ChainResult<Self> {
        let registry: Self = toml::from_str(s).map_err(|e| ChainError::Registry(e.to_string()))?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn insert(&mut self, chain_id: u64, entry: ChainEntry) {
        self.chains.insert(chain_id.to_string(), entry);
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainEntry> {
        self.chains.get(&chain_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Entries in ascending chain id order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &ChainEntry)> {
        let mut entries: Vec<_> = self
            .chains
            .iter()
            .filter_map(|(k, v)| k.parse::<u64>().ok().map(|id| (id, v)))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter()
    }

    /// Every key must be a canonical decimal chain id: no sign, no
    /// leading zeros.
    pub fn validate(&self) -> ChainResult<()> {
        for key in self.chains.keys() {
            match key.parse::<u64>() {
                Ok(id) if id.to_string() == *key => {}
                Ok(id) => {
                    return Err(ChainError::Registry(format!(
                        "`{key}` is not a canonical chain id (write `{id}`)"
                    )))
                }
                Err(_) => {
                    return Err(ChainError::Registry(format!(
                        "`{key}` is not a decimal chain id"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Look up the contract for `chain_id`, loading and checking its ABI
    /// when one is configured.
    pub fn resolve(&self, chain_id: u64) -> ChainResult<ResolvedContract> {
        let entry = self
            .get(chain_id)
            .ok_or(ChainError::UnknownChain(chain_id))?;
        let abi = match &entry.abi_path {
            Some(path) => {
                let abi = ContractAbi::load(path)?;
                if !abi.has_payable_mint() {
                    return Err(ChainError::InvalidAbi(format!(
                        "{} has no payable mint(string)",
                        path.display()
                    )));
                }
                Some(abi)
            }
            None => None,
        };
        Ok(ResolvedContract {
            chain_id,
            name: entry.name.clone(),
            address: entry.contract_address,
            abi,
        })
    }
}

/// A registry entry matched to a live network.
#[derive(Clone, Debug)]
pub struct ResolvedContract {
    pub chain_id: u64,
    pub name: String,
    pub address: Address,
    pub abi: Option<ContractAbi>,
}

/// JSON contract ABI.
#[derive(Clone, Debug)]
pub struct ContractAbi {
    abi: JsonAbi,
}

impl ContractAbi {
    /// Accepts a bare ABI array or an object carrying one under `abi`.
    pub fn from_json(value: Value) -> ChainResult<Self> {
        let items = match value {
            Value::Array(_) => value,
            Value::Object(mut obj) => match obj.remove("abi") {
                Some(items @ Value::Array(_)) => items,
                _ => return Err(ChainError::InvalidAbi("missing `abi` array".into())),
            },
            _ => return Err(ChainError::InvalidAbi("expected array or object".into())),
        };
        let abi = serde_json::from_value(items).map_err(|e| ChainError::InvalidAbi(e.to_string()))?;
        Ok(Self { abi })
    }

    pub fn load(path: &Path) -> ChainResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ChainError::InvalidAbi(format!("{}: {e}", path.display())))?;
        Self::from_json(value)
    }

    /// Every overload named `name`.
    pub fn functions(&self, name: &str) -> &[Function] {
        self.abi.function(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// `true` when the ABI declares `mint(string)` as payable. Legacy
    /// `payable: true` entries are read as payable by the ABI parser.
    pub fn has_payable_mint(&self) -> bool {
        self.functions("mint").iter().any(|f| {
            f.state_mutability == StateMutability::Payable
                && f.inputs.len() == 1
                && f.inputs[0].ty == "string"
        })
    }
}
