use std::path::Path;
use std::time::Duration;

use aimint_chain::{Address, ChainEntry, ChainRegistry, ConfirmationPolicy};
use aimint_pipeline::{PipelineConfig, DEFAULT_MINT_PRICE_ETHER};
use aimint_server::ServerConfig;
use aimint_store::{NftStorageConfig, DEFAULT_API_URL, DEFAULT_GATEWAY};
use aimint_synth::{SynthConfig, DEFAULT_ENDPOINT};
use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "aimint.toml";

/// Address of the first contract deployed on a fresh Hardhat node.
const HARDHAT_FIRST_CONTRACT: Address = Address::new([
    0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f, 0x64,
    0x2f, 0x64, 0x18, 0x0a, 0xa3,
]);

/// Everything `aimint` reads from `aimint.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub synthesis: SynthesisSection,
    pub storage: StorageSection,
    pub chain: ChainSection,
    /// Contract lookup keyed by chain id.
    pub chains: ChainsSection,
    pub pipeline: PipelineSection,
    pub server: ServerConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSection {
    pub endpoint: String,
    pub wait_for_model: bool,
    /// Environment variable holding the inference API token.
    pub token_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for SynthesisSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            wait_for_model: true,
            token_env: "HUGGING_FACE_API_KEY".to_string(),
            timeout_secs: Some(300),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// nft.storage upload API.
    NftStorage,
    /// Process-local store; URIs are not resolvable by anyone else.
    Memory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    pub api_url: String,
    pub gateway: String,
    /// Environment variable holding the storage API token.
    pub token_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::NftStorage,
            api_url: DEFAULT_API_URL.to_string(),
            gateway: DEFAULT_GATEWAY.to_string(),
            token_env: "NFT_STORAGE_API_KEY".to_string(),
            timeout_secs: Some(120),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    /// JSON-RPC endpoint of the node or wallet that signs.
    pub rpc_url: String,
    /// Signing account. Defaults to the wallet's first account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Address>,
    pub rpc_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Stop waiting for the mint receipt after this long and report the
    /// transaction as pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_secs: Option<u64>,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            account: None,
            rpc_timeout_secs: 30,
            poll_interval_ms: 2_000,
            confirmation_timeout_secs: Some(300),
        }
    }
}

/// `[chains.<id>]` tables; a local Hardhat node is configured by default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainsSection(pub ChainRegistry);

impl Default for ChainsSection {
    fn default() -> Self {
        let mut registry = ChainRegistry::new();
        registry.insert(31337, ChainEntry::new("localhost", HARDHAT_FIRST_CONTRACT));
        Self(registry)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Payment attached to each mint, as a decimal ether amount.
    pub mint_price_ether: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_timeout_secs: Option<u64>,
    pub event_capacity: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            mint_price_ether: DEFAULT_MINT_PRICE_ETHER.to_string(),
            stage_timeout_secs: None,
            event_capacity: 64,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load `path`, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.chains.0.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.chains.0
    }

    pub fn synth_config(&self) -> anyhow::Result<SynthConfig> {
        let s = &self.synthesis;
        Ok(SynthConfig {
            endpoint: s.endpoint.clone(),
            api_token: token_from_env(&s.token_env)?,
            wait_for_model: s.wait_for_model,
            timeout: s.timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn storage_config(&self) -> anyhow::Result<NftStorageConfig> {
        let s = &self.storage;
        Ok(NftStorageConfig {
            api_url: s.api_url.clone(),
            api_token: token_from_env(&s.token_env)?,
            gateway: s.gateway.clone(),
            timeout: s.timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(self.chain.poll_interval_ms.max(1)),
            timeout: self.chain.confirmation_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let p = &self.pipeline;
        let mut config = PipelineConfig {
            event_capacity: p.event_capacity,
            ..PipelineConfig::default()
        }
        .with_mint_price_ether(&p.mint_price_ether)?;
        if let Some(secs) = p.stage_timeout_secs {
            config = config.with_stage_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn token_from_env(var: &str) -> anyhow::Result<String> {
    let token = std::env::var(var)
        .with_context(|| format!("environment variable {var} is not set"))?;
    if token.trim().is_empty() {
        anyhow::bail!("environment variable {var} is empty");
    }
    Ok(token)
}
