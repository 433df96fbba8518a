use std::time::Duration;

use alloy_primitives::utils::{format_ether, parse_ether};
use alloy_primitives::U256;

use crate::error::{PipelineError, PipelineResult};

/// Default mint price: 1 ether, matching the deployed contract's cost.
pub const DEFAULT_MINT_PRICE_ETHER: &str = "1";

/// Settings for an [`AssetPipeline`](crate::AssetPipeline).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Fixed payment attached to every mint, in wei.
    pub mint_price_wei: U256,
    /// Upper bound on each stage. `None` lets stages run as long as their
    /// own clients allow.
    pub stage_timeout: Option<Duration>,
    /// Buffer size of the progress event channel.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mint_price_wei: U256::from(10u64).pow(U256::from(18u64)),
            stage_timeout: None,
            event_capacity: 64,
        }
    }
}

impl PipelineConfig {
    /// Set the mint price from a decimal ether amount such as `"0.05"`.
    pub fn with_mint_price_ether(mut self, ether: &str) -> PipelineResult<Self> {
        self.mint_price_wei = parse_ether(ether.trim())
            .map_err(|e| PipelineError::Config(format!("mint price `{ether}`: {e}")))?;
        Ok(self)
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// The mint price as a decimal ether string.
    pub fn mint_price_ether(&self) -> String {
        format_ether(self.mint_price_wei)
    }
}
