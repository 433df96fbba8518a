use std::sync::Arc;
use std::time::{Duration, Instant};

use aimint_types::MintReceipt;
use alloy_primitives::{hex, Address, TxHash, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{MintError, MintResult};
use crate::rpc::{JsonRpcClient, TransactionRequest};
use crate::signer::Signer;

mod abi {
    alloy_sol_types::sol! {
        function mint(string tokenURI) external payable returns (uint256);
    }
}

/// Encode the calldata for `mint(tokenURI)`.
pub fn encode_mint_call(token_uri: &str) -> Vec<u8> {
    abi::mintCall {
        tokenURI: token_uri.to_string(),
    }
    .abi_encode()
}

/// How long to wait for the mint transaction to be mined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Delay between receipt polls.
    pub poll_interval: Duration,
    /// Give up waiting after this long and report the transaction as
    /// pending. `None` waits until mined.
    pub timeout: Option<Duration>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Submits a payable mint and waits for its outcome.
#[async_trait]
pub trait MintExecutor: Send + Sync {
    /// Mint one token pointing at `token_uri`, paying `price_wei` from
    /// `signer`. Exactly one transaction is broadcast per call.
    ///
    /// Returns a confirmed receipt once mined with success status, or a
    /// pending receipt when the wait gave up while the transaction is
    /// still live.
    async fn mint(
        &self,
        token_uri: &str,
        signer: &dyn Signer,
        price_wei: U256,
    ) -> MintResult<MintReceipt>;
}

/// [`MintExecutor`] for a deployed contract exposing
/// `mint(string) payable`.
#[derive(Debug, Clone)]
pub struct ContractMintExecutor {
    rpc: Arc<JsonRpcClient>,
    contract: Address,
    policy: ConfirmationPolicy,
}

impl ContractMintExecutor {
    pub fn new(rpc: Arc<JsonRpcClient>, contract: Address, policy: ConfirmationPolicy) -> Self {
        Self {
            rpc,
            contract,
            policy,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> MintResult<MintReceipt> {
        let hash = hex::encode_prefixed(tx_hash);
        let started = Instant::now();
        loop {
            match self.rpc.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) if receipt.is_mined() => {
                    if receipt.succeeded() {
                        info!(tx = %hash, "mint confirmed");
                        return Ok(MintReceipt::confirmed(hash));
                    }
                    warn!(tx = %hash, "mint reverted");
                    return Err(MintError::Reverted { tx_hash: hash });
                }
                Ok(_) => debug!(tx = %hash, "mint not yet mined"),
                Err(e) => {
                    return Err(MintError::ConfirmationLost {
                        tx_hash: hash,
                        message: e.to_string(),
                    })
                }
            }

            if let Some(timeout) = self.policy.timeout {
                if started.elapsed() >= timeout {
                    warn!(tx = %hash, waited = ?started.elapsed(), "gave up waiting for mint confirmation");
                    return Ok(MintReceipt::pending(hash));
                }
            }
            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }
}

#[async_trait]
impl MintExecutor for ContractMintExecutor {
    async fn mint(
        &self,
        token_uri: &str,
        signer: &dyn Signer,
        price_wei: U256,
    ) -> MintResult<MintReceipt> {
        if token_uri.trim().is_empty() {
            return Err(MintError::EmptyTokenUri);
        }

        let tx = TransactionRequest::call(self.contract, price_wei, encode_mint_call(token_uri));
        let tx_hash = signer.send_transaction(tx).await?;
        info!(
            tx = %tx_hash,
            contract = %self.contract,
            token_uri,
            "mint transaction broadcast"
        );
        self.await_confirmation(tx_hash).await
    }
}
