use std::sync::Arc;

use alloy_primitives::{Address, TxHash};
use async_trait::async_trait;
use tracing::debug;

use crate::error::ChainResult;
use crate::rpc::{JsonRpcClient, TransactionRequest};

/// An account that can authorize and broadcast transactions.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The account transactions are sent from.
    fn address(&self) -> Address;

    /// Sign and broadcast `tx`, returning its hash once the network
    /// accepted it. `tx.from` is overwritten with [`Signer::address`].
    async fn send_transaction(&self, tx: TransactionRequest) -> ChainResult<TxHash>;
}

/// Signs through the node's wallet via `eth_sendTransaction`.
///
/// The private key never leaves the wallet; the node (or the browser
/// extension behind it) prompts and signs.
#[derive(Debug, Clone)]
pub struct WalletSigner {
    rpc: Arc<JsonRpcClient>,
    address: Address,
}

impl WalletSigner {
    pub fn new(rpc: Arc<JsonRpcClient>, address: Address) -> Self {
        Self { rpc, address }
    }
}

#[async_trait]
impl Signer for WalletSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transaction(&self, mut tx: TransactionRequest) -> ChainResult<TxHash> {
        tx.from = Some(self.address);
        debug!(from = %self.address, to = %tx.to, value = %tx.value, "requesting wallet signature");
        self.rpc.send_transaction(&tx).await
    }
}
