use std::sync::Arc;

use alloy_primitives::Address;
use tracing::info;

use crate::error::{ChainError, ChainResult};
use crate::mint::{ConfirmationPolicy, ContractMintExecutor};
use crate::registry::{ChainRegistry, ResolvedContract};
use crate::rpc::JsonRpcClient;
use crate::signer::{Signer, WalletSigner};

/// A live connection: the network, its contract, and the signing account.
///
/// Built once at startup and shared by every run.
#[derive(Clone)]
pub struct ChainContext {
    rpc: Arc<JsonRpcClient>,
    contract: ResolvedContract,
    signer: Arc<dyn Signer>,
}

impl ChainContext {
    /// Ask the node which network it serves, look up that network's
    /// contract, and pick the signing account.
    ///
    /// With `account` unset the wallet's first account is used.
    pub async fn connect(
        rpc: Arc<JsonRpcClient>,
        registry: &ChainRegistry,
        account: Option<Address>,
    ) -> ChainResult<Self> {
        let chain_id = rpc.chain_id().await?;
        let contract = registry.resolve(chain_id)?;

        let accounts = rpc.accounts().await?;
        let address = match account {
            Some(wanted) if accounts.contains(&wanted) => wanted,
            Some(wanted) => return Err(ChainError::UnknownAccount(wanted)),
            None => *accounts.first().ok_or(ChainError::NoAccounts)?,
        };

        info!(
            chain_id,
            network = %contract.name,
            contract = %contract.address,
            account = %address,
            "connected to chain"
        );
        let signer: Arc<dyn Signer> = Arc::new(WalletSigner::new(rpc.clone(), address));
        Ok(Self {
            rpc,
            contract,
            signer,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.contract.chain_id
    }

    pub fn contract(&self) -> &ResolvedContract {
        &self.contract
    }

    pub fn signer(&self) -> Arc<dyn Signer> {
        self.signer.clone()
    }

    /// A mint executor bound to this network's contract.
    pub fn mint_executor(&self, policy: ConfirmationPolicy) -> ContractMintExecutor {
        ContractMintExecutor::new(self.rpc.clone(), self.contract.address, policy)
    }
}

impl std::fmt::Debug for ChainContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainContext")
            .field("rpc", &self.rpc)
            .field("contract", &self.contract)
            .field("account", &self.signer.address())
            .finish()
    }
}
