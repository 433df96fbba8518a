//! Chain access for AIMint.
//!
//! Resolves the NFT contract for whichever network the wallet is connected
//! to, then submits payable `mint(string)` calls and waits for them to be
//! mined.
//!
//! # Components
//!
//! - [`ChainRegistry`] -- contract address book keyed by chain id
//! - [`JsonRpcClient`] -- Ethereum JSON-RPC over HTTP
//! - [`Signer`] / [`WalletSigner`] -- transaction authorization
//! - [`ChainContext`] -- network, contract and account bound together
//! - [`MintExecutor`] / [`ContractMintExecutor`] -- the mint stage

pub mod context;
pub mod error;
pub mod mint;
pub mod registry;
pub mod rpc;
pub mod signer;

#[cfg(test)]
mod testing;

pub use context::ChainContext;
pub use error::{ChainError, ChainResult, MintError, MintResult};
pub use mint::{encode_mint_call, ConfirmationPolicy, ContractMintExecutor, MintExecutor};
pub use registry::{ChainEntry, ChainRegistry, ContractAbi, ResolvedContract};
pub use rpc::{JsonRpcClient, TransactionReceipt, TransactionRequest};
pub use signer::{Signer, WalletSigner};

pub use alloy_primitives::{Address, TxHash, U256};
