use aimint_types::{SpendOutcome, TransportError};
use alloy_primitives::Address;

/// Errors from chain configuration and JSON-RPC access.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The connected network has no entry in the chain registry.
    #[error("no contract configured for chain {0}")]
    UnknownChain(u64),

    /// The chain registry could not be parsed or is inconsistent.
    #[error("invalid chain registry: {0}")]
    Registry(String),

    /// The configured contract ABI does not expose a payable `mint(string)`.
    #[error("invalid contract ABI: {0}")]
    InvalidAbi(String),

    /// The wallet exposes no accounts to sign with.
    #[error("wallet exposes no accounts")]
    NoAccounts,

    /// The requested signing account is not managed by the wallet.
    #[error("account {0} is not managed by the connected wallet")]
    UnknownAccount(Address),

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node's answer could not be decoded.
    #[error("malformed rpc response: {0}")]
    Decode(String),

    /// The node could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for chain access.
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors from the mint stage.
#[derive(Debug, thiserror::Error)]
pub enum MintError {
    /// The token URI was empty; nothing was submitted.
    #[error("token URI must not be empty")]
    EmptyTokenUri,

    /// The wallet or node refused the transaction before broadcast
    /// (insufficient funds, failed gas estimation, user rejection).
    #[error("mint rejected: {reason}")]
    Rejected { reason: String },

    /// The transaction was mined with a failure status: the contract
    /// reverted (wrong payment, supply cap reached).
    #[error("mint transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    /// The transaction was broadcast but its receipt could no longer be
    /// fetched. It may still confirm.
    #[error("lost track of mint transaction {tx_hash}: {message}")]
    ConfirmationLost { tx_hash: String, message: String },

    /// The transaction could not be submitted.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl MintError {
    /// What this failure may have cost on-chain.
    pub fn spend(&self) -> SpendOutcome {
        match self {
            Self::EmptyTokenUri | Self::Rejected { .. } => SpendOutcome::NothingSpent,
            Self::Reverted { .. } => SpendOutcome::GasMayBeSpent,
            Self::ConfirmationLost { tx_hash, .. } => SpendOutcome::TransactionLive {
                tx_hash: tx_hash.clone(),
            },
            // A timed-out submission may have reached the node.
            Self::Transport(err) if err.timed_out => SpendOutcome::Unknown,
            Self::Transport(_) => SpendOutcome::NothingSpent,
        }
    }
}

impl From<ChainError> for MintError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Transport(t) => Self::Transport(t),
            ChainError::Rpc { message, .. } => Self::Rejected { reason: message },
            other => Self::Rejected {
                reason: other.to_string(),
            },
        }
    }
}

/// Result alias for mint operations.
pub type MintResult<T> = Result<T, MintError>;
