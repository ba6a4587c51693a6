//! Error types for the wallet transfer engine
//!
//! # Error Categories
//!
//! - **Transfer errors** ([`TransferError`]): everything the orchestrator can
//!   surface to the boundary layer, grouped by [`ErrorKind`]
//! - **Store errors** ([`StoreError`]): ledger-internal failures; converted to
//!   [`TransferError::Persistence`] before they leave the engine
//! - **Fee configuration errors** ([`FeeConfigError`]): malformed fee schedules,
//!   rejected when the schedule is built
//! - **Input errors** ([`InputError`]): file and CSV problems in the CLI pipelines

use super::money::{Currency, Money};
use super::wallet::{OwnerRef, WalletAddress, WalletId};
use thiserror::Error;

/// Coarse classification of a transfer failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientBalance,
    FeeCalculation,
    Persistence,
}

impl ErrorKind {
    /// Whether the caller may safely retry the same request
    ///
    /// Only persistence failures qualify: they abort the unit of work and
    /// leave no partial state behind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Persistence)
    }
}

/// Failure of a single transfer
///
/// Messages are stable and never carry storage internals.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    /// Amount is not positive or has more than two decimal places
    #[error("Invalid transfer amount '{amount}'")]
    InvalidAmount { amount: String },

    /// A required identifier was empty
    #[error("Missing {field} identifier")]
    MissingIdentifier { field: &'static str },

    /// Sender and receiver resolve to the same wallet
    #[error("Cannot transfer to the sending wallet")]
    SelfTransfer,

    /// Wallets hold different currencies; conversion is not supported
    #[error("Currency mismatch: sender holds {sender}, receiver holds {receiver}")]
    CurrencyMismatch { sender: Currency, receiver: Currency },

    /// Receiver owner id matches wallets of several owner kinds
    #[error("Receiver '{identifier}' is ambiguous; use the wallet address")]
    AmbiguousReceiver { identifier: String },

    #[error("Sender wallet not found for {owner}")]
    SenderNotFound { owner: String },

    #[error("Receiver wallet not found for '{identifier}'")]
    ReceiverNotFound { identifier: String },

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Money, required: Money },

    /// Fee policy produced no defined amount; a configuration fault
    #[error("Fee calculation failed for policy '{policy}': {reason}")]
    FeeCalculation { policy: String, reason: String },

    /// Unit of work could not be written or committed; nothing was applied
    #[error("Transfer could not be recorded: {reason}")]
    Persistence { reason: String },
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidAmount { .. }
            | TransferError::MissingIdentifier { .. }
            | TransferError::SelfTransfer
            | TransferError::CurrencyMismatch { .. }
            | TransferError::AmbiguousReceiver { .. } => ErrorKind::Validation,
            TransferError::SenderNotFound { .. } | TransferError::ReceiverNotFound { .. } => {
                ErrorKind::NotFound
            }
            TransferError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            TransferError::FeeCalculation { .. } => ErrorKind::FeeCalculation,
            TransferError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: impl ToString) -> Self {
        TransferError::InvalidAmount {
            amount: amount.to_string(),
        }
    }

    /// Create a SenderNotFound error
    pub fn sender_not_found(owner: &OwnerRef) -> Self {
        TransferError::SenderNotFound {
            owner: owner.to_string(),
        }
    }

    /// Create a ReceiverNotFound error
    pub fn receiver_not_found(identifier: &str) -> Self {
        TransferError::ReceiverNotFound {
            identifier: identifier.to_string(),
        }
    }

    /// Create an InsufficientBalance error
    pub fn insufficient_balance(available: Money, required: Money) -> Self {
        TransferError::InsufficientBalance {
            available,
            required,
        }
    }

    /// Create a FeeCalculation error
    pub fn fee_calculation(policy: &str, reason: impl Into<String>) -> Self {
        TransferError::FeeCalculation {
            policy: policy.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a Persistence error
    pub fn persistence(reason: impl Into<String>) -> Self {
        TransferError::Persistence {
            reason: reason.into(),
        }
    }
}

/// Ledger-internal failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("{0} does not exist")]
    WalletNotFound(WalletId),

    #[error("owner {0} already has a wallet")]
    DuplicateOwner(OwnerRef),

    #[error("address {0} is already assigned")]
    DuplicateAddress(WalletAddress),

    #[error("delta {delta} would leave {wallet} at {resulting}")]
    NegativeBalance {
        wallet: WalletId,
        delta: Money,
        resulting: Money,
    },

    #[error("arithmetic overflow applying delta to {0}")]
    ArithmeticOverflow(WalletId),

    #[error("{wallet} changed concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        wallet: WalletId,
        expected: u64,
        found: u64,
    },

    #[error("record reference {0} already exists")]
    DuplicateReference(String),

    #[error("idempotency key {0} already committed")]
    DuplicateIdempotencyKey(String),

    #[error("{wallet} still holds {balance}")]
    NonZeroBalance { wallet: WalletId, balance: Money },
}

impl StoreError {
    /// Stable, caller-safe description used when surfacing the failure
    pub fn public_reason(&self) -> &'static str {
        match self {
            StoreError::VersionConflict { .. } => "wallet was modified concurrently",
            StoreError::DuplicateReference(_) | StoreError::DuplicateIdempotencyKey(_) => {
                "record already exists"
            }
            _ => "ledger write failed",
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(error: StoreError) -> Self {
        TransferError::persistence(error.public_reason())
    }
}

/// Malformed fee schedule
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeeConfigError {
    #[error("policy '{policy}': {reason}")]
    InvalidPolicy { policy: String, reason: String },

    #[error("rule {index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("failed to read fee schedule: {0}")]
    Io(String),

    #[error("failed to parse fee schedule: {0}")]
    Parse(String),
}

impl FeeConfigError {
    pub fn invalid_policy(policy: &str, reason: impl Into<String>) -> Self {
        FeeConfigError::InvalidPolicy {
            policy: policy.to_string(),
            reason: reason.into(),
        }
    }
}

/// File and CSV failures in the processing pipelines
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse { line: Option<u64>, message: String },

    #[error("Invalid record{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    InvalidRecord { line: Option<u64>, message: String },
}

impl From<std::io::Error> for InputError {
    fn from(error: std::io::Error) -> Self {
        InputError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for InputError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        InputError::Parse {
            line,
            message: error.to_string(),
        }
    }
}
