//! Types module
//!
//! Contains core data structures used throughout the engine.
//! This module organizes types into logical submodules:
//! - `money`: Fixed-point amounts and currency codes
//! - `wallet`: Wallets, owners, tiers and transfer summaries
//! - `record`: Transaction and revenue records, receipts
//! - `fee`: Fee policies, rules and calculation kinds
//! - `error`: Error types for the engine

pub mod error;
pub mod fee;
pub mod money;
pub mod record;
pub mod wallet;

pub use error::{ErrorKind, FeeConfigError, InputError, StoreError, TransferError};
pub use fee::{FeeBracket, FeeCalculation, FeePolicy, FeeRule, Region, TransactionKind};
pub use money::{Currency, Money, ParseMoneyError, MINOR_UNIT_SCALE};
pub use record::{
    FeeLine, JournalEntry, MoneyAmount, PartySnapshot, RevenueMetadata, RevenueRecord,
    RevenueStatus, TransactionMetadata, TransactionRecord, TransactionStatus, TransferReceipt,
};
pub use wallet::{
    CounterMonth, NewWallet, OwnerKind, OwnerRef, Tier, TransferDirection, TransferSummary,
    Wallet, WalletAddress, WalletId,
};
