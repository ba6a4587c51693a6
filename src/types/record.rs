//! Immutable audit records produced by a committed transfer
//!
//! Field names serialize in the collaborator-facing persisted shapes
//! (camelCase, nested `amount{value,currency}`).

use super::fee::TransactionKind;
use super::money::{Currency, Money};
use super::wallet::{OwnerKind, Tier, WalletId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Status of a transaction record; only completed records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
}

/// Revenue lifecycle, advanced by the settlement process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenueStatus {
    Pending,
    Settled,
}

/// Amount paired with its currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoneyAmount {
    pub value: Money,
    pub currency: Currency,
}

impl MoneyAmount {
    pub fn new(value: Money, currency: Currency) -> Self {
        MoneyAmount { value, currency }
    }
}

/// Denormalised view of a party captured at transfer time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySnapshot {
    /// Owner id
    pub id: String,
    #[serde(skip)]
    pub wallet_id: WalletId,
    pub name: String,
    pub owner_kind: OwnerKind,
    pub tier: Tier,
}

/// One entry of a transaction's fee breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeLine {
    pub amount: Money,
    pub currency: Currency,
    #[serde(rename = "type")]
    pub fee_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    pub source: String,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Audit record of a completed transfer; never mutated once written
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub transaction_ref: String,
    pub transaction_date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub sender: PartySnapshot,
    pub receiver: PartySnapshot,
    pub amount: MoneyAmount,
    pub fees: Vec<FeeLine>,
    pub metadata: TransactionMetadata,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Sum of the fee breakdown, `None` on overflow
    pub fn total_fees(&self) -> Option<Money> {
        self.fees
            .iter()
            .try_fold(Money::ZERO, |acc, fee| acc.checked_add(fee.amount))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueMetadata {
    /// Fee policy the revenue was computed with
    pub fee_policy: String,
    pub fee_type: String,
    pub payer_wallet: WalletId,
}

/// Platform revenue recognised for a transfer fee
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueRecord {
    /// Reference of the transaction that generated the fee
    pub associated_transaction_ref: String,
    /// This record's own reference
    pub transaction_ref: String,
    pub date: DateTime<Utc>,
    pub amount: MoneyAmount,
    pub status: RevenueStatus,
    pub revenue_type: String,
    pub metadata: RevenueMetadata,
}

/// Result handed back to the boundary layer for a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transaction_ref: String,
    pub new_sender_balance: Money,
    pub fee_amount: Money,
    pub fee_type: String,
}

/// Journal line combining the two records of one transfer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record", rename_all = "lowercase")]
pub enum JournalEntry<'a> {
    Transaction(&'a TransactionRecord),
    Revenue(&'a RevenueRecord),
}
