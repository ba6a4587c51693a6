//! Wallet-related types for the transfer engine
//!
//! A wallet is owned by exactly one user, merchant or driver and is reachable
//! either through that owner reference or through its public address.

use super::money::{Currency, Money};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Internal wallet identifier, assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(pub u64);

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wallet#{}", self.0)
    }
}

/// Public, opaque lookup key for a wallet
///
/// Distinct from the owner id; safe to share with payers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Wrap an address string; blank strings are not addresses
    pub fn new(address: &str) -> Option<WalletAddress> {
        let address = address.trim();
        if address.is_empty() {
            None
        } else {
            Some(WalletAddress(address.to_string()))
        }
    }

    pub(crate) fn generated(address: String) -> Self {
        WalletAddress(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of entity owning a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    User,
    Merchant,
    Driver,
}

impl OwnerKind {
    /// Every owner kind, in receiver-resolution order
    pub const ALL: [OwnerKind; 3] = [OwnerKind::User, OwnerKind::Merchant, OwnerKind::Driver];

    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::User => "user",
            OwnerKind::Merchant => "merchant",
            OwnerKind::Driver => "driver",
        }
    }

    /// Whether owners of this kind receive transfer notifications
    ///
    /// Merchants get settlement statements out of band instead.
    pub fn is_notifiable(&self) -> bool {
        matches!(self, OwnerKind::User | OwnerKind::Driver)
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(OwnerKind::User),
            "merchant" => Ok(OwnerKind::Merchant),
            "driver" => Ok(OwnerKind::Driver),
            other => Err(format!("unknown owner kind '{}'", other)),
        }
    }
}

/// Tagged reference to a wallet owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerRef {
    #[serde(rename = "ownerKind")]
    pub kind: OwnerKind,
    #[serde(rename = "ownerId")]
    pub id: String,
}

impl OwnerRef {
    pub fn new(kind: OwnerKind, id: impl Into<String>) -> Self {
        OwnerRef {
            kind,
            id: id.into(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(OwnerKind::User, id)
    }

    pub fn merchant(id: impl Into<String>) -> Self {
        Self::new(OwnerKind::Merchant, id)
    }

    pub fn driver(id: impl Into<String>) -> Self {
        Self::new(OwnerKind::Driver, id)
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Wallet classification driving fee policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Standard,
    Premium,
    Business,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "STANDARD",
            Tier::Premium => "PREMIUM",
            Tier::Business => "BUSINESS",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STANDARD" => Ok(Tier::Standard),
            "PREMIUM" => Ok(Tier::Premium),
            "BUSINESS" => Ok(Tier::Business),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

/// Direction of a transfer from a wallet's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Sent,
    Received,
}

/// Append-only summary of a transfer kept on each wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    /// Reference of the transaction record
    pub transaction_ref: String,
    pub direction: TransferDirection,
    /// The other wallet in the transfer
    pub counterparty: WalletId,
    pub amount: Money,
    pub at: DateTime<Utc>,
}

/// Calendar month used to reset the monthly transaction counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterMonth {
    pub year: i32,
    pub month: u32,
}

impl CounterMonth {
    pub fn of(at: DateTime<Utc>) -> Self {
        CounterMonth {
            year: at.year(),
            month: at.month(),
        }
    }
}

/// Wallet record
///
/// Balance is never negative. It is only changed by committing a unit of
/// work; `version` increases by one on every commit that touches the wallet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    #[serde(skip)]
    pub id: WalletId,
    #[serde(flatten)]
    pub owner: OwnerRef,
    pub address: WalletAddress,
    pub balance: Money,
    /// Fixed when the wallet is opened
    pub currency: Currency,
    pub tier: Tier,
    pub monthly_transaction_count: u32,
    #[serde(skip)]
    pub counter_month: Option<CounterMonth>,
    pub transfers_sent: Vec<TransferSummary>,
    pub transfers_received: Vec<TransferSummary>,
    #[serde(skip)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Append a transfer summary, bumping the monthly counter for sent legs
    ///
    /// The counter restarts at zero when the summary falls in a new month.
    pub fn push_summary(&mut self, summary: TransferSummary) {
        match summary.direction {
            TransferDirection::Sent => {
                let month = CounterMonth::of(summary.at);
                if self.counter_month != Some(month) {
                    self.counter_month = Some(month);
                    self.monthly_transaction_count = 0;
                }
                self.monthly_transaction_count = self.monthly_transaction_count.saturating_add(1);
                self.transfers_sent.push(summary);
            }
            TransferDirection::Received => self.transfers_received.push(summary),
        }
    }
}

/// Request to open a wallet
///
/// Wallet creation belongs to account onboarding; the store exposes it so
/// that collaborators and tests can seed wallets.
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub owner: OwnerRef,
    /// Generated when absent
    pub address: Option<WalletAddress>,
    pub balance: Money,
    pub currency: Currency,
    pub tier: Tier,
}

impl NewWallet {
    pub fn new(owner: OwnerRef, currency: Currency, tier: Tier) -> Self {
        NewWallet {
            owner,
            address: None,
            balance: Money::ZERO,
            currency,
            tier,
        }
    }

    pub fn with_balance(mut self, balance: Money) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_address(mut self, address: WalletAddress) -> Self {
        self.address = Some(address);
        self
    }
}
