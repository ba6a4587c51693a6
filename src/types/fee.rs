//! Fee policy types
//!
//! A fee policy is never stored as one canonical entity: it is resolved from
//! (transaction kind, amount, tier, region) against a schedule of rules and
//! then fed to a pure calculation.

use super::money::Money;
use super::wallet::Tier;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of money movement a fee applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Payment,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Payment => "payment",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region scope for fee resolution, stored uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Region(String);

impl Region {
    pub fn new(code: &str) -> Self {
        Region(code.trim().to_uppercase())
    }

    /// The scope used when the caller does not supply one
    pub fn global() -> Self {
        Region("GLOBAL".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::global()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Region {
    fn from(value: String) -> Self {
        Region::new(&value)
    }
}

impl From<Region> for String {
    fn from(value: Region) -> Self {
        value.0
    }
}

/// One bracket of a tiered fee table
///
/// Applies to amounts up to and including `up_to`; `None` marks the
/// open-ended last bracket. The fee is `flat + amount * rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBracket {
    #[serde(default)]
    pub up_to: Option<Money>,
    #[serde(default)]
    pub flat: Option<Money>,
    #[serde(default)]
    pub rate: Option<Decimal>,
}

/// How a fee amount is derived from the transfer amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeeCalculation {
    /// A fixed amount regardless of transfer size
    Flat { amount: Money },
    /// `amount * rate`, optionally clamped
    Percentage {
        rate: Decimal,
        #[serde(default)]
        minimum: Option<Money>,
        #[serde(default)]
        maximum: Option<Money>,
    },
    /// Bracketed table, ascending by `up_to`
    Tiered { brackets: Vec<FeeBracket> },
}

impl FeeCalculation {
    /// Short name reported as the fee type
    pub fn kind_name(&self) -> &'static str {
        match self {
            FeeCalculation::Flat { .. } => "flat",
            FeeCalculation::Percentage { .. } => "percentage",
            FeeCalculation::Tiered { .. } => "tiered",
        }
    }
}

/// A resolved fee policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Schedule-unique policy name, e.g. `standard-transfer`
    pub name: String,
    pub description: String,
    pub calculation: FeeCalculation,
}

impl FeePolicy {
    /// Policy that charges nothing
    pub fn free(name: &str, description: &str) -> Self {
        FeePolicy {
            name: name.to_string(),
            description: description.to_string(),
            calculation: FeeCalculation::Flat { amount: Money::ZERO },
        }
    }

    pub fn fee_type(&self) -> &'static str {
        self.calculation.kind_name()
    }
}

/// Rule selecting a policy for matching transfers
///
/// Unset selectors match anything. The amount window is `[min_amount,
/// max_amount)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRule {
    pub transaction_kind: TransactionKind,
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub min_amount: Option<Money>,
    #[serde(default)]
    pub max_amount: Option<Money>,
    pub policy: FeePolicy,
}

impl FeeRule {
    pub fn matches(
        &self,
        kind: TransactionKind,
        amount: Money,
        tier: Tier,
        region: &Region,
    ) -> bool {
        self.transaction_kind == kind
            && self.tier.is_none_or(|t| t == tier)
            && self.region.as_ref().is_none_or(|r| r == region)
            && self.min_amount.is_none_or(|min| amount >= min)
            && self.max_amount.is_none_or(|max| amount < max)
    }

    /// Number of selectors pinned by this rule; higher wins
    pub fn specificity(&self) -> u8 {
        u8::from(self.tier.is_some())
            + u8::from(self.region.is_some())
            + u8::from(self.min_amount.is_some() || self.max_amount.is_some())
    }
}
