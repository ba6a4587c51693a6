//! CSV format handling for wallet seeds, transfer requests and wallet output
//!
//! This module centralizes all CSV format concerns, providing:
//! - Raw row structures for deserialization
//! - Conversion from raw rows to domain types via [`FromCsvRecord`]
//! - Wallet output serialization
//!
//! Conversions are pure (no I/O) for easy testing.
//!
//! # Input formats
//!
//! ```text
//! wallets:   owner_kind,owner_id,name,address,balance,currency,tier,contact
//! transfers: sender_kind,sender_id,receiver,amount,description,region,idempotency_key
//! ```
//!
//! Every wallet column after `owner_id` is optional. Missing balances open at
//! zero, currency defaults to USD and tier to STANDARD.

use crate::core::directory::OwnerProfile;
use crate::core::engine::TransferRequest;
use crate::types::{
    Currency, InputError, Money, NewWallet, OwnerKind, OwnerRef, Region, Tier, Wallet,
    WalletAddress,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Domain type built from one CSV row
pub trait FromCsvRecord: Sized {
    /// Row shape as it appears in the file
    type Raw: DeserializeOwned + Send + 'static;

    fn from_csv_record(raw: Self::Raw) -> Result<Self, String>;
}

/// Raw wallet seed row
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct WalletCsvRecord {
    pub owner_kind: String,
    pub owner_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    /// Device token, e-mail or phone depending on the owner kind
    #[serde(default)]
    pub contact: Option<String>,
}

/// Raw transfer request row
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct TransferCsvRecord {
    pub sender_kind: String,
    pub sender_id: String,
    pub receiver: String,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// A wallet to open plus the owner's profile
#[derive(Debug, Clone)]
pub struct WalletSeed {
    pub wallet: NewWallet,
    pub profile: OwnerProfile,
}

fn present(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn with_contact(profile: OwnerProfile, contact: Option<String>) -> OwnerProfile {
    let Some(contact) = contact else {
        return profile;
    };
    match profile {
        OwnerProfile::User {
            first_name,
            last_name,
            ..
        } => OwnerProfile::User {
            first_name,
            last_name,
            device_token: Some(contact),
        },
        OwnerProfile::Merchant { business_name, .. } => OwnerProfile::Merchant {
            business_name,
            contact_email: Some(contact),
        },
        OwnerProfile::Driver { full_name, .. } => OwnerProfile::Driver {
            full_name,
            phone: Some(contact),
        },
    }
}

impl FromCsvRecord for WalletSeed {
    type Raw = WalletCsvRecord;

    fn from_csv_record(raw: WalletCsvRecord) -> Result<Self, String> {
        let kind = OwnerKind::from_str(&raw.owner_kind)?;
        let owner_id = raw.owner_id.trim().to_string();
        if owner_id.is_empty() {
            return Err("Missing owner_id".to_string());
        }

        let balance = match present(raw.balance) {
            Some(balance) => {
                let money = Money::from_str(&balance)
                    .map_err(|_| format!("Invalid balance '{}' for {}", balance, owner_id))?;
                if money.is_negative() {
                    return Err(format!("Negative balance '{}' for {}", balance, owner_id));
                }
                money
            }
            None => Money::ZERO,
        };

        let currency = match present(raw.currency) {
            Some(code) => Currency::new(&code)
                .ok_or_else(|| format!("Invalid currency '{}' for {}", code, owner_id))?,
            None => Currency::usd(),
        };

        let tier = match present(raw.tier) {
            Some(tier) => Tier::from_str(&tier)?,
            None => Tier::Standard,
        };

        let name = present(raw.name).unwrap_or_else(|| owner_id.clone());
        let profile = with_contact(OwnerProfile::named(kind, &name), present(raw.contact));

        let mut wallet =
            NewWallet::new(OwnerRef::new(kind, owner_id), currency, tier).with_balance(balance);
        if let Some(address) = present(raw.address).as_deref().and_then(WalletAddress::new) {
            wallet = wallet.with_address(address);
        }

        Ok(WalletSeed { wallet, profile })
    }
}

impl FromCsvRecord for TransferRequest {
    type Raw = TransferCsvRecord;

    /// Amount positivity and precision are checked by the engine
    fn from_csv_record(raw: TransferCsvRecord) -> Result<Self, String> {
        let kind = OwnerKind::from_str(&raw.sender_kind)?;
        let amount = Decimal::from_str(raw.amount.trim()).map_err(|_| {
            format!(
                "Invalid amount '{}' for transfer from {}:{}",
                raw.amount, kind, raw.sender_id
            )
        })?;

        let mut request = TransferRequest::new(
            OwnerRef::new(kind, raw.sender_id.trim()),
            raw.receiver.trim(),
            amount,
        );
        if let Some(description) = present(raw.description) {
            request = request.with_description(description);
        }
        if let Some(region) = present(raw.region) {
            request = request.in_region(Region::new(&region));
        }
        if let Some(key) = present(raw.idempotency_key) {
            request = request.with_idempotency_key(key);
        }

        Ok(request)
    }
}

/// Write wallet states to CSV format
///
/// Columns: owner_kind, owner_id, address, balance, currency, tier,
/// monthly_transactions. Wallets are sorted by owner for deterministic
/// output.
///
/// # Arguments
///
/// * `wallets` - Slice of wallet states to write
/// * `output` - Mutable reference to a writer for outputting CSV
pub fn write_wallets_csv(wallets: &[Wallet], output: &mut dyn Write) -> Result<(), InputError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "owner_kind",
        "owner_id",
        "address",
        "balance",
        "currency",
        "tier",
        "monthly_transactions",
    ])?;

    let mut sorted: Vec<&Wallet> = wallets.iter().collect();
    sorted.sort_by(|a, b| a.owner.cmp(&b.owner));

    for wallet in sorted {
        writer.write_record(&[
            wallet.owner.kind.to_string(),
            wallet.owner.id.clone(),
            wallet.address.to_string(),
            wallet.balance.to_string(),
            wallet.currency.to_string(),
            wallet.tier.to_string(),
            wallet.monthly_transaction_count.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn wallet_row(kind: &str, id: &str) -> WalletCsvRecord {
        WalletCsvRecord {
            owner_kind: kind.to_string(),
            owner_id: id.to_string(),
            ..Default::default()
        }
    }

    fn transfer_row(amount: &str) -> TransferCsvRecord {
        TransferCsvRecord {
            sender_kind: "user".to_string(),
            sender_id: "alice".to_string(),
            receiver: "bob".to_string(),
            amount: amount.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_wallet_defaults() {
        let seed = WalletSeed::from_csv_record(wallet_row("driver", "d-1")).unwrap();
        assert_eq!(seed.wallet.owner, OwnerRef::driver("d-1"));
        assert_eq!(seed.wallet.balance, Money::ZERO);
        assert_eq!(seed.wallet.currency, Currency::usd());
        assert_eq!(seed.wallet.tier, Tier::Standard);
        assert!(seed.wallet.address.is_none());
        assert_eq!(seed.profile, OwnerProfile::named(OwnerKind::Driver, "d-1"));
    }

    #[test]
    fn test_wallet_full_row() {
        let row = WalletCsvRecord {
            owner_kind: "User".to_string(),
            owner_id: " alice ".to_string(),
            name: Some("Alice Doe".to_string()),
            address: Some("wa_alice".to_string()),
            balance: Some("100.00".to_string()),
            currency: Some("eur".to_string()),
            tier: Some("premium".to_string()),
            contact: Some("tok-1".to_string()),
        };

        let seed = WalletSeed::from_csv_record(row).unwrap();
        assert_eq!(seed.wallet.owner.id, "alice");
        assert_eq!(seed.wallet.address.unwrap().as_str(), "wa_alice");
        assert_eq!(seed.wallet.balance, Money::from_minor(10_000));
        assert_eq!(seed.wallet.currency.as_str(), "EUR");
        assert_eq!(seed.wallet.tier, Tier::Premium);
        assert_eq!(
            seed.profile,
            OwnerProfile::User {
                first_name: "Alice".to_string(),
                last_name: "Doe".to_string(),
                device_token: Some("tok-1".to_string()),
            }
        );
    }

    #[rstest]
    #[case::unknown_kind(WalletCsvRecord { owner_kind: "admin".into(), owner_id: "x".into(), ..Default::default() })]
    #[case::missing_id(WalletCsvRecord { owner_kind: "user".into(), owner_id: " ".into(), ..Default::default() })]
    #[case::bad_balance(WalletCsvRecord { owner_kind: "user".into(), owner_id: "x".into(), balance: Some("ten".into()), ..Default::default() })]
    #[case::negative_balance(WalletCsvRecord { owner_kind: "user".into(), owner_id: "x".into(), balance: Some("-1.00".into()), ..Default::default() })]
    #[case::bad_currency(WalletCsvRecord { owner_kind: "user".into(), owner_id: "x".into(), currency: Some("US".into()), ..Default::default() })]
    #[case::bad_tier(WalletCsvRecord { owner_kind: "user".into(), owner_id: "x".into(), tier: Some("gold".into()), ..Default::default() })]
    fn test_wallet_rejected(#[case] row: WalletCsvRecord) {
        assert!(WalletSeed::from_csv_record(row).is_err());
    }

    #[test]
    fn test_transfer_row_conversion() {
        let mut row = transfer_row("40.00");
        row.description = Some("lunch".to_string());
        row.region = Some("eu".to_string());
        row.idempotency_key = Some(" k-1 ".to_string());

        let request = TransferRequest::from_csv_record(row).unwrap();
        assert_eq!(request.sender, OwnerRef::user("alice"));
        assert_eq!(request.receiver, "bob");
        assert_eq!(request.amount, Decimal::new(4000, 2));
        assert_eq!(request.description, "lunch");
        assert_eq!(request.region, Some(Region::new("EU")));
        assert_eq!(request.idempotency_key.as_deref(), Some("k-1"));
    }

    #[test]
    fn test_transfer_keeps_non_positive_amounts_for_engine() {
        let request = TransferRequest::from_csv_record(transfer_row("-3")).unwrap();
        assert_eq!(request.amount, Decimal::new(-3, 0));
    }

    #[test]
    fn test_transfer_invalid_amount() {
        let error = TransferRequest::from_csv_record(transfer_row("abc")).unwrap_err();
        assert!(error.contains("Invalid amount 'abc'"));
    }

    #[test]
    fn test_write_wallets_csv_sorted() {
        let make = |owner: OwnerRef, address: &str, minor: i64| Wallet {
            id: crate::types::WalletId(1),
            owner,
            address: WalletAddress::new(address).unwrap(),
            balance: Money::from_minor(minor),
            currency: Currency::usd(),
            tier: Tier::Standard,
            monthly_transaction_count: 2,
            counter_month: None,
            transfers_sent: Vec::new(),
            transfers_received: Vec::new(),
            version: 0,
            created_at: Utc::now(),
        };
        let wallets = vec![
            make(OwnerRef::user("zed"), "wa_z", 5850),
            make(OwnerRef::user("amy"), "wa_a", 4000),
        ];

        let mut output = Vec::new();
        write_wallets_csv(&wallets, &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "owner_kind,owner_id,address,balance,currency,tier,monthly_transactions"
        );
        assert_eq!(lines[1], "user,amy,wa_a,40.00,USD,STANDARD,2");
        assert_eq!(lines[2], "user,zed,wa_z,58.50,USD,STANDARD,2");
    }
}
