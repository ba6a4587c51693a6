//! Reference and address generation
//!
//! Transaction references combine a millisecond timestamp with a 16-symbol
//! random suffix (about 82 bits). The revenue reference reuses the same
//! stamp and suffix under its own prefix, so it is derivable from the
//! transaction reference and can never collide with one.

use crate::types::WalletAddress;
use chrono::{DateTime, Utc};
use rand::Rng;

pub const TRANSACTION_PREFIX: &str = "TRX";
pub const REVENUE_PREFIX: &str = "REV";
const ADDRESS_PREFIX: &str = "wa_";

const SUFFIX_LEN: usize = 16;
const ADDRESS_LEN: usize = 24;
const SUFFIX_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ADDRESS_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_string(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// New transaction reference, e.g. `TRX-20261016093000123-7K2Q...`
pub fn transaction_ref(at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        TRANSACTION_PREFIX,
        at.format("%Y%m%d%H%M%S%3f"),
        random_string(SUFFIX_ALPHABET, SUFFIX_LEN)
    )
}

/// Revenue reference linked to a transaction reference
pub fn revenue_ref_for(transaction_ref: &str) -> String {
    match transaction_ref.strip_prefix(TRANSACTION_PREFIX) {
        Some(rest) => format!("{}{}", REVENUE_PREFIX, rest),
        None => format!("{}-{}", REVENUE_PREFIX, transaction_ref),
    }
}

/// New public wallet address
pub fn wallet_address() -> WalletAddress {
    WalletAddress::generated(format!(
        "{}{}",
        ADDRESS_PREFIX,
        random_string(ADDRESS_ALPHABET, ADDRESS_LEN)
    ))
}
