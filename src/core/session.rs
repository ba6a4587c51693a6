//! Unit of work for a single transfer
//!
//! A [`LedgerSession`] collects everything one transfer wants to change:
//! staged wallet copies (with the version each was read at), the transaction
//! and revenue records, and an optional idempotency receipt. Nothing is
//! visible to other readers until [`Ledger::commit`](crate::core::Ledger)
//! applies the whole session; dropping or aborting it discards everything.

use crate::types::{OwnerRef, RevenueRecord, TransactionRecord, TransferReceipt, Wallet, WalletId};
use std::collections::BTreeMap;
use tracing::debug;

/// Idempotency key together with the sender that used it
pub(crate) type ReceiptKey = (OwnerRef, String);

/// Wallet copy staged inside a session
#[derive(Debug, Clone)]
pub(crate) struct StagedWallet {
    /// Committed version the copy was read at
    pub base_version: u64,
    pub wallet: Wallet,
    /// Whether the copy differs from what was read
    pub dirty: bool,
}

/// Staged changes of one transfer
///
/// Wallets are kept ordered by id; commit locks them in that order.
#[derive(Debug, Default)]
pub struct LedgerSession {
    pub(crate) wallets: BTreeMap<WalletId, StagedWallet>,
    pub(crate) transactions: Vec<TransactionRecord>,
    pub(crate) revenues: Vec<RevenueRecord>,
    pub(crate) receipts: Vec<(ReceiptKey, TransferReceipt)>,
    finished: bool,
}

impl LedgerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the wallets this session has read or changed
    pub fn touched_wallets(&self) -> impl Iterator<Item = WalletId> + '_ {
        self.wallets.keys().copied()
    }

    /// Whether nothing has been staged yet
    pub fn is_empty(&self) -> bool {
        self.wallets.values().all(|staged| !staged.dirty)
            && self.transactions.is_empty()
            && self.revenues.is_empty()
            && self.receipts.is_empty()
    }

    pub(crate) fn staged(&self, wallet_id: WalletId) -> Option<&StagedWallet> {
        self.wallets.get(&wallet_id)
    }

    pub(crate) fn staged_mut(&mut self, wallet_id: WalletId) -> Option<&mut StagedWallet> {
        self.wallets.get_mut(&wallet_id)
    }

    pub(crate) fn stage(&mut self, wallet: Wallet) {
        self.wallets.insert(
            wallet.id,
            StagedWallet {
                base_version: wallet.version,
                wallet,
                dirty: false,
            },
        );
    }

    /// Mark the session as consumed by a commit or an abort
    pub(crate) fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for LedgerSession {
    fn drop(&mut self) {
        if !self.finished && !self.is_empty() {
            debug!(
                wallets = self.wallets.len(),
                records = self.transactions.len(),
                "discarding uncommitted session"
            );
        }
    }
}
