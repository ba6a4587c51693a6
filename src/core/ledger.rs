//! In-memory ledger: wallet store and record book
//!
//! The [`Ledger`] owns every wallet plus the append-only transaction and
//! revenue records. It implements [`WalletStore`] and [`RecordWriter`] over
//! the same [`LedgerSession`], so the balance changes and records of a
//! transfer are committed together.
//!
//! # Concurrency
//!
//! Wallets live in a `DashMap` of individually locked entries. Sessions read
//! committed snapshots without holding locks and remember each wallet's
//! version. Commit locks the touched wallets in ascending id order, checks
//! idempotency keys, then that no version moved, then record uniqueness, and
//! only then applies everything. Any check failing leaves the ledger
//! untouched. Keys come first so a duplicate that lost the race is reported
//! as a duplicate rather than as a version conflict.

use crate::core::reference;
use crate::core::session::{LedgerSession, ReceiptKey};
use crate::core::traits::{RecordWriter, WalletStore};
use crate::types::{
    Money, NewWallet, OwnerKind, OwnerRef, RevenueRecord, StoreError, TransactionRecord,
    TransferReceipt, TransferSummary, Wallet, WalletAddress, WalletId,
};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Append-only records, indexed by reference
#[derive(Debug, Default)]
struct RecordBook {
    transactions: Vec<TransactionRecord>,
    revenues: Vec<RevenueRecord>,
    references: HashSet<String>,
    receipts: HashMap<ReceiptKey, TransferReceipt>,
}

/// In-memory, thread-safe wallet ledger
#[derive(Debug)]
pub struct Ledger {
    wallets: DashMap<WalletId, Arc<Mutex<Wallet>>>,
    owners: DashMap<OwnerRef, WalletId>,
    addresses: DashMap<WalletAddress, WalletId>,
    records: Mutex<RecordBook>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
            owners: DashMap::new(),
            addresses: DashMap::new(),
            records: Mutex::new(RecordBook::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a wallet for an owner
    ///
    /// Each owner holds at most one wallet and addresses are unique. A
    /// missing address is generated.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateOwner`] if the owner already has a wallet
    /// - [`StoreError::DuplicateAddress`] if the address is taken
    /// - [`StoreError::NegativeBalance`] if the opening balance is negative
    pub fn open_wallet(&self, request: NewWallet) -> Result<Wallet, StoreError> {
        let id = WalletId(self.next_id.fetch_add(1, Ordering::Relaxed));

        if request.balance.is_negative() {
            return Err(StoreError::NegativeBalance {
                wallet: id,
                delta: request.balance,
                resulting: request.balance,
            });
        }

        let owner_slot = match self.owners.entry(request.owner.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateOwner(request.owner)),
            Entry::Vacant(slot) => slot,
        };

        let address = request.address.unwrap_or_else(reference::wallet_address);
        match self.addresses.entry(address.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateAddress(address)),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let wallet = Wallet {
            id,
            owner: request.owner,
            address,
            balance: request.balance,
            currency: request.currency,
            tier: request.tier,
            monthly_transaction_count: 0,
            counter_month: None,
            transfers_sent: Vec::new(),
            transfers_received: Vec::new(),
            version: 0,
            created_at: Utc::now(),
        };

        self.wallets.insert(id, Arc::new(Mutex::new(wallet.clone())));
        owner_slot.insert(id);

        debug!(wallet = %id, owner = %wallet.owner, address = %wallet.address, "wallet opened");
        Ok(wallet)
    }

    /// Close a wallet that holds no funds
    ///
    /// Sessions that read the wallet before it was closed fail their commit
    /// with a version conflict.
    pub fn close_wallet(&self, wallet_id: WalletId) -> Result<Wallet, StoreError> {
        let handle = self.handle(wallet_id)?;
        let mut wallet = lock(&handle);

        if wallet.balance.is_positive() {
            return Err(StoreError::NonZeroBalance {
                wallet: wallet_id,
                balance: wallet.balance,
            });
        }

        wallet.version += 1;
        self.wallets.remove(&wallet_id);
        self.owners.remove(&wallet.owner);
        self.addresses.remove(&wallet.address);

        debug!(wallet = %wallet_id, owner = %wallet.owner, "wallet closed");
        Ok(wallet.clone())
    }

    /// Committed snapshot of a wallet
    pub fn wallet(&self, wallet_id: WalletId) -> Option<Wallet> {
        self.snapshot(wallet_id).ok()
    }

    /// Committed snapshots of all wallets, sorted by id
    pub fn wallets(&self) -> Vec<Wallet> {
        let handles: Vec<Arc<Mutex<Wallet>>> = self
            .wallets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut wallets: Vec<Wallet> = handles.iter().map(|handle| lock(handle).clone()).collect();
        wallets.sort_by_key(|wallet| wallet.id);
        wallets
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    /// All committed transaction records in commit order
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        lock(&self.records).transactions.clone()
    }

    /// All committed revenue records in commit order
    pub fn revenue_records(&self) -> Vec<RevenueRecord> {
        lock(&self.records).revenues.clone()
    }

    /// Transaction record by reference
    pub fn transaction(&self, transaction_ref: &str) -> Option<TransactionRecord> {
        lock(&self.records)
            .transactions
            .iter()
            .find(|record| record.transaction_ref == transaction_ref)
            .cloned()
    }

    /// Revenue record generated by a transaction, if a fee was charged
    pub fn revenue_for(&self, transaction_ref: &str) -> Option<RevenueRecord> {
        lock(&self.records)
            .revenues
            .iter()
            .find(|record| record.associated_transaction_ref == transaction_ref)
            .cloned()
    }

    /// Sum of all recognised platform revenue, `None` on overflow
    pub fn platform_revenue(&self) -> Option<Money> {
        let total = lock(&self.records)
            .revenues
            .iter()
            .try_fold(Money::ZERO, |total, record| total.checked_add(record.amount.value));
        if total.is_none() {
            warn!("platform revenue overflows");
        }
        total
    }

    fn handle(&self, wallet_id: WalletId) -> Result<Arc<Mutex<Wallet>>, StoreError> {
        self.wallets
            .get(&wallet_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::WalletNotFound(wallet_id))
    }

    fn snapshot(&self, wallet_id: WalletId) -> Result<Wallet, StoreError> {
        let handle = self.handle(wallet_id)?;
        let wallet = lock(&handle).clone();
        Ok(wallet)
    }

    fn ensure_staged(
        &self,
        wallet_id: WalletId,
        session: &mut LedgerSession,
    ) -> Result<(), StoreError> {
        if session.staged(wallet_id).is_none() {
            let wallet = self.snapshot(wallet_id)?;
            session.stage(wallet);
        }
        Ok(())
    }
}

impl WalletStore for Ledger {
    type Session = LedgerSession;

    fn begin(&self) -> LedgerSession {
        LedgerSession::new()
    }

    fn find_by_owner(&self, kind: OwnerKind, owner_id: &str) -> Option<Wallet> {
        let wallet_id = *self.owners.get(&OwnerRef::new(kind, owner_id))?;
        self.wallet(wallet_id)
    }

    fn find_by_address(&self, address: &WalletAddress) -> Option<Wallet> {
        let wallet_id = *self.addresses.get(address)?;
        self.wallet(wallet_id)
    }

    fn read(&self, wallet_id: WalletId, session: &mut LedgerSession) -> Result<Wallet, StoreError> {
        self.ensure_staged(wallet_id, session)?;
        session
            .staged(wallet_id)
            .map(|staged| staged.wallet.clone())
            .ok_or(StoreError::WalletNotFound(wallet_id))
    }

    fn apply_delta(
        &self,
        wallet_id: WalletId,
        delta: Money,
        session: &mut LedgerSession,
    ) -> Result<Wallet, StoreError> {
        self.ensure_staged(wallet_id, session)?;
        let staged = session
            .staged_mut(wallet_id)
            .ok_or(StoreError::WalletNotFound(wallet_id))?;

        let resulting = staged
            .wallet
            .balance
            .checked_add(delta)
            .ok_or(StoreError::ArithmeticOverflow(wallet_id))?;
        if resulting.is_negative() {
            return Err(StoreError::NegativeBalance {
                wallet: wallet_id,
                delta,
                resulting,
            });
        }

        staged.wallet.balance = resulting;
        staged.dirty = true;
        Ok(staged.wallet.clone())
    }

    fn append_summary(
        &self,
        wallet_id: WalletId,
        summary: TransferSummary,
        session: &mut LedgerSession,
    ) -> Result<(), StoreError> {
        self.ensure_staged(wallet_id, session)?;
        let staged = session
            .staged_mut(wallet_id)
            .ok_or(StoreError::WalletNotFound(wallet_id))?;
        staged.wallet.push_summary(summary);
        staged.dirty = true;
        Ok(())
    }

    fn commit(&self, mut session: LedgerSession) -> Result<(), StoreError> {
        session.finish();

        // BTreeMap iteration gives ascending wallet ids: a global lock order
        let handles = session
            .wallets
            .keys()
            .map(|id| self.handle(*id).map(|handle| (*id, handle)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut guards: Vec<(WalletId, MutexGuard<'_, Wallet>)> = handles
            .iter()
            .map(|(id, handle)| (*id, lock(handle)))
            .collect();

        let mut book = lock(&self.records);
        for (scoped_key, _) in &session.receipts {
            if book.receipts.contains_key(scoped_key) {
                return Err(StoreError::DuplicateIdempotencyKey(scoped_key.1.clone()));
            }
        }

        for (id, guard) in &guards {
            if let Some(staged) = session.staged(*id) {
                if guard.version != staged.base_version {
                    return Err(StoreError::VersionConflict {
                        wallet: *id,
                        expected: staged.base_version,
                        found: guard.version,
                    });
                }
            }
        }

        let mut new_refs = HashSet::new();
        let staged_refs = session
            .transactions
            .iter()
            .map(|record| &record.transaction_ref)
            .chain(session.revenues.iter().map(|record| &record.transaction_ref));
        for reference in staged_refs {
            if book.references.contains(reference) || !new_refs.insert(reference.clone()) {
                return Err(StoreError::DuplicateReference(reference.clone()));
            }
        }
        for (key, _) in &session.receipts {
            if book.receipts.contains_key(key) {
                return Err(StoreError::DuplicateIdempotencyKey(key.1.clone()));
            }
        }

        for (id, guard) in guards.iter_mut() {
            if let Some(staged) = session.staged_mut(*id) {
                if staged.dirty {
                    let mut wallet = staged.wallet.clone();
                    wallet.version = staged.base_version + 1;
                    **guard = wallet;
                }
            }
        }

        book.references.extend(new_refs);
        book.transactions.append(&mut session.transactions);
        book.revenues.append(&mut session.revenues);
        for (key, receipt) in session.receipts.drain(..) {
            book.receipts.insert(key, receipt);
        }

        info!(wallets = guards.len(), "unit of work committed");
        Ok(())
    }

    fn abort(&self, mut session: LedgerSession) {
        session.finish();
        debug!(wallets = session.wallets.len(), "unit of work aborted");
    }
}

impl RecordWriter<LedgerSession> for Ledger {
    fn write_transfer(
        &self,
        transaction: TransactionRecord,
        revenue: Option<RevenueRecord>,
        session: &mut LedgerSession,
    ) -> Result<(), StoreError> {
        {
            let book = lock(&self.records);
            if book.references.contains(&transaction.transaction_ref) {
                return Err(StoreError::DuplicateReference(transaction.transaction_ref));
            }
        }

        session.transactions.push(transaction);
        if let Some(revenue) = revenue {
            session.revenues.push(revenue);
        }
        Ok(())
    }

    fn remember_receipt(
        &self,
        sender: &OwnerRef,
        key: &str,
        receipt: &TransferReceipt,
        session: &mut LedgerSession,
    ) -> Result<(), StoreError> {
        session
            .receipts
            .push(((sender.clone(), key.to_string()), receipt.clone()));
        Ok(())
    }

    fn find_receipt(&self, sender: &OwnerRef, key: &str) -> Option<TransferReceipt> {
        lock(&self.records)
            .receipts
            .get(&(sender.clone(), key.to_string()))
            .cloned()
    }
}
