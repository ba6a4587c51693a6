//! Core traits for wallet storage, record writing, fee resolution and
//! post-commit notification
//!
//! These are the seams the transfer orchestrator is built against. The
//! in-memory [`Ledger`](crate::core::Ledger) implements both storage traits;
//! tests swap individual pieces (for example a record writer that fails) to
//! exercise the abort paths.

use crate::core::directory::OwnerProfile;
use crate::core::notify::{NotifyError, TransferNotification};
use crate::types::{
    FeePolicy, Money, OwnerKind, OwnerRef, Region, RevenueRecord, StoreError, Tier,
    TransactionKind, TransactionRecord, TransferError, TransferReceipt, TransferSummary, Wallet,
    WalletAddress, WalletId,
};

/// Wallet persistence scoped to units of work
///
/// Lookups outside a session return committed snapshots. Every mutation goes
/// through a session obtained from [`WalletStore::begin`] and only becomes
/// visible when that session is committed.
pub trait WalletStore: Send + Sync {
    /// Unit-of-work handle shared with the [`RecordWriter`]
    type Session: Send;

    /// Open a unit of work
    fn begin(&self) -> Self::Session;

    /// Committed wallet for an owner
    fn find_by_owner(&self, kind: OwnerKind, owner_id: &str) -> Option<Wallet>;

    /// Committed wallet for a public address
    fn find_by_address(&self, address: &WalletAddress) -> Option<Wallet>;

    /// Read a wallet inside the session, pinning the version it was read at
    ///
    /// Returns the session's staged view when the wallet was already touched.
    fn read(&self, wallet_id: WalletId, session: &mut Self::Session) -> Result<Wallet, StoreError>;

    /// Adjust a balance by `delta` inside the session
    ///
    /// Rejects without any staged effect when the resulting balance would be
    /// negative.
    fn apply_delta(
        &self,
        wallet_id: WalletId,
        delta: Money,
        session: &mut Self::Session,
    ) -> Result<Wallet, StoreError>;

    /// Stage a sent/received summary for a wallet
    fn append_summary(
        &self,
        wallet_id: WalletId,
        summary: TransferSummary,
        session: &mut Self::Session,
    ) -> Result<(), StoreError>;

    /// Atomically apply everything staged in the session
    fn commit(&self, session: Self::Session) -> Result<(), StoreError>;

    /// Discard everything staged in the session
    fn abort(&self, session: Self::Session);
}

/// Writer for the immutable records of a transfer
///
/// Writes are staged in the caller's session so they land in the same
/// commit as the balance changes, or not at all.
pub trait RecordWriter<S>: Send + Sync {
    /// Stage the transaction record and, when a fee was charged, its revenue
    /// record
    fn write_transfer(
        &self,
        transaction: TransactionRecord,
        revenue: Option<RevenueRecord>,
        session: &mut S,
    ) -> Result<(), StoreError>;

    /// Stage a sender's idempotency key so that a replay returns `receipt`
    ///
    /// Keys are scoped to the sender: two senders may use the same key.
    fn remember_receipt(
        &self,
        sender: &OwnerRef,
        key: &str,
        receipt: &TransferReceipt,
        session: &mut S,
    ) -> Result<(), StoreError>;

    /// Receipt committed by `sender` under an idempotency key
    fn find_receipt(&self, sender: &OwnerRef, key: &str) -> Option<TransferReceipt>;
}

/// Fee policy lookup and calculation
pub trait FeeResolver: Send + Sync {
    /// Most specific matching policy, or the default one
    ///
    /// Never fails: schedules are validated when they are built.
    fn resolve_fee(
        &self,
        kind: TransactionKind,
        amount: Money,
        tier: Tier,
        region: &Region,
    ) -> FeePolicy;

    /// Fee amount for `amount` under `policy`, rounded to the minor unit
    fn compute_fee_amount(&self, policy: &FeePolicy, amount: Money) -> Result<Money, TransferError> {
        crate::core::fee_schedule::compute_fee_amount(policy, amount)
    }
}

/// Source of display names and contact channels for wallet owners
pub trait OwnerDirectory: Send + Sync {
    fn profile(&self, owner: &OwnerRef) -> Option<OwnerProfile>;
}

/// Best-effort delivery of transfer events
///
/// Implementations must not block; failures are logged by the caller and
/// never affect the committed transfer.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: TransferNotification) -> Result<(), NotifyError>;
}
