//! Transfer orchestration
//!
//! This module provides the [`TransferEngine`], the state machine that moves
//! money between two wallets:
//!
//! ```text
//! Validating → Resolving → FeeCalculation → BalanceCheck → Debit → Credit → RecordWrite → Committed
//!      └────────────┴──────────────┴───────────────┴───────────┴───────┴──────────┴──→ Aborted
//! ```
//!
//! The engine enforces business rules such as:
//! - Positive amounts with at most two decimal places
//! - Sender and receiver resolving to two distinct wallets of one currency
//! - Sender balance covering amount plus fee, re-read inside the unit of work
//! - Balance changes and records landing in a single commit, or not at all
//!
//! Notifications are sent after the commit and can never undo a transfer.

use crate::config::EngineConfig;
use crate::core::directory::{InMemoryDirectory, ResolvedParty};
use crate::core::ledger::Ledger;
use crate::core::notify::{TracingNotifier, TransferEventKind, TransferNotification};
use crate::core::reference;
use crate::core::traits::{
    FeeResolver, NotificationDispatcher, OwnerDirectory, RecordWriter, WalletStore,
};
use crate::types::{
    ErrorKind, FeeLine, FeePolicy, Money, MoneyAmount, OwnerKind, OwnerRef, PartySnapshot, Region,
    RevenueMetadata, RevenueRecord, RevenueStatus, StoreError, TransactionKind,
    TransactionMetadata, TransactionRecord, TransactionStatus, TransferDirection, TransferError,
    TransferReceipt, TransferSummary, Wallet, WalletAddress, WalletId,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};

/// Revenue type recorded for transfer fees
const TRANSFER_FEE_REVENUE: &str = "transfer_fee";

/// A transfer as received from the boundary layer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    /// Authenticated caller
    pub sender: OwnerRef,
    /// Receiver owner id or public wallet address
    pub receiver: String,
    pub amount: Decimal,
    pub description: String,
    /// Fee region; the engine default applies when absent
    pub region: Option<Region>,
    /// Caller-supplied deduplication token
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    pub fn new(sender: OwnerRef, receiver: impl Into<String>, amount: Decimal) -> Self {
        Self {
            sender,
            receiver: receiver.into(),
            amount,
            description: String::new(),
            region: None,
            idempotency_key: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn in_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// States of the transfer state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Validating,
    Resolving,
    FeeCalculation,
    BalanceCheck,
    Debit,
    Credit,
    RecordWrite,
    Committed,
    Aborted,
}

impl TransferStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Validating => "validating",
            TransferStage::Resolving => "resolving",
            TransferStage::FeeCalculation => "fee_calculation",
            TransferStage::BalanceCheck => "balance_check",
            TransferStage::Debit => "debit",
            TransferStage::Credit => "credit",
            TransferStage::RecordWrite => "record_write",
            TransferStage::Committed => "committed",
            TransferStage::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStage::Committed | TransferStage::Aborted)
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of one transfer, logging every transition
struct StageTracker {
    stage: TransferStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: TransferStage::Validating,
        }
    }

    fn advance(&mut self, next: TransferStage) {
        debug!(from = %self.stage, to = %next, "transfer stage");
        self.stage = next;
    }
}

/// Everything resolved before the unit of work opens
struct TransferPlan {
    sender: Wallet,
    receiver: Wallet,
    sender_party: ResolvedParty,
    receiver_party: ResolvedParty,
    amount: Money,
    fee: Money,
    total: Money,
    policy: FeePolicy,
}

enum Outcome {
    Committed {
        receipt: TransferReceipt,
        plan: Box<TransferPlan>,
    },
    /// Idempotency key already committed; nothing was changed
    Replayed(TransferReceipt),
}

/// Transfer orchestrator
///
/// Coordinates the wallet store, fee resolver and record writer for each
/// transfer. Holds no per-transfer state, so one engine can serve many
/// threads at once; consistency between concurrent transfers on the same
/// wallet is left to the store's commit.
pub struct TransferEngine<W, R>
where
    W: WalletStore,
    R: RecordWriter<W::Session>,
{
    store: Arc<W>,
    records: Arc<R>,
    fees: Arc<dyn FeeResolver>,
    directory: Arc<dyn OwnerDirectory>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: EngineConfig,
}

impl TransferEngine<Ledger, Ledger> {
    /// Engine over an in-memory ledger acting as both store and record writer
    pub fn with_ledger(ledger: Arc<Ledger>, fees: Arc<dyn FeeResolver>) -> Self {
        Self::new(Arc::clone(&ledger), ledger, fees)
    }
}

impl<W, R> TransferEngine<W, R>
where
    W: WalletStore,
    R: RecordWriter<W::Session>,
{
    /// Create an engine with an empty owner directory, a logging notifier
    /// and default configuration
    pub fn new(store: Arc<W>, records: Arc<R>, fees: Arc<dyn FeeResolver>) -> Self {
        Self {
            store,
            records,
            fees,
            directory: Arc::new(InMemoryDirectory::new()),
            notifier: Arc::new(TracingNotifier),
            config: EngineConfig::default(),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn OwnerDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<W> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a transfer
    ///
    /// Runs the full state machine. Any failure before the commit aborts the
    /// unit of work, so neither wallet nor the record book changes. A request
    /// whose idempotency key was already committed returns the original
    /// receipt without touching anything.
    ///
    /// # Arguments
    ///
    /// * `request` - Sender, receiver identifier, amount and options
    ///
    /// # Returns
    ///
    /// * `Ok(TransferReceipt)` - Reference, new sender balance and the fee charged
    /// * `Err(TransferError)` - Why the transfer was rejected or aborted
    ///
    /// # Errors
    ///
    /// - Validation: bad amount, missing identifier, self-transfer, currency
    ///   mismatch, ambiguous receiver
    /// - Not found: sender or receiver wallet absent
    /// - Insufficient balance: amount plus fee exceeds the sender balance
    /// - Fee calculation: the resolved policy is undefined for the amount
    /// - Persistence: record write or commit failed; safe to retry
    pub fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, TransferError> {
        let span = info_span!(
            "transfer",
            sender = %request.sender,
            receiver = %request.receiver,
            amount = %request.amount
        );
        let _entered = span.enter();

        let mut stage = StageTracker::new();
        match self.run(&request, &mut stage) {
            Ok(Outcome::Committed { receipt, plan }) => {
                stage.advance(TransferStage::Committed);
                info!(
                    transaction_ref = %receipt.transaction_ref,
                    amount = %plan.amount,
                    fee = %receipt.fee_amount,
                    fee_type = %receipt.fee_type,
                    "transfer committed"
                );
                self.announce(&plan, &receipt.transaction_ref);
                Ok(receipt)
            }
            Ok(Outcome::Replayed(receipt)) => {
                info!(
                    transaction_ref = %receipt.transaction_ref,
                    "idempotency key already committed, returning original receipt"
                );
                Ok(receipt)
            }
            Err(failure) => {
                let failed_at = stage.stage;
                stage.advance(TransferStage::Aborted);
                match failure.kind() {
                    ErrorKind::FeeCalculation | ErrorKind::Persistence => {
                        error!(stage = %failed_at, error = %failure, "transfer aborted")
                    }
                    kind => {
                        warn!(stage = %failed_at, kind = ?kind, error = %failure, "transfer rejected")
                    }
                }
                Err(failure)
            }
        }
    }

    fn run(
        &self,
        request: &TransferRequest,
        stage: &mut StageTracker,
    ) -> Result<Outcome, TransferError> {
        let amount = validate(request)?;
        let idempotency_key = normalized_key(request);
        let sender_ref = OwnerRef::new(request.sender.kind, request.sender.id.trim());

        if let Some(key) = idempotency_key {
            if let Some(receipt) = self.records.find_receipt(&sender_ref, key) {
                return Ok(Outcome::Replayed(receipt));
            }
        }

        stage.advance(TransferStage::Resolving);
        let sender = self
            .store
            .find_by_owner(sender_ref.kind, &sender_ref.id)
            .ok_or_else(|| TransferError::sender_not_found(&request.sender))?;
        let receiver = self.resolve_receiver(request.receiver.trim())?;

        if sender.id == receiver.id {
            return Err(TransferError::SelfTransfer);
        }
        if sender.currency != receiver.currency {
            return Err(TransferError::CurrencyMismatch {
                sender: sender.currency.clone(),
                receiver: receiver.currency.clone(),
            });
        }

        let sender_party = ResolvedParty::resolve(self.directory.as_ref(), &sender.owner);
        let receiver_party = ResolvedParty::resolve(self.directory.as_ref(), &receiver.owner);

        stage.advance(TransferStage::FeeCalculation);
        let region = request
            .region
            .clone()
            .unwrap_or_else(|| self.config.default_region.clone());
        let policy = self
            .fees
            .resolve_fee(TransactionKind::Transfer, amount, sender.tier, &region);
        let fee = self.fees.compute_fee_amount(&policy, amount)?;
        let total = amount
            .checked_add(fee)
            .ok_or_else(|| TransferError::invalid_amount(request.amount))?;
        debug!(policy = %policy.name, fee = %fee, total = %total, region = %region, "fee resolved");

        let plan = TransferPlan {
            sender,
            receiver,
            sender_party,
            receiver_party,
            amount,
            fee,
            total,
            policy,
        };

        stage.advance(TransferStage::BalanceCheck);
        let mut session = self.store.begin();
        let receipt = match self.stage_writes(&plan, request, idempotency_key, &mut session, stage)
        {
            Ok(receipt) => receipt,
            Err(failure) => {
                self.store.abort(session);
                return Err(failure);
            }
        };

        match self.store.commit(session) {
            Ok(()) => Ok(Outcome::Committed {
                receipt,
                plan: Box::new(plan),
            }),
            Err(StoreError::DuplicateIdempotencyKey(key)) => {
                // A concurrent request with the same key won the commit
                match self.records.find_receipt(&plan.sender.owner, &key) {
                    Some(original) => Ok(Outcome::Replayed(original)),
                    None => Err(self.store_failure(StoreError::DuplicateIdempotencyKey(key))),
                }
            }
            Err(failure) => Err(self.store_failure(failure)),
        }
    }

    /// Stage balance checks, both deltas and the records inside `session`
    fn stage_writes(
        &self,
        plan: &TransferPlan,
        request: &TransferRequest,
        idempotency_key: Option<&str>,
        session: &mut W::Session,
        stage: &mut StageTracker,
    ) -> Result<TransferReceipt, TransferError> {
        let sender_id = plan.sender.id;
        let receiver_id = plan.receiver.id;

        // Fresh read inside the unit of work; the resolved snapshot may be stale
        let current = self
            .store
            .read(sender_id, session)
            .map_err(|e| self.store_failure(e))?;
        if current.balance < plan.total {
            return Err(TransferError::insufficient_balance(current.balance, plan.total));
        }

        stage.advance(TransferStage::Debit);
        let debited = self
            .store
            .apply_delta(sender_id, plan.total.negate(), session)
            .map_err(|e| match e {
                StoreError::NegativeBalance { .. } => {
                    TransferError::insufficient_balance(current.balance, plan.total)
                }
                other => self.store_failure(other),
            })?;

        stage.advance(TransferStage::Credit);
        self.store
            .apply_delta(receiver_id, plan.amount, session)
            .map_err(|e| self.store_failure(e))?;

        stage.advance(TransferStage::RecordWrite);
        let now = Utc::now();
        let transaction_ref = reference::transaction_ref(now);
        let fee_type = plan.policy.fee_type().to_string();
        let currency = current.currency.clone();

        let fees = if plan.fee.is_positive() {
            vec![FeeLine {
                amount: plan.fee,
                currency: currency.clone(),
                fee_type: fee_type.clone(),
                description: plan.policy.description.clone(),
            }]
        } else {
            Vec::new()
        };

        let transaction = TransactionRecord {
            transaction_ref: transaction_ref.clone(),
            transaction_date: now,
            kind: TransactionKind::Transfer,
            status: TransactionStatus::Completed,
            sender: snapshot(&plan.sender, &plan.sender_party),
            receiver: snapshot(&plan.receiver, &plan.receiver_party),
            amount: MoneyAmount::new(plan.amount, currency.clone()),
            fees,
            metadata: TransactionMetadata {
                source: self.config.source.clone(),
                notes: request.description.clone(),
                idempotency_key: idempotency_key.map(str::to_string),
            },
            created_at: now,
        };

        let revenue = plan.fee.is_positive().then(|| RevenueRecord {
            associated_transaction_ref: transaction_ref.clone(),
            transaction_ref: reference::revenue_ref_for(&transaction_ref),
            date: now,
            amount: MoneyAmount::new(plan.fee, currency.clone()),
            status: RevenueStatus::Pending,
            revenue_type: TRANSFER_FEE_REVENUE.to_string(),
            metadata: RevenueMetadata {
                fee_policy: plan.policy.name.clone(),
                fee_type: fee_type.clone(),
                payer_wallet: sender_id,
            },
        });

        let summaries = [
            (sender_id, TransferDirection::Sent, receiver_id),
            (receiver_id, TransferDirection::Received, sender_id),
        ];
        for (wallet_id, direction, counterparty) in summaries {
            let summary = TransferSummary {
                transaction_ref: transaction_ref.clone(),
                direction,
                counterparty,
                amount: plan.amount,
                at: now,
            };
            self.store
                .append_summary(wallet_id, summary, session)
                .map_err(|e| self.store_failure(e))?;
        }

        self.records
            .write_transfer(transaction, revenue, session)
            .map_err(|e| self.store_failure(e))?;

        let receipt = TransferReceipt {
            transaction_ref,
            new_sender_balance: debited.balance,
            fee_amount: plan.fee,
            fee_type,
        };

        if let Some(key) = idempotency_key {
            self.records
                .remember_receipt(&plan.sender.owner, key, &receipt, session)
                .map_err(|e| self.store_failure(e))?;
        }

        Ok(receipt)
    }

    /// Wallets a request would touch, as far as they resolve today
    ///
    /// Used by the batch driver to keep transfers that share a wallet in
    /// input order. Unresolvable parties are left out.
    pub fn touched_wallets(&self, request: &TransferRequest) -> Vec<WalletId> {
        let sender = self
            .store
            .find_by_owner(request.sender.kind, request.sender.id.trim())
            .map(|wallet| wallet.id);
        let receiver = self
            .resolve_receiver(request.receiver.trim())
            .ok()
            .map(|wallet| wallet.id);
        sender.into_iter().chain(receiver).collect()
    }

    /// Resolve a receiver identifier to a wallet
    ///
    /// Addresses win over owner ids. An owner id held by wallets of more than
    /// one owner kind is ambiguous and rejected.
    fn resolve_receiver(&self, identifier: &str) -> Result<Wallet, TransferError> {
        if let Some(address) = WalletAddress::new(identifier) {
            if let Some(wallet) = self.store.find_by_address(&address) {
                return Ok(wallet);
            }
        }

        let mut matches: Vec<Wallet> = OwnerKind::ALL
            .iter()
            .filter_map(|kind| self.store.find_by_owner(*kind, identifier))
            .collect();

        match matches.len() {
            0 => Err(TransferError::receiver_not_found(identifier)),
            1 => Ok(matches.remove(0)),
            _ => Err(TransferError::AmbiguousReceiver {
                identifier: identifier.to_string(),
            }),
        }
    }

    /// Notify notifiable parties of a committed transfer
    fn announce(&self, plan: &TransferPlan, transaction_ref: &str) {
        if !self.config.notifications_enabled {
            return;
        }

        let events = [
            (
                TransferEventKind::TransferSent,
                &plan.sender_party,
                &plan.receiver_party,
            ),
            (
                TransferEventKind::TransferReceived,
                &plan.receiver_party,
                &plan.sender_party,
            ),
        ];

        for (kind, party, counterparty) in events {
            if !party.is_notifiable() {
                continue;
            }
            let Some(channel) = party.contact.clone() else {
                continue;
            };

            let notification = TransferNotification {
                kind,
                recipient: party.owner.clone(),
                channel,
                transaction_ref: transaction_ref.to_string(),
                amount: plan.amount,
                counterparty: counterparty.display_name.clone(),
            };
            if let Err(e) = self.notifier.notify(notification) {
                warn!(
                    event = kind.as_str(),
                    recipient = %party.owner,
                    error = %e,
                    "notification dropped"
                );
            }
        }
    }

    /// Log a ledger failure with its detail and convert it to a stable error
    fn store_failure(&self, failure: StoreError) -> TransferError {
        error!(error = %failure, "ledger operation failed");
        failure.into()
    }
}

/// Check the request shape and convert the amount
fn validate(request: &TransferRequest) -> Result<Money, TransferError> {
    if request.sender.id.trim().is_empty() {
        return Err(TransferError::MissingIdentifier { field: "sender" });
    }
    if request.receiver.trim().is_empty() {
        return Err(TransferError::MissingIdentifier { field: "receiver" });
    }
    if request.amount <= Decimal::ZERO {
        return Err(TransferError::invalid_amount(request.amount));
    }
    Money::from_decimal(request.amount).ok_or_else(|| TransferError::invalid_amount(request.amount))
}

fn normalized_key(request: &TransferRequest) -> Option<&str> {
    request
        .idempotency_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

fn snapshot(wallet: &Wallet, party: &ResolvedParty) -> PartySnapshot {
    PartySnapshot {
        id: wallet.owner.id.clone(),
        wallet_id: wallet.id,
        name: party.display_name.clone(),
        owner_kind: wallet.owner.kind,
        tier: wallet.tier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::directory::{ContactChannel, OwnerProfile};
    use crate::core::fee_schedule::FeeSchedule;
    use crate::core::notify::ChannelNotifier;
    use crate::core::session::LedgerSession;
    use crate::types::{Currency, FeeBracket, FeeCalculation, NewWallet, Tier};
    use rstest::rstest;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn open(ledger: &Ledger, owner: OwnerRef, balance: &str, tier: Tier) -> Wallet {
        ledger
            .open_wallet(
                NewWallet::new(owner, Currency::usd(), tier).with_balance(money(balance)),
            )
            .unwrap()
    }

    fn setup() -> (Arc<Ledger>, TransferEngine<Ledger, Ledger>) {
        let ledger = Arc::new(Ledger::new());
        let engine =
            TransferEngine::with_ledger(Arc::clone(&ledger), Arc::new(FeeSchedule::standard()));
        (ledger, engine)
    }

    #[test]
    fn test_standard_flat_fee_scenario() {
        let (ledger, engine) = setup();
        let sender = open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        let receiver = open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let receipt = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec("40.00")))
            .unwrap();

        assert_eq!(receipt.new_sender_balance, money("58.50"));
        assert_eq!(receipt.fee_amount, money("1.50"));
        assert_eq!(receipt.fee_type, "flat");
        assert_eq!(ledger.wallet(sender.id).unwrap().balance, money("58.50"));
        assert_eq!(ledger.wallet(receiver.id).unwrap().balance, money("40.00"));

        let record = ledger.transaction(&receipt.transaction_ref).unwrap();
        assert_eq!(record.fees.len(), 1);
        assert_eq!(record.fees[0].amount, money("1.50"));
        assert_eq!(record.sender.owner_kind, OwnerKind::User);

        let revenue = ledger.revenue_for(&receipt.transaction_ref).unwrap();
        assert_eq!(revenue.amount.value, money("1.50"));
        assert_eq!(revenue.status, RevenueStatus::Pending);
        assert!(revenue.transaction_ref.starts_with("REV-"));
        assert_eq!(ledger.platform_revenue(), Some(money("1.50")));
    }

    #[test]
    fn test_insufficient_balance_changes_nothing() {
        let (ledger, engine) = setup();
        let sender = open(&ledger, OwnerRef::user("alice"), "10.00", Tier::Standard);
        let receiver = open(&ledger, OwnerRef::user("bob"), "5.00", Tier::Standard);

        let err = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec("20.00")))
            .unwrap_err();

        assert_eq!(
            err,
            TransferError::insufficient_balance(money("10.00"), money("21.50"))
        );
        assert_eq!(ledger.wallet(sender.id).unwrap(), sender);
        assert_eq!(ledger.wallet(receiver.id).unwrap(), receiver);
        assert!(ledger.transactions().is_empty());
    }

    #[test]
    fn test_fee_pushes_total_over_balance() {
        let (ledger, engine) = setup();
        open(&ledger, OwnerRef::user("alice"), "40.00", Tier::Standard);
        open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let err = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec("40.00")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn test_exact_balance_is_enough() {
        let (ledger, engine) = setup();
        let sender = open(&ledger, OwnerRef::user("alice"), "41.50", Tier::Standard);
        open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec("40.00")))
            .unwrap();
        assert_eq!(ledger.wallet(sender.id).unwrap().balance, Money::ZERO);
    }

    #[rstest]
    #[case::zero("0")]
    #[case::negative("-5.00")]
    #[case::sub_cent("1.005")]
    fn test_invalid_amounts_rejected(#[case] amount: &str) {
        let (ledger, engine) = setup();
        let sender = open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let err = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec(amount)))
            .unwrap_err();

        assert!(matches!(err, TransferError::InvalidAmount { .. }));
        assert_eq!(ledger.wallet(sender.id).unwrap(), sender);
    }

    #[test]
    fn test_trailing_zeros_are_not_extra_precision() {
        let (ledger, engine) = setup();
        open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let receipt = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec("10.5000")))
            .unwrap();
        assert_eq!(receipt.new_sender_balance, money("88.00"));
    }

    #[rstest]
    #[case::sender("", "bob", "sender")]
    #[case::receiver("alice", "  ", "receiver")]
    fn test_missing_identifiers(#[case] sender: &str, #[case] receiver: &str, #[case] field: &str) {
        let (_ledger, engine) = setup();
        let err = engine
            .transfer(TransferRequest::new(OwnerRef::user(sender), receiver, dec("1.00")))
            .unwrap_err();
        assert!(matches!(err, TransferError::MissingIdentifier { field: f } if f == field));
    }

    #[test]
    fn test_self_transfer_by_owner_and_address() {
        let (ledger, engine) = setup();
        let wallet = open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);

        for receiver in ["alice".to_string(), wallet.address.to_string()] {
            let err = engine
                .transfer(TransferRequest::new(OwnerRef::user("alice"), receiver, dec("1.00")))
                .unwrap_err();
            assert_eq!(err, TransferError::SelfTransfer);
        }
        assert_eq!(ledger.wallet(wallet.id).unwrap(), wallet);
    }

    #[test]
    fn test_unknown_address_fails_not_found() {
        let (ledger, engine) = setup();
        let sender = open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);

        let err = engine
            .transfer(TransferRequest::new(
                OwnerRef::user("alice"),
                "wa_doesnotexist000000000000",
                dec("10.00"),
            ))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(ledger.wallet(sender.id).unwrap(), sender);
    }

    #[test]
    fn test_unknown_sender_fails_not_found() {
        let (ledger, engine) = setup();
        open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let err = engine
            .transfer(TransferRequest::new(OwnerRef::driver("ghost"), "bob", dec("1.00")))
            .unwrap_err();
        assert!(matches!(err, TransferError::SenderNotFound { .. }));
    }

    #[test]
    fn test_receiver_resolved_by_address() {
        let (ledger, engine) = setup();
        open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        let merchant = open(&ledger, OwnerRef::merchant("m-1"), "0.00", Tier::Business);

        engine
            .transfer(TransferRequest::new(
                OwnerRef::user("alice"),
                merchant.address.as_str(),
                dec("25.00"),
            ))
            .unwrap();
        assert_eq!(ledger.wallet(merchant.id).unwrap().balance, money("25.00"));
    }

    #[test]
    fn test_owner_id_shared_by_two_kinds_is_ambiguous() {
        let (ledger, engine) = setup();
        open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        open(&ledger, OwnerRef::merchant("shared-7"), "0.00", Tier::Business);
        open(&ledger, OwnerRef::driver("shared-7"), "0.00", Tier::Standard);

        let err = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "shared-7", dec("5.00")))
            .unwrap_err();
        assert!(matches!(err, TransferError::AmbiguousReceiver { .. }));
    }

    #[test]
    fn test_currency_mismatch_rejected() {
        let (ledger, engine) = setup();
        open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        ledger
            .open_wallet(NewWallet::new(
                OwnerRef::user("bob"),
                Currency::new("EUR").unwrap(),
                Tier::Standard,
            ))
            .unwrap();

        let err = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec("5.00")))
            .unwrap_err();
        assert!(matches!(err, TransferError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_free_transfer_writes_no_revenue() {
        let ledger = Arc::new(Ledger::new());
        let schedule = FeeSchedule::new(vec![], FeePolicy::free("no-fee", "No fee")).unwrap();
        let engine = TransferEngine::with_ledger(Arc::clone(&ledger), Arc::new(schedule));
        open(&ledger, OwnerRef::user("alice"), "10.00", Tier::Standard);
        open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let receipt = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec("10.00")))
            .unwrap();

        assert_eq!(receipt.fee_amount, Money::ZERO);
        assert!(ledger.revenue_records().is_empty());
        assert!(ledger.transaction(&receipt.transaction_ref).unwrap().fees.is_empty());
    }

    #[test]
    fn test_idempotent_replay_returns_original_receipt() {
        let (ledger, engine) = setup();
        let sender = open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let request = TransferRequest::new(OwnerRef::user("alice"), "bob", dec("10.00"))
            .with_idempotency_key("req-1");
        let first = engine.transfer(request.clone()).unwrap();
        let second = engine.transfer(request).unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.transactions().len(), 1);
        assert_eq!(ledger.wallet(sender.id).unwrap().balance, money("88.50"));
    }

    #[test]
    fn test_same_key_from_different_senders_both_commit() {
        let (ledger, engine) = setup();
        let alice = open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);
        let carol = open(&ledger, OwnerRef::user("carol"), "500.00", Tier::Standard);
        let dave = open(&ledger, OwnerRef::user("dave"), "0.00", Tier::Standard);

        let first = engine
            .transfer(
                TransferRequest::new(OwnerRef::user("alice"), "bob", dec("10.00"))
                    .with_idempotency_key("k1"),
            )
            .unwrap();
        let second = engine
            .transfer(
                TransferRequest::new(OwnerRef::user("carol"), "dave", dec("200.00"))
                    .with_idempotency_key("k1"),
            )
            .unwrap();

        assert_ne!(first.transaction_ref, second.transaction_ref);
        assert_eq!(second.new_sender_balance, money("298.50"));
        assert_eq!(ledger.wallet(alice.id).unwrap().balance, money("88.50"));
        assert_eq!(ledger.wallet(carol.id).unwrap().balance, money("298.50"));
        assert_eq!(ledger.wallet(dave.id).unwrap().balance, money("200.00"));
        assert_eq!(ledger.transactions().len(), 2);
    }

    struct BrokenFees;

    impl FeeResolver for BrokenFees {
        fn resolve_fee(&self, _: TransactionKind, _: Money, _: Tier, _: &Region) -> FeePolicy {
            FeePolicy {
                name: "gap".to_string(),
                description: "tiered table with a gap".to_string(),
                calculation: FeeCalculation::Tiered {
                    brackets: vec![FeeBracket {
                        up_to: Some(Money::from_minor(100)),
                        flat: None,
                        rate: None,
                    }],
                },
            }
        }
    }

    #[test]
    fn test_undefined_fee_aborts_before_any_mutation() {
        let ledger = Arc::new(Ledger::new());
        let engine = TransferEngine::with_ledger(Arc::clone(&ledger), Arc::new(BrokenFees));
        let sender = open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let err = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec("50.00")))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FeeCalculation);
        assert_eq!(ledger.wallet(sender.id).unwrap(), sender);
    }

    struct RejectingWriter;

    impl RecordWriter<LedgerSession> for RejectingWriter {
        fn write_transfer(
            &self,
            transaction: TransactionRecord,
            _revenue: Option<RevenueRecord>,
            _session: &mut LedgerSession,
        ) -> Result<(), StoreError> {
            Err(StoreError::DuplicateReference(transaction.transaction_ref))
        }

        fn remember_receipt(
            &self,
            _sender: &OwnerRef,
            _key: &str,
            _receipt: &TransferReceipt,
            _session: &mut LedgerSession,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        fn find_receipt(&self, _sender: &OwnerRef, _key: &str) -> Option<TransferReceipt> {
            None
        }
    }

    #[test]
    fn test_record_write_failure_rolls_back_both_wallets() {
        let ledger = Arc::new(Ledger::new());
        let engine = TransferEngine::new(
            Arc::clone(&ledger),
            Arc::new(RejectingWriter),
            Arc::new(FeeSchedule::standard()),
        );
        let sender = open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        let receiver = open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let err = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "bob", dec("40.00")))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.kind().is_retryable());
        assert_eq!(ledger.wallet(sender.id).unwrap(), sender);
        assert_eq!(ledger.wallet(receiver.id).unwrap(), receiver);
    }

    #[tokio::test]
    async fn test_notifications_only_for_notifiable_parties() {
        let (ledger, engine) = setup();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert(
            OwnerRef::user("alice"),
            OwnerProfile::User {
                first_name: "Alice".into(),
                last_name: "Doe".into(),
                device_token: Some("tok-a".into()),
            },
        );
        directory.insert(
            OwnerRef::merchant("cafe"),
            OwnerProfile::Merchant {
                business_name: "Corner Cafe".into(),
                contact_email: Some("cafe@example.com".into()),
            },
        );
        let (notifier, mut events) = ChannelNotifier::channel();
        let engine = engine
            .with_directory(directory)
            .with_notifier(Arc::new(notifier));

        open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        open(&ledger, OwnerRef::merchant("cafe"), "0.00", Tier::Business);

        let receipt = engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "cafe", dec("12.00")))
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, TransferEventKind::TransferSent);
        assert_eq!(event.recipient, OwnerRef::user("alice"));
        assert_eq!(event.counterparty, "Corner Cafe");
        assert_eq!(event.transaction_ref, receipt.transaction_ref);
        assert_eq!(
            event.channel,
            ContactChannel::Push {
                device_token: "tok-a".into()
            }
        );
        assert!(events.try_recv().is_err());

        let record = ledger.transaction(&receipt.transaction_ref).unwrap();
        assert_eq!(record.sender.name, "Alice Doe");
        assert_eq!(record.receiver.name, "Corner Cafe");
    }

    #[test]
    fn test_disabled_notifications_skip_dispatch() {
        let (ledger, engine) = setup();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert(
            OwnerRef::driver("sam"),
            OwnerProfile::Driver {
                full_name: "Sam Rivers".into(),
                phone: Some("+100".into()),
            },
        );
        let (notifier, mut events) = ChannelNotifier::channel();
        let engine = engine
            .with_directory(directory)
            .with_notifier(Arc::new(notifier))
            .with_config(EngineConfig::default().with_notifications(false));

        open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        open(&ledger, OwnerRef::driver("sam"), "0.00", Tier::Standard);

        engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "sam", dec("30.00")))
            .unwrap();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_closed_notification_channel_does_not_fail_transfer() {
        let (ledger, engine) = setup();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert(
            OwnerRef::driver("sam"),
            OwnerProfile::Driver {
                full_name: "Sam Rivers".into(),
                phone: Some("+100".into()),
            },
        );
        let (notifier, receiver) = ChannelNotifier::channel();
        drop(receiver);
        let engine = engine
            .with_directory(directory)
            .with_notifier(Arc::new(notifier));

        open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Standard);
        let driver = open(&ledger, OwnerRef::driver("sam"), "0.00", Tier::Standard);

        engine
            .transfer(TransferRequest::new(OwnerRef::user("alice"), "sam", dec("30.00")))
            .unwrap();
        assert_eq!(ledger.wallet(driver.id).unwrap().balance, money("30.00"));
    }

    #[test]
    fn test_summaries_and_counter_recorded() {
        let (ledger, engine) = setup();
        let sender = open(&ledger, OwnerRef::user("alice"), "100.00", Tier::Premium);
        let receiver = open(&ledger, OwnerRef::user("bob"), "0.00", Tier::Standard);

        let receipt = engine
            .transfer(
                TransferRequest::new(OwnerRef::user("alice"), "bob", dec("20.00"))
                    .with_description("rent share"),
            )
            .unwrap();

        // Premium: 0.5% of 20.00 = 0.10, raised to the 0.50 minimum
        assert_eq!(receipt.fee_amount, money("0.50"));
        assert_eq!(receipt.fee_type, "percentage");

        let sender_after = ledger.wallet(sender.id).unwrap();
        let receiver_after = ledger.wallet(receiver.id).unwrap();
        assert_eq!(sender_after.monthly_transaction_count, 1);
        assert_eq!(sender_after.transfers_sent[0].counterparty, receiver.id);
        assert_eq!(receiver_after.transfers_received[0].transaction_ref, receipt.transaction_ref);
        assert_eq!(
            ledger.transaction(&receipt.transaction_ref).unwrap().metadata.notes,
            "rent share"
        );
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(TransferStage::FeeCalculation.to_string(), "fee_calculation");
        assert!(TransferStage::Aborted.is_terminal());
        assert!(!TransferStage::RecordWrite.is_terminal());
    }
}
