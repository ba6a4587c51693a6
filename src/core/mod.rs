//! Core business logic module
//!
//! This module contains the transfer processing components:
//! - `traits` - Seams between the orchestrator and its collaborators
//! - `engine` - Transfer state machine
//! - `ledger` - In-memory wallet store and record book
//! - `session` - Unit of work shared by the store and the record writer
//! - `fee_schedule` - Fee policy resolution and computation
//! - `reference` - Transaction reference and wallet address generation
//! - `directory` - Owner profiles for snapshots and notifications
//! - `notify` - Post-commit notification dispatchers
//! - `batch_processor` - Concurrent batch driver

pub mod batch_processor;
pub mod directory;
pub mod engine;
pub mod fee_schedule;
pub mod ledger;
pub mod notify;
pub mod reference;
pub mod session;
pub mod traits;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use directory::{
    ContactChannel, InMemoryDirectory, OwnerCapabilities, OwnerProfile, ResolvedParty,
};
pub use engine::{TransferEngine, TransferRequest, TransferStage};
pub use fee_schedule::{compute_fee_amount, FeeSchedule};
pub use ledger::Ledger;
pub use notify::{
    ChannelNotifier, NotifyError, TracingNotifier, TransferEventKind, TransferNotification,
};
pub use session::LedgerSession;
pub use traits::{FeeResolver, NotificationDispatcher, OwnerDirectory, RecordWriter, WalletStore};
