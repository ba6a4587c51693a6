//! Wallet Transfer Engine Library
//! # Overview
//!
//! Moves money between owner wallets (users, merchants, drivers) with a
//! tier- and region-dependent fee, and records every committed transfer as
//! an immutable transaction record plus, when a fee was charged, a platform
//! revenue record. A transfer either commits entirely or leaves nothing
//! behind.
//!
//! # Architecture
//!
//! - [`types`] - Money, wallets, fee policies, records and errors
//! - [`core`] - Business logic:
//!   - [`core::engine`] - Transfer state machine
//!   - [`core::ledger`] - In-memory wallet store and record book
//!   - [`core::fee_schedule`] - Fee policy resolution and computation
//!   - [`core::batch_processor`] - Concurrent batch driver
//! - [`io`] - CSV readers, wallet output and the JSON-lines journal
//! - [`strategy`] - Sync and async end-to-end pipelines
//! - [`cli`] - Command-line arguments
//! - [`config`] / [`logging`] - Runtime settings and tracing setup
//!
//! # Transfer lifecycle
//!
//! ```text
//! Validating → Resolving → FeeCalculation → BalanceCheck
//!     → Debit → Credit → RecordWrite → Committed
//! ```
//!
//! Any failure before `Committed` ends in `Aborted` and rolls the unit of
//! work back. Notifications go out after the commit; their failures never
//! affect a committed transfer.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use core::{BatchProcessor, FeeSchedule, Ledger, TransferEngine, TransferRequest};
pub use io::{write_journal, write_wallets_csv};
pub use types::{
    Money, OwnerKind, OwnerRef, RevenueRecord, TransactionRecord, TransferError, TransferReceipt,
    Wallet, WalletId,
};
