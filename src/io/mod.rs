//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - Row formats for wallet seeds and transfers, wallet output
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface
//! - `journal` - JSON-lines audit journal

pub mod async_reader;
pub mod csv_format;
pub mod journal;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    write_wallets_csv, FromCsvRecord, TransferCsvRecord, WalletCsvRecord, WalletSeed,
};
pub use journal::write_journal;
pub use sync_reader::SyncReader;
