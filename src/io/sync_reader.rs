//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over rows of a CSV file, converted to a
//! domain type through [`FromCsvRecord`]. The same reader serves the wallet
//! seed file and the transfer file.
//!
//! ```no_run
//! use wallet_transfer_engine::core::TransferRequest;
//! use wallet_transfer_engine::io::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::<TransferRequest>::new(Path::new("transfers.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(request) => println!("Transfer from {}", request.sender),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `new()`
//! - Individual row errors are yielded as `Err` items carrying the line number
//!
//! Rows are read one at a time; memory use does not grow with file size.

use crate::io::csv_format::FromCsvRecord;
use crate::types::InputError;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

/// Synchronous CSV reader
#[derive(Debug)]
pub struct SyncReader<T: FromCsvRecord> {
    reader: csv::Reader<File>,
    line_num: u64,
    _record: PhantomData<T>,
}

impl<T: FromCsvRecord> SyncReader<T> {
    /// Create a new SyncReader from a file path
    ///
    /// The CSV reader trims whitespace from all fields and allows rows with
    /// trailing optional columns left out.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::FileNotFound`] if the file does not exist and
    /// [`InputError::Io`] if it cannot be opened.
    pub fn new(path: &Path) -> Result<Self, InputError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => InputError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => InputError::Io {
                message: format!("Failed to open file '{}': {}", path.display(), e),
            },
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
            _record: PhantomData,
        })
    }
}

impl<T: FromCsvRecord> Iterator for SyncReader<T> {
    type Item = Result<T, InputError>;

    /// Next converted row; `None` at end of file
    fn next(&mut self) -> Option<Self::Item> {
        let mut rows = self.reader.deserialize::<T::Raw>();
        let row = rows.next()?;
        self.line_num += 1;

        Some(match row {
            Ok(raw) => T::from_csv_record(raw).map_err(|message| InputError::InvalidRecord {
                line: Some(self.line_num),
                message,
            }),
            Err(e) => Err(InputError::Parse {
                line: Some(self.line_num),
                message: e.to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransferRequest;
    use crate::io::csv_format::WalletSeed;
    use crate::types::{Money, OwnerRef};
    use rust_decimal::Decimal;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_sync_reader_fails_on_missing_file() {
        let result = SyncReader::<WalletSeed>::new(Path::new("nonexistent.csv"));
        assert!(matches!(result, Err(InputError::FileNotFound { .. })));
    }

    #[test]
    fn test_sync_reader_reads_wallet_seeds() {
        let file = create_temp_csv(
            "owner_kind,owner_id,name,address,balance,currency,tier,contact\n\
             user,alice,Alice Doe,wa_alice,100.00,USD,STANDARD,tok-1\n\
             merchant,cafe,Corner Cafe,,0,,BUSINESS,\n",
        );

        let seeds: Vec<WalletSeed> = SyncReader::new(file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].wallet.balance, Money::from_minor(10_000));
        assert_eq!(seeds[1].wallet.owner, OwnerRef::merchant("cafe"));
        assert!(seeds[1].wallet.address.is_none());
    }

    #[test]
    fn test_sync_reader_reads_transfers_with_optional_columns() {
        let file = create_temp_csv(
            "sender_kind,sender_id,receiver,amount,description,region,idempotency_key\n\
             user,alice,bob,40.00,lunch,,\n\
             driver,sam,wa_cafe,12.5\n",
        );

        let requests: Vec<TransferRequest> = SyncReader::new(file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].description, "lunch");
        assert_eq!(requests[1].sender, OwnerRef::driver("sam"));
        assert_eq!(requests[1].amount, Decimal::new(125, 1));
    }

    #[test]
    fn test_sync_reader_includes_line_numbers_in_errors() {
        let file = create_temp_csv(
            "sender_kind,sender_id,receiver,amount\n\
             user,alice,bob,1.00\n\
             user,alice,bob,invalid\n\
             robot,alice,bob,1.00\n",
        );

        let rows: Vec<_> = SyncReader::<TransferRequest>::new(file.path())
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        let error = rows[1].as_ref().unwrap_err().to_string();
        assert!(error.contains("line 3"), "{}", error);
        assert!(error.contains("Invalid amount"));
        assert!(matches!(
            rows[2],
            Err(InputError::InvalidRecord { line: Some(4), .. })
        ));
    }

    #[test]
    fn test_sync_reader_handles_whitespace() {
        let file = create_temp_csv(
            "sender_kind,sender_id,receiver,amount\n  user  ,  alice  ,  bob  ,  7.25  \n",
        );

        let request = SyncReader::<TransferRequest>::new(file.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(request.sender, OwnerRef::user("alice"));
        assert_eq!(request.amount, Decimal::new(725, 2));
    }
}
