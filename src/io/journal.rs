//! JSON-lines audit journal
//!
//! Each committed transfer becomes one `transaction` line, followed by its
//! `revenue` line when a fee was charged.

use crate::types::{InputError, JournalEntry, RevenueRecord, TransactionRecord};
use std::collections::HashMap;
use std::io::Write;

/// Write transaction and revenue records as JSON lines
///
/// Transactions keep the order given; each revenue record follows the
/// transaction it was generated for.
pub fn write_journal(
    transactions: &[TransactionRecord],
    revenues: &[RevenueRecord],
    output: &mut dyn Write,
) -> Result<(), InputError> {
    let revenue_by_tx: HashMap<&str, &RevenueRecord> = revenues
        .iter()
        .map(|revenue| (revenue.associated_transaction_ref.as_str(), revenue))
        .collect();

    for transaction in transactions {
        write_line(output, &JournalEntry::Transaction(transaction))?;
        if let Some(revenue) = revenue_by_tx.get(transaction.transaction_ref.as_str()) {
            write_line(output, &JournalEntry::Revenue(revenue))?;
        }
    }

    output.flush()?;
    Ok(())
}

fn write_line(output: &mut dyn Write, entry: &JournalEntry<'_>) -> Result<(), InputError> {
    let line = serde_json::to_string(entry).map_err(|e| InputError::Io {
        message: format!("Failed to serialize journal entry: {}", e),
    })?;
    writeln!(output, "{}", line)?;
    Ok(())
}
