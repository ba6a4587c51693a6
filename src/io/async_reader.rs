//! Asynchronous CSV reader with batch interface
//!
//! Streams rows from any `futures::io::AsyncRead` and converts them through
//! [`FromCsvRecord`], handing them out in batches for the
//! [`BatchProcessor`](crate::core::BatchProcessor).
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader<R, T> → Vec<T> per batch
//!                  ↓
//!           csv_format module
//!           (FromCsvRecord)
//! ```

use crate::io::csv_format::FromCsvRecord;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use std::marker::PhantomData;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Memory use is bounded by the batch size, not the file size.
pub struct AsyncReader<R: AsyncRead + Unpin, T: FromCsvRecord> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: u64,
    _record: PhantomData<T>,
}

impl<R, T> AsyncReader<R, T>
where
    R: AsyncRead + Unpin + Send + 'static,
    T: FromCsvRecord,
{
    /// Create a new AsyncReader from an async reader
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 1,
            _record: PhantomData,
        }
    }

    /// Read up to `batch_size` converted rows
    ///
    /// Rows that fail to parse or convert are logged and skipped. An empty
    /// vector means the end of input.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<T> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut rows = self.csv_reader.deserialize::<T::Raw>();

        while batch.len() < batch_size {
            let Some(row) = rows.next().await else {
                break;
            };
            self.line_num += 1;
            match row {
                Ok(raw) => match T::from_csv_record(raw) {
                    Ok(record) => batch.push(record),
                    Err(e) => warn!(line = self.line_num, error = %e, "skipping invalid record"),
                },
                Err(e) => warn!(line = self.line_num, error = %e, "skipping unparsable row"),
            }
        }

        batch
    }
}
