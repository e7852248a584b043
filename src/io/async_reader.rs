//! Asynchronous CSV reader with batch interface
//!
//! Provides batched reading of ledger calls from a CSV call script for the
//! async pipeline.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of LedgerCalls
//!                  ↓
//!           csv_format module
//!           (CsvRecord, convert_csv_record)
//! ```

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::LedgerCall;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Reads calls in batches; rows that fail to parse are logged and skipped.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: u64,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 1,
        }
    }

    /// Read a batch of ledger calls
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Maximum number of calls to return
    ///
    /// # Returns
    ///
    /// Up to `batch_size` successfully converted calls, in file order. Only an
    /// exhausted file yields an empty vector.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LedgerCall> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            let Some(next) = records.next().await else {
                break;
            };
            self.line_num += 1;

            match next {
                Ok(csv_record) => match convert_csv_record(csv_record) {
                    Ok(call) => batch.push(call),
                    Err(e) => warn!(line = self.line_num, error = %e, "skipping call"),
                },
                Err(e) => warn!(line = self.line_num, error = %e, "CSV parse error"),
            }
        }

        batch
    }
}
