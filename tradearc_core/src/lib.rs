//! Normalization and archival of raw trade batches.
//!
//! A raw batch is a JSON array of record strings. The [`BatchProcessor`]
//! normalizes every record into a [`TradeRecord`], drops the malformed ones
//! and hands the rest to an [`ArchiveSink`], usually the [`ArchiveWriter`],
//! which writes a single csv or parquet object. [`Intake`] wires the processor
//! to object-created notifications.

pub mod config;
pub mod encode;
pub mod error;
pub mod intake;
pub mod metrics;
pub mod normalize;
pub mod processor;
pub mod record;
pub mod table;
pub mod writer;

#[cfg(test)]
pub mod test_utils;

pub use config::ArchiveConfig;
pub use encode::{ArchiveEncoder, ArchiveFormat, EncodedArchive};
pub use error::{ArchiveError, IntakeError, ProcessError, RecordError};
pub use intake::{Intake, ObjectLocation, StorageEvent, decode_object_key};
pub use normalize::{normalize, normalize_at};
pub use processor::{BatchProcessor, ProcessOutcome, parse_record};
pub use record::{FieldValue, TRADE_COLUMNS, TradeRecord};
pub use table::{ArchiveInput, records_to_batch, trade_schema};
pub use writer::{ArchiveSink, ArchiveWriter, SkipReason, WriteOutcome, WriteState};
