use std::fmt;
use std::str::FromStr;

use arrow::array::RecordBatch;
use arrow::csv::WriterBuilder;
use bytes::Bytes;
use bytesize::ByteSize;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use snafu::{ResultExt, Snafu};

use crate::error::{CsvSnafu, ParquetSnafu, Result};

const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Parquet key/value metadata entries attached to every archive.
pub const RECORD_COUNT_KEY: &str = "TRADEARC:record-count";
pub const CREATED_BY_KEY: &str = "TRADEARC:created-by";

/// Supported archive file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Csv,
    Parquet,
}

#[derive(Debug, Snafu)]
#[snafu(display("unsupported archive format: {format:?}"))]
pub struct UnsupportedFormatError {
    pub format: String,
}

/// An archive file, serialized in memory and ready to upload.
#[derive(Debug, Clone)]
pub struct EncodedArchive {
    pub format: ArchiveFormat,
    pub data: Bytes,
    pub num_rows: usize,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }

    /// File extension of archive keys, without the leading dot.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for ArchiveFormat {
    type Err = UnsupportedFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            other => Err(UnsupportedFormatError {
                format: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EncodedArchive {
    pub fn size(&self) -> ByteSize {
        ByteSize::b(self.data.len() as u64)
    }
}

/// Serializes record batches into archive files.
#[derive(Debug, Clone)]
pub struct ArchiveEncoder {
    compression: Compression,
    created_by: String,
}

impl ArchiveEncoder {
    pub fn new(compression: Compression, created_by: impl Into<String>) -> Self {
        Self {
            compression,
            created_by: created_by.into(),
        }
    }

    pub fn encode(&self, batch: &RecordBatch, format: ArchiveFormat) -> Result<EncodedArchive> {
        let data = match format {
            ArchiveFormat::Csv => encode_csv(batch)?,
            ArchiveFormat::Parquet => self.encode_parquet(batch)?,
        };

        Ok(EncodedArchive {
            format,
            data: data.into(),
            num_rows: batch.num_rows(),
        })
    }

    fn writer_properties(&self, num_rows: usize) -> WriterProperties {
        let kv_metadata = vec![
            KeyValue::new(RECORD_COUNT_KEY.to_string(), num_rows.to_string()),
            KeyValue::new(CREATED_BY_KEY.to_string(), self.created_by.clone()),
        ];

        WriterProperties::builder()
            .set_compression(self.compression)
            .set_key_value_metadata(Some(kv_metadata))
            .set_created_by(self.created_by.clone())
            .build()
    }

    fn encode_parquet(&self, batch: &RecordBatch) -> Result<Vec<u8>> {
        let buffer = Vec::with_capacity(DEFAULT_BUFFER_CAPACITY);
        let properties = self.writer_properties(batch.num_rows());
        let mut writer =
            ArrowWriter::try_new(buffer, batch.schema(), Some(properties)).context(ParquetSnafu {})?;

        writer.write(batch).context(ParquetSnafu {})?;
        writer.finish().context(ParquetSnafu {})?;

        Ok(std::mem::take(writer.inner_mut()))
    }
}

impl Default for ArchiveEncoder {
    fn default() -> Self {
        Self::new(
            Compression::ZSTD(ZstdLevel::default()),
            format!("tradearc {}", env!("CARGO_PKG_VERSION")),
        )
    }
}

fn encode_csv(batch: &RecordBatch) -> Result<Vec<u8>> {
    let buffer = Vec::with_capacity(DEFAULT_BUFFER_CAPACITY);
    let mut writer = WriterBuilder::new().with_header(true).build(buffer);
    writer.write(batch).context(CsvSnafu {})?;
    Ok(writer.into_inner())
}
