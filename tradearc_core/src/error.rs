use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use snafu::Snafu;
use tradearc_observability::ErrorKind;

/// Reasons a single raw trade is rejected.
///
/// These never abort a batch: the processor logs them and skips the record.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RecordError {
    #[snafu(display("record is not valid JSON"))]
    Json { source: serde_json::Error },
    #[snafu(display("record must be an array with exactly one trade, found {found}"))]
    Envelope { found: String },
    #[snafu(display("trade must be a JSON object, found {found}"))]
    NotAnObject { found: &'static str },
    #[snafu(display("cannot cast field {field} to {target}: {value}"))]
    Cast {
        field: &'static str,
        target: &'static str,
        value: String,
    },
}

/// Archive writer errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ArchiveError {
    #[snafu(display("failed to build record batch"))]
    Arrow { source: ArrowError },
    #[snafu(display("failed to encode csv"))]
    Csv { source: ArrowError },
    #[snafu(display("failed to encode parquet"))]
    Parquet { source: ParquetError },
    #[snafu(display("invalid object key {key}"))]
    Path {
        key: String,
        source: object_store::path::Error,
    },
    #[snafu(display("failed to create object store client for bucket {bucket}"))]
    ObjectStoreClient {
        bucket: String,
        source: object_store::Error,
    },
    #[snafu(display("failed to upload {key} to bucket {bucket}"))]
    Upload {
        bucket: String,
        key: String,
        source: object_store::Error,
    },
}

/// Batch processor errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProcessError {
    #[snafu(display("failed to archive {key} to bucket {bucket}"))]
    Archive {
        bucket: String,
        key: String,
        source: ArchiveError,
    },
}

/// Errors raised while turning a storage event into a processed batch.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IntakeError {
    #[snafu(display("invalid storage event"))]
    EventJson { source: serde_json::Error },
    #[snafu(display("storage event contains no records"))]
    EmptyEvent,
    #[snafu(display("object key {key} is not valid percent-encoded UTF-8"))]
    KeyDecode {
        key: String,
        source: std::str::Utf8Error,
    },
    #[snafu(display("invalid object key {key}"))]
    SourcePath {
        key: String,
        source: object_store::path::Error,
    },
    #[snafu(display("failed to create object store client for bucket {bucket}"))]
    SourceClient {
        bucket: String,
        source: object_store::Error,
    },
    #[snafu(display("failed to fetch {key} from bucket {bucket}"))]
    Fetch {
        bucket: String,
        key: String,
        source: object_store::Error,
    },
    #[snafu(display("{key} in bucket {bucket} is not a JSON array of strings"))]
    Decode {
        bucket: String,
        key: String,
        source: serde_json::Error,
    },
    #[snafu(transparent)]
    Process { source: ProcessError },
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Arrow { .. } | Self::Path { .. } => ErrorKind::Validation,
            Self::Csv { .. } | Self::Parquet { .. } => ErrorKind::Internal,
            Self::ObjectStoreClient { .. } => ErrorKind::Configuration,
            Self::Upload { .. } => ErrorKind::Temporary,
        }
    }
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Archive { source, .. } => source.kind(),
        }
    }
}

impl IntakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EventJson { .. }
            | Self::EmptyEvent
            | Self::KeyDecode { .. }
            | Self::SourcePath { .. }
            | Self::Decode { .. } => ErrorKind::Validation,
            Self::SourceClient { .. } => ErrorKind::Configuration,
            Self::Fetch { source, .. } => match source {
                object_store::Error::NotFound { .. } => ErrorKind::NotFound,
                _ => ErrorKind::Temporary,
            },
            Self::Process { source } => source.kind(),
        }
    }
}
