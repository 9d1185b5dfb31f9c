use tradearc_object_store::DEFAULT_MAX_ATTEMPTS;

pub const DEFAULT_BUCKET: &str = "stage-trades-archive";
pub const DEFAULT_KEY_PREFIX: &str = "test_vcxt_trade";
pub const DEFAULT_FORMAT: &str = "parquet";

/// Where and how accepted batches are archived.
///
/// `format` is kept as given. Values other than `csv` and `parquet` are
/// accepted here and turn the archive step into a logged no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub bucket: String,
    pub key_prefix: String,
    pub format: String,
    pub max_attempts: usize,
}

impl ArchiveConfig {
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            format: DEFAULT_FORMAT.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}
