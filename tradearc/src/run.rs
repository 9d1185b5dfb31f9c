use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use snafu::ResultExt;
use tokio::io::AsyncReadExt;
use tradearc_core::config::{DEFAULT_BUCKET, DEFAULT_FORMAT, DEFAULT_KEY_PREFIX};
use tradearc_core::{
    ArchiveConfig, ArchiveWriter, BatchProcessor, Intake, ProcessOutcome, StorageEvent,
};
use tradearc_object_store::{
    CloudObjectStoreFactory, DEFAULT_MAX_ATTEMPTS, LocalFileSystemFactory, ObjectStoreFactory,
    RetryPolicy, S3Options,
};

use crate::error::{InvalidArgumentSnafu, ObjectStoreSnafu, ReadEventSnafu, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Buckets are directories under `--root`.
    Local,
    /// S3 or an S3-compatible service. Credentials come from the AWS environment.
    S3,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Storage event JSON file. Reads stdin when omitted or `-`.
    #[arg(long, short)]
    event: Option<PathBuf>,
    #[clap(flatten)]
    archive: ArchiveArgs,
    #[clap(flatten)]
    store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    /// Bucket the archive is written to.
    #[arg(long, env = "TRADEARC_BUCKET", default_value = DEFAULT_BUCKET)]
    bucket: String,
    /// Prefix of the archive object key.
    #[arg(long, env = "TRADEARC_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    prefix: String,
    /// Archive format, `csv` or `parquet`. Other values skip the archive step.
    #[arg(long, env = "TRADEARC_FORMAT", default_value = DEFAULT_FORMAT)]
    format: String,
    /// Total upload attempts, including the first one.
    #[arg(long, env = "TRADEARC_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: usize,
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    #[arg(long, value_enum, env = "TRADEARC_STORE", default_value = "s3")]
    store: StoreKind,
    /// Root directory of the local store.
    #[arg(long, env = "TRADEARC_ROOT")]
    root: Option<PathBuf>,
    /// Endpoint of an S3-compatible service.
    #[arg(long, env = "TRADEARC_S3_ENDPOINT")]
    endpoint: Option<String>,
    #[arg(long, env = "TRADEARC_S3_REGION")]
    region: Option<String>,
    /// Allow plain HTTP endpoints.
    #[arg(long, env = "TRADEARC_S3_ALLOW_HTTP")]
    allow_http: bool,
}

impl RunArgs {
    pub async fn run(self) -> Result<ProcessOutcome> {
        let config = self.archive.into_config()?;
        let object_store_factory = self.store.into_factory()?;

        let event = read_event(self.event.as_ref()).await?;
        let event = StorageEvent::from_slice(&event)?;

        let writer = ArchiveWriter::new(object_store_factory.clone());
        let retry = RetryPolicy::new(config.max_attempts);
        let processor = BatchProcessor::new(config, Arc::new(writer));
        let intake = Intake::new(object_store_factory, processor).with_retry_policy(retry);

        Ok(intake.handle_event(&event).await?)
    }
}

impl ArchiveArgs {
    fn into_config(self) -> Result<ArchiveConfig> {
        if self.max_attempts == 0 {
            return InvalidArgumentSnafu {
                name: "max-attempts",
                message: "must be at least 1",
            }
            .fail();
        }

        if self.prefix.is_empty() {
            return InvalidArgumentSnafu {
                name: "prefix",
                message: "must not be empty",
            }
            .fail();
        }

        Ok(ArchiveConfig::default()
            .with_bucket(self.bucket)
            .with_key_prefix(self.prefix)
            .with_format(self.format)
            .with_max_attempts(self.max_attempts))
    }
}

impl StoreArgs {
    fn into_factory(self) -> Result<Arc<dyn ObjectStoreFactory>> {
        match self.store {
            StoreKind::Local => {
                let root = self.root.ok_or_else(|| {
                    InvalidArgumentSnafu {
                        name: "root",
                        message: "required with --store local",
                    }
                    .build()
                })?;
                let factory = LocalFileSystemFactory::new(root).context(ObjectStoreSnafu {})?;
                Ok(Arc::new(factory))
            }
            StoreKind::S3 => Ok(Arc::new(CloudObjectStoreFactory::new(S3Options {
                region: self.region,
                endpoint: self.endpoint,
                allow_http: self.allow_http,
            }))),
        }
    }
}

async fn read_event(path: Option<&PathBuf>) -> Result<Vec<u8>> {
    match path.filter(|path| path.as_os_str() != "-") {
        Some(path) => tokio::fs::read(path).await.context(ReadEventSnafu {
            source_name: path.display().to_string(),
        }),
        None => {
            let mut data = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut data)
                .await
                .context(ReadEventSnafu {
                    source_name: "stdin",
                })?;
            Ok(data)
        }
    }
}
