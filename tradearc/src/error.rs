use snafu::Snafu;
use tradearc_core::IntakeError;
use tradearc_observability::ErrorKind;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Invalid {name} argument: {message}"))]
    InvalidArgument { name: &'static str, message: String },
    #[snafu(display("Failed to read storage event from {source_name}"))]
    ReadEvent {
        source_name: String,
        source: std::io::Error,
    },
    #[snafu(display("Object store error"))]
    ObjectStore { source: object_store::Error },
    #[snafu(display("Failed to initialize observability"))]
    Observability {
        source: tradearc_observability::ObservabilityError,
    },
    #[snafu(transparent)]
    Intake { source: IntakeError },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. }
            | Self::ObjectStore { .. }
            | Self::Observability { .. } => ErrorKind::Configuration,
            Self::ReadEvent { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                _ => ErrorKind::Internal,
            },
            Self::Intake { source } => source.kind(),
        }
    }
}
