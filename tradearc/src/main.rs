use std::process::ExitCode;

use clap::Parser;
use snafu::{Report, ResultExt};
use tracing::info;

use crate::error::{CliError, ObservabilitySnafu};
use crate::run::RunArgs;

mod error;
mod run;

#[derive(Parser)]
#[command(name = "tradearc")]
#[command(about = "Normalize a raw trade batch and archive it as csv or parquet")]
#[command(version)]
struct Cli {
    #[clap(flatten)]
    inner: RunArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let guard = match tradearc_observability::init_observability(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    )
    .context(ObservabilitySnafu {})
    {
        Ok(guard) => guard,
        Err(err) => return exit_with(err),
    };

    let result = cli.inner.run().await;
    if let Ok(outcome) = &result {
        info!(outcome = ?outcome, "invocation finished");
    }
    guard.shutdown();

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => exit_with(err),
    }
}

fn exit_with(err: CliError) -> ExitCode {
    let code = err.kind().exit_code();
    eprintln!("{}", Report::from_error(err));
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
