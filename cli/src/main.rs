//! Tessera CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tessera_cli::commands::{dispatch, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing; --debug raises everything to debug level.
    let default_filter = if cli.debug {
        "debug"
    } else {
        "warn,tessera_cli=info,tessera_client=info,tessera_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
