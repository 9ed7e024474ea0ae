//! CLI command definitions and dispatch.

mod configure;
mod export;
mod images;
mod import;
mod repositories;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tessera_client::{ImageService, S3ObjectStore, Session};
use tessera_core::config::{Overrides, Settings};

/// Tessera — import and export tiled microscopy images.
#[derive(Parser)]
#[command(name = "tessera", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Debug logging on
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Connection settings shared by every remote command. Flags override
/// `TESSERA_*` environment variables, which override the config file.
#[derive(Args, Clone, Default)]
pub struct ConnectionArgs {
    /// Config file (default: ~/.tessera.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Service endpoint
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// AWS region
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Identity provider client id
    #[arg(long, global = true)]
    pub client_id: Option<String>,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Import images into a repository
    Import(import::ImportArgs),
    /// Export an image as zarr or TIFF
    Export(export::ExportArgs),
    /// List repositories
    #[command(alias = "list")]
    Repositories(repositories::RepositoriesArgs),
    /// List images in a repository
    Images(images::ImagesArgs),
    /// Show import processing status
    Status(status::StatusArgs),
    /// Write the configuration file interactively
    Configure,
}

/// A resolved connection: settings plus an authenticated session.
pub(crate) struct Connection {
    pub settings: Settings,
    pub session: Arc<dyn ImageService>,
}

impl Connection {
    /// S3 transfer backend for this connection's region.
    pub fn object_store(&self) -> Arc<S3ObjectStore> {
        Arc::new(S3ObjectStore::new(&self.settings.region))
    }
}

/// Resolve settings and authenticate. One token per CLI invocation.
pub(crate) async fn connect(
    args: &ConnectionArgs,
) -> Result<Connection, Box<dyn std::error::Error>> {
    let overrides = Overrides {
        endpoint: args.endpoint.clone(),
        region: args.region.clone(),
        client_id: args.client_id.clone(),
    };
    let settings = Settings::resolve(args.config.as_deref(), &overrides)?;

    let token = tessera_client::authenticate(
        &settings.region,
        &settings.client_id,
        &settings.username,
        &settings.password,
    )
    .await?;

    let session = Arc::new(Session::new(&settings.endpoint, token));
    Ok(Connection { settings, session })
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Import(args) => import::execute(args, &cli.connection).await,
        Command::Export(args) => export::execute(args, &cli.connection).await,
        Command::Repositories(args) => repositories::execute(args, &cli.connection).await,
        Command::Images(args) => images::execute(args, &cli.connection).await,
        Command::Status(args) => status::execute(args, &cli.connection).await,
        Command::Configure => configure::execute(),
    }
}
