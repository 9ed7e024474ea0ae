//! `tessera export` command.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tessera_client::{ExportFormat, Exporter};

use super::ConnectionArgs;

#[derive(Args)]
pub struct ExportArgs {
    /// Image uuid
    #[arg(long)]
    pub id: String,

    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Save the full pyramid instead of the base level only
    #[arg(short = 'p', long)]
    pub pyramid: bool,

    /// Export format
    #[arg(long, default_value = "zarr")]
    pub format: String,
}

pub async fn execute(
    args: ExportArgs,
    connection: &ConnectionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let format: ExportFormat = args.format.parse()?;

    let connection = super::connect(connection).await?;
    let store = connection.object_store();
    let exporter = Exporter::new(Arc::clone(&connection.session), store);

    println!("Exporting image {} (pyramid={})", args.id, args.pyramid);
    let progress = Arc::new(|done: u64, total: u64| {
        print!("\rDownloading: {}/{} tiles", done, total);
        let _ = std::io::stdout().flush();
    });

    let output = exporter
        .export_image(
            &args.id,
            args.output.as_deref(),
            args.pyramid,
            format,
            progress,
        )
        .await?;
    println!();
    println!("Image saved as {}", output.display());
    Ok(())
}
