//! `tessera import` command.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tessera_client::import::DirectImportRequest;
use tessera_client::models::Fileset;
use tessera_client::{fileutils, Importer, RawStoragePolicy, BATCH_IMPORT_EXTENSIONS};

use crate::output;

use super::ConnectionArgs;

#[derive(Args)]
pub struct ImportArgs {
    /// Repository name
    #[arg(short, long)]
    pub repository: String,

    /// Import directory
    #[arg(short = 'd', long)]
    pub dir: Option<PathBuf>,

    /// Import a single file
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Direct import of a pre-tiled pyramid directory
    #[arg(short = 'l', long)]
    pub local: bool,

    /// Image name (direct import)
    #[arg(short = 'n', long)]
    pub imagename: Option<String>,

    /// Metadata sidecar path (direct import; default: <dir>/metadata.xml)
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Archive original images instead of destroying them after tiling
    #[arg(long)]
    pub archive: bool,
}

pub async fn execute(
    args: ImportArgs,
    connection: &ConnectionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.dir.is_none() && args.file.is_none() {
        return Err("define either a directory with -d or a file with -f to import".into());
    }

    let raw_storage = if args.archive {
        RawStoragePolicy::Archive
    } else {
        RawStoragePolicy::Destroy
    };

    let connection = super::connect(connection).await?;
    let store = connection.object_store();
    let importer = Importer::new(Arc::clone(&connection.session), store);

    if args.local {
        return direct_import(args, importer, raw_storage).await;
    }

    let files = match &args.dir {
        Some(dir) => fileutils::list_by_extension(dir, BATCH_IMPORT_EXTENSIONS),
        None => args.file.iter().cloned().collect(),
    };
    if files.is_empty() {
        println!("No files found.");
        return Ok(());
    }

    println!("Importing {} file(s) into '{}'", files.len(), args.repository);
    let total_bytes: u64 = files
        .iter()
        .map(|f| std::fs::metadata(f).map(|m| m.len()).unwrap_or(0))
        .sum();
    tracing::info!(
        "Upload size: {}",
        output::format_bytes(total_bytes)
    );

    let progress = Arc::new(|done: u64, total: u64| {
        print!("\rUploading: {}/{} files", done, total);
        let _ = std::io::stdout().flush();
    });

    let outcome = importer
        .import_files(&files, &args.repository, raw_storage, progress)
        .await?;
    println!();

    let outcome = match outcome {
        Some(outcome) => outcome,
        None => return Ok(()),
    };

    println!("{}", outcome.report.summary());
    for failed in &outcome.report.failed {
        println!("  failed: {} ({})", failed.path.display(), failed.reason);
    }

    importer
        .poll_import_progress(&outcome.import_uuid, &render_fileset_progress)
        .await?;
    println!();

    for (fileset, images) in importer.collect_results(&outcome.import_uuid).await? {
        println!("Fileset {} ({})", fileset.name, fileset.uuid);
        let mut table = output::new_table(&["UUID", "NAME", "PYRAMID LEVELS"]);
        for image in images {
            table.add_row([
                image.uuid.clone(),
                image.name.unwrap_or_else(|| "<none>".to_string()),
                image
                    .pyramid_levels
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }
        println!("{table}\n");
    }

    Ok(())
}

async fn direct_import(
    args: ImportArgs,
    importer: Importer,
    raw_storage: RawStoragePolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let directory = args
        .dir
        .ok_or("direct import requires a tile directory (-d)")?;
    let image_name = args
        .imagename
        .ok_or("direct import requires an image name (-n)")?;

    println!("Processing tiles locally.");
    let request = DirectImportRequest {
        directory,
        image_name,
        repository: args.repository,
        raw_storage,
        metadata: args.metadata,
    };

    let progress = Arc::new(|done: u64, total: u64| {
        print!("\rUploading: {}/{} tiles", done, total);
        let _ = std::io::stdout().flush();
    });

    match importer.import_tiled_image(&request, progress).await? {
        Some(outcome) => {
            println!();
            println!("{}", outcome.report.summary());
            println!("Image uuid: {}", outcome.image_uuid);
        }
        None => println!("No tile files found."),
    }
    Ok(())
}

/// Single-line fileset progress, rewritten in place each poll.
fn render_fileset_progress(filesets: &[Fileset]) {
    let mut line = String::from("Processing filesets:");
    for fileset in filesets {
        line.push_str(&format!(" {} {}%", fileset.name, fileset.progress_percent()));
    }
    print!("\r{line}");
    let _ = std::io::stdout().flush();
}
