//! `tessera repositories` command.

use clap::Args;
use tessera_client::ImageService;

use crate::output;

use super::ConnectionArgs;

#[derive(Args)]
pub struct RepositoriesArgs {
    /// Only show repository names (one per line)
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(
    args: RepositoriesArgs,
    connection: &ConnectionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let connection = super::connect(connection).await?;
    let listing = connection.session.list_repositories().await?;

    if args.quiet {
        for repository in &listing.repositories {
            println!("{}", repository.name);
        }
        return Ok(());
    }

    let mut table = output::new_table(&["NAME", "UUID", "RAW STORAGE", "PERMISSION"]);
    for repository in &listing.repositories {
        table.add_row([
            repository.name.as_str(),
            repository.uuid.as_str(),
            repository.raw_storage.as_deref().unwrap_or("-"),
            listing.permission_for(&repository.uuid).unwrap_or("-"),
        ]);
    }
    println!("{table}");
    Ok(())
}
