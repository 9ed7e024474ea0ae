//! `tessera status` command.

use clap::Args;
use tessera_client::ImageService;

use crate::output;

use super::ConnectionArgs;

#[derive(Args)]
pub struct StatusArgs {}

pub async fn execute(
    _args: StatusArgs,
    connection: &ConnectionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let connection = super::connect(connection).await?;
    let incomplete = connection.session.list_incomplete_imports().await?;

    if incomplete.imports.is_empty() {
        println!("No imports are processing currently.");
        return Ok(());
    }

    println!("Following filesets are currently processing:");
    let mut table = output::new_table(&["UUID", "NAME", "COMPLETE", "PROGRESS"]);
    for fileset in &incomplete.filesets {
        table.add_row([
            fileset.uuid.clone(),
            fileset.name.clone(),
            fileset.complete.to_string(),
            format!("{}%", fileset.progress_percent()),
        ]);
    }
    println!("{table}");
    Ok(())
}
