//! `tessera images` command.

use clap::Args;
use tessera_client::ImageService;

use crate::output;

use super::ConnectionArgs;

#[derive(Args)]
pub struct ImagesArgs {
    /// Repository name
    #[arg(short, long)]
    pub repository: String,
}

pub async fn execute(
    args: ImagesArgs,
    connection: &ConnectionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let connection = super::connect(connection).await?;
    let listing = connection.session.list_repositories().await?;

    let repository = listing
        .find_by_name(&args.repository)
        .ok_or_else(|| format!("repository '{}' not found", args.repository))?;

    let images = connection
        .session
        .list_images_in_repository(&repository.uuid)
        .await?;

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
    println!("{table}");
    Ok(())
}
